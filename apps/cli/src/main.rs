mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "loam")]
#[command(about = "A shortcode-driven Markdown site generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    New {
        name: String,
    },
    Init,
    Build {
        #[arg(long, short)]
        input: Option<PathBuf>,

        #[arg(long, short, default_value = "dist")]
        output: PathBuf,

        #[arg(long)]
        drafts: bool,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        clean: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::New { name } => commands::new_site(&name),
        Commands::Init => commands::init_site(),
        Commands::Build {
            input,
            output,
            drafts,
            base_url,
            clean,
        } => commands::build_site(input.as_deref(), &output, drafts, base_url.as_deref(), clean),
    };

    if let Err(error) = result {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
