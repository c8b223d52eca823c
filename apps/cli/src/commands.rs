use loam_ssg::{RenderEngine, SiteBuilder, clean_output_dir};
use std::fs;
use std::path::Path;
use std::time::Instant;

fn escape_toml_string(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for character in input.chars() {
        match character {
            '\\' => output.push_str("\\\\"),
            '"' => output.push_str("\\\""),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            '\u{0008}' => output.push_str("\\b"),
            '\u{000C}' => output.push_str("\\f"),
            control if control < '\u{0020}' => {
                output.push_str(&format!("\\u{:04X}", control as u32));
            }
            other => output.push(other),
        }
    }
    output
}

fn starter_config(title: &str) -> String {
    let escaped_title = escape_toml_string(title);
    format!(
        r#"title = "{escaped_title}"
base_url = "https://example.com"
subtitle = "A new Loam site"
language = "en"
posts_per_page = 10
"#
    )
}

pub fn new_site(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let site_dir = Path::new(name);

    if site_dir.exists() {
        return Err(format!("Directory '{}' already exists", name).into());
    }

    fs::create_dir_all(site_dir.join("content").join("posts"))?;
    fs::create_dir_all(site_dir.join("content").join("pages"))?;
    fs::create_dir_all(site_dir.join("templates"))?;

    fs::write(site_dir.join("loam.toml"), starter_config(name))?;

    let about_content = r#"---
title: About
---

This is the about page.
"#;
    fs::write(
        site_dir.join("content").join("pages").join("about.md"),
        about_content,
    )?;

    let post_content = r#"---
title: Hello World
date: 2024-01-01
tags: [welcome, first-post]
shortname: hello
---

This is your first post. Start writing!

You can use **markdown** formatting and shortcodes:

{{< img "/images/example.jpg" "An example" >}}

Link to other posts by shortname with {{< link hello "a link" >}}.
"#;
    fs::write(
        site_dir
            .join("content")
            .join("posts")
            .join("hello-world.md"),
        post_content,
    )?;

    println!("Created new site: {name}");
    println!("  cd {name}");
    println!("  loam build");

    Ok(())
}

pub fn init_site() -> Result<(), Box<dyn std::error::Error>> {
    let current_dir = std::env::current_dir()?;

    if current_dir.join("loam.toml").exists() {
        return Err("loam.toml already exists in this directory".into());
    }

    fs::create_dir_all(current_dir.join("content").join("posts"))?;
    fs::create_dir_all(current_dir.join("templates"))?;

    let name = current_dir
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "My Site".to_string());

    fs::write(current_dir.join("loam.toml"), starter_config(&name))?;

    println!("Initialized Loam site in current directory");

    Ok(())
}

pub fn build_site(
    input: Option<&Path>,
    output: &Path,
    drafts: bool,
    base_url: Option<&str>,
    clean: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let input_dir = input.unwrap_or(Path::new("."));

    if clean {
        clean_output_dir(output)?;
    }

    println!("Building site...");
    let start = Instant::now();

    let mut builder = SiteBuilder::new(input_dir).include_drafts(drafts);

    if let Some(url) = base_url {
        builder = builder.base_url(url);
    }

    let site = builder.build()?;

    let templates_dir = input_dir.join("templates");
    let site_templates = templates_dir.is_dir().then_some(templates_dir.as_path());
    let engine = RenderEngine::new(site_templates)?;
    engine.render_site(&site, output)?;

    let elapsed = start.elapsed();
    println!(
        "Built {} items to {} in {:.2?}",
        site.items.len(),
        output.display(),
        elapsed
    );

    Ok(())
}
