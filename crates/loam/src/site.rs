use crate::cache::{CacheEntry, FileStamp, FreshnessCache};
use crate::content::{ContentItem, Frontmatter, build_item};
use crate::error::{LoamError, Result};
use crate::handlers::HandlerRegistry;
use crate::parsing::{extract_frontmatter, parse_markdown};
use crate::shortcodes::ShortcodeExpander;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const CACHE_DIR: &str = ".loam-cache";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub title: String,
    pub base_url: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: usize,
    /// Optional feature switches (e.g. `reviews_in_index`); unset features
    /// fall back to the caller's default.
    #[serde(default)]
    pub features: HashMap<String, bool>,
    /// Localized URL segment per section, e.g. `reviews = "rezensionen"`.
    #[serde(default)]
    pub slugs: HashMap<String, String>,
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

pub fn default_posts_per_page() -> usize {
    10
}

impl SiteConfig {
    pub fn feature(&self, name: &str, default: bool) -> bool {
        self.features.get(name).copied().unwrap_or(default)
    }

    /// The host part of `base_url`, used to tell internal anchors from
    /// external ones.
    pub fn host(&self) -> &str {
        crate::links::url_host(&self.base_url).unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Site {
    pub config: SiteConfig,
    /// All loaded items, newest first.
    pub items: Vec<ContentItem>,
    pub last_updated: DateTime<Utc>,
}

impl Site {
    pub fn section(&self, name: &str) -> Vec<&ContentItem> {
        self.items
            .iter()
            .filter(|item| item.section == name)
            .collect()
    }
}

pub struct SiteBuilder {
    input_dir: PathBuf,
    include_drafts: bool,
    base_url_override: Option<String>,
}

impl SiteBuilder {
    pub fn new(input_dir: impl AsRef<Path>) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            include_drafts: false,
            base_url_override: None,
        }
    }

    pub fn include_drafts(mut self, include: bool) -> Self {
        self.include_drafts = include;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }

    /// Loads the config and all content. A missing config is the only fatal
    /// condition; individual items that fail to parse are reported and
    /// skipped so one bad file never sinks the build.
    pub fn build(&self) -> Result<Site> {
        let mut config = self.load_config()?;

        if let Some(ref url) = self.base_url_override {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        let mut cache = FreshnessCache::load(&self.input_dir.join(CACHE_DIR));
        let expander = ShortcodeExpander::new(HandlerRegistry::builtin());

        let mut items = self.load_content(&config, &mut cache, &expander)?;

        if let Err(error) = cache.flush() {
            eprintln!("Warning: failed to write cache snapshot: {error}");
        }

        items.sort_by(|a, b| b.date.cmp(&a.date));

        let last_updated = items.first().map(|item| item.date).unwrap_or_else(Utc::now);

        Ok(Site {
            config,
            items,
            last_updated,
        })
    }

    fn load_config(&self) -> Result<SiteConfig> {
        let config_path = self.input_dir.join("loam.toml");

        if !config_path.exists() {
            return Err(LoamError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        let mut config: SiteConfig =
            toml::from_str(&content).map_err(|error| LoamError::TomlParse {
                path: config_path,
                message: error.to_string(),
            })?;

        config.base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(config)
    }

    /// Walks `content/<section>/` one level deep. An item is either a bare
    /// `<slug>.md` file or a `<slug>/post.md` bundle directory.
    fn load_content(
        &self,
        config: &SiteConfig,
        cache: &mut FreshnessCache,
        expander: &ShortcodeExpander,
    ) -> Result<Vec<ContentItem>> {
        let content_dir = self.input_dir.join("content");
        let mut items = Vec::new();

        if !content_dir.is_dir() {
            return Ok(items);
        }

        for entry in WalkDir::new(&content_dir).min_depth(2).max_depth(3) {
            let entry = entry.map_err(|error| LoamError::WalkDir {
                path: content_dir.clone(),
                message: error.to_string(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some((section, slug)) = locate_item(&content_dir, path, entry.depth()) else {
                continue;
            };

            match self.load_item(path, &section, &slug, config, cache, expander) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(error) => {
                    eprintln!("Warning: skipping {}: {}", path.display(), error);
                }
            }
        }

        Ok(items)
    }

    /// Parses one source file, going through the cache keyed by mtime. The
    /// draft check runs after caching so toggling `--drafts` never requires
    /// re-parsing.
    fn load_item(
        &self,
        source: &Path,
        section: &str,
        slug: &str,
        config: &SiteConfig,
        cache: &mut FreshnessCache,
        expander: &ShortcodeExpander,
    ) -> Result<Option<ContentItem>> {
        let stamp = FileStamp::from_metadata(source)?;
        let cache_key = self.cache_key(source);

        let (html, frontmatter) = match cache.get(&cache_key, &stamp) {
            Some(entry) => (
                entry.html.clone(),
                Frontmatter {
                    raw: entry.frontmatter.clone(),
                },
            ),
            None => {
                let raw = fs::read_to_string(source)?;
                let (frontmatter, body) = extract_frontmatter(&raw, source)?;
                let expanded = expander.expand(&body);
                let html = parse_markdown(&expanded);

                cache.put(
                    &cache_key,
                    CacheEntry {
                        mtime: stamp,
                        html: html.clone(),
                        frontmatter: frontmatter.raw.clone(),
                    },
                );

                (html, frontmatter)
            }
        };

        if frontmatter.get_bool("draft").unwrap_or(false) && !self.include_drafts {
            return Ok(None);
        }

        Ok(Some(build_item(
            section,
            slug,
            frontmatter,
            html,
            source.to_path_buf(),
            &config.slugs,
        )))
    }

    fn cache_key(&self, source: &Path) -> String {
        source
            .strip_prefix(&self.input_dir)
            .unwrap_or(source)
            .to_string_lossy()
            .into_owned()
    }
}

/// Maps a walked file back to (section, slug). A `.md` file directly under a
/// section is a bare item; a file named `post.md` one level deeper is a
/// bundle whose slug is the directory name. Anything else is skipped.
fn locate_item(content_dir: &Path, path: &Path, depth: usize) -> Option<(String, String)> {
    if path.extension().is_none_or(|extension| extension != "md") {
        return None;
    }

    let relative = path.strip_prefix(content_dir).ok()?;
    let section = relative
        .components()
        .next()?
        .as_os_str()
        .to_string_lossy()
        .to_string();

    match depth {
        2 => {
            let slug = path.file_stem()?.to_string_lossy().to_string();
            Some((section, slug))
        }
        3 if path.file_name().is_some_and(|name| name == "post.md") => {
            let slug = path.parent()?.file_name()?.to_string_lossy().to_string();
            Some((section, slug))
        }
        _ => None,
    }
}
