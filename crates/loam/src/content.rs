use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

const DEFAULT_ICON: &str = "\u{1F4AC}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(flatten)]
    pub raw: HashMap<String, Value>,
}

impl Frontmatter {
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.raw.get(key).and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.raw.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.raw.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_array(&self, key: &str) -> Option<Vec<String>> {
        self.raw.get(key).and_then(|v| {
            v.as_array().map(|arr| {
                arr.iter()
                    .map(|item| match item.as_str() {
                        Some(s) => s.to_string(),
                        None => item.to_string(),
                    })
                    .collect()
            })
        })
    }
}

/// Section-specific shape of a content item. The section name selects the
/// variant through an explicit table in [`kind_for_section`]; unknown
/// sections fall back to `Post`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Post,
    Micro,
    Review {
        rating: Option<f64>,
    },
    Bookmark {
        link: Option<String>,
        domain: Option<String>,
    },
    Music {
        link: Option<String>,
        domain: Option<String>,
    },
    Page,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub title: String,
    pub date: DateTime<Utc>,
    pub slug: String,
    pub url: String,
    pub html: String,
    pub section: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub shortname: Option<String>,
    #[serde(default)]
    pub hide_from_home: bool,
    /// Pre-rendered star string for rated reviews, `None` otherwise. Kept on
    /// the item so templates can print it directly.
    #[serde(default)]
    pub stars: Option<String>,
    pub frontmatter: Frontmatter,
    pub source_path: PathBuf,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl ContentItem {
    pub fn icon(&self) -> String {
        match self.frontmatter.get_string("emoji") {
            Some(emoji) if !emoji.is_empty() => emoji,
            _ => DEFAULT_ICON.to_string(),
        }
    }

    /// True when a music item's body embeds exactly one iframe.
    pub fn has_single_embed(&self) -> bool {
        matches!(self.kind, ItemKind::Music { .. }) && self.html.matches("<iframe").count() == 1
    }
}

/// Renders a score on a 5-star scale: full stars, a half-star glyph when the
/// fractional remainder is at least 0.5, empty stars for the rest. Always
/// exactly five glyphs.
pub fn stars(score: f64) -> String {
    let clamped = score.clamp(0.0, 5.0);
    let full = clamped.floor() as usize;
    let half = clamped - full as f64 >= 0.5;
    let empty = 5 - full - usize::from(half);

    let mut output = String::new();
    for _ in 0..full {
        output.push('\u{2605}');
    }
    if half {
        output.push('\u{2BE8}');
    }
    for _ in 0..empty {
        output.push('\u{2606}');
    }
    output
}

fn kind_for_section(section: &str, frontmatter: &Frontmatter) -> ItemKind {
    match section {
        "micro" => ItemKind::Micro,
        "posts" => ItemKind::Post,
        "reviews" => ItemKind::Review {
            rating: frontmatter.get_f64("rating"),
        },
        "bookmarks" => {
            let link = frontmatter.get_string("link");
            let domain = link.as_deref().and_then(domain_from_link);
            ItemKind::Bookmark { link, domain }
        }
        "music" => {
            let link = frontmatter.get_string("link");
            let domain = link.as_deref().and_then(domain_from_link);
            ItemKind::Music { link, domain }
        }
        "pages" => ItemKind::Page,
        _ => ItemKind::Post,
    }
}

/// Extracts the host from an absolute URL, stripping a leading `www.`.
fn domain_from_link(link: &str) -> Option<String> {
    let after_scheme = link.split_once("://").map(|(_, rest)| rest)?;
    let host = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(after_scheme);

    if host.is_empty() {
        return None;
    }

    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Builds the typed content item for one parsed source. The URL is derived
/// here from section and slug and never changes afterwards; `url_slugs`
/// optionally localizes the section segment.
pub fn build_item(
    section: &str,
    slug: &str,
    frontmatter: Frontmatter,
    html: String,
    source_path: PathBuf,
    url_slugs: &HashMap<String, String>,
) -> ContentItem {
    let title = frontmatter
        .get_string("title")
        .unwrap_or_else(|| "Untitled".to_string());

    let date = frontmatter
        .get_string("date")
        .and_then(|value| crate::parsing::parse_date(&value))
        .unwrap_or_else(Utc::now);

    let url = if section == "pages" {
        format!("/{}/", slug)
    } else {
        let url_section = url_slugs
            .get(section)
            .map(String::as_str)
            .unwrap_or(section);
        format!("/{}/{}/", url_section, slug)
    };

    let tags = normalize_tags(&frontmatter);
    let category = frontmatter.get_string("category");
    let shortname = frontmatter.get_string("shortname");
    let hide_from_home = frontmatter.get_bool("hide_from_home").unwrap_or(false);
    let kind = kind_for_section(section, &frontmatter);

    // Reviews rate on a 0-10 scale, halved onto five stars.
    let star_display = match kind {
        ItemKind::Review {
            rating: Some(rating),
        } => Some(stars(rating / 2.0)),
        _ => None,
    };

    ContentItem {
        title,
        date,
        slug: slug.to_string(),
        url,
        html,
        section: section.to_string(),
        tags,
        category,
        shortname,
        hide_from_home,
        stars: star_display,
        frontmatter,
        source_path,
        kind,
    }
}

/// Tags come from frontmatter either as a list or a comma-separated string;
/// both forms are normalized to trimmed lowercase.
fn normalize_tags(frontmatter: &Frontmatter) -> Vec<String> {
    let raw = match frontmatter.raw.get("tags") {
        Some(Value::String(joined)) => joined
            .split(',')
            .map(|tag| tag.trim().to_string())
            .collect(),
        Some(_) => frontmatter.get_array("tags").unwrap_or_default(),
        None => Vec::new(),
    };

    raw.into_iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}
