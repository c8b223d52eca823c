use crate::content::ContentItem;
use std::collections::HashMap;

const PLACEHOLDER_OPEN: &str = "<internal-link";
const PLACEHOLDER_CLOSE: &str = "</internal-link>";

/// Resolution target for one shortname: where the item lives and what to
/// call it when the link gave no text of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTarget {
    pub url: String,
    pub title: String,
}

/// Builds the global shortname table over all loaded items. Duplicates are
/// reported and the later item wins.
pub fn shortname_index(items: &[ContentItem]) -> HashMap<String, LinkTarget> {
    let mut index = HashMap::new();

    for item in items {
        let Some(shortname) = &item.shortname else {
            continue;
        };

        let target = LinkTarget {
            url: item.url.clone(),
            title: item.title.clone(),
        };

        if let Some(previous) = index.insert(shortname.clone(), target) {
            eprintln!(
                "Warning: duplicate shortname '{}': {} replaces {}",
                shortname, item.url, previous.url
            );
        }
    }

    index
}

struct Placeholder<'a> {
    shortname: &'a str,
    text: &'a str,
    len: usize,
}

fn parse_placeholder(input: &str) -> Option<Placeholder<'_>> {
    let open_end = input.find('>')?;
    let open_tag = &input[..open_end];

    let attr_start = open_tag.find("shortname=\"")? + "shortname=\"".len();
    let attr_len = open_tag[attr_start..].find('"')?;
    let shortname = &open_tag[attr_start..attr_start + attr_len];

    let body = &input[open_end + 1..];
    let text_len = body.find(PLACEHOLDER_CLOSE)?;
    let text = &body[..text_len];

    Some(Placeholder {
        shortname,
        text,
        len: open_end + 1 + text_len + PLACEHOLDER_CLOSE.len(),
    })
}

/// Replaces every `<internal-link>` placeholder in `html` with an anchor
/// whose href is relative to `current_url`. Unresolvable shortnames become a
/// visible broken-link marker rather than failing the build.
pub fn resolve_internal_links(
    html: &str,
    current_url: &str,
    index: &HashMap<String, LinkTarget>,
) -> String {
    let mut output = String::with_capacity(html.len());
    let mut remaining = html;

    while let Some(start) = remaining.find(PLACEHOLDER_OPEN) {
        output.push_str(&remaining[..start]);
        let rest = &remaining[start..];

        let Some(placeholder) = parse_placeholder(rest) else {
            output.push_str(PLACEHOLDER_OPEN);
            remaining = &rest[PLACEHOLDER_OPEN.len()..];
            continue;
        };

        match index.get(placeholder.shortname) {
            Some(target) => {
                let href = relative_url(current_url, &target.url);
                let text = if placeholder.text.is_empty() {
                    &target.title
                } else {
                    placeholder.text
                };
                output.push_str(&format!(r#"<a href="{href}">{text}</a>"#));
            }
            None => {
                eprintln!(
                    "Warning: unresolved internal link '{}'",
                    placeholder.shortname
                );
                output.push_str(&format!(
                    r#"<span class="broken-link">[Broken Link: {}]</span>"#,
                    placeholder.shortname
                ));
            }
        }

        remaining = &rest[placeholder.len..];
    }

    output.push_str(remaining);
    output
}

/// Computes the relative path from page `from` to page `to`. Both are
/// site-absolute URLs; directory-style URLs keep their trailing slash, and a
/// self-link becomes `./`.
pub fn relative_url(from: &str, to: &str) -> String {
    let from_dir = if from.ends_with('/') {
        from
    } else {
        match from.rfind('/') {
            Some(index) => &from[..=index],
            None => "/",
        }
    };

    let from_segments: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to_segments: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_segments
        .iter()
        .zip(&to_segments)
        .take_while(|(a, b)| a == b)
        .count();

    let mut output = String::new();
    for _ in common..from_segments.len() {
        output.push_str("../");
    }
    output.push_str(&to_segments[common..].join("/"));
    if to.ends_with('/') && common < to_segments.len() {
        output.push('/');
    }

    if output.is_empty() {
        "./".to_string()
    } else {
        output
    }
}

/// Appends `?ref=<site_host>` to every anchor pointing at a foreign host.
/// Only `<a>` tags are rewritten; `href` attributes on other elements
/// (`<link>`, `<area>`) pass through untouched. Existing query strings and
/// fragments are preserved; links that already carry a `ref` parameter are
/// left alone.
pub fn tag_external_links(html: &str, site_host: &str) -> String {
    const HREF: &str = "href=\"";

    let mut output = String::with_capacity(html.len());
    let mut remaining = html;

    while let Some(start) = remaining.find("<a") {
        let after_open = &remaining[start + 2..];

        // "<a" must end the tag name; "<article" and friends pass through.
        if !after_open.starts_with(|c: char| c.is_whitespace()) {
            output.push_str(&remaining[..start + 2]);
            remaining = after_open;
            continue;
        }

        let Some(tag_len) = after_open.find('>') else {
            break;
        };
        let tag = &after_open[..tag_len];

        let rewritten = tag.find(HREF).and_then(|href_start| {
            let value_start = href_start + HREF.len();
            let value_len = tag[value_start..].find('"')?;
            Some((value_start, value_len))
        });

        match rewritten {
            Some((value_start, value_len)) => {
                let value = &tag[value_start..value_start + value_len];
                output.push_str(&remaining[..start + 2 + value_start]);
                output.push_str(&tag_url(value, site_host));
                remaining = &after_open[value_start + value_len..];
            }
            None => {
                output.push_str(&remaining[..start + 2 + tag_len]);
                remaining = &after_open[tag_len..];
            }
        }
    }

    output.push_str(remaining);
    output
}

fn tag_url(url: &str, site_host: &str) -> String {
    let Some(host) = url_host(url) else {
        return url.to_string();
    };
    if host == site_host {
        return url.to_string();
    }

    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };

    if let Some((_, query)) = base.split_once('?')
        && has_ref_param(query)
    {
        return url.to_string();
    }

    let separator = if base.contains('?') { '&' } else { '?' };
    let mut tagged = format!("{base}{separator}ref={site_host}");
    if let Some(fragment) = fragment {
        tagged.push('#');
        tagged.push_str(fragment);
    }
    tagged
}

fn has_ref_param(query: &str) -> bool {
    query
        .split('&')
        .any(|parameter| parameter == "ref" || parameter.starts_with("ref="))
}

/// The host part of an absolute URL, or `None` for relative URLs.
pub fn url_host(url: &str) -> Option<&str> {
    let (_, after_scheme) = url.split_once("://")?;
    let host = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(after_scheme);

    if host.is_empty() { None } else { Some(host) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Frontmatter, build_item};
    use serde_json::Value;
    use std::path::PathBuf;

    fn item(section: &str, slug: &str, pairs: &[(&str, Value)]) -> ContentItem {
        let frontmatter = Frontmatter {
            raw: pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        };
        build_item(
            section,
            slug,
            frontmatter,
            String::new(),
            PathBuf::from(format!("content/{section}/{slug}.md")),
            &HashMap::new(),
        )
    }

    #[test]
    fn test_relative_url_sibling() {
        assert_eq!(relative_url("/posts/a/", "/posts/s1/"), "../s1/");
    }

    #[test]
    fn test_relative_url_across_sections() {
        assert_eq!(relative_url("/posts/a/", "/reviews/dune/"), "../../reviews/dune/");
    }

    #[test]
    fn test_relative_url_from_root() {
        assert_eq!(relative_url("/", "/posts/a/"), "posts/a/");
    }

    #[test]
    fn test_relative_url_to_parent() {
        assert_eq!(relative_url("/posts/a/b/", "/posts/"), "../../");
    }

    #[test]
    fn test_relative_url_self_link() {
        assert_eq!(relative_url("/posts/a/", "/posts/a/"), "./");
    }

    #[test]
    fn test_shortname_index_duplicates_last_wins() {
        let items = vec![
            item("posts", "first", &[("shortname", Value::from("s1"))]),
            item("posts", "second", &[("shortname", Value::from("s1"))]),
        ];

        let index = shortname_index(&items);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("s1").unwrap().url, "/posts/second/");
    }

    #[test]
    fn test_resolve_uses_explicit_text() {
        let items = vec![item(
            "posts",
            "target",
            &[("shortname", Value::from("s1")), ("title", Value::from("Target Post"))],
        )];
        let index = shortname_index(&items);

        let html = r#"<p>see <internal-link shortname="s1">this one</internal-link></p>"#;
        let resolved = resolve_internal_links(html, "/posts/other/", &index);
        assert_eq!(resolved, r#"<p>see <a href="../target/">this one</a></p>"#);
    }

    #[test]
    fn test_resolve_falls_back_to_title() {
        let items = vec![item(
            "posts",
            "target",
            &[("shortname", Value::from("s1")), ("title", Value::from("Target Post"))],
        )];
        let index = shortname_index(&items);

        let html = r#"<internal-link shortname="s1"></internal-link>"#;
        let resolved = resolve_internal_links(html, "/posts/other/", &index);
        assert_eq!(resolved, r#"<a href="../target/">Target Post</a>"#);
    }

    #[test]
    fn test_resolve_broken_link_marker() {
        let html = r#"<internal-link shortname="gone">text</internal-link>"#;
        let resolved = resolve_internal_links(html, "/posts/other/", &HashMap::new());
        assert_eq!(
            resolved,
            r#"<span class="broken-link">[Broken Link: gone]</span>"#
        );
    }

    #[test]
    fn test_resolve_leaves_plain_html_alone() {
        let html = "<p>no placeholders here</p>";
        assert_eq!(
            resolve_internal_links(html, "/", &HashMap::new()),
            html
        );
    }

    #[test]
    fn test_tag_external_link() {
        let html = r#"<a href="https://other.com/page">x</a>"#;
        assert_eq!(
            tag_external_links(html, "example.com"),
            r#"<a href="https://other.com/page?ref=example.com">x</a>"#
        );
    }

    #[test]
    fn test_tag_preserves_existing_query_and_fragment() {
        let html = r#"<a href="https://other.com/page?a=1#top">x</a>"#;
        assert_eq!(
            tag_external_links(html, "example.com"),
            r#"<a href="https://other.com/page?a=1&ref=example.com#top">x</a>"#
        );
    }

    #[test]
    fn test_tag_skips_same_host_and_relative() {
        let html = r#"<a href="https://example.com/page">x</a> <a href="/local/">y</a>"#;
        assert_eq!(tag_external_links(html, "example.com"), html);
    }

    #[test]
    fn test_tag_only_rewrites_anchor_tags() {
        let html = concat!(
            r#"<link rel="stylesheet" href="https://other.com/style.css">"#,
            r#"<area href="https://other.com/map">"#,
            r#"<a href="https://other.com/page">x</a>"#,
        );
        let tagged = tag_external_links(html, "example.com");
        assert!(tagged.contains(r#"href="https://other.com/style.css">"#));
        assert!(tagged.contains(r#"href="https://other.com/map">"#));
        assert!(tagged.contains(r#"href="https://other.com/page?ref=example.com""#));
    }

    #[test]
    fn test_tag_skips_article_elements() {
        let html = r#"<article data-href="https://other.com/x">body</article>"#;
        assert_eq!(tag_external_links(html, "example.com"), html);
    }

    #[test]
    fn test_tag_is_idempotent() {
        let html = r#"<a href="https://other.com/page">x</a>"#;
        let once = tag_external_links(html, "example.com");
        assert_eq!(tag_external_links(&once, "example.com"), once);
    }

    #[test]
    fn test_url_host() {
        assert_eq!(url_host("https://www.example.com/a"), Some("www.example.com"));
        assert_eq!(url_host("/relative/"), None);
        assert_eq!(url_host("mailto:user@example.com"), None);
    }
}
