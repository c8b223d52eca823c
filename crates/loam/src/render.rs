use crate::content::ContentItem;
use crate::error::Result;
use crate::links::{LinkTarget, resolve_internal_links, shortname_index, tag_external_links};
use crate::pagination::{Pagination, RELATED_LIMIT, related_items, total_pages};
use crate::site::Site;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tera::{Context, Tera};

const DEFAULT_BASE_TEMPLATE: &str = include_str!("../themes/default/templates/base.html");
const DEFAULT_INDEX_TEMPLATE: &str = include_str!("../themes/default/templates/index.html");
const DEFAULT_ITEM_TEMPLATE: &str = include_str!("../themes/default/templates/item.html");
const DEFAULT_SECTION_TEMPLATE: &str = include_str!("../themes/default/templates/section.html");
const DEFAULT_TAXONOMY_TEMPLATE: &str = include_str!("../themes/default/templates/taxonomy.html");

pub struct RenderEngine {
    tera: Tera,
}

impl RenderEngine {
    /// Builds the template set: embedded defaults, optionally overlaid by
    /// `.html` files from a site-local templates directory. A site template
    /// with the same name replaces the builtin; extra names (like
    /// `reviews.html`) become per-section templates.
    pub fn new(site_templates: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template("base.html", DEFAULT_BASE_TEMPLATE)?;
        tera.add_raw_template("index.html", DEFAULT_INDEX_TEMPLATE)?;
        tera.add_raw_template("item.html", DEFAULT_ITEM_TEMPLATE)?;
        tera.add_raw_template("section.html", DEFAULT_SECTION_TEMPLATE)?;
        tera.add_raw_template("taxonomy.html", DEFAULT_TAXONOMY_TEMPLATE)?;

        if let Some(directory) = site_templates
            && directory.is_dir()
        {
            for entry in fs::read_dir(directory)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().is_none_or(|extension| extension != "html") {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                let content = fs::read_to_string(&path)?;
                tera.add_raw_template(&name, &content)?;
            }
        }

        Ok(Self { tera })
    }

    /// Emits the whole site. The shortname index is complete before the
    /// first page is written, so links resolve regardless of item order.
    pub fn render_site(&self, site: &Site, output_dir: &Path) -> Result<()> {
        fs::create_dir_all(output_dir)?;

        let index = shortname_index(&site.items);
        let host = site.config.host().to_string();

        for item in &site.items {
            self.render_item(site, item, &index, &host, output_dir)?;
        }

        self.render_home(site, &index, &host, output_dir)?;
        self.render_sections(site, &index, &host, output_dir)?;

        if site.config.feature("tags", true) {
            self.render_tags(site, &index, &host, output_dir)?;
        }
        if site.config.feature("categories", true) {
            self.render_categories(site, &index, &host, output_dir)?;
        }

        Ok(())
    }

    fn render_item(
        &self,
        site: &Site,
        item: &ContentItem,
        index: &HashMap<String, LinkTarget>,
        host: &str,
        output_dir: &Path,
    ) -> Result<()> {
        let related = related_items(item, &site.items, RELATED_LIMIT);

        let mut context = Context::new();
        context.insert("site", site);
        context.insert("item", item);
        context.insert("related", &related);
        context.insert(
            "canonical_url",
            &format!("{}{}", site.config.base_url, item.url),
        );

        let section_template = format!("{}.html", item.section);
        let template_name = if self
            .tera
            .get_template_names()
            .any(|name| name == section_template)
        {
            section_template.as_str()
        } else {
            "item.html"
        };

        let rendered = self.tera.render(template_name, &context)?;
        self.write_page(output_dir, &item.url, &rendered, index, host)
    }

    /// The home stream: everything except pages, minus hidden items and
    /// feature-disabled sections, paginated at `posts_per_page`. An empty
    /// stream still yields one index page.
    fn render_home(
        &self,
        site: &Site,
        index: &HashMap<String, LinkTarget>,
        host: &str,
        output_dir: &Path,
    ) -> Result<()> {
        let stream: Vec<&ContentItem> = site
            .items
            .iter()
            .filter(|item| {
                if item.hide_from_home || item.section == "pages" {
                    return false;
                }
                match item.section.as_str() {
                    "reviews" => site.config.feature("reviews_in_index", true),
                    "bookmarks" => site.config.feature("bookmarks_in_index", true),
                    _ => true,
                }
            })
            .collect();

        // A zero page size from config paginates one item per page.
        let per_page = site.config.posts_per_page.max(1);
        let total = total_pages(stream.len(), per_page);

        for page_number in 1..=total {
            let start = (page_number - 1) * per_page;
            let end = (start + per_page).min(stream.len());
            let page_items = &stream[start..end];

            let pagination = Pagination::build("/", total, page_number);
            let url = if page_number == 1 {
                "/".to_string()
            } else {
                format!("/page/{page_number}/")
            };

            let mut context = Context::new();
            context.insert("site", site);
            context.insert("items", page_items);
            context.insert("pagination", &pagination);

            let rendered = self.tera.render("index.html", &context)?;
            self.write_page(output_dir, &url, &rendered, index, host)?;
        }

        Ok(())
    }

    fn render_sections(
        &self,
        site: &Site,
        index: &HashMap<String, LinkTarget>,
        host: &str,
        output_dir: &Path,
    ) -> Result<()> {
        let mut sections: BTreeMap<&str, Vec<&ContentItem>> = BTreeMap::new();
        for item in &site.items {
            if item.section != "pages" {
                sections.entry(&item.section).or_default().push(item);
            }
        }

        for (section, items) in sections {
            let url_section = site
                .config
                .slugs
                .get(section)
                .map(String::as_str)
                .unwrap_or(section);
            let url = format!("/{url_section}/");

            let mut context = Context::new();
            context.insert("site", site);
            context.insert("section_title", &title_case(section));
            context.insert("items", &items);

            let rendered = self.tera.render("section.html", &context)?;
            self.write_page(output_dir, &url, &rendered, index, host)?;
        }

        Ok(())
    }

    fn render_tags(
        &self,
        site: &Site,
        index: &HashMap<String, LinkTarget>,
        host: &str,
        output_dir: &Path,
    ) -> Result<()> {
        let mut terms: BTreeMap<&str, Vec<&ContentItem>> = BTreeMap::new();
        for item in &site.items {
            for tag in &item.tags {
                terms.entry(tag).or_default().push(item);
            }
        }

        for (tag, items) in terms {
            let url = format!("/tags/{tag}/");
            let rendered = self.render_taxonomy_page(site, "Tags", tag, &items)?;
            self.write_page(output_dir, &url, &rendered, index, host)?;
        }

        Ok(())
    }

    fn render_categories(
        &self,
        site: &Site,
        index: &HashMap<String, LinkTarget>,
        host: &str,
        output_dir: &Path,
    ) -> Result<()> {
        let mut terms: BTreeMap<String, (&str, Vec<&ContentItem>)> = BTreeMap::new();
        for item in &site.items {
            if let Some(category) = &item.category {
                let slot = terms
                    .entry(slugify(category))
                    .or_insert_with(|| (category.as_str(), Vec::new()));
                slot.1.push(item);
            }
        }

        for (slug, (category, items)) in terms {
            let url = format!("/categories/{slug}/");
            let rendered = self.render_taxonomy_page(site, "Categories", category, &items)?;
            self.write_page(output_dir, &url, &rendered, index, host)?;
        }

        Ok(())
    }

    fn render_taxonomy_page(
        &self,
        site: &Site,
        taxonomy_name: &str,
        term: &str,
        items: &[&ContentItem],
    ) -> Result<String> {
        let mut context = Context::new();
        context.insert("site", site);
        context.insert("taxonomy_name", taxonomy_name);
        context.insert("term", term);
        context.insert("items", items);

        Ok(self.tera.render("taxonomy.html", &context)?)
    }

    /// Link resolution, ref tagging, then the write to
    /// `{output}/{url}/index.html`.
    fn write_page(
        &self,
        output_dir: &Path,
        url: &str,
        html: &str,
        index: &HashMap<String, LinkTarget>,
        host: &str,
    ) -> Result<()> {
        let resolved = resolve_internal_links(html, url, index);
        let tagged = tag_external_links(&resolved, host);

        let mut path = output_dir.to_path_buf();
        for segment in url.split('/').filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }

        fs::create_dir_all(&path)?;
        fs::write(path.join("index.html"), tagged)?;

        Ok(())
    }
}

fn title_case(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Category display names become URL segments: lowercased, whitespace to
/// hyphens.
fn slugify(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|character| {
            if character.is_whitespace() {
                '-'
            } else {
                character.to_ascii_lowercase()
            }
        })
        .collect()
}

pub fn clean_output_dir(output_dir: &Path) -> Result<()> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteBuilder;
    use tempfile::TempDir;

    fn create_test_site() -> TempDir {
        let dir = TempDir::new().unwrap();

        fs::write(
            dir.path().join("loam.toml"),
            r#"
title = "Test Site"
base_url = "https://example.com"
posts_per_page = 5
"#,
        )
        .unwrap();

        fs::create_dir_all(dir.path().join("content/posts")).unwrap();
        fs::create_dir_all(dir.path().join("content/reviews")).unwrap();
        fs::create_dir_all(dir.path().join("content/pages")).unwrap();

        fs::write(
            dir.path().join("content/posts/hello.md"),
            r#"---
title: Hello World
date: 2024-01-15
tags: [test]
shortname: hello
---

Hello there. Read [elsewhere](https://other.com/article)."#,
        )
        .unwrap();

        fs::write(
            dir.path().join("content/posts/follow-up.md"),
            r#"---
title: Follow Up
date: 2024-02-15
tags: [test]
---

As promised: {{< link hello "the first post" >}}."#,
        )
        .unwrap();

        fs::write(
            dir.path().join("content/reviews/dune.md"),
            r#"---
title: Dune
date: 2024-03-01
rating: 9
category: Science Fiction
---

Great book."#,
        )
        .unwrap();

        fs::write(
            dir.path().join("content/pages/about.md"),
            r#"---
title: About
date: 2023-06-01
---

About page."#,
        )
        .unwrap();

        dir
    }

    fn render(dir: &TempDir) -> TempDir {
        let site = SiteBuilder::new(dir.path()).build().unwrap();
        let output = TempDir::new().unwrap();
        let engine = RenderEngine::new(None).unwrap();
        engine.render_site(&site, output.path()).unwrap();
        output
    }

    fn read(output: &TempDir, relative: &str) -> String {
        fs::read_to_string(output.path().join(relative)).unwrap()
    }

    #[test]
    fn test_renders_home_and_item_pages() {
        let dir = create_test_site();
        let output = render(&dir);

        let home = read(&output, "index.html");
        assert!(home.contains("Hello World"));
        assert!(home.contains("Dune"));
        assert!(!home.contains("About page"));

        assert!(output.path().join("posts/hello/index.html").exists());
        assert!(output.path().join("reviews/dune/index.html").exists());
        assert!(output.path().join("about/index.html").exists());
    }

    #[test]
    fn test_internal_link_resolved_relative() {
        let dir = create_test_site();
        let output = render(&dir);

        let page = read(&output, "posts/follow-up/index.html");
        assert!(page.contains(r#"<a href="../hello/">the first post</a>"#));
        assert!(!page.contains("<internal-link"));
    }

    #[test]
    fn test_external_links_ref_tagged() {
        let dir = create_test_site();
        let output = render(&dir);

        let page = read(&output, "posts/hello/index.html");
        assert!(page.contains("https://other.com/article?ref=example.com"));
    }

    #[test]
    fn test_review_page_shows_stars() {
        let dir = create_test_site();
        let output = render(&dir);

        let page = read(&output, "reviews/dune/index.html");
        assert!(page.contains("★★★★⯨"));
    }

    #[test]
    fn test_section_and_taxonomy_pages() {
        let dir = create_test_site();
        let output = render(&dir);

        assert!(output.path().join("posts/index.html").exists());
        assert!(output.path().join("reviews/index.html").exists());

        let tag_page = read(&output, "tags/test/index.html");
        assert!(tag_page.contains("Hello World"));
        assert!(tag_page.contains("Follow Up"));

        assert!(
            output
                .path()
                .join("categories/science-fiction/index.html")
                .exists()
        );
    }

    #[test]
    fn test_related_items_listed() {
        let dir = create_test_site();
        let output = render(&dir);

        let page = read(&output, "posts/hello/index.html");
        assert!(page.contains("Follow Up"));
    }

    #[test]
    fn test_home_pagination() {
        let dir = create_test_site();
        for number in 0..10 {
            fs::write(
                dir.path().join(format!("content/posts/extra-{number}.md")),
                format!(
                    "---\ntitle: Extra {number}\ndate: 2024-04-{:02}\n---\n\nFiller.",
                    number + 1
                ),
            )
            .unwrap();
        }

        let output = render(&dir);
        assert!(output.path().join("page/2/index.html").exists());
        assert!(output.path().join("page/3/index.html").exists());

        let home = read(&output, "index.html");
        assert!(home.contains(r#"href="/page/2/""#));
    }

    #[test]
    fn test_hidden_item_off_home_but_rendered() {
        let dir = create_test_site();
        fs::write(
            dir.path().join("content/posts/quiet.md"),
            "---\ntitle: Quiet Post\ndate: 2024-05-01\nhide_from_home: true\n---\n\nShh.",
        )
        .unwrap();

        let output = render(&dir);
        let home = read(&output, "index.html");
        assert!(!home.contains("Quiet Post"));
        assert!(output.path().join("posts/quiet/index.html").exists());
    }

    #[test]
    fn test_feature_switch_drops_reviews_from_home() {
        let dir = create_test_site();
        fs::write(
            dir.path().join("loam.toml"),
            r#"
title = "Test Site"
base_url = "https://example.com"

[features]
reviews_in_index = false
"#,
        )
        .unwrap();

        let output = render(&dir);
        let home = read(&output, "index.html");
        assert!(!home.contains("Dune"));
        assert!(output.path().join("reviews/dune/index.html").exists());
    }

    #[test]
    fn test_section_template_override() {
        let dir = create_test_site();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(
            dir.path().join("templates/reviews.html"),
            "CUSTOM REVIEW: {{ item.title }}",
        )
        .unwrap();

        let site = SiteBuilder::new(dir.path()).build().unwrap();
        let output = TempDir::new().unwrap();
        let engine = RenderEngine::new(Some(&dir.path().join("templates"))).unwrap();
        engine.render_site(&site, output.path()).unwrap();

        let page = read(&output, "reviews/dune/index.html");
        assert_eq!(page, "CUSTOM REVIEW: Dune");
    }

    #[test]
    fn test_zero_posts_per_page_renders_without_panic() {
        let dir = create_test_site();
        fs::write(
            dir.path().join("loam.toml"),
            r#"
title = "Test Site"
base_url = "https://example.com"
posts_per_page = 0
"#,
        )
        .unwrap();

        let output = render(&dir);
        let home = read(&output, "index.html");
        assert!(home.contains("Dune"));
        assert!(output.path().join("page/2/index.html").exists());
    }

    #[test]
    fn test_empty_site_still_has_index() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("loam.toml"),
            "title = \"Empty\"\nbase_url = \"https://example.com\"\n",
        )
        .unwrap();

        let output = render(&dir);
        assert!(output.path().join("index.html").exists());
    }

    #[test]
    fn test_clean_output_dir() {
        let dir = create_test_site();
        let output = render(&dir);
        assert!(output.path().join("index.html").exists());

        clean_output_dir(output.path()).unwrap();
        assert!(!output.path().exists());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Science Fiction"), "science-fiction");
        assert_eq!(slugify("  Rust  "), "rust");
    }
}
