pub mod cache;
pub mod content;
pub mod error;
pub mod handlers;
pub mod links;
pub mod pagination;
pub mod parsing;
pub mod render;
pub mod shortcodes;
pub mod site;

pub use cache::{CacheEntry, FileStamp, FreshnessCache};
pub use content::{ContentItem, Frontmatter, ItemKind};
pub use error::{LoamError, Result};
pub use handlers::{Handler, HandlerRegistry, HandlerResult};
pub use links::{
    LinkTarget, relative_url, resolve_internal_links, shortname_index, tag_external_links,
};
pub use pagination::{PageEntry, Pagination, page_window, related_items, total_pages};
pub use render::{RenderEngine, clean_output_dir};
pub use shortcodes::ShortcodeExpander;
pub use site::{Site, SiteBuilder, SiteConfig};
