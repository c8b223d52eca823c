use crate::content::stars;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

/// A shortcode handler: pure function from parsed arguments to an HTML
/// fragment. The error string is folded into an HTML comment by the
/// expander; handlers never abort a build.
pub type Handler = fn(&[String], &HashMap<String, String>) -> HandlerResult;

pub type HandlerResult = std::result::Result<String, String>;

pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The built-in handler set, registered once at startup.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("youtube", youtube);
        registry.register("img", img);
        registry.register("rating", rating);
        registry.register("spoiler", spoiler);
        registry.register("link", link);
        registry.register("email", email);
        registry
    }

    pub fn register(&mut self, name: &str, handler: Handler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Resolves one handler parameter: positional by index first, then the named
/// fallback, mirroring keyword-argument binding in template languages.
fn arg<'a>(
    positional: &'a [String],
    named: &'a HashMap<String, String>,
    index: usize,
    key: &str,
) -> Option<&'a str> {
    positional
        .get(index)
        .map(String::as_str)
        .or_else(|| named.get(key).map(String::as_str))
}

fn youtube(positional: &[String], named: &HashMap<String, String>) -> HandlerResult {
    let id = arg(positional, named, 0, "id").ok_or("missing video id")?;
    let title = arg(positional, named, 1, "title").unwrap_or("YouTube Video");
    let autoplay = arg(positional, named, 2, "autoplay").unwrap_or("false");
    let autoplay_param = usize::from(autoplay.eq_ignore_ascii_case("true"));

    Ok(format!(
        r#"<div class="video-embed"><iframe src="https://www.youtube.com/embed/{id}?autoplay={autoplay_param}" title="{title}" allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture" allowfullscreen></iframe></div>"#
    ))
}

fn img(positional: &[String], named: &HashMap<String, String>) -> HandlerResult {
    let src = arg(positional, named, 0, "src").ok_or("missing image source")?;
    let alt = match arg(positional, named, 1, "alt") {
        Some(alt) if !alt.is_empty() => alt,
        _ => "Image",
    };
    let caption = arg(positional, named, 2, "caption").unwrap_or("");
    let width = arg(positional, named, 3, "width").unwrap_or("100%");
    let class = arg(positional, named, 4, "class").unwrap_or("");

    let img_tag = format!(
        r#"<img src="{src}" alt="{alt}" class="{class}" style="max-width: {width}; height: auto;" loading="lazy">"#
    );

    if caption.is_empty() {
        Ok(format!(r#"<div class="content-image">{img_tag}</div>"#))
    } else {
        Ok(format!(
            r#"<figure class="content-image">{img_tag}<figcaption>{caption}</figcaption></figure>"#
        ))
    }
}

fn rating(positional: &[String], named: &HashMap<String, String>) -> HandlerResult {
    let score = arg(positional, named, 0, "score").ok_or("missing score")?;
    let max_score = arg(positional, named, 1, "max").unwrap_or("10");

    let value: f64 = score
        .parse()
        .map_err(|_| format!("invalid rating: {}/{}", score, max_score))?;
    let maximum: f64 = max_score
        .parse()
        .map_err(|_| format!("invalid rating: {}/{}", score, max_score))?;
    if maximum <= 0.0 {
        return Err(format!("invalid rating: {}/{}", score, max_score));
    }

    let normalized = value / maximum * 5.0;
    Ok(format!(
        r#"<span class="review-stars" title="{}/{}">{}</span>"#,
        value,
        maximum,
        stars(normalized)
    ))
}

fn spoiler(positional: &[String], named: &HashMap<String, String>) -> HandlerResult {
    let title = arg(positional, named, 0, "title").unwrap_or("Spoiler");
    let content = named.get("content").map(String::as_str).unwrap_or("");

    Ok(format!(
        r#"<details class="spoiler"><summary>{title}</summary>{content}</details>"#
    ))
}

/// Emits the deferred cross-reference placeholder resolved later against the
/// global shortname index, once the current page's URL is known.
fn link(positional: &[String], named: &HashMap<String, String>) -> HandlerResult {
    let shortname = arg(positional, named, 0, "shortname").ok_or("missing shortname")?;
    let text = arg(positional, named, 1, "text").unwrap_or("");

    Ok(format!(
        r#"<internal-link shortname="{shortname}">{text}</internal-link>"#
    ))
}

fn email(positional: &[String], named: &HashMap<String, String>) -> HandlerResult {
    let address = arg(positional, named, 0, "address").ok_or("missing address")?;
    let text = arg(positional, named, 1, "text").unwrap_or(address);

    let js_address = encode_char_codes(address);
    let js_text = encode_char_codes(text);
    let uid = element_id(address, text);

    Ok(format!(
        r#"<span id="mail-{uid}"></span><script>(function() {{ var addr = {js_address}; var txt = {js_text}; document.getElementById('mail-{uid}').innerHTML = '<a href="mailto:' + addr + '">' + txt + '</a>'; }})();</script><noscript>(Enable JavaScript to view email)</noscript>"#
    ))
}

fn encode_char_codes(input: &str) -> String {
    input
        .chars()
        .map(|character| format!("String.fromCharCode({})", character as u32))
        .collect::<Vec<_>>()
        .join("+")
}

fn element_id(address: &str, text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    address.hash(&mut hasher);
    text.hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}
