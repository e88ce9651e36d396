use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Images whose declared width or height is below this are treated as
/// icons and left out of the cover-candidate list.
const ICON_MIN_DIMENSION: u32 = 50;

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));
static VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("video").expect("valid selector"));
static SOURCE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("source").expect("valid selector"));
static IFRAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe").expect("valid selector"));

/// Opening `<img>`/`<iframe>` tags, rebuilt attribute-by-attribute during
/// the markup rewrite.
static MEDIA_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(img|iframe)\b[^>]*>").expect("valid regex"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z][a-zA-Z0-9_:-]*)\s*=\s*"([^"]*)""#).expect("valid regex")
});
/// Whole script/style blocks, removed from sanitized markup.
static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").expect("valid regex")
});

/// Elements whose text never belongs in extracted article content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "iframe", "noscript"];

/// Converts an HTML fragment to plain text.
///
/// Scripts, styles, iframes, and noscript blocks are dropped; remaining
/// text nodes are walked in document order, each line trimmed, blank
/// lines removed, and the result rejoined with newlines.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    extract_text(fragment.root_element())
}

/// Walks the element's subtree collecting visible text.
pub(crate) fn extract_text(element: ElementRef) -> String {
    let mut segments = Vec::new();
    collect_text(element, &mut segments);

    segments
        .join("\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef, out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push(text.to_string());
        } else if let Some(el) = ElementRef::wrap(child) {
            if !SKIPPED_ELEMENTS.contains(&el.value().name()) {
                collect_text(el, out);
            }
        }
    }
}

/// Collects cover-candidate image URLs from the container.
///
/// Lazy-loading `data-src` wins over `src`, relative URLs are resolved
/// against the article URL, and icon-sized images (declared width or
/// height under 50px) are skipped. The filter applies to this list only;
/// the rewritten HTML keeps every image.
pub(crate) fn extract_images(container: ElementRef, base: &Url) -> Vec<String> {
    let mut images = Vec::new();

    for img in container.select(&IMG_SELECTOR) {
        let Some(raw_src) = img.value().attr("data-src").or(img.value().attr("src")) else {
            continue;
        };
        let Ok(resolved) = base.join(raw_src) else {
            continue;
        };

        let declared = |attr: &str| {
            img.value()
                .attr(attr)
                .and_then(|v| v.trim().parse::<u32>().ok())
        };
        if declared("width").is_some_and(|w| w < ICON_MIN_DIMENSION)
            || declared("height").is_some_and(|h| h < ICON_MIN_DIMENSION)
        {
            continue;
        }

        images.push(resolved.to_string());
    }

    images
}

/// Collects video URLs: `<video>` elements (or their `<source>` children)
/// plus iframes pointing at known video hosts.
pub(crate) fn extract_videos(container: ElementRef, base: &Url) -> Vec<String> {
    let mut videos = Vec::new();

    for video in container.select(&VIDEO_SELECTOR) {
        let src = video.value().attr("src").map(str::to_string).or_else(|| {
            video
                .select(&SOURCE_SELECTOR)
                .find_map(|s| s.value().attr("src").map(str::to_string))
        });
        if let Some(src) = src {
            if let Ok(resolved) = base.join(&src) {
                videos.push(resolved.to_string());
            }
        }
    }

    for iframe in container.select(&IFRAME_SELECTOR) {
        if let Some(src) = iframe.value().attr("src") {
            if is_video_host(src) {
                videos.push(src.to_string());
            }
        }
    }

    videos
}

pub(crate) fn is_video_host(src: &str) -> bool {
    let lower = src.to_lowercase();
    lower.contains("video") || lower.contains("v.qq.com")
}

/// Rewrites article markup for safe third-party rendering.
///
/// Script and style blocks are removed outright. For each `<img>` and
/// `<iframe>` tag: the lazy `data-src` attribute (preferred) or `src` is
/// resolved against the article URL and written back as `src`, a
/// `referrerpolicy="no-referrer"` attribute is added, and responsive
/// sizing is forced. Inline styles that hide lazily-loaded media
/// (`visibility: hidden`, `opacity: 0`, `display: none!important`) are
/// stripped everywhere in the markup.
pub(crate) fn rewrite_media_markup(html: &str, base: &Url) -> String {
    let html = SCRIPT_STYLE_RE.replace_all(html, "");
    let rewritten = MEDIA_TAG_RE.replace_all(&html, |caps: &regex::Captures| {
        rebuild_media_tag(&caps[0], &caps[1].to_lowercase(), base)
    });

    rewritten
        .replace("visibility: hidden", "")
        .replace("opacity: 0", "")
        .replace("display: none!important;", "")
}

fn rebuild_media_tag(tag: &str, name: &str, base: &Url) -> String {
    let mut kept: Vec<(String, String)> = Vec::new();
    let mut lazy_src = None;
    let mut plain_src = None;
    let mut style = String::new();
    let mut width = None;

    for caps in ATTR_RE.captures_iter(tag) {
        let attr = caps[1].to_lowercase();
        let value = caps[2].to_string();
        match attr.as_str() {
            "data-src" => lazy_src = Some(value),
            "src" => plain_src = Some(value),
            "style" => style = value,
            "referrerpolicy" => {}
            "width" => width = Some(value),
            _ => kept.push((attr, value)),
        }
    }

    let resolved = lazy_src
        .or(plain_src)
        .and_then(|src| base.join(&src).ok().map(|u| u.to_string()));

    // Drop the lazy-loading placeholder styles, then force responsive sizing
    let mut style = style
        .replace("visibility: hidden", "")
        .replace("opacity: 0", "")
        .trim_matches(|c| c == ' ' || c == ';')
        .to_string();
    if !style.to_lowercase().contains("max-width") {
        if !style.is_empty() {
            style.push_str("; ");
        }
        match name {
            "iframe" => style.push_str("max-width: 100%;"),
            _ => style.push_str("max-width: 100%; height: auto;"),
        }
    }

    let mut out = format!("<{}", name);
    if let Some(src) = resolved {
        out.push_str(&format!(r#" src="{}""#, src));
    }
    if name == "iframe" {
        out.push_str(&format!(r#" width="{}""#, width.as_deref().unwrap_or("100%")));
    } else if let Some(width) = width {
        out.push_str(&format!(r#" width="{}""#, width));
    }
    for (attr, value) in kept {
        out.push_str(&format!(r#" {}="{}""#, attr, value));
    }
    out.push_str(&format!(
        r#" referrerpolicy="no-referrer" style="{}">"#,
        style
    ));
    out
}

/// Wraps extracted article markup in a minimal standalone document.
///
/// The `no-referrer` meta is required for hotlink-protected media to load
/// when the markup is rendered inside a sandboxed frame.
pub(crate) fn wrap_document(inner_html: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="referrer" content="no-referrer">
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
            margin: 0;
            padding: 0;
            overflow-x: hidden;
        }}
        img {{
            max-width: 100% !important;
            height: auto !important;
            display: block;
            margin: 10px 0;
        }}
        iframe {{
            max-width: 100% !important;
        }}
    </style>
</head>
<body>
    {}
</body>
</html>"#,
        inner_html
    )
}
