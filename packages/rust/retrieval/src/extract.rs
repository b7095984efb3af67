//! Plain-text extraction from fetched HTML.
//!
//! Page chrome (navigation, headers, footers, scripts, styles) is dropped and
//! the remaining text is collapsed into a single whitespace-normalized run.

use std::sync::LazyLock;

use fathom_shared::truncate_chars;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Elements whose text never contributes to the extracted body.
const CHROME_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "template", "svg",
];

/// Text and title pulled out of an HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// `<title>` text, or the first `<h1>` when the title is missing.
    pub title: Option<String>,
    /// Whitespace-collapsed body text, truncated to the configured maximum.
    pub body: String,
}

/// Extract title and body text from an HTML document.
pub fn extract_page(html: &str, body_max_chars: usize) -> ExtractedPage {
    let doc = Html::parse_document(html);
    let title = extract_title(&doc);

    let body_sel = Selector::parse("body").expect("valid selector");
    let root = doc
        .select(&body_sel)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let text = visible_text(root);
    let collapsed = collapse_whitespace(&text);

    ExtractedPage {
        title,
        body: truncate_chars(&collapsed, body_max_chars),
    }
}

/// Collect text nodes under `root` that are not inside a chrome element.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in root.descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        let in_chrome = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| CHROME_TAGS.contains(&el.name()))
        });
        if !in_chrome {
            text.push_str(fragment);
            text.push(' ');
        }
    }
    text
}

fn extract_title(doc: &Html) -> Option<String> {
    for sel_str in ["title", "h1"] {
        let sel = Selector::parse(sel_str).expect("valid selector");
        if let Some(el) = doc.select(&sel).next() {
            let title = collapse_whitespace(&el.text().collect::<String>());
            if !title.is_empty() {
                return Some(title);
            }
        }
    }
    None
}

/// Collapse every whitespace run into a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    WS_RE.replace_all(text, " ").trim().to_string()
}

/// Synthesize a page title from the URL path (`/wiki/Solar_power` → "Solar Power").
pub fn title_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        });

    match segment {
        Some(seg) => {
            let stem = seg
                .trim_end_matches(".html")
                .trim_end_matches(".htm")
                .replace(['-', '_'], " ");
            title_case(&stem)
        }
        None => url.host_str().unwrap_or("Untitled").to_string(),
    }
}

/// Capitalize the first letter of every word.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
