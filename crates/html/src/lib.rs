//! HTML Processor (component C3): bounded-memory HTML parsing, element
//! stripping, and title/text/link extraction, per §4.3.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;
use webcrawler_core::CrawlError;

pub const MAX_HTML_BYTES: usize = 500_000;
pub const MAX_TEXT_BYTES: usize = 10_000;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_LINKS: usize = 50;
const TRUNCATION_MARKER: &str = "...";
const STRIPPED_SELECTORS: &str = "script, style, nav, header, footer, aside, form, iframe";

#[derive(Debug, Clone, Default)]
pub struct ProcessedPage {
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
}

/// Truncate `s` to at most `max_bytes` bytes, backing off to the nearest
/// char boundary so we never split a multi-byte UTF-8 sequence.
fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn truncate_to_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Parse HTML with bounded memory and extract `{title, text, links}`.
/// Nothing here retains state past this call: `document` is dropped when
/// the function returns, per the §4.3 memory discipline.
pub fn process_html(html: &str, base_url: &Url) -> Result<ProcessedPage, CrawlError> {
    if html.len() > MAX_HTML_BYTES {
        debug!(url = %base_url, original_bytes = html.len(), "html truncated before parsing");
    }
    let capped_html = truncate_to_bytes(html, MAX_HTML_BYTES);
    let document = Html::parse_document(capped_html);

    let stripped_selector =
        Selector::parse(STRIPPED_SELECTORS).map_err(|e| CrawlError::Parse(format!("{e:?}")))?;
    let skip_ids: HashSet<_> = document
        .select(&stripped_selector)
        .flat_map(|el| el.descendants().map(|n| n.id()))
        .collect();

    let title = extract_title(&document)?;
    let text = extract_text(&document, &skip_ids);
    let links = extract_links(&document, base_url, &skip_ids);

    Ok(ProcessedPage { title, text, links })
}

fn extract_title(document: &Html) -> Result<String, CrawlError> {
    let selector = Selector::parse("title").map_err(|e| CrawlError::Parse(format!("{e:?}")))?;
    let title = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();
    Ok(truncate_to_chars(title.trim(), MAX_TITLE_CHARS))
}

fn extract_text(document: &Html, skip_ids: &HashSet<ego_tree::NodeId>) -> String {
    let root = document.tree.root();
    let fragments: Vec<String> = root
        .descendants()
        .filter_map(|node| node.value().as_text().map(|t| (node, t)))
        .filter(|(node, _)| !node.ancestors().any(|a| skip_ids.contains(&a.id())))
        .map(|(_, t)| t.trim().to_string())
        .filter(|t| t.len() > 10)
        .collect();

    let joined = fragments.join(" ");
    let capped = truncate_to_bytes(&joined, MAX_TEXT_BYTES);
    if capped.len() < joined.len() {
        format!("{capped}{TRUNCATION_MARKER}")
    } else {
        capped.to_string()
    }
}

fn extract_links(document: &Html, base_url: &Url, skip_ids: &HashSet<ego_tree::NodeId>) -> Vec<String> {
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut links = Vec::new();
    for el in document.select(&selector) {
        if links.len() >= MAX_LINKS {
            break;
        }
        if is_stripped(&el, skip_ids) {
            continue;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
        {
            continue;
        }
        let Ok(absolute) = base_url.join(href) else {
            continue;
        };
        if !webcrawler_policy::is_allowed(&absolute, &[]) {
            continue;
        }
        links.push(absolute.to_string());
    }
    links
}

fn is_stripped(el: &ElementRef, skip_ids: &HashSet<ego_tree::NodeId>) -> bool {
    skip_ids.contains(&el.id()) || el.ancestors().any(|a| skip_ids.contains(&a.id()))
}
