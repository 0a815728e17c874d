//! HTML parsing: content narrowing, text extraction, and link discovery
//!
//! Pages are narrowed to their main content region when a source declares a
//! CSS selector; otherwise the whole page is used with boilerplate elements
//! (script, style, nav, header, footer) stripped.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements never contributing text, regardless of content selector
const STRIPPED_ALWAYS: &[&str] = &["script", "style", "noscript"];

/// Additional boilerplate stripped when no content selector narrows the page
const STRIPPED_FULL_PAGE: &[&str] = &["nav", "header", "footer"];

/// Anchor selectors that typically point at the next listing page
const PAGINATION_SELECTORS: &[&str] = &[
    ".pagination a[href]",
    ".pager a[href]",
    "a[href*='page=']",
    "a[href*='/page/']",
];

/// Extracts readable text from a page
///
/// When `content_selector` is provided and matches, only that region is
/// used; when it does not match, the full page is used and a warning is
/// logged. Text nodes are trimmed and joined with newlines.
pub fn extract_text(html: &str, content_selector: Option<&str>) -> String {
    let document = Html::parse_document(html);

    if let Some(selector_str) = content_selector {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = text_of(element, STRIPPED_ALWAYS);
                if text.is_empty() {
                    tracing::warn!("Selector '{}' matched but yielded no text", selector_str);
                }
                return text;
            }
            tracing::warn!("Selector '{}' not found, using full page", selector_str);
        } else {
            tracing::warn!("Invalid content selector '{}', using full page", selector_str);
        }
    }

    let stripped: Vec<&str> = STRIPPED_ALWAYS
        .iter()
        .chain(STRIPPED_FULL_PAGE.iter())
        .copied()
        .collect();

    match Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
    {
        Some(body) => text_of(body, &stripped),
        None => text_of(document.root_element(), &stripped),
    }
}

/// Collects trimmed text from an element, excluding unwanted descendants
///
/// Scraper offers no tree mutation, so unwanted elements are blanked out of
/// the serialized region before the text pass.
fn text_of(element: ElementRef, stripped: &[&str]) -> String {
    let mut region = element.html();
    for name in stripped {
        if let Ok(selector) = Selector::parse(name) {
            for unwanted in element.select(&selector) {
                region = region.replace(&unwanted.html(), "");
            }
        }
    }

    let fragment = Html::parse_fragment(&region);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts absolute links from a page, in document order, deduplicated
///
/// When `content_selector` is provided and matches, only links inside that
/// region are considered. Non-HTTP(S) schemes and fragment-only anchors are
/// skipped.
pub fn extract_links(html: &str, base_url: &Url, content_selector: Option<&str>) -> Vec<Url> {
    let document = Html::parse_document(html);

    let anchor_selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let container = content_selector
        .and_then(|s| Selector::parse(s).ok())
        .and_then(|s| document.select(&s).next());

    let anchors: Vec<ElementRef> = match container {
        Some(element) => element.select(&anchor_selector).collect(),
        None => document.select(&anchor_selector).collect(),
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for anchor in anchors {
        let href = match anchor.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        if let Some(resolved) = resolve_link(href, base_url) {
            if seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }
    }

    links
}

/// Finds the most likely "next page" link on a listing page
///
/// Prefers an explicit `rel="next"` link; falls back to common pagination
/// anchors. The current URL itself is never returned; cycle protection
/// beyond that is the frontier's job.
pub fn find_next_page(html: &str, base_url: &Url, current: &Url) -> Option<Url> {
    let document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse("link[rel='next'][href], a[rel='next'][href]") {
        for element in document.select(&selector) {
            if let Some(resolved) = element
                .value()
                .attr("href")
                .and_then(|h| resolve_link(h, base_url))
            {
                if &resolved != current {
                    return Some(resolved);
                }
            }
        }
    }

    for selector_str in PAGINATION_SELECTORS {
        let selector = match Selector::parse(selector_str) {
            Ok(s) => s,
            Err(_) => continue,
        };
        for element in document.select(&selector) {
            if let Some(resolved) = element
                .value()
                .attr("href")
                .and_then(|h| resolve_link(h, base_url))
            {
                if &resolved != current {
                    return Some(resolved);
                }
            }
        }
    }

    None
}

/// Resolves a link href to an absolute HTTP(S) URL
///
/// Returns None for empty hrefs, fragment-only anchors, and non-web schemes
/// (javascript:, mailto:, tel:, data:).
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut resolved = base_url.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }

    // Fragments never distinguish fetch targets
    resolved.set_fragment(None);
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/docs/").unwrap()
    }

    #[test]
    fn test_extract_text_full_page_strips_boilerplate() {
        let html = r#"<html><body>
            <nav>Menu</nav>
            <p>Actual content</p>
            <script>var x = 1;</script>
            <footer>Copyright</footer>
        </body></html>"#;

        let text = extract_text(html, None);
        assert!(text.contains("Actual content"));
        assert!(!text.contains("Menu"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_extract_text_with_selector() {
        let html = r#"<html><body>
            <div class="sidebar">Ignore me</div>
            <div class="main"><h1>Title</h1><p>Body text</p></div>
        </body></html>"#;

        let text = extract_text(html, Some(".main"));
        assert!(text.contains("Title"));
        assert!(text.contains("Body text"));
        assert!(!text.contains("Ignore me"));
    }

    #[test]
    fn test_extract_text_selector_not_found_falls_back() {
        let html = r#"<html><body><p>Fallback content</p></body></html>"#;
        let text = extract_text(html, Some(".missing"));
        assert!(text.contains("Fallback content"));
    }

    #[test]
    fn test_extract_links_resolves_relative() {
        let html = r#"<html><body><a href="guide">Guide</a></body></html>"#;
        let links = extract_links(html, &base(), None);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_str(), "https://example.com/docs/guide");
    }

    #[test]
    fn test_extract_links_skips_special_schemes() {
        let html = r##"<html><body>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:a@b.c">Mail</a>
            <a href="tel:+123">Tel</a>
            <a href="#anchor">Anchor</a>
            <a href="/real">Real</a>
        </body></html>"##;
        let links = extract_links(html, &base(), None);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].path(), "/real");
    }

    #[test]
    fn test_extract_links_dedupes_preserving_order() {
        let html = r#"<html><body>
            <a href="/b">B</a>
            <a href="/a">A</a>
            <a href="/b">B again</a>
        </body></html>"#;
        let links = extract_links(html, &base(), None);
        let paths: Vec<_> = links.iter().map(|u| u.path()).collect();
        assert_eq!(paths, vec!["/b", "/a"]);
    }

    #[test]
    fn test_extract_links_scoped_to_selector() {
        let html = r#"<html><body>
            <nav><a href="/nav-link">Nav</a></nav>
            <div id="content"><a href="/content-link">Content</a></div>
        </body></html>"#;
        let links = extract_links(html, &base(), Some("#content"));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].path(), "/content-link");
    }

    #[test]
    fn test_find_next_page_rel_next() {
        let html = r#"<html><head>
            <link rel="next" href="/docs/?page=2">
        </head><body></body></html>"#;
        let current = Url::parse("https://example.com/docs/").unwrap();
        let next = find_next_page(html, &base(), &current).unwrap();
        assert_eq!(next.as_str(), "https://example.com/docs/?page=2");
    }

    #[test]
    fn test_find_next_page_pagination_class() {
        let html = r#"<html><body>
            <div class="pagination"><a href="/list/page/2">2</a></div>
        </body></html>"#;
        let current = Url::parse("https://example.com/list").unwrap();
        let next = find_next_page(html, &base(), &current).unwrap();
        assert_eq!(next.path(), "/list/page/2");
    }

    #[test]
    fn test_find_next_page_ignores_current() {
        let html = r#"<html><body>
            <div class="pagination"><a href="/docs/">1</a></div>
        </body></html>"#;
        let current = Url::parse("https://example.com/docs/").unwrap();
        assert!(find_next_page(html, &base(), &current).is_none());
    }

    #[test]
    fn test_find_next_page_none() {
        let html = r#"<html><body><p>No pagination here</p></body></html>"#;
        let current = Url::parse("https://example.com/docs/").unwrap();
        assert!(find_next_page(html, &base(), &current).is_none());
    }
}
