//! Sitemap parsing for the sitemap chunk method
//!
//! Handles both regular sitemaps (`<urlset>`) and sitemap index files
//! (`<sitemapindex>`). URL order in the document is preserved, since the
//! sitemap order defines the discovery order of the resulting fetch units.

use url::Url;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// A regular sitemap listing page URLs
    UrlSet(Vec<Url>),

    /// A sitemap index listing further sitemap documents
    Index(Vec<Url>),
}

/// Parses sitemap XML into an ordered URL list
///
/// Returns an error string (scoped to the owning source by the caller) when
/// the document is not recognizable as a sitemap at all.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, String> {
    let is_index = xml.contains("<sitemapindex");
    let is_urlset = xml.contains("<urlset");

    if !is_index && !is_urlset {
        return Err("document contains neither <urlset> nor <sitemapindex>".to_string());
    }

    let mut urls = Vec::new();
    for loc in extract_locs(xml) {
        match Url::parse(&loc) {
            Ok(url) => urls.push(url),
            Err(e) => tracing::warn!("Skipping malformed sitemap URL '{}': {}", loc, e),
        }
    }

    if is_index {
        Ok(SitemapDocument::Index(urls))
    } else {
        Ok(SitemapDocument::UrlSet(urls))
    }
}

/// Extracts `<loc>` values in document order, unescaping XML entities
fn extract_locs(xml: &str) -> Vec<String> {
    let mut locs = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find("<loc>") {
        rest = &rest[start + 5..];
        let end = match rest.find("</loc>") {
            Some(e) => e,
            None => break,
        };
        let raw = rest[..end].trim();
        if !raw.is_empty() {
            locs.push(unescape_entities(raw));
        }
        rest = &rest[end + 6..];
    }

    locs
}

fn unescape_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}
