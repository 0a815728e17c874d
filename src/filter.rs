//! URL filtering with glob patterns
//!
//! Sources may declare include and exclude patterns for discovered URLs.
//! Patterns are glob-style, not regular expressions: `*` matches within a
//! path segment, `?` matches a single character, and `**` crosses segment
//! boundaries. Patterns are matched against the URL path plus query, and
//! multiple patterns may be joined with `|`.
//!
//! Exclude always takes precedence over include. A missing include pattern
//! means every URL is accepted, subject to exclude.

use url::Url;

/// Accepts or rejects discovered URLs against include/exclude globs
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl UrlFilter {
    /// Creates a filter from optional `|`-separated pattern lists
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include: split_patterns(include),
            exclude: split_patterns(exclude),
        }
    }

    /// Checks whether a URL passes the filter
    pub fn accepts(&self, url: &Url) -> bool {
        self.accepts_target(&target_of(url))
    }

    /// Checks a pre-built path-plus-query string against the filter
    pub fn accepts_target(&self, target: &str) -> bool {
        if self.exclude.iter().any(|p| glob_match(p, target)) {
            return false;
        }

        if self.include.is_empty() {
            return true;
        }

        self.include.iter().any(|p| glob_match(p, target))
    }

    /// Filters a URL list, preserving input order
    pub fn filter(&self, urls: Vec<Url>) -> Vec<Url> {
        urls.into_iter().filter(|u| self.accepts(u)).collect()
    }
}

fn split_patterns(patterns: Option<&str>) -> Vec<String> {
    patterns
        .map(|s| {
            s.split('|')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn target_of(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Matches a glob pattern against a string
///
/// `*` matches any run of characters except `/`, `?` matches one character
/// except `/`, and `**` matches any run of characters including `/`. A
/// `**` segment may also match nothing, so `/docs/**` matches `/docs/` and
/// `a/**/b` matches `a/b`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    match_from(&p, 0, &t, 0)
}

fn match_from(p: &[char], pi: usize, t: &[char], ti: usize) -> bool {
    if pi == p.len() {
        return ti == t.len();
    }

    if p[pi] == '*' && pi + 1 < p.len() && p[pi + 1] == '*' {
        let after = pi + 2;

        // `**` as any sequence, including across '/'
        for k in ti..=t.len() {
            if match_from(p, after, t, k) {
                return true;
            }
        }

        // `**/rest`: let `**` plus the separator match nothing
        if after < p.len() && p[after] == '/' {
            for k in ti..=t.len() {
                if match_from(p, after + 1, t, k) {
                    return true;
                }
            }
        }

        return false;
    }

    if p[pi] == '*' {
        let mut k = ti;
        loop {
            if match_from(p, pi + 1, t, k) {
                return true;
            }
            if k == t.len() || t[k] == '/' {
                return false;
            }
            k += 1;
        }
    }

    if ti == t.len() {
        return false;
    }

    match p[pi] {
        '?' => t[ti] != '/' && match_from(p, pi + 1, t, ti + 1),
        c => c == t[ti] && match_from(p, pi + 1, t, ti + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{}", path)).unwrap()
    }

    #[test]
    fn test_no_patterns_accepts_everything() {
        let filter = UrlFilter::new(None, None);
        assert!(filter.accepts(&url("/anything/at/all")));
    }

    #[test]
    fn test_include_only() {
        let filter = UrlFilter::new(Some("/docs/**"), None);
        assert!(filter.accepts(&url("/docs/guide")));
        assert!(filter.accepts(&url("/docs/api/v2/reference")));
        assert!(!filter.accepts(&url("/blog/post")));
    }

    #[test]
    fn test_exclude_overrides_include() {
        let filter = UrlFilter::new(Some("/docs/**"), Some("/docs/internal/**"));
        assert!(!filter.accepts(&url("/docs/internal/x")));
        assert!(filter.accepts(&url("/docs/guide")));
    }

    #[test]
    fn test_exclude_without_include() {
        let filter = UrlFilter::new(None, Some("**/private/**"));
        assert!(!filter.accepts(&url("/a/private/b")));
        assert!(filter.accepts(&url("/a/public/b")));
    }

    #[test]
    fn test_multiple_patterns_pipe_separated() {
        let filter = UrlFilter::new(Some("/docs/**|/api/**"), None);
        assert!(filter.accepts(&url("/docs/x")));
        assert!(filter.accepts(&url("/api/y")));
        assert!(!filter.accepts(&url("/blog/z")));
    }

    #[test]
    fn test_query_is_part_of_target() {
        let filter = UrlFilter::new(None, Some("**page=*"));
        assert!(!filter.accepts(&url("/list?page=2")));
        assert!(filter.accepts(&url("/list")));
    }

    #[test]
    fn test_single_star_stays_within_segment() {
        assert!(glob_match("/docs/*", "/docs/guide"));
        assert!(!glob_match("/docs/*", "/docs/api/reference"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        assert!(glob_match("/docs/**", "/docs/api/reference"));
        assert!(glob_match("/docs/**", "/docs/"));
        assert!(glob_match("/a/**/b", "/a/b"));
        assert!(glob_match("/a/**/b", "/a/x/y/b"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("/v?", "/v1"));
        assert!(!glob_match("/v?", "/v12"));
        assert!(!glob_match("/v?", "/v/"));
    }

    #[test]
    fn test_literal_match() {
        assert!(glob_match("/exact/path", "/exact/path"));
        assert!(!glob_match("/exact/path", "/exact/other"));
    }

    #[test]
    fn test_filter_preserves_order() {
        let filter = UrlFilter::new(Some("/keep/**"), None);
        let urls = vec![url("/keep/1"), url("/drop/2"), url("/keep/3")];
        let kept = filter.filter(urls);
        let paths: Vec<_> = kept.iter().map(|u| u.path()).collect();
        assert_eq!(paths, vec!["/keep/1", "/keep/3"]);
    }
}
