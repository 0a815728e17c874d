//! Per-source frontier: pending units plus the visited set
//!
//! The frontier guarantees that each URL is admitted at most once per run
//! and that the total number of admitted units never exceeds the source's
//! cap. Discovery order indices are assigned here, atomically at admit
//! time (the scheduler serializes access behind a mutex).

use crate::strategy::FetchUnit;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Queue of discovered-but-not-yet-dispatched units plus the visited set
#[derive(Debug)]
pub struct Frontier {
    source_id: String,
    selector: Option<String>,
    cap: usize,
    queue: VecDeque<FetchUnit>,
    visited: HashSet<String>,
    admitted: usize,
}

impl Frontier {
    pub fn new(source_id: &str, selector: Option<&str>, cap: usize) -> Self {
        Self {
            source_id: source_id.to_string(),
            selector: selector.map(str::to_string),
            cap,
            queue: VecDeque::new(),
            visited: HashSet::new(),
            admitted: 0,
        }
    }

    /// Admits a URL as a new fetch unit
    ///
    /// Returns false when the URL was already admitted this run or the cap
    /// is reached. Indices are assigned in admit order.
    pub fn admit_url(&mut self, url: Url, depth: u32) -> bool {
        if self.admitted >= self.cap {
            return false;
        }
        if !self.visited.insert(url.as_str().to_string()) {
            return false;
        }

        let unit = FetchUnit {
            source_id: self.source_id.clone(),
            url,
            depth,
            index: self.admitted,
            selector: self.selector.clone(),
            inline_body: None,
            label: None,
        };
        self.admitted += 1;
        self.queue.push_back(unit);
        true
    }

    /// Admits a unit carrying its body inline, deduplicated by label
    ///
    /// Inline units share one page URL, so the visited key is the label
    /// rather than the URL, and the cap is not applied (the cap of an
    /// alphabetical source bounds items per group, not group count).
    pub fn admit_inline(&mut self, url: Url, label: &str, body: String) -> bool {
        let key = format!("{}#{}", url.as_str(), label);
        if !self.visited.insert(key) {
            return false;
        }

        let unit = FetchUnit {
            source_id: self.source_id.clone(),
            url,
            depth: 0,
            index: self.admitted,
            selector: self.selector.clone(),
            inline_body: Some(body),
            label: Some(label.to_string()),
        };
        self.admitted += 1;
        self.queue.push_back(unit);
        true
    }

    /// Removes and returns the next unit in discovery order
    pub fn pop(&mut self) -> Option<FetchUnit> {
        self.queue.pop_front()
    }

    /// Total number of units admitted so far (dispatched or pending)
    pub fn admitted(&self) -> usize {
        self.admitted
    }

    /// Whether the cap leaves room for more units
    pub fn has_capacity(&self) -> bool {
        self.admitted < self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{}", path)).unwrap()
    }

    #[test]
    fn test_admit_assigns_sequential_indices() {
        let mut frontier = Frontier::new("src", None, 10);
        assert!(frontier.admit_url(url("/a"), 0));
        assert!(frontier.admit_url(url("/b"), 1));

        let first = frontier.pop().unwrap();
        let second = frontier.pop().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(first.url.path(), "/a");
    }

    #[test]
    fn test_duplicate_url_rejected() {
        let mut frontier = Frontier::new("src", None, 10);
        assert!(frontier.admit_url(url("/a"), 0));
        assert!(!frontier.admit_url(url("/a"), 1));
        assert_eq!(frontier.admitted(), 1);
    }

    #[test]
    fn test_cap_enforced() {
        let mut frontier = Frontier::new("src", None, 2);
        assert!(frontier.admit_url(url("/a"), 0));
        assert!(frontier.admit_url(url("/b"), 0));
        assert!(!frontier.admit_url(url("/c"), 0));
        assert_eq!(frontier.admitted(), 2);
        assert!(!frontier.has_capacity());
    }

    #[test]
    fn test_inline_units_bypass_cap_and_dedupe_by_label() {
        let mut frontier = Frontier::new("src", None, 1);
        assert!(frontier.admit_url(url("/list"), 0));
        assert!(frontier.admit_inline(url("/list"), "A-C", "items".to_string()));
        assert!(!frontier.admit_inline(url("/list"), "A-C", "items".to_string()));
        assert!(frontier.admit_inline(url("/list"), "D-F", "more".to_string()));
        assert_eq!(frontier.admitted(), 3);
    }

    #[test]
    fn test_selector_propagated_to_units() {
        let mut frontier = Frontier::new("src", Some(".main"), 5);
        frontier.admit_url(url("/a"), 0);
        let unit = frontier.pop().unwrap();
        assert_eq!(unit.selector.as_deref(), Some(".main"));
    }
}
