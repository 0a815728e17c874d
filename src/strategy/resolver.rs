//! Strategy resolution: seeding and expanding a source's frontier
//!
//! `seed` establishes the initial unit set (fetching the sitemap or the
//! listing page where the strategy requires it); `expand` feeds units
//! discovered on fetched pages back into the frontier for the incremental
//! strategies (paginated, recursive).

use crate::config::{ChunkMethod, SourceDefinition};
use crate::fetch::Fetcher;
use crate::filter::UrlFilter;
use crate::sitemap::{parse_sitemap, SitemapDocument};
use crate::strategy::{FetchUnit, Frontier};
use crate::{html, GenError};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Ceiling on nested sitemap documents followed from one source
const MAX_SITEMAP_DOCS: usize = 32;

/// Resolves a source definition into an expandable frontier of fetch units
pub struct StrategyResolver {
    source: SourceDefinition,
    root: Url,
    filter: UrlFilter,
    frontier: Frontier,
}

impl StrategyResolver {
    pub fn new(source: &SourceDefinition) -> crate::Result<Self> {
        let root = Url::parse(&source.url)?;
        let filter = UrlFilter::new(
            source.include_pattern.as_deref(),
            source.exclude_pattern.as_deref(),
        );

        let cap = match source.chunk_method {
            // Exactly one unit, cap ignored
            ChunkMethod::Single => 1,
            // chunk_size bounds items per group, not group count
            ChunkMethod::Alphabetical => usize::MAX,
            _ => source.chunk_size,
        };

        let frontier = Frontier::new(&source.id, source.content_selector.as_deref(), cap);

        Ok(Self {
            source: source.clone(),
            root,
            filter,
            frontier,
        })
    }

    pub fn source(&self) -> &SourceDefinition {
        &self.source
    }

    /// Whether fetched pages can feed new units back into the frontier
    pub fn is_expandable(&self) -> bool {
        matches!(
            self.source.chunk_method,
            ChunkMethod::Paginated | ChunkMethod::Recursive
        )
    }

    pub fn pop(&mut self) -> Option<FetchUnit> {
        self.frontier.pop()
    }

    pub fn admitted(&self) -> usize {
        self.frontier.admitted()
    }

    /// Seeds the frontier with the strategy's initial unit set
    ///
    /// Sitemap and alphabetical need to fetch before any unit exists; the
    /// other strategies start from the root URL alone.
    pub async fn seed(&mut self, fetcher: &Fetcher) -> crate::Result<()> {
        match self.source.chunk_method {
            ChunkMethod::Single | ChunkMethod::Paginated | ChunkMethod::Recursive => {
                self.frontier.admit_url(self.root.clone(), 0);
                Ok(())
            }
            ChunkMethod::Sitemap => self.seed_sitemap(fetcher).await,
            ChunkMethod::Alphabetical => self.seed_alphabetical(fetcher).await,
        }
    }

    async fn seed_sitemap(&mut self, fetcher: &Fetcher) -> crate::Result<()> {
        let mut docs = VecDeque::from([self.root.clone()]);
        let mut seen_docs: HashSet<Url> = HashSet::new();
        let mut page_urls = Vec::new();

        while let Some(doc_url) = docs.pop_front() {
            if !seen_docs.insert(doc_url.clone()) {
                continue;
            }
            if seen_docs.len() > MAX_SITEMAP_DOCS {
                tracing::warn!(
                    "Source '{}': sitemap index exceeds {} documents, truncating",
                    self.source.id,
                    MAX_SITEMAP_DOCS
                );
                break;
            }

            let page = fetcher.fetch(&doc_url, None).await?;
            match parse_sitemap(&page.body).map_err(|message| GenError::Resolver {
                source_id: self.source.id.clone(),
                message: format!("{}: {}", doc_url, message),
            })? {
                SitemapDocument::Index(nested) => docs.extend(nested),
                SitemapDocument::UrlSet(urls) => page_urls.extend(urls),
            }
        }

        let mut admitted = 0;
        for url in self.filter.filter(page_urls) {
            if !self.frontier.has_capacity() {
                break;
            }
            if self.frontier.admit_url(url, 0) {
                admitted += 1;
            }
        }

        if admitted == 0 {
            tracing::warn!(
                "Source '{}': sitemap yielded no URLs after filtering",
                self.source.id
            );
        } else {
            tracing::debug!("Source '{}': {} URLs from sitemap", self.source.id, admitted);
        }
        Ok(())
    }

    async fn seed_alphabetical(&mut self, fetcher: &Fetcher) -> crate::Result<()> {
        let selector = self.source.content_selector.as_deref();
        let page = fetcher.fetch(&self.root, selector).await?;
        let text = html::extract_text(&page.body, selector);

        let groups = partition_alphabetical(&text, self.source.chunk_size);
        if groups.is_empty() {
            tracing::warn!(
                "Source '{}': listing page yielded no items to partition",
                self.source.id
            );
            return Ok(());
        }

        for (ordinal, (label, body)) in groups.into_iter().enumerate() {
            if !self.frontier.admit_inline(self.root.clone(), &label, body.clone()) {
                // Letter ranges can repeat; disambiguate with the ordinal
                let unique = format!("{}_{}", label, ordinal);
                self.frontier.admit_inline(self.root.clone(), &unique, body);
            }
        }
        Ok(())
    }

    /// Expands the frontier from a fetched page body
    ///
    /// Returns the number of units admitted. A no-op for strategies that
    /// know their full unit set at seed time.
    pub fn expand(&mut self, unit: &FetchUnit, body: &str) -> usize {
        match self.source.chunk_method {
            ChunkMethod::Paginated => self.expand_paginated(unit, body),
            ChunkMethod::Recursive => self.expand_recursive(unit, body),
            _ => 0,
        }
    }

    fn expand_paginated(&mut self, unit: &FetchUnit, body: &str) -> usize {
        if !self.frontier.has_capacity() {
            return 0;
        }

        match html::find_next_page(body, &unit.url, &unit.url) {
            Some(next) => {
                if self.frontier.admit_url(next, unit.depth + 1) {
                    1
                } else {
                    // Revisit: the pagination chain has cycled
                    0
                }
            }
            None => 0,
        }
    }

    fn expand_recursive(&mut self, unit: &FetchUnit, body: &str) -> usize {
        let selector = self.source.content_selector.as_deref();
        let links = html::extract_links(body, &unit.url, selector);

        let mut admitted = 0;
        for link in links {
            if !self.frontier.has_capacity() {
                break;
            }
            if link.host_str() != self.root.host_str() {
                continue;
            }
            if !self.filter.accepts(&link) {
                continue;
            }
            if self.frontier.admit_url(link, unit.depth + 1) {
                admitted += 1;
            }
        }
        admitted
    }
}

/// Partitions listing-page text into letter groups of at most `group_size`
/// items each
///
/// Lines are accumulated in order; a group closes at the next
/// letter-initial line once it holds `group_size` items. Each group is
/// labeled with its letter range (e.g., "A-C").
pub fn partition_alphabetical(text: &str, group_size: usize) -> Vec<(String, String)> {
    let group_size = group_size.max(1);
    let mut groups = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut letters: Vec<char> = Vec::new();
    let mut items = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let first = line
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or(' ');

        if first.is_alphabetic() {
            if items >= group_size && !current.is_empty() {
                groups.push((label_of(&letters), current.join("\n")));
                current.clear();
                letters.clear();
                items = 0;
            }
            if !letters.contains(&first) {
                letters.push(first);
            }
        }

        current.push(line);
        items += 1;
    }

    if !current.is_empty() {
        groups.push((label_of(&letters), current.join("\n")));
    }

    groups
}

fn label_of(letters: &[char]) -> String {
    match letters {
        [] => "misc".to_string(),
        [only] => only.to_string(),
        [first, .., last] => format!("{}-{}", first, last),
    }
}
