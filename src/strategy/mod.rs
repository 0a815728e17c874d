//! Chunking strategies: turning a source definition into fetch units
//!
//! A strategy resolves a source into an ordered, capped sequence of
//! [`FetchUnit`]s. Single, sitemap, and alphabetical know their full unit
//! set up front; paginated and recursive discover further units as pages
//! are fetched, feeding them back through the [`Frontier`].

mod frontier;
mod resolver;

pub use frontier::Frontier;
pub use resolver::{partition_alphabetical, StrategyResolver};

use url::Url;

/// One schedulable page/content target produced by a chunking strategy
///
/// The discovery order index is the sole ordering key for final
/// aggregation; completion order never overrides it.
#[derive(Debug, Clone)]
pub struct FetchUnit {
    /// Originating source identifier
    pub source_id: String,

    /// Target URL (for inline units, the page the content came from)
    pub url: Url,

    /// Crawl depth; 0 for the root
    pub depth: u32,

    /// Discovery order index within the source
    pub index: usize,

    /// Content selector applied when fetching/narrowing this unit
    pub selector: Option<String>,

    /// Pre-resolved body for units that share an already-fetched page
    /// (alphabetical groups); such units never touch the network
    pub inline_body: Option<String>,

    /// Human-readable label, e.g. the letter range of an alphabetical group
    pub label: Option<String>,
}

impl FetchUnit {
    /// A short identifier for logs and output separators
    pub fn display_id(&self) -> String {
        match &self.label {
            Some(label) => format!("{}_{}", self.source_id, label),
            None => format!("{}_{}", self.source_id, self.index),
        }
    }
}
