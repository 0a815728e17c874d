//! Content cache for fetched pages
//!
//! Fetched page bodies are persisted keyed by (URL, selector) so that
//! repeated runs do not re-issue network requests. The physical store is
//! SQLite; the [`CacheStore`] trait keeps the fetcher independent of the
//! backing medium.

mod sqlite;

pub use sqlite::SqliteCache;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// A cached page body with its provenance
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: String,
    pub selector: Option<String>,
    pub body: String,
    pub body_hash: String,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Builds an entry for a freshly fetched body
    pub fn new(url: &str, selector: Option<&str>, body: String) -> Self {
        let body_hash = content_hash(&body);
        Self {
            url: url.to_string(),
            selector: selector.map(str::to_string),
            body,
            body_hash,
            fetched_at: Utc::now(),
        }
    }
}

/// Trait for cache backends
///
/// Implementations must be safe under concurrent writers to the same key;
/// last-writer-wins is acceptable since content for a given key is expected
/// to be stable within a run.
pub trait CacheStore: Send + Sync {
    /// Looks up a cached body by (URL, selector)
    fn get(&self, url: &str, selector: Option<&str>) -> CacheResult<Option<CacheEntry>>;

    /// Inserts or replaces the entry for its (URL, selector) key
    fn put(&self, entry: &CacheEntry) -> CacheResult<()>;

    /// Removes the entry for a key, if present
    fn invalidate(&self, url: &str, selector: Option<&str>) -> CacheResult<()>;

    /// Number of cached entries
    fn len(&self) -> CacheResult<u64>;
}

/// Derives the cache key for a (URL, selector) pair
pub fn cache_key(url: &str, selector: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(selector.unwrap_or("").as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes a page body for change detection
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
