//! SQLite cache backend
//!
//! A single connection behind a mutex. Workers share the cache through an
//! `Arc<SqliteCache>`; the key-level upsert gives last-writer-wins under
//! concurrent writes to the same key.

use crate::cache::{cache_key, CacheEntry, CacheResult, CacheStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pages (
    key         TEXT PRIMARY KEY,
    url         TEXT NOT NULL,
    selector    TEXT,
    body        TEXT NOT NULL,
    body_hash   TEXT NOT NULL,
    fetched_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);
";

/// SQLite-backed page cache
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Opens (or creates) a cache database at the given path
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory cache, used by tests and dry runs
    pub fn in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CacheStore for SqliteCache {
    fn get(&self, url: &str, selector: Option<&str>) -> CacheResult<Option<CacheEntry>> {
        let key = cache_key(url, selector);
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                "SELECT url, selector, body, body_hash, fetched_at FROM pages WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(url, selector, body, body_hash, fetched_at)| CacheEntry {
            url,
            selector,
            body,
            body_hash,
            fetched_at: fetched_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    fn put(&self, entry: &CacheEntry) -> CacheResult<()> {
        let key = cache_key(&entry.url, entry.selector.as_deref());
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO pages (key, url, selector, body, body_hash, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(key) DO UPDATE SET
                 body = excluded.body,
                 body_hash = excluded.body_hash,
                 fetched_at = excluded.fetched_at",
            params![
                key,
                entry.url,
                entry.selector,
                entry.body,
                entry.body_hash,
                entry.fetched_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn invalidate(&self, url: &str, selector: Option<&str>) -> CacheResult<()> {
        let key = cache_key(url, selector);
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM pages WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn len(&self) -> CacheResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get_roundtrip() {
        let cache = SqliteCache::in_memory().unwrap();
        let entry = CacheEntry::new("https://example.com/a", None, "body".to_string());

        cache.put(&entry).unwrap();
        let fetched = cache.get("https://example.com/a", None).unwrap().unwrap();
        assert_eq!(fetched.body, "body");
        assert_eq!(fetched.body_hash, entry.body_hash);
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = SqliteCache::in_memory().unwrap();
        assert!(cache.get("https://example.com/miss", None).unwrap().is_none());
    }

    #[test]
    fn test_selector_distinguishes_entries() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put(&CacheEntry::new(
                "https://example.com/",
                None,
                "full".to_string(),
            ))
            .unwrap();
        cache
            .put(&CacheEntry::new(
                "https://example.com/",
                Some(".main"),
                "narrow".to_string(),
            ))
            .unwrap();

        let full = cache.get("https://example.com/", None).unwrap().unwrap();
        let narrow = cache
            .get("https://example.com/", Some(".main"))
            .unwrap()
            .unwrap();
        assert_eq!(full.body, "full");
        assert_eq!(narrow.body, "narrow");
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn test_put_overwrites_same_key() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put(&CacheEntry::new(
                "https://example.com/",
                None,
                "old".to_string(),
            ))
            .unwrap();
        cache
            .put(&CacheEntry::new(
                "https://example.com/",
                None,
                "new".to_string(),
            ))
            .unwrap();

        let fetched = cache.get("https://example.com/", None).unwrap().unwrap();
        assert_eq!(fetched.body, "new");
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put(&CacheEntry::new(
                "https://example.com/",
                None,
                "body".to_string(),
            ))
            .unwrap();
        cache.invalidate("https://example.com/", None).unwrap();
        assert!(cache.get("https://example.com/", None).unwrap().is_none());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = SqliteCache::open(&path).unwrap();
            cache
                .put(&CacheEntry::new(
                    "https://example.com/",
                    None,
                    "persisted".to_string(),
                ))
                .unwrap();
        }

        let reopened = SqliteCache::open(&path).unwrap();
        let entry = reopened.get("https://example.com/", None).unwrap().unwrap();
        assert_eq!(entry.body, "persisted");
    }
}
