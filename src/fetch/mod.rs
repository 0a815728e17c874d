//! Cache-aware HTTP fetcher
//!
//! The fetcher checks the cache first (unless force-refresh is active),
//! passes the rate gate before issuing network requests, classifies
//! failures as transient or permanent, and writes successful fetches back
//! to the cache.

mod gate;

pub use gate::RateGate;

use crate::cache::{CacheEntry, CacheError, CacheStore};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// User agent sent with every request
const USER_AGENT: &str = concat!("llms-gen/", env!("CARGO_PKG_VERSION"));

/// Errors from fetching a single page
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout, connection failure, 429, or 5xx; worth retrying
    #[error("Transient fetch failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// 4xx (other than 429) or unusable content; terminal for the unit
    #[error("Permanent fetch failure for {url}: {reason}")]
    Permanent { url: String, reason: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Where a fetched body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    Cache,
    Network,
    /// Body carried by the unit itself; no fetch at all
    Inline,
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub origin: FetchOrigin,
}

/// Builds the HTTP client used for all page fetches
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Cache-aware, rate-limited page fetcher shared by all workers
pub struct Fetcher {
    client: Client,
    cache: Arc<dyn CacheStore>,
    gate: Arc<RateGate>,
    force_refresh: bool,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(
        client: Client,
        cache: Arc<dyn CacheStore>,
        gate: Arc<RateGate>,
        force_refresh: bool,
    ) -> Self {
        Self {
            client,
            cache,
            gate,
            force_refresh,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }

    /// Overrides the transient-failure retry policy
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Fetches a page body, via cache or network
    ///
    /// The selector is part of the cache key only; the stored body is the
    /// raw response. With force-refresh the cache read is bypassed but a
    /// successful network fetch still updates the cache.
    pub async fn fetch(
        &self,
        url: &url::Url,
        selector: Option<&str>,
    ) -> Result<FetchedPage, FetchError> {
        if !self.force_refresh {
            if let Some(entry) = self.cache.get(url.as_str(), selector)? {
                tracing::debug!("Cache hit: {}", url);
                return Ok(FetchedPage {
                    body: entry.body,
                    origin: FetchOrigin::Cache,
                });
            }
        }

        let body = self.fetch_network(url).await?;

        self.cache
            .put(&CacheEntry::new(url.as_str(), selector, body.clone()))?;

        Ok(FetchedPage {
            body,
            origin: FetchOrigin::Network,
        })
    }

    /// Issues the network request, retrying transient failures
    async fn fetch_network(&self, url: &url::Url) -> Result<String, FetchError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let mut last_error = None;

        for attempt in 0..self.retry_attempts {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying fetch of {} (attempt {}/{})",
                    url,
                    attempt + 1,
                    self.retry_attempts
                );
                tokio::time::sleep(self.retry_delay).await;
            }

            self.gate.acquire(&host).await;
            tracing::debug!("Fetching: {}", url);

            match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Transient {
            url: url.to_string(),
            reason: "retry attempts exhausted".to_string(),
        }))
    }

    async fn attempt(&self, url: &url::Url) -> Result<String, FetchError> {
        let response = match self.client.get(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                // Send-level failures are all network conditions worth retrying
                return Err(FetchError::Transient {
                    url: url.to_string(),
                    reason,
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url, status));
        }

        response.text().await.map_err(|e| FetchError::Permanent {
            url: url.to_string(),
            reason: format!("failed to read body: {}", e),
        })
    }
}

fn classify_status(url: &url::Url, status: StatusCode) -> FetchError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::Transient {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        }
    } else {
        FetchError::Permanent {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteCache;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(cache: Arc<dyn CacheStore>, force: bool) -> Fetcher {
        Fetcher::new(
            build_http_client().unwrap(),
            cache,
            Arc::new(RateGate::unlimited()),
            force,
        )
        .with_retry(2, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_network_fetch_populates_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let cache: Arc<dyn CacheStore> = Arc::new(SqliteCache::in_memory().unwrap());
        let f = fetcher(cache.clone(), false);
        let url = url::Url::parse(&format!("{}/page", server.uri())).unwrap();

        let page = f.fetch(&url, None).await.unwrap();
        assert_eq!(page.origin, FetchOrigin::Network);
        assert_eq!(page.body, "<html>hi</html>");
        assert!(cache.get(url.as_str(), None).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .expect(1)
            .mount(&server)
            .await;

        let cache: Arc<dyn CacheStore> = Arc::new(SqliteCache::in_memory().unwrap());
        let f = fetcher(cache, false);
        let url = url::Url::parse(&format!("{}/page", server.uri())).unwrap();

        let first = f.fetch(&url, None).await.unwrap();
        let second = f.fetch(&url, None).await.unwrap();
        assert_eq!(first.origin, FetchOrigin::Network);
        assert_eq!(second.origin, FetchOrigin::Cache);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache_but_updates_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
            .mount(&server)
            .await;

        let cache: Arc<dyn CacheStore> = Arc::new(SqliteCache::in_memory().unwrap());
        let url = url::Url::parse(&format!("{}/page", server.uri())).unwrap();
        cache
            .put(&CacheEntry::new(url.as_str(), None, "stale".to_string()))
            .unwrap();

        let f = fetcher(cache.clone(), true);
        let page = f.fetch(&url, None).await.unwrap();
        assert_eq!(page.origin, FetchOrigin::Network);
        assert_eq!(page.body, "fresh");
        assert_eq!(cache.get(url.as_str(), None).unwrap().unwrap().body, "fresh");
    }

    #[tokio::test]
    async fn test_404_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache: Arc<dyn CacheStore> = Arc::new(SqliteCache::in_memory().unwrap());
        let f = fetcher(cache, false);
        let url = url::Url::parse(&format!("{}/missing", server.uri())).unwrap();

        let err = f.fetch(&url, None).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_500_is_transient_and_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let cache: Arc<dyn CacheStore> = Arc::new(SqliteCache::in_memory().unwrap());
        let f = fetcher(cache, false);
        let url = url::Url::parse(&format!("{}/flaky", server.uri())).unwrap();

        let err = f.fetch(&url, None).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
