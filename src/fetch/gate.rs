//! Rate-limit gate for network fetches
//!
//! Workers pass the gate immediately before a network request is issued.
//! The gate enforces a minimum interval between request issue times, either
//! per host or across all hosts, depending on configuration. Extraction
//! calls are not gated here; the extractor bounds itself with backoff.

use crate::config::RateLimitScope;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct GateState {
    global_last: Option<Instant>,
    per_host_last: HashMap<String, Instant>,
}

/// Gates the issue of network fetches under the configured delay policy
pub struct RateGate {
    interval: Duration,
    scope: RateLimitScope,
    state: Mutex<GateState>,
}

impl RateGate {
    pub fn new(interval: Duration, scope: RateLimitScope) -> Self {
        Self {
            interval,
            scope,
            state: Mutex::new(GateState::default()),
        }
    }

    /// A gate that never delays, used for inline units and tests
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, RateLimitScope::Global)
    }

    /// Waits until a request to `host` may be issued, then records the slot
    ///
    /// Concurrent callers are serialized: each successful return reserves
    /// the next interval, so two workers can never issue inside the same
    /// window.
    pub async fn acquire(&self, host: &str) {
        if self.interval.is_zero() {
            return;
        }

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                let last = match self.scope {
                    RateLimitScope::Global => state.global_last,
                    RateLimitScope::PerHost => state.per_host_last.get(host).copied(),
                };

                match last {
                    Some(last) if now.duration_since(last) < self.interval => {
                        self.interval - now.duration_since(last)
                    }
                    _ => {
                        match self.scope {
                            RateLimitScope::Global => state.global_last = Some(now),
                            RateLimitScope::PerHost => {
                                state.per_host_last.insert(host.to_string(), now);
                            }
                        }
                        return;
                    }
                }
            };

            tokio::time::sleep(wait).await;
        }
    }
}
