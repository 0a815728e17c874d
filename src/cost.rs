//! Token usage and cost accounting
//!
//! One [`CostTracker`] exists per run, shared by reference with every
//! extraction completion. Run totals are atomic counters so concurrent
//! completions never lose an update; the per-source breakdown sits behind
//! a mutex since it is only touched once per extraction call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Pricing per 1M tokens in USD: (model, input, output)
const PRICING: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4.1-mini", 0.40, 1.60),
    ("gpt-4.1", 2.00, 8.00),
];

/// Fallback pricing for unknown models
const DEFAULT_PRICING: (f64, f64) = (0.15, 0.60);

fn pricing_for(model: &str) -> (f64, f64) {
    PRICING
        .iter()
        .find(|(name, _, _)| *name == model)
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or(DEFAULT_PRICING)
}

/// Token usage accumulated for a single source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceUsage {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub truncated: bool,
}

impl SourceUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Snapshot of run-wide usage, taken at the end of a run
#[derive(Debug, Clone)]
pub struct RunCostSummary {
    pub model: String,
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,
    /// Per-source breakdown, sorted by total tokens descending
    pub per_source: Vec<(String, SourceUsage)>,
}

impl RunCostSummary {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Process-wide running totals of token usage and estimated cost
#[derive(Debug, Default)]
pub struct CostTracker {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    calls: AtomicU64,
    per_source: Mutex<HashMap<String, SourceUsage>>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records usage from one completed extraction call
    pub fn record(&self, source_id: &str, input_tokens: u64, output_tokens: u64, truncated: bool) {
        self.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(output_tokens, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut per_source = self.per_source.lock().unwrap();
        let usage = per_source.entry(source_id.to_string()).or_default();
        usage.calls += 1;
        usage.input_tokens += input_tokens;
        usage.output_tokens += output_tokens;
        if truncated {
            usage.truncated = true;
        }
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens.load(Ordering::Relaxed)
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Estimates the cost so far for the given model
    pub fn estimate_cost(&self, model: &str) -> f64 {
        let (input_price, output_price) = pricing_for(model);
        let input_cost = self.input_tokens() as f64 / 1_000_000.0 * input_price;
        let output_cost = self.output_tokens() as f64 / 1_000_000.0 * output_price;
        input_cost + output_cost
    }

    /// Takes a snapshot of the current totals and per-source breakdown
    pub fn summary(&self, model: &str) -> RunCostSummary {
        let mut per_source: Vec<(String, SourceUsage)> = self
            .per_source
            .lock()
            .unwrap()
            .iter()
            .map(|(id, usage)| (id.clone(), usage.clone()))
            .collect();
        per_source.sort_by(|a, b| b.1.total_tokens().cmp(&a.1.total_tokens()));

        RunCostSummary {
            model: model.to_string(),
            calls: self.calls(),
            input_tokens: self.input_tokens(),
            output_tokens: self.output_tokens(),
            estimated_cost_usd: self.estimate_cost(model),
            per_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_accumulates() {
        let tracker = CostTracker::new();
        tracker.record("a", 100, 50, false);
        tracker.record("a", 200, 100, true);
        tracker.record("b", 10, 5, false);

        assert_eq!(tracker.input_tokens(), 310);
        assert_eq!(tracker.output_tokens(), 155);
        assert_eq!(tracker.calls(), 3);

        let summary = tracker.summary("gpt-4o-mini");
        assert_eq!(summary.per_source.len(), 2);
        assert_eq!(summary.per_source[0].0, "a");
        assert!(summary.per_source[0].1.truncated);
        assert!(!summary.per_source[1].1.truncated);
    }

    #[test]
    fn test_estimate_cost_known_model() {
        let tracker = CostTracker::new();
        tracker.record("a", 1_000_000, 1_000_000, false);

        let cost = tracker.estimate_cost("gpt-4o-mini");
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_uses_default_pricing() {
        let tracker = CostTracker::new();
        tracker.record("a", 1_000_000, 0, false);
        let cost = tracker.estimate_cost("mystery-model");
        assert!((cost - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let tracker = Arc::new(CostTracker::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    tracker.record("s", 1, 1, false);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.input_tokens(), 8000);
        assert_eq!(tracker.output_tokens(), 8000);
        assert_eq!(tracker.calls(), 8000);
    }
}
