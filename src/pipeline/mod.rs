//! Run orchestration
//!
//! Processes the selected sources one at a time; within a source, units
//! run on a worker pool. A failing source never sinks the run, but a
//! run-fatal extraction error (bad credentials, exhausted quota) stops
//! dispatch everywhere while keeping every result already completed.

mod collect;
mod scheduler;

pub use collect::OrderedCollector;
pub use scheduler::{schedule_source, RunAbort};

use crate::cache::SqliteCache;
use crate::config::{load_prompt, Config, RunOptions};
use crate::cost::{CostTracker, RunCostSummary};
use crate::extract::{ExtractionResult, ExtractionStatus, Extractor};
use crate::fetch::{build_http_client, Fetcher, RateGate};
use crate::strategy::StrategyResolver;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of processing one source
#[derive(Debug)]
pub struct SourceReport {
    pub source_id: String,
    /// Output file name from the source definition
    pub output: String,
    /// Per-unit results in discovery order
    pub results: Vec<ExtractionResult>,
    /// Source-level failure (resolution or prompt loading); when set, no
    /// units were processed
    pub error: Option<String>,
}

impl SourceReport {
    fn failed_with(source_id: &str, output: &str, error: String) -> Self {
        Self {
            source_id: source_id.to_string(),
            output: output.to_string(),
            results: Vec::new(),
            error: Some(error),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.count(ExtractionStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(ExtractionStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(ExtractionStatus::Skipped)
    }

    fn count(&self, status: ExtractionStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Whether every unit of this source succeeded
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.failed() == 0 && self.skipped() == 0
    }
}

/// Outcome of a whole run
#[derive(Debug)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    pub cost: RunCostSummary,
    /// First run-fatal error, when one occurred
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.sources.iter().all(SourceReport::is_clean)
    }

    pub fn total_succeeded(&self) -> usize {
        self.sources.iter().map(SourceReport::succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.sources.iter().map(SourceReport::failed).sum()
    }
}

/// Runs the pipeline over every selected source
///
/// Partial results are always returned: unit failures are recorded in the
/// reports, source-level failures scope to their source, and a run-fatal
/// abort stops dispatch while preserving completed work.
pub async fn run(
    config: &Config,
    options: &RunOptions,
    prompts_dir: &Path,
    cache_path: &Path,
    cancel: CancellationToken,
) -> crate::Result<RunReport> {
    let cache = Arc::new(SqliteCache::open(cache_path)?);
    let gate = Arc::new(RateGate::new(options.rate_limit, options.rate_limit_scope));
    let fetcher = Arc::new(Fetcher::new(
        build_http_client()?,
        cache,
        gate,
        options.force,
    ));

    let tracker = Arc::new(CostTracker::new());
    let extractor = Arc::new(Extractor::new(
        &config.extractor,
        tracker.clone(),
        options.dry_run,
    )?);

    let abort = Arc::new(RunAbort::new(cancel));
    let workers = options.effective_workers();
    let mut reports = Vec::new();

    for source in config.selected_sources(options.only.as_deref()) {
        if abort.is_tripped() {
            break;
        }

        tracing::info!(
            "Processing source '{}' ({}, {})",
            source.id,
            source.chunk_method,
            source.url
        );

        let prompt = match load_prompt(&source.prompt_file, prompts_dir) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Source '{}': prompt load failed: {}", source.id, e);
                reports.push(SourceReport::failed_with(
                    &source.id,
                    &source.output,
                    format!("prompt load failed: {}", e),
                ));
                continue;
            }
        };

        let mut resolver = match StrategyResolver::new(source) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Source '{}': {}", source.id, e);
                reports.push(SourceReport::failed_with(
                    &source.id,
                    &source.output,
                    e.to_string(),
                ));
                continue;
            }
        };

        if let Err(e) = resolver.seed(&fetcher).await {
            tracing::error!("Source '{}': resolution failed: {}", source.id, e);
            reports.push(SourceReport::failed_with(
                &source.id,
                &source.output,
                format!("resolution failed: {}", e),
            ));
            continue;
        }

        if resolver.admitted() == 0 {
            tracing::warn!("Source '{}': no units to process", source.id);
            reports.push(SourceReport {
                source_id: source.id.clone(),
                output: source.output.clone(),
                results: Vec::new(),
                error: None,
            });
            continue;
        }

        let results = schedule_source(
            resolver,
            fetcher.clone(),
            extractor.clone(),
            prompt,
            workers,
            abort.clone(),
        )
        .await;

        reports.push(SourceReport {
            source_id: source.id.clone(),
            output: source.output.clone(),
            results,
            error: None,
        });
    }

    Ok(RunReport {
        sources: reports,
        cost: tracker.summary(extractor.model()),
        aborted: abort.reason(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionResult;

    fn result(index: usize, status: ExtractionStatus) -> ExtractionResult {
        ExtractionResult {
            source_id: "s".to_string(),
            display_id: format!("s_{index}"),
            url: "https://example.com/".to_string(),
            index,
            status,
            text: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            failure: None,
        }
    }

    #[test]
    fn test_report_counts() {
        let report = SourceReport {
            source_id: "s".to_string(),
            output: "s.md".to_string(),
            results: vec![
                result(0, ExtractionStatus::Succeeded),
                result(1, ExtractionStatus::Failed),
                result(2, ExtractionStatus::Succeeded),
                result(3, ExtractionStatus::Skipped),
            ],
            error: None,
        };

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_run_success_requires_clean_sources_and_no_abort() {
        let clean = SourceReport {
            source_id: "s".to_string(),
            output: "s.md".to_string(),
            results: vec![result(0, ExtractionStatus::Succeeded)],
            error: None,
        };
        let cost = CostTracker::new().summary("gpt-4o-mini");

        let report = RunReport {
            sources: vec![clean],
            cost: cost.clone(),
            aborted: None,
        };
        assert!(report.is_success());

        let aborted = RunReport {
            sources: Vec::new(),
            cost,
            aborted: Some("quota".to_string()),
        };
        assert!(!aborted.is_success());
    }
}
