//! Per-source worker pool
//!
//! Workers pull units from the source's frontier, fetch them, and feed
//! discovered units back in. Each fetched body is handed off to a spawned
//! extraction task, with fetch and extraction concurrency bounded by
//! separate semaphores, so a slow extraction backend never idles fetch
//! workers and vice versa. Expansion is committed in parent
//! discovery-index order so the set and ordering of admitted units never
//! depends on which worker finished first.

use crate::extract::{ExtractionResult, ExtractionStatus, Extractor};
use crate::fetch::Fetcher;
use crate::html;
use crate::pipeline::collect::OrderedCollector;
use crate::strategy::{FetchUnit, StrategyResolver};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Run-wide abort signal carrying the first fatal reason
///
/// Tripping the signal stops dispatch of new units everywhere; units
/// already in flight finish and their results are kept.
pub struct RunAbort {
    cancel: CancellationToken,
    reason: std::sync::Mutex<Option<String>>,
}

impl RunAbort {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            reason: std::sync::Mutex::new(None),
        }
    }

    /// Records the first fatal reason and cancels dispatch
    pub fn trip(&self, reason: String) {
        let mut slot = self.reason.lock().unwrap();
        if slot.is_none() {
            *slot = Some(reason);
        }
        self.cancel.cancel();
    }

    pub fn is_tripped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().unwrap().clone()
    }

    async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Expansion payload for one completed fetch: the unit plus its body when
/// the strategy can discover more units from it
type ExpansionEntry = Option<(FetchUnit, String)>;

struct SourceState {
    resolver: StrategyResolver,
    /// Completed fetches awaiting expansion, keyed by unit index
    expansions: BTreeMap<usize, ExpansionEntry>,
    /// Index of the next unit whose expansion may be committed
    next_expand: usize,
    in_flight: usize,
}

impl SourceState {
    fn new(resolver: StrategyResolver) -> Self {
        Self {
            resolver,
            expansions: BTreeMap::new(),
            next_expand: 0,
            in_flight: 0,
        }
    }

    /// Records a completed fetch and commits every expansion that is now
    /// contiguous from the front
    fn commit(&mut self, index: usize, entry: ExpansionEntry) -> usize {
        self.expansions.insert(index, entry);

        let mut admitted = 0;
        while let Some(entry) = self.expansions.remove(&self.next_expand) {
            if let Some((unit, body)) = entry {
                admitted += self.resolver.expand(&unit, &body);
            }
            self.next_expand += 1;
        }
        admitted
    }
}

struct WorkerCtx {
    state: Arc<Mutex<SourceState>>,
    notify: Arc<Notify>,
    fetcher: Arc<Fetcher>,
    extractor: Arc<Extractor>,
    prompt: Arc<String>,
    abort: Arc<RunAbort>,
    fetch_permits: Arc<Semaphore>,
    extract_permits: Arc<Semaphore>,
}

enum Next {
    Unit(FetchUnit),
    Wait,
    Done,
}

/// Processes all units of one seeded source, returning results in
/// discovery order
///
/// `workers` bounds the fetch stage and the extraction stage separately.
/// Units left undispatched after an abort are reported as skipped.
pub async fn schedule_source(
    resolver: StrategyResolver,
    fetcher: Arc<Fetcher>,
    extractor: Arc<Extractor>,
    prompt: String,
    workers: usize,
    abort: Arc<RunAbort>,
) -> Vec<ExtractionResult> {
    let workers = workers.max(1);
    let state = Arc::new(Mutex::new(SourceState::new(resolver)));
    let notify = Arc::new(Notify::new());
    let prompt = Arc::new(prompt);
    let fetch_permits = Arc::new(Semaphore::new(workers));
    let extract_permits = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut pool = JoinSet::new();
    for _ in 0..workers {
        let ctx = WorkerCtx {
            state: state.clone(),
            notify: notify.clone(),
            fetcher: fetcher.clone(),
            extractor: extractor.clone(),
            prompt: prompt.clone(),
            abort: abort.clone(),
            fetch_permits: fetch_permits.clone(),
            extract_permits: extract_permits.clone(),
        };
        let tx = tx.clone();
        pool.spawn(async move { worker(ctx, tx).await });
    }
    drop(tx);

    while pool.join_next().await.is_some() {}

    // In-flight extraction tasks still hold channel senders; recv yields
    // None once the last of them finishes
    let mut collector = OrderedCollector::new();
    while let Some(result) = rx.recv().await {
        collector.push(result);
    }

    // Anything still queued was never dispatched
    let mut st = state.lock().await;
    while let Some(unit) = st.resolver.pop() {
        collector.push(unit_result(
            &unit,
            ExtractionStatus::Skipped,
            String::new(),
            Some("run aborted before dispatch".to_string()),
        ));
    }

    collector.finish()
}

async fn worker(ctx: WorkerCtx, tx: mpsc::UnboundedSender<ExtractionResult>) {
    loop {
        if ctx.abort.is_tripped() {
            return;
        }

        let next = {
            let mut st = ctx.state.lock().await;
            match st.resolver.pop() {
                Some(unit) => {
                    st.in_flight += 1;
                    Next::Unit(unit)
                }
                None if st.in_flight == 0 => Next::Done,
                None => Next::Wait,
            }
        };

        match next {
            Next::Done => {
                ctx.notify.notify_waiters();
                return;
            }
            Next::Wait => {
                // The sleep bounds the race between releasing the lock and
                // registering with the notifier
                tokio::select! {
                    _ = ctx.notify.notified() => {}
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                    _ = ctx.abort.cancelled() => return,
                }
            }
            Next::Unit(unit) => {
                stage_unit(&ctx, unit, &tx).await;

                let mut st = ctx.state.lock().await;
                st.in_flight -= 1;
                drop(st);
                ctx.notify.notify_waiters();
            }
        }
    }
}

/// Resolves a unit's text and hands it to the extraction stage
///
/// Fetch failures and empty pages short-circuit with a result of their
/// own; successful bodies are extracted on a spawned task so this worker
/// can return to fetching immediately.
async fn stage_unit(ctx: &WorkerCtx, unit: FetchUnit, tx: &mpsc::UnboundedSender<ExtractionResult>) {
    let text = match unit.inline_body.clone() {
        Some(body) => {
            // Inline units already hold extracted text; nothing to fetch,
            // nothing to expand
            let mut st = ctx.state.lock().await;
            st.commit(unit.index, None);
            body
        }
        None => {
            let fetched = {
                let _permit = ctx.fetch_permits.clone().acquire_owned().await;
                ctx.fetcher.fetch(&unit.url, unit.selector.as_deref()).await
            };
            match fetched {
                Ok(page) => {
                    let admitted = {
                        let mut st = ctx.state.lock().await;
                        let entry = if st.resolver.is_expandable() {
                            Some((unit.clone(), page.body.clone()))
                        } else {
                            None
                        };
                        st.commit(unit.index, entry)
                    };
                    if admitted > 0 {
                        tracing::debug!("{}: discovered {} new units", unit.display_id(), admitted);
                        ctx.notify.notify_waiters();
                    }
                    html::extract_text(&page.body, unit.selector.as_deref())
                }
                Err(e) => {
                    tracing::warn!("{}: fetch failed: {}", unit.display_id(), e);
                    let mut st = ctx.state.lock().await;
                    st.commit(unit.index, None);
                    drop(st);
                    let _ = tx.send(unit_result(
                        &unit,
                        ExtractionStatus::Failed,
                        String::new(),
                        Some(e.to_string()),
                    ));
                    return;
                }
            }
        }
    };

    if text.trim().is_empty() {
        let _ = tx.send(unit_result(
            &unit,
            ExtractionStatus::Failed,
            String::new(),
            Some("page yielded no text content".to_string()),
        ));
        return;
    }

    let extractor = ctx.extractor.clone();
    let abort = ctx.abort.clone();
    let prompt = ctx.prompt.clone();
    let permits = ctx.extract_permits.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = extract_unit(extractor, abort, permits, prompt, unit, text).await;
        let _ = tx.send(result);
    });
}

async fn extract_unit(
    extractor: Arc<Extractor>,
    abort: Arc<RunAbort>,
    permits: Arc<Semaphore>,
    prompt: Arc<String>,
    unit: FetchUnit,
    text: String,
) -> ExtractionResult {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return unit_result(
                &unit,
                ExtractionStatus::Skipped,
                String::new(),
                Some("extraction stage shut down".to_string()),
            );
        }
    };

    if abort.is_tripped() {
        return unit_result(
            &unit,
            ExtractionStatus::Skipped,
            String::new(),
            Some("run aborted before extraction".to_string()),
        );
    }

    match extractor.extract(&unit.source_id, &prompt, &text).await {
        Ok(extraction) => {
            tracing::info!(
                "{}: extracted {} chars ({} in / {} out tokens)",
                unit.display_id(),
                extraction.text.len(),
                extraction.input_tokens,
                extraction.output_tokens
            );
            let mut result = unit_result(&unit, ExtractionStatus::Succeeded, extraction.text, None);
            result.input_tokens = extraction.input_tokens;
            result.output_tokens = extraction.output_tokens;
            result
        }
        Err(e) => {
            if e.is_run_fatal() {
                tracing::error!("{}: fatal extraction failure: {}", unit.display_id(), e);
                abort.trip(e.to_string());
            } else {
                tracing::warn!("{}: extraction failed: {}", unit.display_id(), e);
            }
            unit_result(&unit, ExtractionStatus::Failed, String::new(), Some(e.to_string()))
        }
    }
}

fn unit_result(
    unit: &FetchUnit,
    status: ExtractionStatus,
    text: String,
    failure: Option<String>,
) -> ExtractionResult {
    ExtractionResult {
        source_id: unit.source_id.clone(),
        display_id: unit.display_id(),
        url: unit.url.to_string(),
        index: unit.index,
        status,
        text,
        input_tokens: 0,
        output_tokens: 0,
        failure,
    }
}
