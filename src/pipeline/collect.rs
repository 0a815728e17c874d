//! Ordered result collection
//!
//! Workers complete units in arbitrary order; the collector buffers
//! out-of-order completions and releases results strictly by discovery
//! index, so the assembled document never depends on completion timing.

use crate::extract::ExtractionResult;
use std::collections::BTreeMap;

/// Reorders per-unit results into discovery order
#[derive(Debug, Default)]
pub struct OrderedCollector {
    buffer: BTreeMap<usize, ExtractionResult>,
    released: Vec<ExtractionResult>,
    next: usize,
}

impl OrderedCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts one completed result, releasing any contiguous run it
    /// unblocks
    pub fn push(&mut self, result: ExtractionResult) {
        self.buffer.insert(result.index, result);
        while let Some(ready) = self.buffer.remove(&self.next) {
            self.released.push(ready);
            self.next += 1;
        }
    }

    /// Returns all results in index order, including any still buffered
    /// behind a gap (a gap can only come from an aborted run)
    pub fn finish(mut self) -> Vec<ExtractionResult> {
        for (_, result) in std::mem::take(&mut self.buffer) {
            self.released.push(result);
        }
        self.released
    }
}
