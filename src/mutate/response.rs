use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::storage::MutateMetrics;
use crate::types::PartitionId;

use super::{DeleteEdgesResponse, ErrorCode, MutateError, PartResult};

struct CollectorState {
    expected: usize,
    reported: FxHashSet<PartitionId>,
    results: Vec<PartResult>,
    tx: Option<oneshot::Sender<DeleteEdgesResponse>>,
}

/// Gathers per-partition outcomes and resolves the response once every
/// requested partition has reported.
pub(crate) struct ResponseCollector {
    state: Mutex<CollectorState>,
    started: Instant,
    metrics: Arc<dyn MutateMetrics>,
}

impl ResponseCollector {
    /// Creates a collector expecting `expected` partitions. With nothing to
    /// wait for, the response resolves immediately.
    pub(crate) fn new(
        expected: usize,
        metrics: Arc<dyn MutateMetrics>,
    ) -> (Arc<Self>, PendingResponse) {
        let (tx, rx) = oneshot::channel();
        let collector = Arc::new(Self {
            state: Mutex::new(CollectorState {
                expected,
                reported: FxHashSet::default(),
                results: Vec::with_capacity(expected),
                tx: Some(tx),
            }),
            started: Instant::now(),
            metrics,
        });
        if expected == 0 {
            collector.finish(&mut collector.state.lock());
        }
        (collector, PendingResponse { rx })
    }

    /// Records the terminal outcome of `part`. A second report for the same
    /// partition is ignored.
    pub(crate) fn report(&self, part: PartitionId, code: ErrorCode) {
        let mut state = self.state.lock();
        if !state.reported.insert(part) {
            warn!(part = part.0, %code, "mutate.response.duplicate_report");
            return;
        }
        if !code.is_ok() {
            self.metrics.delete_edges_error();
        }
        debug!(part = part.0, %code, "mutate.response.part_done");
        state.results.push(PartResult { part, code });
        if state.results.len() == state.expected {
            self.finish(&mut state);
        }
    }

    fn finish(&self, state: &mut CollectorState) {
        let Some(tx) = state.tx.take() else {
            return;
        };
        let latency_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.metrics.request_latency_us(latency_us);
        let mut results = std::mem::take(&mut state.results);
        results.sort_by_key(|r| r.part);
        // The caller may have stopped waiting.
        let _ = tx.send(DeleteEdgesResponse {
            results,
            latency_us,
        });
    }
}

/// Response of a submitted request, resolved when every partition has reported.
#[must_use = "the response carries per-partition results"]
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<DeleteEdgesResponse>,
}

impl PendingResponse {
    /// Waits for the response.
    pub async fn wait(self) -> Result<DeleteEdgesResponse, MutateError> {
        self.rx.await.map_err(|_| MutateError::ResponseDropped)
    }

    /// Blocks the current thread until the response is ready.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_wait(self) -> Result<DeleteEdgesResponse, MutateError> {
        self.rx.blocking_recv().map_err(|_| MutateError::ResponseDropped)
    }
}
