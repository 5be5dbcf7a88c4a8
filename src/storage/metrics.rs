use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking edge-mutation activity on a storage node.
///
/// Implementations collect statistics about delete requests, lock conflicts and
/// index maintenance. Calls happen on the request path and on store completion
/// callbacks, so implementations must be cheap and thread-safe.
pub trait MutateMetrics: Send + Sync {
    /// Records one delete-edges request entering the processor.
    fn delete_edges_call(&self);

    /// Records one partition that finished with a non-success code.
    fn delete_edges_error(&self);

    /// Records `count` edges submitted for removal by a successful partition.
    fn edges_deleted(&self, count: u64);

    /// Records a partition rejected because another request held one of its edges.
    fn lock_conflict(&self);

    /// Records `count` index entries whose removal was deferred to the operation log.
    fn deferred_index_ops(&self, count: u64);

    /// Records `count` index entries removed directly.
    fn index_entries_removed(&self, count: u64);

    /// Records the end-to-end latency of one request, in microseconds.
    fn request_latency_us(&self, micros: u64);
}

/// A no-op implementation of [`MutateMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl MutateMetrics for NoopMetrics {
    fn delete_edges_call(&self) {}
    fn delete_edges_error(&self) {}
    fn edges_deleted(&self, _count: u64) {}
    fn lock_conflict(&self) {}
    fn deferred_index_ops(&self, _count: u64) {}
    fn index_entries_removed(&self, _count: u64) {}
    fn request_latency_us(&self, _micros: u64) {}
}

/// A thread-safe counter-based implementation of [`MutateMetrics`].
#[derive(Default, Debug)]
pub struct CounterMetrics {
    /// Number of delete-edges requests received.
    pub delete_edges_calls: AtomicU64,

    /// Number of partitions that reported a failure.
    pub delete_edges_errors: AtomicU64,

    /// Number of edges submitted for removal.
    pub edges_deleted: AtomicU64,

    /// Number of partitions rejected with a data conflict.
    pub lock_conflicts: AtomicU64,

    /// Number of index removals appended to the operation log.
    pub deferred_index_ops: AtomicU64,

    /// Number of index entries removed directly.
    pub index_entries_removed: AtomicU64,

    /// Sum of request latencies in microseconds.
    pub latency_us_total: AtomicU64,

    /// Largest request latency seen, in microseconds.
    pub latency_us_max: AtomicU64,
}

impl CounterMetrics {
    /// Reads one counter.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

impl MutateMetrics for CounterMetrics {
    fn delete_edges_call(&self) {
        self.delete_edges_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn delete_edges_error(&self) {
        self.delete_edges_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn edges_deleted(&self, count: u64) {
        self.edges_deleted.fetch_add(count, Ordering::Relaxed);
    }

    fn lock_conflict(&self) {
        self.lock_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    fn deferred_index_ops(&self, count: u64) {
        self.deferred_index_ops.fetch_add(count, Ordering::Relaxed);
    }

    fn index_entries_removed(&self, count: u64) {
        self.index_entries_removed.fetch_add(count, Ordering::Relaxed);
    }

    fn request_latency_us(&self, micros: u64) {
        self.latency_us_total.fetch_add(micros, Ordering::Relaxed);
        self.latency_us_max.fetch_max(micros, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn MutateMetrics> {
    Arc::new(NoopMetrics)
}
