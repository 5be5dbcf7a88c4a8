use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::types::{IndexId, PartitionId, SpaceId};

use super::types::IndexLifecycleState;

/// Read-only view of index lifecycle markers owned by the rebuild machinery.
pub trait IndexStateOracle: Send + Sync {
    /// Lifecycle of `index` in `(space, part)`. No marker means [`IndexLifecycleState::Normal`].
    fn index_state(&self, space: SpaceId, part: PartitionId, index: IndexId)
        -> IndexLifecycleState;
}

/// In-memory lifecycle markers.
///
/// A marker set for a specific index wins over a partition-wide marker; a
/// partition-wide marker covers every index of that partition.
#[derive(Default)]
pub struct IndexStateRegistry {
    per_index: RwLock<FxHashMap<(SpaceId, PartitionId, IndexId), IndexLifecycleState>>,
    per_part: RwLock<FxHashMap<(SpaceId, PartitionId), IndexLifecycleState>>,
}

impl IndexStateRegistry {
    /// Creates a registry with no markers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one index of a partition.
    pub fn set_index_state(
        &self,
        space: SpaceId,
        part: PartitionId,
        index: IndexId,
        state: IndexLifecycleState,
    ) {
        let mut map = self.per_index.write();
        if state == IndexLifecycleState::Normal {
            map.remove(&(space, part, index));
        } else {
            map.insert((space, part, index), state);
        }
    }

    /// Marks every index of a partition.
    pub fn set_partition_state(&self, space: SpaceId, part: PartitionId, state: IndexLifecycleState) {
        let mut map = self.per_part.write();
        if state == IndexLifecycleState::Normal {
            map.remove(&(space, part));
        } else {
            map.insert((space, part), state);
        }
    }

    /// Drops every marker of a space.
    pub fn clear_space(&self, space: SpaceId) {
        self.per_index.write().retain(|(s, _, _), _| *s != space);
        self.per_part.write().retain(|(s, _), _| *s != space);
    }
}

impl IndexStateOracle for IndexStateRegistry {
    fn index_state(
        &self,
        space: SpaceId,
        part: PartitionId,
        index: IndexId,
    ) -> IndexLifecycleState {
        if let Some(state) = self.per_index.read().get(&(space, part, index)) {
            return *state;
        }
        self.per_part
            .read()
            .get(&(space, part))
            .copied()
            .unwrap_or_default()
    }
}

/// Count of index-aware mutations submitted but not yet completed.
///
/// A rebuild waits for this to drain before switching an index back to
/// [`IndexLifecycleState::Normal`], so no mutation that observed the old state
/// is still in flight.
#[derive(Default, Debug)]
pub struct InflightRequests {
    count: AtomicU64,
}

/// Keeps one request counted until dropped.
#[derive(Debug)]
pub struct InflightGuard {
    owner: Arc<InflightRequests>,
}

impl InflightRequests {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a request for the lifetime of the returned guard.
    pub fn track(self: &Arc<Self>) -> InflightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InflightGuard {
            owner: Arc::clone(self),
        }
    }

    /// Number of requests currently counted.
    pub fn current(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.owner.count.fetch_sub(1, Ordering::SeqCst);
    }
}
