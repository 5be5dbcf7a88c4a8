//! Partitioned key-value store seam and its in-memory implementation.
//!
//! Writes are asynchronous: the store accepts a request and later invokes the
//! supplied callback exactly once with the outcome. Each write is atomic with
//! respect to its partition.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::types::{PartitionId, SpaceId};

use super::batch::{decode_batch, BatchOp};
use super::keys::StorageKey;

/// Failure codes reported by the key-value store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StoreErrorCode {
    /// The space has no partition on this node.
    SpaceNotFound,
    /// The partition is not hosted here.
    PartNotFound,
    /// Leadership moved while the write was pending.
    LeaderChanged,
    /// The store is throttling writes.
    WriteStalled,
    /// Any other failure.
    Unknown,
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorCode::SpaceNotFound => "space not found",
            StoreErrorCode::PartNotFound => "partition not found",
            StoreErrorCode::LeaderChanged => "leader changed",
            StoreErrorCode::WriteStalled => "write stalled",
            StoreErrorCode::Unknown => "unknown store error",
        };
        f.write_str(name)
    }
}

/// Completion callback of an asynchronous write.
pub type KvCallback = Box<dyn FnOnce(Result<(), StoreErrorCode>) + Send + 'static>;

/// Ordered `(key, value)` pairs produced by a prefix scan.
pub type KvIter<'a> = Box<dyn Iterator<Item = (StorageKey, Vec<u8>)> + Send + 'a>;

/// Partitioned, ordered key-value store.
pub trait KvStore: Send + Sync {
    /// Every entry of `(space, part)` whose key starts with `prefix`, in key order.
    fn prefix(
        &self,
        space: SpaceId,
        part: PartitionId,
        prefix: &[u8],
    ) -> Result<KvIter<'_>, StoreErrorCode>;

    /// Removes `keys` atomically, then invokes `callback`.
    fn async_multi_remove(
        &self,
        space: SpaceId,
        part: PartitionId,
        keys: Vec<StorageKey>,
        callback: KvCallback,
    );

    /// Applies an encoded [`super::batch::BatchHolder`] atomically, then invokes `callback`.
    fn async_append_batch(
        &self,
        space: SpaceId,
        part: PartitionId,
        batch: Vec<u8>,
        callback: KvCallback,
    );
}

type PartKey = (SpaceId, PartitionId);
type PartData = BTreeMap<StorageKey, Vec<u8>>;

enum WriteOp {
    Remove(Vec<StorageKey>),
    Batch(Vec<u8>),
}

struct PendingWrite {
    part: PartKey,
    op: WriteOp,
    callback: KvCallback,
}

#[derive(Default)]
struct Inner {
    parts: Mutex<FxHashMap<PartKey, PartData>>,
    write_faults: Mutex<FxHashMap<PartKey, StoreErrorCode>>,
    scan_faults: Mutex<FxHashMap<PartKey, StoreErrorCode>>,
    paused: Mutex<Option<Vec<PendingWrite>>>,
    submissions: AtomicU64,
}

/// In-memory [`KvStore`].
///
/// Completions run on a spawned tokio task when called inside a runtime and
/// inline otherwise. Writes can be paused to hold completions back, and
/// one-shot faults can be injected per partition.
#[derive(Clone, Default)]
pub struct MemKvStore {
    inner: Arc<Inner>,
}

impl MemKvStore {
    /// Empty store without partitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty partition. Existing data is kept.
    pub fn add_part(&self, space: SpaceId, part: PartitionId) {
        self.inner.parts.lock().entry((space, part)).or_default();
    }

    /// Writes one entry directly, bypassing the asynchronous path.
    pub fn put(
        &self,
        space: SpaceId,
        part: PartitionId,
        key: StorageKey,
        value: Vec<u8>,
    ) -> Result<(), StoreErrorCode> {
        let mut parts = self.inner.parts.lock();
        let data = part_mut(&mut parts, (space, part))?;
        data.insert(key, value);
        Ok(())
    }

    /// Reads one entry directly.
    pub fn get(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> Option<Vec<u8>> {
        self.inner
            .parts
            .lock()
            .get(&(space, part))
            .and_then(|data| data.get(key).cloned())
    }

    /// Every entry of a partition in key order.
    pub fn scan_all(&self, space: SpaceId, part: PartitionId) -> Vec<(StorageKey, Vec<u8>)> {
        self.inner
            .parts
            .lock()
            .get(&(space, part))
            .map(|data| data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Number of asynchronous writes submitted so far.
    pub fn submissions(&self) -> u64 {
        self.inner.submissions.load(Ordering::SeqCst)
    }

    /// Fails the next write to `(space, part)` with `code`.
    pub fn fail_next_write(&self, space: SpaceId, part: PartitionId, code: StoreErrorCode) {
        self.inner.write_faults.lock().insert((space, part), code);
    }

    /// Fails the next prefix scan of `(space, part)` with `code`.
    pub fn fail_next_scan(&self, space: SpaceId, part: PartitionId, code: StoreErrorCode) {
        self.inner.scan_faults.lock().insert((space, part), code);
    }

    /// Holds back every subsequent write until [`MemKvStore::resume_writes`].
    pub fn pause_writes(&self) {
        let mut paused = self.inner.paused.lock();
        if paused.is_none() {
            *paused = Some(Vec::new());
        }
    }

    /// Applies held writes in submission order and stops holding new ones.
    /// Returns how many writes were released.
    pub fn resume_writes(&self) -> usize {
        let held = self.inner.paused.lock().take().unwrap_or_default();
        let released = held.len();
        for write in held {
            self.dispatch(write);
        }
        released
    }

    /// Number of writes currently held back.
    pub fn held_writes(&self) -> usize {
        self.inner.paused.lock().as_ref().map_or(0, Vec::len)
    }

    fn submit(&self, write: PendingWrite) {
        self.inner.submissions.fetch_add(1, Ordering::SeqCst);
        {
            let mut paused = self.inner.paused.lock();
            if let Some(queue) = paused.as_mut() {
                queue.push(write);
                return;
            }
        }
        self.dispatch(write);
    }

    fn dispatch(&self, write: PendingWrite) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move { inner.complete(write) });
            }
            Err(_) => self.inner.complete(write),
        }
    }
}

impl Inner {
    fn complete(&self, write: PendingWrite) {
        let PendingWrite {
            part,
            op,
            callback,
        } = write;
        let result = self.apply(part, op);
        trace!(space = part.0 .0, part = part.1 .0, ok = result.is_ok(), "kv.write_complete");
        callback(result);
    }

    fn apply(&self, part: PartKey, op: WriteOp) -> Result<(), StoreErrorCode> {
        if let Some(code) = self.write_faults.lock().remove(&part) {
            return Err(code);
        }
        let mut parts = self.parts.lock();
        let data = part_mut(&mut parts, part)?;
        match op {
            WriteOp::Remove(keys) => {
                for key in keys {
                    data.remove(&key);
                }
            }
            WriteOp::Batch(payload) => {
                let ops = decode_batch(&payload).map_err(|err| {
                    warn!(error = %err, "kv.batch_rejected");
                    StoreErrorCode::Unknown
                })?;
                for op in ops {
                    match op {
                        BatchOp::Put(key, value) => {
                            data.insert(key, value);
                        }
                        BatchOp::Remove(key) => {
                            data.remove(&key);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn part_mut(
    parts: &mut FxHashMap<PartKey, PartData>,
    key: PartKey,
) -> Result<&mut PartData, StoreErrorCode> {
    if !parts.contains_key(&key) {
        return Err(missing_part_code(parts, key));
    }
    parts.get_mut(&key).ok_or(StoreErrorCode::PartNotFound)
}

fn missing_part_code(parts: &FxHashMap<PartKey, PartData>, key: PartKey) -> StoreErrorCode {
    if parts.keys().any(|(space, _)| *space == key.0) {
        StoreErrorCode::PartNotFound
    } else {
        StoreErrorCode::SpaceNotFound
    }
}

impl KvStore for MemKvStore {
    fn prefix(
        &self,
        space: SpaceId,
        part: PartitionId,
        prefix: &[u8],
    ) -> Result<KvIter<'_>, StoreErrorCode> {
        if let Some(code) = self.inner.scan_faults.lock().remove(&(space, part)) {
            return Err(code);
        }
        let parts = self.inner.parts.lock();
        let data = parts
            .get(&(space, part))
            .ok_or_else(|| missing_part_code(&parts, (space, part)))?;
        let entries: Vec<(StorageKey, Vec<u8>)> = data
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(entries.into_iter()))
    }

    fn async_multi_remove(
        &self,
        space: SpaceId,
        part: PartitionId,
        keys: Vec<StorageKey>,
        callback: KvCallback,
    ) {
        self.submit(PendingWrite {
            part: (space, part),
            op: WriteOp::Remove(keys),
            callback,
        });
    }

    fn async_append_batch(
        &self,
        space: SpaceId,
        part: PartitionId,
        batch: Vec<u8>,
        callback: KvCallback,
    ) {
        self.submit(PendingWrite {
            part: (space, part),
            op: WriteOp::Batch(batch),
            callback,
        });
    }
}
