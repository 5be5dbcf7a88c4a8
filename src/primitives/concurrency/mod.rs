#![forbid(unsafe_code)]
//! In-process lock registry used to serialize conflicting edge mutations.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// Registry of keys currently claimed by in-flight operations.
///
/// Acquisition is all-or-nothing over a set of keys and is serialized by a
/// single mutex, so two callers racing for overlapping sets always produce one
/// winner and one conflict. Only exclusive claims exist.
pub struct MemoryLock<K> {
    held: Mutex<FxHashSet<K>>,
}

/// Returned when a key requested by [`MemoryLock::try_lock_all`] is already held.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LockConflict<K> {
    /// The first conflicting key, in sorted order of the requested set.
    pub key: K,
}

impl<K: fmt::Display> fmt::Display for LockConflict<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key {} already locked", self.key)
    }
}

/// Guard owning a set of claimed keys; dropping it releases all of them.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct MemoryLockGuard<K: Eq + Hash> {
    lock: Arc<MemoryLock<K>>,
    keys: Vec<K>,
}

impl<K> Default for MemoryLock<K> {
    fn default() -> Self {
        Self {
            held: Mutex::new(FxHashSet::default()),
        }
    }
}

impl<K> MemoryLock<K>
where
    K: Clone + Eq + Hash + Ord,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims every key in `keys` or none of them.
    ///
    /// Duplicates inside `keys` are claimed once. On conflict nothing is
    /// claimed and the smallest conflicting key is returned, which keeps the
    /// reported key independent of the caller's insertion order.
    pub fn try_lock_all(
        self: &Arc<Self>,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<MemoryLockGuard<K>, LockConflict<K>> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        let mut held = self.held.lock();
        if let Some(conflict) = keys.iter().find(|key| held.contains(*key)) {
            return Err(LockConflict {
                key: conflict.clone(),
            });
        }
        held.extend(keys.iter().cloned());
        drop(held);
        Ok(MemoryLockGuard {
            lock: Arc::clone(self),
            keys,
        })
    }

    /// Returns `true` when `key` is currently claimed.
    pub fn is_locked(&self, key: &K) -> bool {
        self.held.lock().contains(key)
    }

    /// Number of keys currently claimed.
    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    /// Returns `true` when nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash> MemoryLockGuard<K> {
    /// Keys owned by this guard, sorted and deduplicated.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }
}

impl<K: Eq + Hash> Drop for MemoryLockGuard<K> {
    fn drop(&mut self) {
        let mut held = self.lock.held.lock();
        for key in &self.keys {
            held.remove(key);
        }
    }
}

impl<K: Eq + Hash + fmt::Debug> fmt::Debug for MemoryLockGuard<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLockGuard")
            .field("keys", &self.keys)
            .finish()
    }
}
