//! Edge deletion.
//!
//! Spaces without indexes take a lock-free path that removes the record keys
//! directly. Otherwise each partition scans every edge's key range to drop
//! lock placeholders, index entries and stale versions in one batch, claims
//! the partition's edges in the in-process lock registry and keeps them
//! claimed until the store reports the batch outcome.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::storage::index::{collect_index_values, IndexDescriptor, IndexLifecycleState};
use crate::storage::keys::{self, KeyKind};
use crate::storage::{BatchHolder, EdgeRow, KvCallback};
use crate::types::{EdgeIdentity, EdgeKey, PartitionId, SpaceId};

use super::response::{PendingResponse, ResponseCollector};
use super::{DeleteEdgesRequest, DeleteEdgesResponse, ErrorCode, MutateError, StorageEnv};

/// Batch built for one partition of an index-aware delete.
#[derive(Debug, Default)]
struct PartBatch {
    batch: BatchHolder,
    records: u64,
    index_removals: u64,
    deferred: u64,
}

#[derive(Clone, Copy)]
struct PartScope {
    space: SpaceId,
    part: PartitionId,
    vid_len: usize,
}

/// Deletes edges and maintains their secondary index entries.
pub struct DeleteEdgesProcessor {
    env: StorageEnv,
}

impl DeleteEdgesProcessor {
    /// Creates a processor over `env`.
    pub fn new(env: StorageEnv) -> Self {
        Self { env }
    }

    /// Deletes the edges of `req` and waits for every partition to report.
    pub async fn delete_edges(
        &self,
        req: DeleteEdgesRequest,
    ) -> Result<DeleteEdgesResponse, MutateError> {
        self.process(req).wait().await
    }

    /// Dispatches every partition of `req` and returns without waiting for
    /// the store. Each partition reports exactly once.
    pub fn process(&self, req: DeleteEdgesRequest) -> PendingResponse {
        self.env.metrics.delete_edges_call();
        let (collector, pending) =
            ResponseCollector::new(req.parts.len(), Arc::clone(&self.env.metrics));
        let space = req.space;

        let vid_len = match self.env.schema_man.space_vid_len(space) {
            Ok(vid_len) => vid_len,
            Err(source) => {
                let err = MutateError::SpaceVidLen { space, source };
                error!(space = space.0, error = %err, "mutate.delete_edges.space_vid_len");
                fail_all(&collector, &req, err.code());
                return pending;
            }
        };
        let indexes = match self.env.index_man.edge_indexes(space) {
            Ok(indexes) => indexes,
            Err(source) => {
                let err = MutateError::IndexesUnavailable { space, source };
                error!(space = space.0, error = %err, "mutate.delete_edges.indexes");
                fail_all(&collector, &req, err.code());
                return pending;
            }
        };

        debug!(
            space = space.0,
            parts = req.parts.len(),
            indexes = indexes.len(),
            "mutate.delete_edges.dispatch"
        );
        if indexes.is_empty() {
            for (part, edges) in req.parts {
                self.delete_without_index(space, part, vid_len, &edges, &collector);
            }
        } else {
            for (part, edges) in req.parts {
                self.delete_with_index(space, part, vid_len, &edges, &indexes, &collector);
            }
        }
        pending
    }

    fn delete_without_index(
        &self,
        space: SpaceId,
        part: PartitionId,
        vid_len: usize,
        edges: &[EdgeKey],
        collector: &Arc<ResponseCollector>,
    ) {
        let mut keys = Vec::with_capacity(edges.len());
        for edge in edges {
            if let Err(err) = check_vid(vid_len, edge) {
                error!(space = space.0, part = part.0, error = %err, "mutate.delete_edges.invalid_vid");
                collector.report(part, err.code());
                return;
            }
            keys.push(keys::edge_key(
                vid_len,
                part,
                &edge.src,
                edge.edge_type,
                edge.ranking,
                &edge.dst,
            ));
        }
        let count = keys.len() as u64;
        self.env.kvstore.async_multi_remove(
            space,
            part,
            keys,
            self.completion(part, count, None, Arc::clone(collector)),
        );
    }

    fn delete_with_index(
        &self,
        space: SpaceId,
        part: PartitionId,
        vid_len: usize,
        edges: &[EdgeKey],
        indexes: &[Arc<IndexDescriptor>],
        collector: &Arc<ResponseCollector>,
    ) {
        // Counted before any index state is read; early returns release it.
        let inflight = self.env.inflight.track();
        let built = match self.build_index_batch(space, part, vid_len, edges, indexes) {
            Ok(built) => built,
            Err(err) => {
                error!(space = space.0, part = part.0, error = %err, "mutate.delete_edges.build_batch");
                collector.report(part, err.code());
                return;
            }
        };

        let identities = edges.iter().map(|edge| EdgeIdentity::new(space, part, edge));
        let guard = match self.env.edges_ml.try_lock_all(identities) {
            Ok(guard) => guard,
            Err(conflict) => {
                self.env.metrics.lock_conflict();
                if self.env.options.log_conflict_keys {
                    error!(part = part.0, edge = %conflict.key, "mutate.delete_edges.lock_conflict");
                } else {
                    error!(part = part.0, "mutate.delete_edges.lock_conflict");
                }
                collector.report(part, MutateError::Conflict(conflict.key).code());
                return;
            }
        };

        self.env.metrics.deferred_index_ops(built.deferred);
        trace!(
            part = part.0,
            ops = built.batch.len(),
            index_removals = built.index_removals,
            deferred = built.deferred,
            "mutate.delete_edges.submit"
        );
        let collector = Arc::clone(collector);
        let done = self.completion(part, built.records, Some(built.index_removals), collector);
        let callback: KvCallback = Box::new(move |result| {
            drop(guard);
            drop(inflight);
            done(result);
        });
        self.env
            .kvstore
            .async_append_batch(space, part, built.batch.encode(), callback);
    }

    /// Builds the removal batch of one partition: for every edge, its lock
    /// placeholders, its index entries (or their deferred deletions), its
    /// record and every stale version under its prefix.
    fn build_index_batch(
        &self,
        space: SpaceId,
        part: PartitionId,
        vid_len: usize,
        edges: &[EdgeKey],
        indexes: &[Arc<IndexDescriptor>],
    ) -> Result<PartBatch, MutateError> {
        let mut out = PartBatch::default();
        for edge in edges {
            check_vid(vid_len, edge)?;
            let prefix = keys::edge_prefix(
                vid_len,
                part,
                &edge.src,
                edge.edge_type,
                edge.ranking,
                &edge.dst,
            );
            let mut iter = self
                .env
                .kvstore
                .prefix(space, part, &prefix)
                .map_err(MutateError::Store)?
                .peekable();

            while let Some((key, _)) =
                iter.next_if(|(key, _)| keys::classify(vid_len, key) == KeyKind::Lock)
            {
                out.batch.remove(key);
            }
            if let Some((key, value)) =
                iter.next_if(|(key, _)| keys::classify(vid_len, key) == KeyKind::EdgeRecord)
            {
                let scope = PartScope {
                    space,
                    part,
                    vid_len,
                };
                self.remove_index_entries(scope, edge, &value, indexes, &mut out)?;
                out.batch.remove(key);
                out.records += 1;
            }
            for (key, _) in iter {
                out.batch.remove(key);
            }
        }
        Ok(out)
    }

    fn remove_index_entries(
        &self,
        scope: PartScope,
        edge: &EdgeKey,
        raw: &[u8],
        indexes: &[Arc<IndexDescriptor>],
        out: &mut PartBatch,
    ) -> Result<(), MutateError> {
        let PartScope {
            space,
            part,
            vid_len,
        } = scope;
        let mut row: Option<EdgeRow> = None;
        for index in indexes.iter().filter(|index| index.edge_type == edge.edge_type) {
            let decoded: &EdgeRow = match &mut row {
                Some(decoded) => decoded,
                slot @ None => slot.insert(
                    self.env
                        .schema_man
                        .decode_edge_record(space, edge.edge_type, raw)
                        .map_err(|source| MutateError::InvalidRecord {
                            edge_type: edge.edge_type,
                            source,
                        })?,
                ),
            };
            let values = match collect_index_values(decoded, &index.fields) {
                Ok(values) => values,
                Err(err) => {
                    warn!(
                        part = part.0,
                        index = %index.name,
                        error = %err,
                        "mutate.delete_edges.index_values_skipped"
                    );
                    continue;
                }
            };
            let index_key = keys::edge_index_key(
                vid_len,
                part,
                index.index_id,
                &edge.src,
                edge.ranking,
                &edge.dst,
                &values,
            );
            match self.env.index_state.index_state(space, part, index.index_id) {
                IndexLifecycleState::Locked => {
                    return Err(MutateError::IndexLocked {
                        index_id: index.index_id,
                        name: index.name.clone(),
                    });
                }
                IndexLifecycleState::Rebuilding => {
                    out.batch.put(keys::deferred_deletion_key(part), index_key);
                    out.deferred += 1;
                }
                IndexLifecycleState::Normal => {
                    out.batch.remove(index_key);
                    out.index_removals += 1;
                }
            }
        }
        Ok(())
    }

    /// Completion callback reporting the store outcome of one partition.
    fn completion(
        &self,
        part: PartitionId,
        edges: u64,
        index_removals: Option<u64>,
        collector: Arc<ResponseCollector>,
    ) -> KvCallback {
        let metrics = Arc::clone(&self.env.metrics);
        Box::new(move |result| match result {
            Ok(()) => {
                metrics.edges_deleted(edges);
                if let Some(n) = index_removals {
                    metrics.index_entries_removed(n);
                }
                collector.report(part, ErrorCode::Succeeded);
            }
            Err(code) => {
                let err = MutateError::Store(code);
                error!(part = part.0, error = %err, "mutate.delete_edges.store");
                collector.report(part, err.code());
            }
        })
    }
}

fn check_vid(vid_len: usize, edge: &EdgeKey) -> Result<(), MutateError> {
    if keys::is_valid_vid_len(vid_len, &edge.src, &edge.dst) {
        Ok(())
    } else {
        Err(MutateError::InvalidVid {
            vid_len,
            src_len: edge.src.len(),
            dst_len: edge.dst.len(),
        })
    }
}

fn fail_all(collector: &ResponseCollector, req: &DeleteEdgesRequest, code: ErrorCode) {
    for part in req.parts.keys() {
        collector.report(*part, code);
    }
}
