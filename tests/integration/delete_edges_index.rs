#![allow(missing_docs)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{edge, lock_key, stale_key, Harness, SPACE};
use parking_lot::Mutex;
use shardgraph::mutate::{DeleteEdgesProcessor, DeleteEdgesRequest, ErrorCode, MutateError};
use shardgraph::storage::index::{
    IndexDescriptor, IndexField, IndexLifecycleState, IndexStateOracle, IndexStateRegistry,
    InflightRequests, TypeTag,
};
use shardgraph::storage::keys;
use shardgraph::storage::{KvStore, StoreErrorCode};
use shardgraph::types::{EdgeKey, IndexId, PartitionId, SpaceId};

const P1: PartitionId = PartitionId(1);

fn with_weight_index(parts: &[u32]) -> (Harness, IndexDescriptor) {
    let h = Harness::new(parts);
    let index = h.add_index(10, "likes_by_weight", vec![IndexField::new("weight", TypeTag::Int)]);
    (h, index)
}

fn one_part(part: u32, edges: Vec<EdgeKey>) -> DeleteEdgesRequest {
    DeleteEdgesRequest::new(SPACE).add_part(PartitionId(part), edges)
}

fn deferred_ops(h: &Harness, part: u32) -> Vec<(Vec<u8>, Vec<u8>)> {
    h.store
        .prefix(SPACE, PartitionId(part), &keys::deferred_operation_prefix(PartitionId(part)))
        .expect("scan")
        .collect()
}

#[tokio::test]
async fn normal_index_entries_are_removed_with_the_edge() -> Result<(), MutateError> {
    let (h, index) = with_weight_index(&[1]);
    let target = edge("AAAAAAAA", "BBBBBBBB", 0);
    let other = edge("AAAAAAAA", "CCCCCCCC", 0);
    let record = h.seed_edge(1, &target, 5, None);
    h.seed_edge(1, &other, 5, None);
    let target_entry = h.seed_index_entry(1, &target, &index);
    let other_entry = h.seed_index_entry(1, &other, &index);
    let lock = lock_key(1, &target, b"pending");
    let stale = stale_key(1, &target, 2);
    h.put_raw(1, lock.clone(), Vec::new());
    h.put_raw(1, stale.clone(), Vec::new());

    let resp = h.processor().delete_edges(one_part(1, vec![target])).await?;
    assert_eq!(resp.code_for(P1), Some(ErrorCode::Succeeded));
    for key in [&record, &target_entry, &lock, &stale] {
        assert!(!h.contains(1, key));
    }
    assert!(h.contains(1, &other_entry));
    assert!(deferred_ops(&h, 1).is_empty());
    assert_eq!(h.metrics.index_entries_removed.load(Ordering::Relaxed), 1);
    assert_eq!(h.metrics.edges_deleted.load(Ordering::Relaxed), 1);
    Ok(())
}

#[tokio::test]
async fn rebuilding_index_gets_a_deferred_deletion() -> Result<(), MutateError> {
    let (h, index) = with_weight_index(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    let record = h.seed_edge(1, &e, 9, None);
    let entry = h.seed_index_entry(1, &e, &index);
    h.states
        .set_index_state(SPACE, P1, index.index_id, IndexLifecycleState::Rebuilding);

    let resp = h.processor().delete_edges(one_part(1, vec![e])).await?;
    assert!(resp.all_succeeded());
    assert!(!h.contains(1, &record));
    assert!(h.contains(1, &entry));
    let ops = deferred_ops(&h, 1);
    assert_eq!(ops.len(), 1);
    assert!(keys::is_deferred_deletion(&ops[0].0));
    assert_eq!(ops[0].1, entry);
    assert_eq!(h.metrics.deferred_index_ops.load(Ordering::Relaxed), 1);
    assert_eq!(h.metrics.index_entries_removed.load(Ordering::Relaxed), 0);
    Ok(())
}

#[tokio::test]
async fn partition_wide_rebuild_marker_applies_to_every_index() -> Result<(), MutateError> {
    let (h, weight) = with_weight_index(&[1]);
    let label = h.add_index(11, "likes_by_label", vec![IndexField::fixed_string("label", 4).nullable()]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    h.seed_edge(1, &e, 1, Some("fan"));
    let weight_entry = h.seed_index_entry(1, &e, &weight);
    let label_entry = h.seed_index_entry(1, &e, &label);
    h.states
        .set_partition_state(SPACE, P1, IndexLifecycleState::Rebuilding);

    let resp = h.processor().delete_edges(one_part(1, vec![e])).await?;
    assert!(resp.all_succeeded());
    let mut deferred: Vec<Vec<u8>> = deferred_ops(&h, 1).into_iter().map(|(_, v)| v).collect();
    deferred.sort();
    let mut expected = vec![weight_entry, label_entry];
    expected.sort();
    assert_eq!(deferred, expected);
    Ok(())
}

#[tokio::test]
async fn locked_index_rejects_partition_and_leaves_it_untouched() -> Result<(), MutateError> {
    let (h, index) = with_weight_index(&[1, 2]);
    let a = edge("AAAAAAAA", "BBBBBBBB", 0);
    let b = edge("CCCCCCCC", "DDDDDDDD", 0);
    h.seed_edge(1, &a, 1, None);
    h.seed_index_entry(1, &a, &index);
    h.put_raw(1, lock_key(1, &a, b"x"), Vec::new());
    let b_record = h.seed_edge(2, &b, 1, None);
    h.states
        .set_index_state(SPACE, P1, index.index_id, IndexLifecycleState::Locked);
    let before = h.keys(1);

    let req = one_part(1, vec![a]).add_part(PartitionId(2), vec![b]);
    let resp = h.processor().delete_edges(req).await?;
    assert_eq!(resp.code_for(P1), Some(ErrorCode::DataConflict));
    assert_eq!(resp.code_for(PartitionId(2)), Some(ErrorCode::Succeeded));
    assert_eq!(h.keys(1), before);
    assert!(!h.contains(2, &b_record));
    assert_eq!(h.store.submissions(), 1);
    assert!(h.env.edges_ml.is_empty());
    assert_eq!(h.env.inflight.current(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_value_extraction_skips_only_that_index() -> Result<(), MutateError> {
    let (h, weight) = with_weight_index(&[1]);
    // Not nullable, so rows without a label cannot produce an entry.
    h.add_index(12, "likes_by_label_strict", vec![IndexField::fixed_string("label", 4)]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    let record = h.seed_edge(1, &e, 4, None);
    let weight_entry = h.seed_index_entry(1, &e, &weight);

    let resp = h.processor().delete_edges(one_part(1, vec![e])).await?;
    assert!(resp.all_succeeded());
    assert!(!h.contains(1, &record));
    assert!(!h.contains(1, &weight_entry));
    assert_eq!(h.metrics.index_entries_removed.load(Ordering::Relaxed), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_row_fails_partition_as_invalid_record() -> Result<(), MutateError> {
    let (h, _index) = with_weight_index(&[1, 2]);
    let a = edge("AAAAAAAA", "BBBBBBBB", 0);
    let b = edge("CCCCCCCC", "DDDDDDDD", 0);
    let a_record = common::record_key(1, &a);
    h.put_raw(1, a_record.clone(), b"\x07garbage".to_vec());
    let b_record = h.seed_edge(2, &b, 1, None);

    let req = one_part(1, vec![a]).add_part(PartitionId(2), vec![b]);
    let resp = h.processor().delete_edges(req).await?;
    assert_eq!(resp.code_for(P1), Some(ErrorCode::InvalidRecordFormat));
    assert_eq!(resp.code_for(PartitionId(2)), Some(ErrorCode::Succeeded));
    assert!(h.contains(1, &a_record));
    assert!(!h.contains(2, &b_record));
    Ok(())
}

#[tokio::test]
async fn missing_edge_is_a_successful_noop() -> Result<(), MutateError> {
    let (h, _index) = with_weight_index(&[1]);
    let resp = h
        .processor()
        .delete_edges(one_part(1, vec![edge("AAAAAAAA", "BBBBBBBB", 0)]))
        .await?;
    assert!(resp.all_succeeded());
    assert!(h.keys(1).is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_vertex_id_fails_before_any_scan() -> Result<(), MutateError> {
    let (h, _index) = with_weight_index(&[1]);
    h.store
        .fail_next_scan(SPACE, P1, StoreErrorCode::WriteStalled);
    let resp = h
        .processor()
        .delete_edges(one_part(1, vec![edge("AAAAAAAA", "BBBBBBBBB", 0)]))
        .await?;
    assert_eq!(resp.code_for(P1), Some(ErrorCode::InvalidVertexIdLength));
    assert_eq!(h.store.submissions(), 0);
    Ok(())
}

#[tokio::test]
async fn prefix_scan_failure_is_reported_as_store_error() -> Result<(), MutateError> {
    let (h, _index) = with_weight_index(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    h.seed_edge(1, &e, 1, None);
    h.store
        .fail_next_scan(SPACE, P1, StoreErrorCode::WriteStalled);
    let resp = h.processor().delete_edges(one_part(1, vec![e])).await?;
    assert_eq!(
        resp.code_for(P1),
        Some(ErrorCode::Store(StoreErrorCode::WriteStalled))
    );
    assert_eq!(h.store.submissions(), 0);
    Ok(())
}

#[tokio::test]
async fn locks_and_inflight_count_are_released_after_completion() -> Result<(), MutateError> {
    let (h, index) = with_weight_index(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    h.seed_edge(1, &e, 1, None);
    h.seed_index_entry(1, &e, &index);
    h.store.fail_next_write(SPACE, P1, StoreErrorCode::LeaderChanged);

    let processor = h.processor();
    let resp = processor.delete_edges(one_part(1, vec![e.clone()])).await?;
    assert_eq!(
        resp.code_for(P1),
        Some(ErrorCode::Store(StoreErrorCode::LeaderChanged))
    );
    assert!(h.env.edges_ml.is_empty());
    assert_eq!(h.env.inflight.current(), 0);

    let retry = processor.delete_edges(one_part(1, vec![e])).await?;
    assert!(retry.all_succeeded());
    assert!(h.keys(1).is_empty());
    Ok(())
}

#[tokio::test]
async fn dropping_an_index_restores_the_fast_path() -> Result<(), MutateError> {
    let (h, index) = with_weight_index(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    h.seed_edge(1, &e, 1, None);
    let entry = h.seed_index_entry(1, &e, &index);
    assert!(h.catalog.drop_edge_index(SPACE, IndexId(10)));

    let resp = h.processor().delete_edges(one_part(1, vec![e])).await?;
    assert!(resp.all_succeeded());
    assert_eq!(h.keys(1), vec![entry]);
    Ok(())
}

/// Delegates to a registry and records the in-flight count seen at each lookup.
struct RecordingOracle {
    states: Arc<IndexStateRegistry>,
    inflight: Arc<InflightRequests>,
    seen: Mutex<Vec<u64>>,
}

impl IndexStateOracle for RecordingOracle {
    fn index_state(&self, space: SpaceId, part: PartitionId, index: IndexId) -> IndexLifecycleState {
        self.seen.lock().push(self.inflight.current());
        self.states.index_state(space, part, index)
    }
}

#[tokio::test]
async fn index_state_is_read_while_counted_in_flight() -> Result<(), MutateError> {
    let (h, index) = with_weight_index(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    h.seed_edge(1, &e, 2, None);
    h.seed_index_entry(1, &e, &index);

    let mut env = h.env.clone();
    let oracle = Arc::new(RecordingOracle {
        states: h.states.clone(),
        inflight: Arc::clone(&env.inflight),
        seen: Mutex::new(Vec::new()),
    });
    env.index_state = oracle.clone();

    let resp = DeleteEdgesProcessor::new(env).delete_edges(one_part(1, vec![e])).await?;
    assert!(resp.all_succeeded());
    let seen = oracle.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen.iter().all(|count| *count >= 1), "lookups saw {seen:?}");
    assert_eq!(h.env.inflight.current(), 0);
    Ok(())
}
