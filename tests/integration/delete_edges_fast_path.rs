#![allow(missing_docs)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{edge, lock_key, record_key, stale_key, Harness, SPACE, VID_LEN};
use shardgraph::mutate::{DeleteEdgesProcessor, DeleteEdgesRequest, ErrorCode, MutateError, StorageEnv};
use shardgraph::storage::index::IndexStateRegistry;
use shardgraph::storage::{MemCatalog, StoreErrorCode};
use shardgraph::types::{EdgeKey, PartitionId, SpaceId};

fn request(parts: &[(u32, Vec<EdgeKey>)]) -> DeleteEdgesRequest {
    parts
        .iter()
        .fold(DeleteEdgesRequest::new(SPACE), |req, (part, edges)| {
            req.add_part(PartitionId(*part), edges.clone())
        })
}

#[tokio::test]
async fn single_edge_is_removed_with_one_submission() -> Result<(), MutateError> {
    let h = Harness::new(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    let key = h.seed_edge(1, &e, 1, None);
    assert_eq!(key.len(), 1 + 4 + VID_LEN * 2 + 4 + 8 + 1);

    let resp = h.processor().delete_edges(request(&[(1, vec![e])])).await?;
    assert_eq!(resp.code_for(PartitionId(1)), Some(ErrorCode::Succeeded));
    assert_eq!(resp.results.len(), 1);
    assert_eq!(h.store.submissions(), 1);
    assert!(!h.contains(1, &key));
    Ok(())
}

#[tokio::test]
async fn short_vertex_id_fails_only_its_partition() -> Result<(), MutateError> {
    let h = Harness::new(&[1, 2]);
    let good = edge("AAAAAAAA", "BBBBBBBB", 0);
    let good_key = h.seed_edge(2, &good, 1, None);
    let bad = edge("AAAA", "BBBBBBBB", 0);

    let resp = h
        .processor()
        .delete_edges(request(&[(1, vec![good.clone(), bad]), (2, vec![good])]))
        .await?;
    assert_eq!(resp.code_for(PartitionId(1)), Some(ErrorCode::InvalidVertexIdLength));
    assert_eq!(resp.code_for(PartitionId(2)), Some(ErrorCode::Succeeded));
    assert_eq!(h.store.submissions(), 1);
    assert!(!h.contains(2, &good_key));
    assert_eq!(resp.failed_parts().count(), 1);
    Ok(())
}

#[tokio::test]
async fn deleting_twice_is_a_successful_noop() -> Result<(), MutateError> {
    let h = Harness::new(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 3);
    h.seed_edge(1, &e, 1, None);
    let processor = h.processor();

    let first = processor.delete_edges(request(&[(1, vec![e.clone()])])).await?;
    assert!(first.all_succeeded());
    assert!(h.keys(1).is_empty());

    let second = processor.delete_edges(request(&[(1, vec![e])])).await?;
    assert!(second.all_succeeded());
    assert!(h.keys(1).is_empty());
    Ok(())
}

#[tokio::test]
async fn fast_path_removes_only_record_keys() -> Result<(), MutateError> {
    let h = Harness::new(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    let record = h.seed_edge(1, &e, 1, None);
    let lock = lock_key(1, &e, b"tx1");
    let stale = stale_key(1, &e, 7);
    h.put_raw(1, lock.clone(), Vec::new());
    h.put_raw(1, stale.clone(), Vec::new());

    let resp = h.processor().delete_edges(request(&[(1, vec![e])])).await?;
    assert!(resp.all_succeeded());
    assert!(!h.contains(1, &record));
    assert!(h.contains(1, &lock));
    assert!(h.contains(1, &stale));
    assert!(h.env.edges_ml.is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_space_fails_every_partition() -> Result<(), MutateError> {
    let h = Harness::new(&[1, 2]);
    let req = DeleteEdgesRequest::new(SpaceId(42))
        .add_part(PartitionId(1), vec![edge("AAAAAAAA", "BBBBBBBB", 0)])
        .add_part(PartitionId(2), vec![]);
    let resp = h.processor().delete_edges(req).await?;
    assert_eq!(resp.results.len(), 2);
    for result in &resp.results {
        assert_eq!(result.code, ErrorCode::InvalidSpaceVidLen);
    }
    assert_eq!(h.store.submissions(), 0);
    Ok(())
}

#[tokio::test]
async fn index_lookup_failure_fails_every_partition() -> Result<(), MutateError> {
    let h = Harness::new(&[1, 2]);
    let env = StorageEnv::new(
        Arc::new(h.store.clone()),
        h.catalog.clone(),
        Arc::new(MemCatalog::new()),
        Arc::new(IndexStateRegistry::new()),
    );
    let resp = DeleteEdgesProcessor::new(env)
        .delete_edges(request(&[
            (1, vec![edge("AAAAAAAA", "BBBBBBBB", 0)]),
            (2, vec![edge("CCCCCCCC", "DDDDDDDD", 0)]),
        ]))
        .await?;
    assert!(resp
        .results
        .iter()
        .all(|r| r.code == ErrorCode::SpaceOrSchemaNotFound));
    assert_eq!(h.store.submissions(), 0);
    Ok(())
}

#[tokio::test]
async fn store_failure_is_reported_for_its_partition() -> Result<(), MutateError> {
    let h = Harness::new(&[1, 2]);
    let a = edge("AAAAAAAA", "BBBBBBBB", 0);
    let b = edge("CCCCCCCC", "DDDDDDDD", 0);
    let a_key = h.seed_edge(1, &a, 1, None);
    let b_key = h.seed_edge(2, &b, 1, None);
    h.store
        .fail_next_write(SPACE, PartitionId(2), StoreErrorCode::LeaderChanged);

    let resp = h
        .processor()
        .delete_edges(request(&[(1, vec![a]), (2, vec![b])]))
        .await?;
    assert_eq!(resp.code_for(PartitionId(1)), Some(ErrorCode::Succeeded));
    assert_eq!(
        resp.code_for(PartitionId(2)),
        Some(ErrorCode::Store(StoreErrorCode::LeaderChanged))
    );
    assert!(!h.contains(1, &a_key));
    assert!(h.contains(2, &b_key));
    Ok(())
}

#[tokio::test]
async fn unknown_partition_surfaces_store_code() -> Result<(), MutateError> {
    let h = Harness::new(&[1]);
    let resp = h
        .processor()
        .delete_edges(request(&[(9, vec![edge("AAAAAAAA", "BBBBBBBB", 0)])]))
        .await?;
    assert_eq!(
        resp.code_for(PartitionId(9)),
        Some(ErrorCode::Store(StoreErrorCode::PartNotFound))
    );
    Ok(())
}

#[tokio::test]
async fn empty_request_completes_immediately() -> Result<(), MutateError> {
    let h = Harness::new(&[1]);
    let resp = h.processor().delete_edges(DeleteEdgesRequest::new(SPACE)).await?;
    assert!(resp.results.is_empty());
    assert_eq!(h.store.submissions(), 0);
    Ok(())
}

#[tokio::test]
async fn counters_track_calls_edges_and_errors() -> Result<(), MutateError> {
    let h = Harness::new(&[1, 2]);
    let a = edge("AAAAAAAA", "BBBBBBBB", 0);
    let b = edge("AAAAAAAA", "BBBBBBBB", 1);
    h.seed_edge(1, &a, 1, None);
    h.seed_edge(1, &b, 1, None);
    let resp = h
        .processor()
        .delete_edges(request(&[(1, vec![a, b]), (2, vec![edge("A", "B", 0)])]))
        .await?;
    assert_eq!(resp.failed_parts().count(), 1);
    assert_eq!(h.metrics.delete_edges_calls.load(Ordering::Relaxed), 1);
    assert_eq!(h.metrics.edges_deleted.load(Ordering::Relaxed), 2);
    assert_eq!(h.metrics.delete_edges_errors.load(Ordering::Relaxed), 1);
    assert_eq!(h.metrics.lock_conflicts.load(Ordering::Relaxed), 0);
    Ok(())
}

#[test]
fn completes_inline_without_a_runtime() -> Result<(), MutateError> {
    let h = Harness::new(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    let key = record_key(1, &e);
    h.seed_edge(1, &e, 1, None);
    let resp = h
        .processor()
        .process(request(&[(1, vec![e])]))
        .blocking_wait()?;
    assert!(resp.all_succeeded());
    assert!(!h.contains(1, &key));
    Ok(())
}
