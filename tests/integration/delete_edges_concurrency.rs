#![allow(missing_docs)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

use common::{edge, Harness, SPACE};
use shardgraph::mutate::{DeleteEdgesRequest, ErrorCode, MutateError};
use shardgraph::storage::index::{IndexField, TypeTag};
use shardgraph::storage::MutateOptions;
use shardgraph::types::{EdgeIdentity, EdgeKey, PartitionId};

const P1: PartitionId = PartitionId(1);
const THREADS: usize = 8;

fn indexed(parts: &[u32]) -> Harness {
    let h = Harness::new(parts);
    h.add_index(10, "likes_by_weight", vec![IndexField::new("weight", TypeTag::Int)]);
    h
}

fn req(edges: Vec<EdgeKey>) -> DeleteEdgesRequest {
    DeleteEdgesRequest::new(SPACE).add_part(P1, edges)
}

#[tokio::test]
async fn overlapping_request_conflicts_while_first_is_in_flight() -> Result<(), MutateError> {
    let h = indexed(&[1]);
    let shared = edge("AAAAAAAA", "BBBBBBBB", 0);
    let only_second = edge("CCCCCCCC", "DDDDDDDD", 0);
    h.seed_edge(1, &shared, 1, None);
    h.seed_edge(1, &only_second, 1, None);
    let processor = h.processor();

    h.store.pause_writes();
    let first = processor.process(req(vec![shared.clone()]));
    assert!(h
        .env
        .edges_ml
        .is_locked(&EdgeIdentity::new(SPACE, P1, &shared)));
    assert_eq!(h.env.inflight.current(), 1);

    let second = processor
        .delete_edges(req(vec![only_second.clone(), shared.clone()]))
        .await?;
    assert_eq!(second.code_for(P1), Some(ErrorCode::DataConflict));
    assert_eq!(h.store.held_writes(), 1);
    assert!(h.contains(1, &common::record_key(1, &only_second)));

    assert_eq!(h.store.resume_writes(), 1);
    let first = first.wait().await?;
    assert_eq!(first.code_for(P1), Some(ErrorCode::Succeeded));
    assert!(h.env.edges_ml.is_empty());
    assert_eq!(h.env.inflight.current(), 0);
    assert_eq!(h.metrics.lock_conflicts.load(Ordering::Relaxed), 1);

    let retry = processor.delete_edges(req(vec![only_second])).await?;
    assert!(retry.all_succeeded());
    assert!(h.keys(1).is_empty());
    Ok(())
}

#[tokio::test]
async fn disjoint_requests_proceed_together() -> Result<(), MutateError> {
    let h = indexed(&[1]);
    let a = edge("AAAAAAAA", "BBBBBBBB", 0);
    let b = edge("AAAAAAAA", "BBBBBBBB", 1);
    h.seed_edge(1, &a, 1, None);
    h.seed_edge(1, &b, 2, None);
    let processor = h.processor();

    h.store.pause_writes();
    let first = processor.process(req(vec![a]));
    let second = processor.process(req(vec![b]));
    assert_eq!(h.store.held_writes(), 2);
    h.store.resume_writes();
    assert!(first.wait().await?.all_succeeded());
    assert!(second.wait().await?.all_succeeded());
    assert!(h.keys(1).is_empty());
    Ok(())
}

#[tokio::test]
async fn fast_path_never_conflicts() -> Result<(), MutateError> {
    let h = Harness::new(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    h.seed_edge(1, &e, 1, None);
    let processor = h.processor();

    h.store.pause_writes();
    let first = processor.process(req(vec![e.clone()]));
    let second = processor.process(req(vec![e]));
    assert!(h.env.edges_ml.is_empty());
    h.store.resume_writes();
    assert!(first.wait().await?.all_succeeded());
    assert!(second.wait().await?.all_succeeded());
    assert_eq!(h.metrics.lock_conflicts.load(Ordering::Relaxed), 0);
    Ok(())
}

#[tokio::test]
async fn conflict_logging_can_be_disabled() -> Result<(), MutateError> {
    let h = Harness::with_options(&[1], MutateOptions::new().log_conflict_keys(false));
    h.add_index(10, "likes_by_weight", vec![IndexField::new("weight", TypeTag::Int)]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    h.seed_edge(1, &e, 1, None);
    let processor = h.processor();

    h.store.pause_writes();
    let first = processor.process(req(vec![e.clone()]));
    let second = processor.delete_edges(req(vec![e])).await?;
    assert_eq!(second.code_for(P1), Some(ErrorCode::DataConflict));
    h.store.resume_writes();
    assert!(first.wait().await?.all_succeeded());
    Ok(())
}

#[test]
fn racing_requests_produce_exactly_one_winner() {
    let h = indexed(&[1]);
    let e = edge("AAAAAAAA", "BBBBBBBB", 0);
    h.seed_edge(1, &e, 1, None);
    let processor = Arc::new(h.processor());
    let barrier = Arc::new(Barrier::new(THREADS));

    h.store.pause_writes();
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let processor = Arc::clone(&processor);
            let barrier = Arc::clone(&barrier);
            let e = e.clone();
            thread::spawn(move || {
                barrier.wait();
                processor.process(req(vec![e]))
            })
        })
        .collect();
    let pending: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread"))
        .collect();

    assert_eq!(h.store.held_writes(), 1);
    h.store.resume_writes();
    let codes: Vec<ErrorCode> = pending
        .into_iter()
        .map(|p| {
            p.blocking_wait()
                .expect("response")
                .code_for(P1)
                .expect("partition result")
        })
        .collect();
    let winners = codes.iter().filter(|c| c.is_ok()).count();
    let conflicts = codes
        .iter()
        .filter(|c| **c == ErrorCode::DataConflict)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, THREADS - 1);
    assert!(h.env.edges_ml.is_empty());
    assert!(h.keys(1).is_empty());
}
