//! Binary key layout for edge records, index entries, lock placeholders and
//! the operation log consumed by index rebuilds.
//!
//! ```text
//! edge record : [EDGE][part][src][type][rank][dst][EDGE_VERSION]
//! lock        : [EDGE][part][src][type][rank][dst][LOCK][lock id ...]
//! stale       : [EDGE][part][src][type][rank][dst][EDGE_VERSION][version]
//! index entry : [INDEX][part][index id][values ...][src][rank][dst]
//! deferred op : [OPERATION][part][sequence][OP_DELETE]
//! ```
//!
//! Vertex ids occupy exactly `vid_len` bytes; every integer is big-endian with
//! the sign bit flipped, so the unsigned byte order of keys follows the numeric
//! order of their components. Scanning [`edge_prefix`] therefore yields lock
//! placeholders first, then the current record, then stale versions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::primitives::bytes::ord;
use crate::types::{EdgeRanking, EdgeType, IndexId, PartitionId};

/// Raw ordered key bytes.
pub type StorageKey = Vec<u8>;

/// Key type tag for edge records and their placeholders.
pub const KEY_TYPE_EDGE: u8 = 0x02;
/// Key type tag for secondary index entries.
pub const KEY_TYPE_INDEX: u8 = 0x03;
/// Key type tag for operation-log entries.
pub const KEY_TYPE_OPERATION: u8 = 0x04;

/// Placeholder byte marking a lock entry; sorts before the record.
pub const LOCK_PLACEHOLDER: u8 = 0x00;
/// Placeholder byte marking the versioned edge record.
pub const EDGE_VERSION_PLACEHOLDER: u8 = 0x01;
/// Operation-log suffix for a deferred index deletion.
pub const OP_DELETE: u8 = b'd';

const HEADER_LEN: usize = 1 + 4;
const EDGE_TYPE_LEN: usize = 4;
const RANK_LEN: usize = 8;
const SEQUENCE_LEN: usize = 8;

/// Classification of a raw key found under an edge prefix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyKind {
    /// Transient lock placeholder.
    Lock,
    /// The current versioned edge record.
    EdgeRecord,
    /// Anything else (stale versions, foreign keys).
    Other,
}

/// Decoded components of an edge-family key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedEdgeKey {
    /// Partition.
    pub part: PartitionId,
    /// Source vertex id.
    pub src: Vec<u8>,
    /// Edge type.
    pub edge_type: EdgeType,
    /// Edge rank.
    pub rank: EdgeRanking,
    /// Destination vertex id.
    pub dst: Vec<u8>,
    /// Role of the key under its edge prefix.
    pub kind: KeyKind,
}

/// Length of an edge prefix for the given vertex-id width.
pub const fn edge_prefix_len(vid_len: usize) -> usize {
    HEADER_LEN + vid_len * 2 + EDGE_TYPE_LEN + RANK_LEN
}

/// Length of a current edge record key for the given vertex-id width.
pub const fn edge_key_len(vid_len: usize) -> usize {
    edge_prefix_len(vid_len) + 1
}

/// Returns `true` only when both vertex ids are exactly `vid_len` bytes.
pub fn is_valid_vid_len(vid_len: usize, src: &[u8], dst: &[u8]) -> bool {
    src.len() == vid_len && dst.len() == vid_len
}

fn push_header(buf: &mut Vec<u8>, key_type: u8, part: PartitionId) {
    buf.push(key_type);
    ord::push_u32_be(buf, part.0);
}

/// Prefix shared by an edge's record, its lock placeholders and stale versions.
pub fn edge_prefix(
    vid_len: usize,
    part: PartitionId,
    src: &[u8],
    edge_type: EdgeType,
    rank: EdgeRanking,
    dst: &[u8],
) -> StorageKey {
    let mut buf = Vec::with_capacity(edge_key_len(vid_len) + SEQUENCE_LEN);
    push_header(&mut buf, KEY_TYPE_EDGE, part);
    ord::push_fixed(&mut buf, src, vid_len);
    ord::push_i32_be(&mut buf, edge_type.0);
    ord::push_i64_be(&mut buf, rank);
    ord::push_fixed(&mut buf, dst, vid_len);
    buf
}

/// Key of the current edge record.
pub fn edge_key(
    vid_len: usize,
    part: PartitionId,
    src: &[u8],
    edge_type: EdgeType,
    rank: EdgeRanking,
    dst: &[u8],
) -> StorageKey {
    let mut buf = edge_prefix(vid_len, part, src, edge_type, rank, dst);
    buf.push(EDGE_VERSION_PLACEHOLDER);
    buf
}

/// Key of a historical record version; sorts after the current record.
pub fn versioned_edge_key(
    vid_len: usize,
    part: PartitionId,
    src: &[u8],
    edge_type: EdgeType,
    rank: EdgeRanking,
    dst: &[u8],
    version: u64,
) -> StorageKey {
    let mut buf = edge_key(vid_len, part, src, edge_type, rank, dst);
    ord::push_u64_be(&mut buf, version);
    buf
}

/// Key of a lock placeholder; sorts before the record.
pub fn lock_key(
    vid_len: usize,
    part: PartitionId,
    src: &[u8],
    edge_type: EdgeType,
    rank: EdgeRanking,
    dst: &[u8],
    lock_id: &[u8],
) -> StorageKey {
    let mut buf = edge_prefix(vid_len, part, src, edge_type, rank, dst);
    buf.push(LOCK_PLACEHOLDER);
    buf.extend_from_slice(lock_id);
    buf
}

/// Classifies a key found under an edge prefix.
pub fn classify(vid_len: usize, key: &[u8]) -> KeyKind {
    let record_len = edge_key_len(vid_len);
    if key.len() < record_len || key[0] != KEY_TYPE_EDGE {
        return KeyKind::Other;
    }
    match key[record_len - 1] {
        LOCK_PLACEHOLDER => KeyKind::Lock,
        EDGE_VERSION_PLACEHOLDER if key.len() == record_len => KeyKind::EdgeRecord,
        _ => KeyKind::Other,
    }
}

/// Splits an edge-family key back into its components.
pub fn parse_edge_key(vid_len: usize, key: &[u8]) -> Option<ParsedEdgeKey> {
    if key.len() < edge_key_len(vid_len) || key[0] != KEY_TYPE_EDGE {
        return None;
    }
    let mut off = 1;
    let part = PartitionId(ord::get_u32_be(&key[off..])?);
    off += 4;
    let src = key[off..off + vid_len].to_vec();
    off += vid_len;
    let edge_type = EdgeType(ord::get_i32_be(&key[off..])?);
    off += EDGE_TYPE_LEN;
    let rank = ord::get_i64_be(&key[off..])?;
    off += RANK_LEN;
    let dst = key[off..off + vid_len].to_vec();
    Some(ParsedEdgeKey {
        part,
        src,
        edge_type,
        rank,
        dst,
        kind: classify(vid_len, key),
    })
}

/// Key of an edge index entry. `values` is the encoded indexed-field image.
pub fn edge_index_key(
    vid_len: usize,
    part: PartitionId,
    index_id: IndexId,
    src: &[u8],
    rank: EdgeRanking,
    dst: &[u8],
    values: &[u8],
) -> StorageKey {
    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + values.len() + vid_len * 2 + RANK_LEN);
    push_header(&mut buf, KEY_TYPE_INDEX, part);
    ord::push_u32_be(&mut buf, index_id.0);
    buf.extend_from_slice(values);
    ord::push_fixed(&mut buf, src, vid_len);
    ord::push_i64_be(&mut buf, rank);
    ord::push_fixed(&mut buf, dst, vid_len);
    buf
}

/// Prefix of every entry belonging to one index in one partition.
pub fn index_prefix(part: PartitionId, index_id: IndexId) -> StorageKey {
    let mut buf = Vec::with_capacity(HEADER_LEN + 4);
    push_header(&mut buf, KEY_TYPE_INDEX, part);
    ord::push_u32_be(&mut buf, index_id.0);
    buf
}

static OPERATION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Next operation-log sequence: wall-clock microseconds, strictly increasing
/// within the process.
fn next_operation_sequence() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    let mut prev = OPERATION_SEQUENCE.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev.saturating_add(1));
        match OPERATION_SEQUENCE.compare_exchange_weak(
            prev,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Operation-log key recording "delete this index key later". The value
/// stored under it is the index key itself.
pub fn deferred_deletion_key(part: PartitionId) -> StorageKey {
    deferred_deletion_key_at(part, next_operation_sequence())
}

/// [`deferred_deletion_key`] with an explicit sequence number.
pub fn deferred_deletion_key_at(part: PartitionId, sequence: u64) -> StorageKey {
    let mut buf = deferred_operation_prefix(part);
    ord::push_u64_be(&mut buf, sequence);
    buf.push(OP_DELETE);
    buf
}

/// Prefix of the operation log of one partition.
pub fn deferred_operation_prefix(part: PartitionId) -> StorageKey {
    let mut buf = Vec::with_capacity(HEADER_LEN + SEQUENCE_LEN + 1);
    push_header(&mut buf, KEY_TYPE_OPERATION, part);
    buf
}

/// Returns `true` for operation-log keys recording a deferred deletion.
pub fn is_deferred_deletion(key: &[u8]) -> bool {
    key.len() == HEADER_LEN + SEQUENCE_LEN + 1
        && key[0] == KEY_TYPE_OPERATION
        && key[key.len() - 1] == OP_DELETE
}
