//! Write batches submitted to the key-value store as one atomic unit.
//!
//! ```text
//! [version u8][op count varint]
//! op := [tag u8][key len varint][key][value len varint][value]   tag 1 = put
//!     | [tag u8][key len varint][key]                            tag 2 = remove
//! ```

use crate::primitives::bytes::var;
use crate::types::{Result, ShardError};

use super::keys::StorageKey;

const BATCH_VERSION: u8 = 1;
const TAG_PUT: u8 = 1;
const TAG_REMOVE: u8 = 2;

/// One mutation inside a batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BatchOp {
    /// Writes a value.
    Put(StorageKey, Vec<u8>),
    /// Deletes a key.
    Remove(StorageKey),
}

impl BatchOp {
    /// Key touched by the operation.
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put(key, _) | BatchOp::Remove(key) => key,
        }
    }
}

/// Ordered accumulator of puts and removes.
#[derive(Clone, Debug, Default)]
pub struct BatchHolder {
    ops: Vec<BatchOp>,
}

impl BatchHolder {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a put.
    pub fn put(&mut self, key: StorageKey, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    /// Appends a removal.
    pub fn remove(&mut self, key: StorageKey) {
        self.ops.push(BatchOp::Remove(key));
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when no operation was added.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operations in insertion order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Serializes the batch into the store's wire payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            2 + self
                .ops
                .iter()
                .map(|op| match op {
                    BatchOp::Put(k, v) => k.len() + v.len() + 6,
                    BatchOp::Remove(k) => k.len() + 3,
                })
                .sum::<usize>(),
        );
        buf.push(BATCH_VERSION);
        var::encode_u64(self.ops.len() as u64, &mut buf);
        for op in &self.ops {
            match op {
                BatchOp::Put(key, value) => {
                    buf.push(TAG_PUT);
                    push_bytes(&mut buf, key);
                    push_bytes(&mut buf, value);
                }
                BatchOp::Remove(key) => {
                    buf.push(TAG_REMOVE);
                    push_bytes(&mut buf, key);
                }
            }
        }
        buf
    }
}

fn push_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    var::encode_u64(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

/// Parses a payload produced by [`BatchHolder::encode`].
pub fn decode_batch(data: &[u8]) -> Result<Vec<BatchOp>> {
    let (&version, _) = data
        .split_first()
        .ok_or(ShardError::Corruption("batch payload empty"))?;
    if version != BATCH_VERSION {
        return Err(ShardError::Corruption("unknown batch version"));
    }
    let mut off = 1usize;
    let count = var::decode_u64(data, &mut off).ok_or(ShardError::Corruption("batch count"))?;
    let mut ops = Vec::with_capacity(usize::try_from(count).unwrap_or(0).min(data.len()));
    for _ in 0..count {
        let tag = *data
            .get(off)
            .ok_or(ShardError::Corruption("batch op truncated"))?;
        off += 1;
        let key = take_bytes(data, &mut off)?;
        let op = match tag {
            TAG_PUT => BatchOp::Put(key, take_bytes(data, &mut off)?),
            TAG_REMOVE => BatchOp::Remove(key),
            _ => return Err(ShardError::Corruption("unknown batch op tag")),
        };
        ops.push(op);
    }
    if off != data.len() {
        return Err(ShardError::Corruption("batch payload has trailing bytes"));
    }
    Ok(ops)
}

fn take_bytes(data: &[u8], off: &mut usize) -> Result<Vec<u8>> {
    let len = var::decode_u64(data, off).ok_or(ShardError::Corruption("batch length"))?;
    let len = usize::try_from(len).map_err(|_| ShardError::Corruption("batch length"))?;
    let end = off
        .checked_add(len)
        .ok_or(ShardError::Corruption("batch length"))?;
    let bytes = data
        .get(*off..end)
        .ok_or(ShardError::Corruption("batch op truncated"))?;
    *off = end;
    Ok(bytes.to_vec())
}
