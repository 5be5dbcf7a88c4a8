#![forbid(unsafe_code)]
//! Identifiers and error types shared by every layer of the crate.

use std::fmt;

/// Graph space (namespace) identifier.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SpaceId(pub u32);
/// Partition (shard) identifier inside a space.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PartitionId(pub u32);
/// Edge type identifier. Negative values name the reverse direction.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EdgeType(pub i32);
/// Secondary index identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct IndexId(pub u32);

/// Rank distinguishing parallel edges between the same vertices.
pub type EdgeRanking = i64;

/// Errors raised by codecs and collaborators inside the storage layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardError {
    /// Stored bytes do not decode.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// A space, schema or partition is unknown.
    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Result alias over [`ShardError`].
pub type Result<T> = std::result::Result<T, ShardError>;

/// Edge key as supplied by the graph layer in a mutation request.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct EdgeKey {
    /// Source vertex id.
    pub src: Vec<u8>,
    /// Edge type.
    pub edge_type: EdgeType,
    /// Edge rank.
    pub ranking: EdgeRanking,
    /// Destination vertex id.
    pub dst: Vec<u8>,
}

impl EdgeKey {
    /// Creates an edge key from its parts.
    pub fn new(
        src: impl Into<Vec<u8>>,
        edge_type: EdgeType,
        ranking: EdgeRanking,
        dst: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            src: src.into(),
            edge_type,
            ranking,
            dst: dst.into(),
        }
    }
}

/// Fully qualified identity of one edge instance; the unit of in-process locking.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EdgeIdentity {
    /// Owning space.
    pub space: SpaceId,
    /// Owning partition.
    pub part: PartitionId,
    /// Source vertex id.
    pub src: Vec<u8>,
    /// Edge type.
    pub edge_type: EdgeType,
    /// Edge rank.
    pub rank: EdgeRanking,
    /// Destination vertex id.
    pub dst: Vec<u8>,
}

impl EdgeIdentity {
    /// Qualifies a request edge key with its space and partition.
    pub fn new(space: SpaceId, part: PartitionId, key: &EdgeKey) -> Self {
        Self {
            space,
            part,
            src: key.src.clone(),
            edge_type: key.edge_type,
            rank: key.ranking,
            dst: key.dst.clone(),
        }
    }
}

impl fmt::Display for EdgeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            self.space.0,
            self.part.0,
            self.src.escape_ascii(),
            self.edge_type.0,
            self.rank,
            self.dst.escape_ascii()
        )
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PartitionId {
    fn from(value: u32) -> Self {
        PartitionId(value)
    }
}

impl From<i32> for EdgeType {
    fn from(value: i32) -> Self {
        EdgeType(value)
    }
}
