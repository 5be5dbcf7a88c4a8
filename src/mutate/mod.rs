#![forbid(unsafe_code)]
//! Mutation processors of a storage node.
//!
//! A processor validates a request against space metadata, turns each
//! partition's part of it into one atomic store write, and reports one result
//! code per partition once every write has completed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::primitives::concurrency::MemoryLock;
use crate::storage::index::{IndexStateOracle, InflightRequests};
use crate::storage::{
    default_metrics, IndexManager, KvStore, MutateMetrics, MutateOptions, SchemaManager,
    StoreErrorCode,
};
use crate::types::{EdgeIdentity, EdgeKey, EdgeType, IndexId, PartitionId, ShardError, SpaceId};

mod delete_edges;
mod response;

pub use delete_edges::DeleteEdgesProcessor;
pub use response::PendingResponse;

/// Per-partition result code returned to callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorCode {
    /// The partition's write was applied.
    Succeeded,
    /// A vertex id in the request does not have the space's vid length.
    InvalidVertexIdLength,
    /// The space's vid length could not be resolved.
    InvalidSpaceVidLen,
    /// The space or its index set could not be resolved.
    SpaceOrSchemaNotFound,
    /// A stored edge row could not be decoded.
    InvalidRecordFormat,
    /// An index is locked, or another in-flight request holds one of the edges.
    DataConflict,
    /// Failure reported by the key-value store.
    Store(StoreErrorCode),
}

impl ErrorCode {
    /// True for [`ErrorCode::Succeeded`].
    pub fn is_ok(self) -> bool {
        self == ErrorCode::Succeeded
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Succeeded => f.write_str("succeeded"),
            ErrorCode::InvalidVertexIdLength => f.write_str("invalid vertex id length"),
            ErrorCode::InvalidSpaceVidLen => f.write_str("invalid space vid length"),
            ErrorCode::SpaceOrSchemaNotFound => f.write_str("space or schema not found"),
            ErrorCode::InvalidRecordFormat => f.write_str("invalid record format"),
            ErrorCode::DataConflict => f.write_str("data conflict"),
            ErrorCode::Store(code) => write!(f, "store error: {code}"),
        }
    }
}

/// Failures of a mutation processor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutateError {
    /// The space's vid length lookup failed.
    #[error("vid length of space {space} unavailable: {source}")]
    SpaceVidLen {
        /// Requested space.
        space: SpaceId,
        /// Catalog failure.
        source: ShardError,
    },
    /// The space's index list lookup failed.
    #[error("indexes of space {space} unavailable: {source}")]
    IndexesUnavailable {
        /// Requested space.
        space: SpaceId,
        /// Catalog failure.
        source: ShardError,
    },
    /// An edge endpoint has the wrong width.
    #[error("vertex id length mismatch: expected {vid_len}, got src {src_len} and dst {dst_len}")]
    InvalidVid {
        /// Width required by the space.
        vid_len: usize,
        /// Width of the source id.
        src_len: usize,
        /// Width of the destination id.
        dst_len: usize,
    },
    /// A stored edge row failed to decode.
    #[error("edge row of type {edge_type} is malformed: {source}")]
    InvalidRecord {
        /// Type of the malformed edge.
        edge_type: EdgeType,
        /// Decode failure.
        source: ShardError,
    },
    /// An applicable index is locked in the partition.
    #[error("index '{name}' ({index_id}) is locked")]
    IndexLocked {
        /// Locked index.
        index_id: IndexId,
        /// Its name.
        name: String,
    },
    /// Another in-flight request holds this edge.
    #[error("edge {0} is held by another request")]
    Conflict(EdgeIdentity),
    /// The store failed the scan or write.
    #[error("store rejected the write: {0}")]
    Store(StoreErrorCode),
    /// The collector went away without resolving.
    #[error("response dropped before every partition reported")]
    ResponseDropped,
}

impl MutateError {
    /// Wire code reported for a partition failing with this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MutateError::SpaceVidLen { .. } => ErrorCode::InvalidSpaceVidLen,
            MutateError::IndexesUnavailable { .. } => ErrorCode::SpaceOrSchemaNotFound,
            MutateError::InvalidVid { .. } => ErrorCode::InvalidVertexIdLength,
            MutateError::InvalidRecord { .. } => ErrorCode::InvalidRecordFormat,
            MutateError::IndexLocked { .. } | MutateError::Conflict(_) => ErrorCode::DataConflict,
            MutateError::Store(code) => ErrorCode::Store(*code),
            MutateError::ResponseDropped => ErrorCode::Store(StoreErrorCode::Unknown),
        }
    }
}

/// Edges to delete, grouped by partition.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeleteEdgesRequest {
    /// Target space.
    pub space: SpaceId,
    /// Edges to delete, keyed by partition.
    pub parts: BTreeMap<PartitionId, Vec<EdgeKey>>,
}

impl DeleteEdgesRequest {
    /// Empty request against `space`.
    pub fn new(space: SpaceId) -> Self {
        Self {
            space,
            parts: BTreeMap::new(),
        }
    }

    /// Adds edges to a partition, appending to any already present.
    pub fn add_part(mut self, part: PartitionId, edges: Vec<EdgeKey>) -> Self {
        self.parts.entry(part).or_default().extend(edges);
        self
    }
}

/// Outcome of one partition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PartResult {
    /// Partition reported on.
    pub part: PartitionId,
    /// Outcome of the partition.
    pub code: ErrorCode,
}

/// One result per requested partition, ordered by partition id.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeleteEdgesResponse {
    /// Per-partition outcomes.
    pub results: Vec<PartResult>,
    /// Time from request receipt to the last partition report.
    pub latency_us: u64,
}

impl DeleteEdgesResponse {
    /// Result code of `part`, if it was part of the request.
    pub fn code_for(&self, part: PartitionId) -> Option<ErrorCode> {
        self.results
            .iter()
            .find(|r| r.part == part)
            .map(|r| r.code)
    }

    /// Partitions that did not succeed.
    pub fn failed_parts(&self) -> impl Iterator<Item = &PartResult> {
        self.results.iter().filter(|r| !r.code.is_ok())
    }

    /// True when no partition failed.
    pub fn all_succeeded(&self) -> bool {
        self.failed_parts().next().is_none()
    }
}

/// Collaborators shared by every processor of a storage node.
#[derive(Clone)]
pub struct StorageEnv {
    /// Partitioned key-value store.
    pub kvstore: Arc<dyn KvStore>,
    /// Space and edge schema metadata.
    pub schema_man: Arc<dyn SchemaManager>,
    /// Edge index metadata.
    pub index_man: Arc<dyn IndexManager>,
    /// Per-partition index lifecycle.
    pub index_state: Arc<dyn IndexStateOracle>,
    /// In-process edge locks held by index-aware mutations.
    pub edges_ml: Arc<MemoryLock<EdgeIdentity>>,
    /// Index-aware mutations submitted but not yet completed.
    pub inflight: Arc<InflightRequests>,
    /// Counter sink.
    pub metrics: Arc<dyn MutateMetrics>,
    /// Runtime options.
    pub options: MutateOptions,
}

impl StorageEnv {
    /// Creates an environment with fresh lock and in-flight registries and default options.
    pub fn new(
        kvstore: Arc<dyn KvStore>,
        schema_man: Arc<dyn SchemaManager>,
        index_man: Arc<dyn IndexManager>,
        index_state: Arc<dyn IndexStateOracle>,
    ) -> Self {
        Self {
            kvstore,
            schema_man,
            index_man,
            index_state,
            edges_ml: Arc::new(MemoryLock::new()),
            inflight: Arc::new(InflightRequests::new()),
            metrics: default_metrics(),
            options: MutateOptions::default(),
        }
    }

    /// Applies options; a configured metrics sink replaces the current one.
    pub fn with_options(mut self, options: MutateOptions) -> Self {
        if let Some(metrics) = options.metrics.clone() {
            self.metrics = metrics;
        }
        self.options = options;
        self
    }
}
