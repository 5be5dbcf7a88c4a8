//! Storage-side building blocks of the edge mutation path.
//!
//! Covers the binary key layout, the key-value store seam, write batches,
//! schema and index metadata, and the row codec used to recover indexed
//! column values from stored edges.

/// Binary key layout of edge records, index entries and the operation log.
pub mod keys;

/// Secondary index descriptors, lifecycle state and value extraction.
pub mod index;

mod batch;
mod kv;
mod metrics;
mod options;
mod row;
mod schema;
mod types;

/// Write batches.
pub use batch::{decode_batch, BatchHolder, BatchOp};

/// Key-value store seam and in-memory implementation.
pub use kv::{KvCallback, KvIter, KvStore, MemKvStore, StoreErrorCode};

/// Metrics.
pub use metrics::{default_metrics, CounterMetrics, MutateMetrics, NoopMetrics};

/// Configuration.
pub use options::{
    ConfigError, EdgeConfig, FieldConfig, IndexConfig, MutateConfig, MutateOptions, ShardConfig,
    SpaceConfig,
};

pub use row::{decode as decode_row, encode as encode_row, EdgeRow};
pub use schema::{EdgeSchema, FieldDef, IndexManager, MemCatalog, SchemaManager};
pub use types::PropValue;
