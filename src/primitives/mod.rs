//! Low-level primitives shared by the storage and mutation layers.

/// Order-preserving and variable-length integer encodings.
pub mod bytes;

/// In-process lock registry with RAII guards.
pub mod concurrency;
