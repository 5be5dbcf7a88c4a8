//! Edge mutation path of a partitioned graph storage node.
//!
//! Deleting an edge removes its record, any lock placeholders and stale
//! versions left under its key range, and the secondary index entries derived
//! from it. Index entries of an index being rebuilt are deferred to the
//! partition's operation log instead. See [`mutate::DeleteEdgesProcessor`].

#![warn(missing_docs)]

pub mod mutate;
pub mod primitives;
pub mod storage;
pub mod types;
