#![forbid(unsafe_code)]
//! Secondary index descriptors, lifecycle state and column extraction.

mod state;
mod types;
mod values;

pub use state::{IndexStateOracle, IndexStateRegistry, InflightGuard, InflightRequests};
pub use types::{IndexDescriptor, IndexField, IndexLifecycleState, TypeTag};
pub use values::{collect_index_values, IndexValueError};
