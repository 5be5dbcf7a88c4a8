use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EdgeType, IndexId};

use super::index::{IndexDescriptor, IndexField, TypeTag};
use super::metrics::MutateMetrics;
use super::schema::{EdgeSchema, FieldDef};

/// Runtime options for the mutation processors.
#[derive(Clone)]
pub struct MutateOptions {
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn MutateMetrics>>,
    /// Whether a lock conflict logs the contended edge identity.
    pub log_conflict_keys: bool,
}

impl Default for MutateOptions {
    fn default() -> Self {
        Self {
            metrics: None,
            log_conflict_keys: true,
        }
    }
}

impl MutateOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the `[mutate]` section of a configuration file.
    pub fn from_config(config: &MutateConfig) -> Self {
        Self::default().log_conflict_keys(config.log_conflict_keys)
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn MutateMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables or disables logging of contended edge identities.
    pub fn log_conflict_keys(mut self, enabled: bool) -> Self {
        self.log_conflict_keys = enabled;
        self
    }
}

/// Parsed shard configuration file.
///
/// ```toml
/// [mutate]
/// log_conflict_keys = false
///
/// [[spaces]]
/// id = 1
/// vid_len = 8
///
/// [[spaces.edges]]
/// edge_type = 3
/// fields = [{ name = "weight", type = "int" }]
///
/// [[spaces.indexes]]
/// id = 10
/// name = "by_weight"
/// edge_type = 3
/// fields = [{ name = "weight", type = "int" }]
/// ```
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ShardConfig {
    /// Mutation processor settings.
    #[serde(default)]
    pub mutate: MutateConfig,
    /// Spaces hosted by the node.
    #[serde(default)]
    pub spaces: Vec<SpaceConfig>,
}

/// `[mutate]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MutateConfig {
    /// Log the conflicting edge on lock conflicts.
    pub log_conflict_keys: bool,
}

impl Default for MutateConfig {
    fn default() -> Self {
        Self {
            log_conflict_keys: true,
        }
    }
}

/// One `[[spaces]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpaceConfig {
    /// Space id.
    pub id: u32,
    /// Fixed vertex-id width.
    pub vid_len: usize,
    /// Edge schemas.
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
    /// Edge indexes.
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

/// Edge schema declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EdgeConfig {
    /// Forward edge type.
    pub edge_type: i32,
    /// Columns in row order.
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// Edge index declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Index id.
    pub id: u32,
    /// Index name.
    pub name: String,
    /// Indexed edge type.
    pub edge_type: i32,
    /// Indexed columns in key order.
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// Column declaration shared by schemas and indexes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldConfig {
    /// Column name.
    pub name: String,
    /// Column type.
    #[serde(rename = "type")]
    pub ty: TypeTag,
    /// Whether the column may hold null.
    #[serde(default)]
    pub nullable: bool,
    /// Fixed index width of a string column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u16>,
}

impl EdgeConfig {
    pub(crate) fn to_schema(&self) -> EdgeSchema {
        EdgeSchema::new(
            self.fields
                .iter()
                .map(|f| FieldDef {
                    name: f.name.clone(),
                    ty: f.ty,
                    nullable: f.nullable,
                })
                .collect(),
        )
    }
}

impl IndexConfig {
    pub(crate) fn to_descriptor(&self) -> IndexDescriptor {
        IndexDescriptor {
            index_id: IndexId(self.id),
            edge_type: EdgeType(self.edge_type),
            name: self.name.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| IndexField {
                    name: f.name.clone(),
                    ty: f.ty,
                    nullable: f.nullable,
                    type_len: f.len,
                })
                .collect(),
        }
    }
}

impl ShardConfig {
    /// Reads and parses a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses configuration text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }
}

/// Failures loading a [`ShardConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read shard config {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },
    /// The file is not a valid shard config.
    #[error("failed to parse shard config {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying failure.
        source: toml::de::Error,
    },
}
