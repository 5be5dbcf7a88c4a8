//! Schema and index metadata seams, plus an in-memory catalog implementing both.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::types::{EdgeType, IndexId, Result, ShardError, SpaceId};

use super::index::{IndexDescriptor, TypeTag};
use super::options::ShardConfig;
use super::row::{self, EdgeRow};

/// One column of an edge schema.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: TypeTag,
    /// Whether the column may hold null.
    pub nullable: bool,
}

impl FieldDef {
    /// Non-nullable column.
    pub fn new(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
        }
    }

    /// Marks the column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Ordered column list of an edge type.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EdgeSchema {
    /// Columns in row order.
    pub fields: Vec<FieldDef>,
}

impl EdgeSchema {
    /// Creates a schema from its columns.
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }
}

/// Space and edge-schema metadata consumed by the mutation path.
pub trait SchemaManager: Send + Sync {
    /// Configured vertex-id width of `space`.
    fn space_vid_len(&self, space: SpaceId) -> Result<usize>;

    /// Current schema of `edge_type` in `space`. Reverse edge types resolve to
    /// the schema of their forward type.
    fn edge_schema(&self, space: SpaceId, edge_type: EdgeType) -> Result<Arc<EdgeSchema>>;

    /// Decodes a stored edge row against the current schema.
    fn decode_edge_record(&self, space: SpaceId, edge_type: EdgeType, raw: &[u8]) -> Result<EdgeRow> {
        let schema = self.edge_schema(space, edge_type)?;
        row::decode(&schema, raw)
    }
}

/// Index metadata consumed by the mutation path.
pub trait IndexManager: Send + Sync {
    /// Every edge index defined in `space`.
    fn edge_indexes(&self, space: SpaceId) -> Result<Vec<Arc<IndexDescriptor>>>;
}

#[derive(Clone, Default)]
struct SpaceMeta {
    vid_len: usize,
    edges: FxHashMap<EdgeType, Arc<EdgeSchema>>,
    indexes: Vec<Arc<IndexDescriptor>>,
}

/// In-memory schema and index catalog.
#[derive(Default)]
pub struct MemCatalog {
    spaces: RwLock<FxHashMap<SpaceId, SpaceMeta>>,
}

impl MemCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from the `[[spaces]]` sections of a configuration file.
    pub fn from_config(config: &ShardConfig) -> Result<Self> {
        let catalog = Self::new();
        for space in &config.spaces {
            let space_id = SpaceId(space.id);
            catalog.add_space(space_id, space.vid_len);
            for edge in &space.edges {
                catalog.add_edge_schema(space_id, EdgeType(edge.edge_type), edge.to_schema())?;
            }
            for index in &space.indexes {
                catalog.add_edge_index(space_id, index.to_descriptor())?;
            }
        }
        Ok(catalog)
    }

    /// Registers (or resets) a space.
    pub fn add_space(&self, space: SpaceId, vid_len: usize) {
        debug!(space = space.0, vid_len, "catalog.add_space");
        self.spaces.write().insert(
            space,
            SpaceMeta {
                vid_len,
                ..SpaceMeta::default()
            },
        );
    }

    /// Removes a space and everything defined in it.
    pub fn drop_space(&self, space: SpaceId) -> bool {
        self.spaces.write().remove(&space).is_some()
    }

    /// Registers the schema of a forward edge type.
    pub fn add_edge_schema(
        &self,
        space: SpaceId,
        edge_type: EdgeType,
        schema: EdgeSchema,
    ) -> Result<()> {
        if edge_type.0 <= 0 {
            return Err(ShardError::Invalid("edge schemas are registered for forward types"));
        }
        let mut spaces = self.spaces.write();
        let meta = spaces.get_mut(&space).ok_or(ShardError::NotFound("space"))?;
        meta.edges.insert(edge_type, Arc::new(schema));
        Ok(())
    }

    /// Registers an edge index. Its edge type must already have a schema.
    pub fn add_edge_index(&self, space: SpaceId, index: IndexDescriptor) -> Result<()> {
        let mut spaces = self.spaces.write();
        let meta = spaces.get_mut(&space).ok_or(ShardError::NotFound("space"))?;
        if !meta.edges.contains_key(&index.edge_type) {
            return Err(ShardError::NotFound("edge schema"));
        }
        if meta.indexes.iter().any(|i| i.index_id == index.index_id) {
            return Err(ShardError::Invalid("index id already exists"));
        }
        meta.indexes.push(Arc::new(index));
        Ok(())
    }

    /// Drops an index; returns whether it existed.
    pub fn drop_edge_index(&self, space: SpaceId, index_id: IndexId) -> bool {
        let mut spaces = self.spaces.write();
        let Some(meta) = spaces.get_mut(&space) else {
            return false;
        };
        let before = meta.indexes.len();
        meta.indexes.retain(|i| i.index_id != index_id);
        before != meta.indexes.len()
    }
}

impl SchemaManager for MemCatalog {
    fn space_vid_len(&self, space: SpaceId) -> Result<usize> {
        let spaces = self.spaces.read();
        let meta = spaces.get(&space).ok_or(ShardError::NotFound("space"))?;
        if meta.vid_len == 0 {
            return Err(ShardError::Invalid("space vid length is zero"));
        }
        Ok(meta.vid_len)
    }

    fn edge_schema(&self, space: SpaceId, edge_type: EdgeType) -> Result<Arc<EdgeSchema>> {
        let forward = EdgeType(edge_type.0.checked_abs().unwrap_or(edge_type.0));
        let spaces = self.spaces.read();
        spaces
            .get(&space)
            .ok_or(ShardError::NotFound("space"))?
            .edges
            .get(&forward)
            .cloned()
            .ok_or(ShardError::NotFound("edge schema"))
    }
}

impl IndexManager for MemCatalog {
    fn edge_indexes(&self, space: SpaceId) -> Result<Vec<Arc<IndexDescriptor>>> {
        let spaces = self.spaces.read();
        let meta = spaces.get(&space).ok_or(ShardError::NotFound("space"))?;
        Ok(meta.indexes.clone())
    }
}
