use serde::{Deserialize, Serialize};

use crate::types::{EdgeType, IndexId};

/// Logical type of a stored or indexed property value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string; indexed at a fixed width.
    String,
}

impl TypeTag {
    pub(crate) fn code(self) -> u8 {
        match self {
            TypeTag::Bool => 1,
            TypeTag::Int => 2,
            TypeTag::Float => 3,
            TypeTag::String => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TypeTag::Bool),
            2 => Some(TypeTag::Int),
            3 => Some(TypeTag::Float),
            4 => Some(TypeTag::String),
            _ => None,
        }
    }
}

/// One indexed column of an edge index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexField {
    /// Property name inside the edge row.
    pub name: String,
    /// Declared property type.
    pub ty: TypeTag,
    /// Whether null values are admitted (tracked in the null bitmap).
    pub nullable: bool,
    /// Fixed key width for string columns. Strings are padded or truncated to it.
    pub type_len: Option<u16>,
}

impl IndexField {
    /// Non-nullable scalar column.
    pub fn new(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            type_len: None,
        }
    }

    /// Non-nullable fixed-width string column.
    pub fn fixed_string(name: impl Into<String>, type_len: u16) -> Self {
        Self {
            name: name.into(),
            ty: TypeTag::String,
            nullable: false,
            type_len: Some(type_len),
        }
    }

    /// Marks the column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Secondary index over the properties of one edge type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexDescriptor {
    /// Index id, unique within the space.
    pub index_id: IndexId,
    /// Edge type whose rows feed the index.
    pub edge_type: EdgeType,
    /// Indexed columns, in key order.
    pub fields: Vec<IndexField>,
    /// Human-readable index name.
    pub name: String,
}

/// Lifecycle of an index in one partition, as seen by writers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexLifecycleState {
    /// Writers maintain index entries directly.
    #[default]
    Normal,
    /// A rebuild is running; index removals go to the operation log.
    Rebuilding,
    /// The index must not be mutated.
    Locked,
}
