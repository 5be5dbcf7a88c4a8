//! Schema-aware edge row codec.
//!
//! ```text
//! [format u8][field count u16][field 0]...[field n-1]
//! field := [tag u8][payload]   tag 0 = null, otherwise a TypeTag code
//! ```
//!
//! Rows written under an older schema carry fewer fields than the current
//! schema; the missing trailing fields decode as absent.

use crate::types::{Result, ShardError};

use super::index::TypeTag;
use super::schema::EdgeSchema;
use super::types::PropValue;

const ROW_FORMAT_V1: u8 = 1;
const TAG_NULL: u8 = 0;

/// Decoded edge row: the stored fields in schema order.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeRow {
    values: Vec<(String, PropValue)>,
}

impl EdgeRow {
    /// Looks a field up by name. `None` means the row does not carry it.
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Number of fields stored in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when the row stores no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encodes `props` against `schema`. Fields not supplied are written as null.
pub fn encode(schema: &EdgeSchema, props: &[(&str, PropValue)]) -> Result<Vec<u8>> {
    let count = u16::try_from(schema.fields.len())
        .map_err(|_| ShardError::Invalid("edge schema has too many fields"))?;
    let mut buf = Vec::with_capacity(3 + schema.fields.len() * 9);
    buf.push(ROW_FORMAT_V1);
    buf.extend_from_slice(&count.to_be_bytes());
    for field in &schema.fields {
        let value = props
            .iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, value)| value)
            .unwrap_or(&PropValue::Null);
        match (value, field.ty) {
            (PropValue::Null, _) => buf.push(TAG_NULL),
            (PropValue::Bool(v), TypeTag::Bool) => {
                buf.push(TypeTag::Bool.code());
                buf.push(u8::from(*v));
            }
            (PropValue::Int(v), TypeTag::Int) => {
                buf.push(TypeTag::Int.code());
                buf.extend_from_slice(&v.to_be_bytes());
            }
            (PropValue::Float(v), TypeTag::Float) => {
                buf.push(TypeTag::Float.code());
                buf.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            (PropValue::Str(v), TypeTag::String) => {
                let len = u32::try_from(v.len())
                    .map_err(|_| ShardError::Invalid("edge string property too long"))?;
                buf.push(TypeTag::String.code());
                buf.extend_from_slice(&len.to_be_bytes());
                buf.extend_from_slice(v.as_bytes());
            }
            _ => return Err(ShardError::Invalid("edge property type does not match schema")),
        }
    }
    Ok(buf)
}

/// Decodes a stored edge row against the edge type's current schema.
pub fn decode(schema: &EdgeSchema, data: &[u8]) -> Result<EdgeRow> {
    if data.len() < 3 {
        return Err(ShardError::Corruption("edge row truncated"));
    }
    if data[0] != ROW_FORMAT_V1 {
        return Err(ShardError::Corruption("unknown edge row format"));
    }
    let count = usize::from(u16::from_be_bytes([data[1], data[2]]));
    if count > schema.fields.len() {
        return Err(ShardError::Corruption("edge row has more fields than its schema"));
    }
    let mut offset = 3usize;
    let mut values = Vec::with_capacity(count);
    for field in &schema.fields[..count] {
        let tag = *data
            .get(offset)
            .ok_or(ShardError::Corruption("edge row field tag missing"))?;
        offset += 1;
        let value = if tag == TAG_NULL {
            PropValue::Null
        } else {
            if TypeTag::from_code(tag) != Some(field.ty) {
                return Err(ShardError::Corruption("edge row field type mismatch"));
            }
            match field.ty {
                TypeTag::Bool => PropValue::Bool(take(data, &mut offset, 1)?[0] != 0),
                TypeTag::Int => PropValue::Int(i64::from_be_bytes(take_array(data, &mut offset)?)),
                TypeTag::Float => PropValue::Float(f64::from_bits(u64::from_be_bytes(
                    take_array(data, &mut offset)?,
                ))),
                TypeTag::String => {
                    let len = u32::from_be_bytes(take_array(data, &mut offset)?) as usize;
                    let body = take(data, &mut offset, len)?;
                    let s = std::str::from_utf8(body)
                        .map_err(|_| ShardError::Corruption("edge string property not UTF-8"))?;
                    PropValue::Str(s.to_string())
                }
            }
        };
        values.push((field.name.clone(), value));
    }
    if offset != data.len() {
        return Err(ShardError::Corruption("edge row has trailing bytes"));
    }
    Ok(EdgeRow { values })
}

fn take<'a>(data: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .ok_or(ShardError::Corruption("edge row length overflow"))?;
    let slice = data
        .get(*offset..end)
        .ok_or(ShardError::Corruption("edge row field truncated"))?;
    *offset = end;
    Ok(slice)
}

fn take_array<const N: usize>(data: &[u8], offset: &mut usize) -> Result<[u8; N]> {
    let mut arr = [0u8; N];
    arr.copy_from_slice(take(data, offset, N)?);
    Ok(arr)
}
