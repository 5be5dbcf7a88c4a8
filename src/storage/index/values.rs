//! Extraction of the indexed-column image of an edge row.
//!
//! Each column contributes a fixed-width, order-preserving image. Null columns
//! contribute zeros of the same width and set their bit in a trailing
//! big-endian `u16` bitmap, which is present only when the index has at least
//! one nullable column.

use thiserror::Error;

use crate::primitives::bytes::ord;
use crate::storage::row::EdgeRow;
use crate::storage::types::PropValue;

use super::types::{IndexField, TypeTag};

const MAX_NULLABLE_FIELDS: usize = 16;

/// Reasons an index image cannot be built for a row.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexValueError {
    /// The row has no such column.
    #[error("field '{0}' is not present in the row")]
    MissingField(String),
    /// A null value feeds a non-nullable column.
    #[error("field '{0}' is null but the index column is not nullable")]
    NullNotAllowed(String),
    /// The value type differs from the column type.
    #[error("field '{0}' does not match the index column type")]
    TypeMismatch(String),
    /// A string column was declared without a width.
    #[error("string field '{0}' has no fixed index length")]
    MissingStringLength(String),
    /// The null bitmap cannot cover every nullable column.
    #[error("index has more than {MAX_NULLABLE_FIELDS} nullable columns")]
    TooManyNullable,
}

/// Builds the encoded indexed-column image of `row` for `fields`.
pub fn collect_index_values(
    row: &EdgeRow,
    fields: &[IndexField],
) -> Result<Vec<u8>, IndexValueError> {
    let has_nullable = fields.iter().any(|f| f.nullable);
    if fields.iter().filter(|f| f.nullable).count() > MAX_NULLABLE_FIELDS {
        return Err(IndexValueError::TooManyNullable);
    }
    let mut buf = Vec::new();
    let mut null_bitmap = 0u16;
    let mut nullable_pos = 0usize;
    for field in fields {
        let value = row
            .get(&field.name)
            .ok_or_else(|| IndexValueError::MissingField(field.name.clone()))?;
        if value.is_null() {
            if !field.nullable {
                return Err(IndexValueError::NullNotAllowed(field.name.clone()));
            }
            null_bitmap |= 1 << (15 - nullable_pos);
        }
        encode_column(&mut buf, field, value)?;
        if field.nullable {
            nullable_pos += 1;
        }
    }
    if has_nullable {
        buf.extend_from_slice(&null_bitmap.to_be_bytes());
    }
    Ok(buf)
}

fn encode_column(
    buf: &mut Vec<u8>,
    field: &IndexField,
    value: &PropValue,
) -> Result<(), IndexValueError> {
    match (field.ty, value) {
        (TypeTag::Bool, PropValue::Bool(v)) => buf.push(u8::from(*v)),
        (TypeTag::Bool, PropValue::Null) => buf.push(0),
        (TypeTag::Int, PropValue::Int(v)) => ord::push_i64_be(buf, *v),
        (TypeTag::Int, PropValue::Null) => ord::push_i64_be(buf, 0),
        (TypeTag::Float, PropValue::Float(v)) if !v.is_nan() => ord::push_f64_be(buf, *v),
        (TypeTag::Float, PropValue::Null) => ord::push_f64_be(buf, 0.0),
        (TypeTag::String, PropValue::Str(_) | PropValue::Null) => {
            let width = field
                .type_len
                .ok_or_else(|| IndexValueError::MissingStringLength(field.name.clone()))?;
            let bytes: &[u8] = match value {
                PropValue::Str(s) => s.as_bytes(),
                _ => &[],
            };
            ord::push_fixed(buf, bytes, usize::from(width));
        }
        _ => return Err(IndexValueError::TypeMismatch(field.name.clone())),
    }
    Ok(())
}
