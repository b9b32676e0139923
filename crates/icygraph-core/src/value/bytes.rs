//! Order-preserving storage byte forms, one per [`ValueKind`].
//!
//! These are the only bytes that ever enter a row or qualifier, so their
//! lexicographic order must agree with `Value::canonical_cmp`. Integers are
//! sign-biased big-endian; floats flip the sign bit (positive) or every bit
//! (negative) so that `total_cmp` order and byte order coincide. Text and
//! bytes are raw; fixed-width kinds reject any other length on decode.

use crate::value::{Value, ValueKind};
use thiserror::Error as ThisError;

///
/// ValueBytesError
/// (decode / corruption boundary)
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum ValueBytesError {
    #[error("invalid length {len} for {kind} payload (expected {expected})")]
    InvalidLength {
        kind: ValueKind,
        len: usize,
        expected: usize,
    },

    #[error("invalid bool payload: {byte:#04x}")]
    InvalidBool { byte: u8 },

    #[error("text payload is not valid utf-8")]
    InvalidUtf8,
}

/// Encode a value into its order-preserving storage form. Infallible: every
/// value of a kind has a byte form.
#[must_use]
pub fn to_ordered_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Bool(v) => vec![u8::from(*v)],
        Value::Int(v) => (v.cast_unsigned() ^ (1u64 << 63)).to_be_bytes().to_vec(),
        Value::Uint(v) => v.to_be_bytes().to_vec(),
        Value::Float(v) => {
            let bits = v.to_bits();
            let ordered = if bits & (1u64 << 63) == 0 {
                bits | (1u64 << 63)
            } else {
                !bits
            };
            ordered.to_be_bytes().to_vec()
        }
        Value::Text(v) => v.as_bytes().to_vec(),
        Value::Bytes(v) => v.clone(),
    }
}

/// Decode a storage form against the schema-declared kind.
pub fn from_ordered_bytes(kind: ValueKind, bytes: &[u8]) -> Result<Value, ValueBytesError> {
    match kind {
        ValueKind::Bool => match bytes {
            [0] => Ok(Value::Bool(false)),
            [1] => Ok(Value::Bool(true)),
            [byte] => Err(ValueBytesError::InvalidBool { byte: *byte }),
            _ => Err(invalid_length(kind, bytes.len(), 1)),
        },
        ValueKind::Int => {
            let raw = fixed8(kind, bytes)?;
            Ok(Value::Int((raw ^ (1u64 << 63)).cast_signed()))
        }
        ValueKind::Uint => Ok(Value::Uint(fixed8(kind, bytes)?)),
        ValueKind::Float => {
            let ordered = fixed8(kind, bytes)?;
            let bits = if ordered & (1u64 << 63) != 0 {
                ordered & !(1u64 << 63)
            } else {
                !ordered
            };
            Ok(Value::Float(f64::from_bits(bits)))
        }
        ValueKind::Text => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|_| ValueBytesError::InvalidUtf8),
        ValueKind::Bytes => Ok(Value::Bytes(bytes.to_vec())),
    }
}

fn fixed8(kind: ValueKind, bytes: &[u8]) -> Result<u64, ValueBytesError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| invalid_length(kind, bytes.len(), 8))?;
    Ok(u64::from_be_bytes(arr))
}

const fn invalid_length(kind: ValueKind, len: usize, expected: usize) -> ValueBytesError {
    ValueBytesError::InvalidLength {
        kind,
        len,
        expected,
    }
}

///
/// TESTS
///
