use std::cmp::Ordering;
use std::fmt;

use super::error::{TupleError, TupleResult};

/// Maximum number of content bytes in a text field. The on-disk encoding
/// prefixes the content with a 4-byte length, so a text field occupies
/// `MAX_TEXT_LEN + 4` bytes regardless of the stored string.
pub const MAX_TEXT_LEN: usize = 128;

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Text,
}

impl Type {
    /// Fixed on-disk width of a field of this type, in bytes
    pub fn len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::Text => 4 + MAX_TEXT_LEN,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Text => write!(f, "string"),
        }
    }
}

/// Comparison operator applied between two fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    Like,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::NotEquals => "<>",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEq => ">=",
            Op::Like => "LIKE",
        };
        write!(f, "{}", s)
    }
}

/// A single typed column value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    /// Get the type of this field
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Text(_) => Type::Text,
        }
    }

    /// Append the fixed-width encoding of this field to `out`.
    ///
    /// Ints are big-endian two's complement; text is a 4-byte big-endian
    /// content length followed by exactly `MAX_TEXT_LEN` bytes, zero padded.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> TupleResult<()> {
        match self {
            Field::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::Text(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > MAX_TEXT_LEN {
                    return Err(TupleError::Serialization(format!(
                        "string length {} exceeds max length {}",
                        bytes.len(),
                        MAX_TEXT_LEN
                    )));
                }
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
                out.extend(std::iter::repeat(0u8).take(MAX_TEXT_LEN - bytes.len()));
            }
        }
        Ok(())
    }

    /// Decode one field of type `ty` from a slice of exactly `ty.len()` bytes
    pub fn read_from(ty: Type, bytes: &[u8]) -> TupleResult<Field> {
        if bytes.len() != ty.len() {
            return Err(TupleError::Deserialization(format!(
                "expected {} bytes for {}, got {}",
                ty.len(),
                ty,
                bytes.len()
            )));
        }
        match ty {
            Type::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Field::Int(i32::from_be_bytes(buf)))
            }
            Type::Text => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&bytes[..4]);
                let len = u32::from_be_bytes(buf) as usize;
                if len > MAX_TEXT_LEN {
                    return Err(TupleError::Deserialization(format!(
                        "string length {} exceeds max length {}",
                        len, MAX_TEXT_LEN
                    )));
                }
                let s = std::str::from_utf8(&bytes[4..4 + len])
                    .map_err(|e| TupleError::Deserialization(format!("invalid UTF-8: {}", e)))?;
                Ok(Field::Text(s.to_string()))
            }
        }
    }

    /// Evaluate `self op other`.
    ///
    /// LIKE on text is substring containment; on ints it degenerates to
    /// equality. Comparing fields of different types is an error.
    pub fn compare(&self, op: Op, other: &Field) -> TupleResult<bool> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Ok(match op {
                Op::Equals | Op::Like => a == b,
                Op::NotEquals => a != b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
            }),
            (Field::Text(a), Field::Text(b)) => Ok(match op {
                Op::Equals => a == b,
                Op::NotEquals => a != b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
                Op::Like => a.contains(b.as_str()),
            }),
            _ => Err(TupleError::TypeMismatch {
                expected: self.field_type().to_string(),
                actual: other.field_type().to_string(),
            }),
        }
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Field) -> Option<Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Some(a.cmp(b)),
            (Field::Text(a), Field::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Text(s) => write!(f, "{}", s),
        }
    }
}
