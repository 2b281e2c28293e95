use std::fmt;

use super::desc::TupleDesc;
use super::error::{TupleError, TupleResult};
use super::field::Field;
use crate::storage::PageId;

/// Physical identifier of a tuple: the page it lives on plus its slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: i32,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: i32) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}

/// A row: fixed array of fields matching a descriptor, plus the record id
/// assigned once the tuple has been placed on a page.
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: TupleDesc,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Create a tuple, validating field count and types against the descriptor
    pub fn new(desc: TupleDesc, fields: Vec<Field>) -> TupleResult<Self> {
        if fields.len() != desc.num_fields() {
            return Err(TupleError::Serialization(format!(
                "expected {} fields, got {}",
                desc.num_fields(),
                fields.len()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            let expected = desc.field_type(i)?;
            if field.field_type() != expected {
                return Err(TupleError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: field.field_type().to_string(),
                });
            }
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn field(&self, i: usize) -> TupleResult<&Field> {
        self.fields
            .get(i)
            .ok_or(TupleError::FieldIndex(i, self.fields.len()))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Replace field `i`, keeping the descriptor's type
    pub fn set_field(&mut self, i: usize, field: Field) -> TupleResult<()> {
        let expected = self.desc.field_type(i)?;
        if field.field_type() != expected {
            return Err(TupleError::TypeMismatch {
                expected: expected.to_string(),
                actual: field.field_type().to_string(),
            });
        }
        self.fields[i] = field;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Append the fixed-width encoding of all fields to `out`
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> TupleResult<()> {
        for field in &self.fields {
            field.serialize_into(out)?;
        }
        Ok(())
    }

    /// Decode a tuple from a slice of exactly `desc.byte_size()` bytes
    pub fn from_bytes(desc: TupleDesc, bytes: &[u8]) -> TupleResult<Self> {
        if bytes.len() != desc.byte_size() {
            return Err(TupleError::Deserialization(format!(
                "expected {} bytes, got {}",
                desc.byte_size(),
                bytes.len()
            )));
        }
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for i in 0..desc.num_fields() {
            let ty = desc.field_type(i)?;
            fields.push(Field::read_from(ty, &bytes[offset..offset + ty.len()])?);
            offset += ty.len();
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }
}

/// Field-wise equality; record ids and column names are ignored
impl PartialEq for Tuple {
    fn eq(&self, other: &Tuple) -> bool {
        self.desc == other.desc && self.fields == other.fields
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self.fields.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", cols.join("\t"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::field::Type;

    fn int_tuple(values: &[i32]) -> Tuple {
        let desc = TupleDesc::of_types(&vec![Type::Int; values.len()]);
        let fields = values.iter().map(|&v| Field::Int(v)).collect();
        Tuple::new(desc, fields).unwrap()
    }

    #[test]
    fn test_new_validates_arity() {
        let desc = TupleDesc::of_types(&[Type::Int, Type::Int]);
        assert!(Tuple::new(desc, vec![Field::Int(1)]).is_err());
    }

    #[test]
    fn test_new_validates_types() {
        let desc = TupleDesc::of_types(&[Type::Int]);
        assert!(Tuple::new(desc, vec![Field::Text("x".to_string())]).is_err());
    }

    #[test]
    fn test_set_field() {
        let mut t = int_tuple(&[1, 2]);
        t.set_field(1, Field::Int(9)).unwrap();
        assert_eq!(t.field(1).unwrap(), &Field::Int(9));
        assert!(t.set_field(1, Field::Text("no".to_string())).is_err());
        assert!(t.set_field(5, Field::Int(0)).is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let desc = TupleDesc::of_types(&[Type::Int, Type::Text]);
        let t = Tuple::new(
            desc.clone(),
            vec![Field::Int(-7), Field::Text("abc".to_string())],
        )
        .unwrap();

        let mut buf = Vec::new();
        t.serialize_into(&mut buf).unwrap();
        assert_eq!(buf.len(), desc.byte_size());

        let back = Tuple::from_bytes(desc, &buf).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn test_equality_ignores_record_id() {
        let mut a = int_tuple(&[1]);
        let b = int_tuple(&[1]);
        a.set_record_id(Some(RecordId::new(PageId::new(1, 0), 3)));
        assert_eq!(a, b);
    }
}
