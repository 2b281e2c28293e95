use std::fmt;

use super::error::{TupleError, TupleResult};
use super::field::Type;

/// One column of a tuple descriptor
#[derive(Debug, Clone)]
pub struct TdItem {
    pub field_type: Type,
    pub name: Option<String>,
}

impl TdItem {
    pub fn new(field_type: Type, name: Option<String>) -> Self {
        Self { field_type, name }
    }
}

/// Ordered description of the columns of a tuple.
///
/// Two descriptors are equal iff their type sequences are equal; column
/// names carry no weight in comparisons.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// Create a descriptor from explicit items
    pub fn new(items: Vec<TdItem>) -> Self {
        Self { items }
    }

    /// Create an unnamed descriptor from a type sequence
    pub fn of_types(types: &[Type]) -> Self {
        Self {
            items: types.iter().map(|&t| TdItem::new(t, None)).collect(),
        }
    }

    /// Number of columns
    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    /// Type of column `i`
    pub fn field_type(&self, i: usize) -> TupleResult<Type> {
        self.items
            .get(i)
            .map(|item| item.field_type)
            .ok_or(TupleError::FieldIndex(i, self.items.len()))
    }

    /// Name of column `i`, if it has one
    pub fn field_name(&self, i: usize) -> TupleResult<Option<&str>> {
        self.items
            .get(i)
            .map(|item| item.name.as_deref())
            .ok_or(TupleError::FieldIndex(i, self.items.len()))
    }

    /// Find the index of the column with the given name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
    }

    /// Total serialized width of one tuple, in bytes
    pub fn byte_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.len()).sum()
    }

    /// Concatenate two descriptors
    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        let mut items = a.items.clone();
        items.extend(b.items.iter().cloned());
        TupleDesc::new(items)
    }

    /// Copy of this descriptor with every column name prefixed by `alias.`
    pub fn with_alias(&self, alias: &str) -> TupleDesc {
        let items = self
            .items
            .iter()
            .map(|item| {
                let name = item
                    .name
                    .as_deref()
                    .map(|n| format!("{}.{}", alias, n))
                    .or_else(|| Some(format!("{}.null", alias)));
                TdItem::new(item.field_type, name)
            })
            .collect();
        TupleDesc::new(items)
    }

    pub fn items(&self) -> &[TdItem] {
        &self.items
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &TupleDesc) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self
            .items
            .iter()
            .map(|item| {
                format!(
                    "{}({})",
                    item.name.as_deref().unwrap_or("null"),
                    item.field_type
                )
            })
            .collect();
        write!(f, "{}", cols.join(", "))
    }
}
