use std::fmt;
use serde::{Deserialize, Serialize};
use crate::types::{ColumnId, DbError, DbResult};

const INT_SIZE: usize = size_of::<i32>();
const LENGTH_PREFIX_SIZE: usize = size_of::<u32>();

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Int,
    Varchar(u32), // VARCHAR(n), n payload bytes
}

impl FieldType {
    /// Number of bytes one value of this type occupies in a slot
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => INT_SIZE,
            FieldType::Varchar(n) => LENGTH_PREFIX_SIZE + *n as usize,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Varchar(n) => write!(f, "VARCHAR({n})"),
        }
    }
}

/// Column Definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    pub field_type: FieldType,
    pub name: Option<String>,
}

impl ColumnDef {
    pub fn new(field_type: FieldType, name: impl Into<String>) -> Self {
        Self { field_type, name: Some(name.into()) }
    }

    pub fn unnamed(field_type: FieldType) -> Self {
        Self { field_type, name: None }
    }
}

/// Ordered column layout shared by every row of a table.
///
/// Two schemas compare equal when they have the same number of columns and the
/// same type sequence; names are informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// Schema of anonymous columns
    pub fn from_types(types: &[FieldType]) -> Self {
        Self::new(types.iter().copied().map(ColumnDef::unnamed).collect())
    }

    pub fn named(columns: &[(FieldType, &str)]) -> Self {
        Self::new(columns.iter().map(|(t, n)| ColumnDef::new(*t, *n)).collect())
    }

    /// Concatenate two schemas, columns of `a` first
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let mut columns = Vec::with_capacity(a.len() + b.len());
        columns.extend_from_slice(&a.columns);
        columns.extend_from_slice(&b.columns);
        Schema { columns }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn field_type(&self, index: ColumnId) -> DbResult<FieldType> {
        self.columns.get(index)
            .map(|c| c.field_type)
            .ok_or_else(|| DbError::NoSuchElement(format!("column {} out of range", index)))
    }

    pub fn field_name(&self, index: ColumnId) -> DbResult<Option<&str>> {
        self.columns.get(index)
            .map(|c| c.name.as_deref())
            .ok_or_else(|| DbError::NoSuchElement(format!("column {} out of range", index)))
    }

    /// Index of the first column with the given name
    pub fn index_of(&self, name: &str) -> DbResult<ColumnId> {
        self.columns.iter()
            .position(|c| c.name.as_deref() == Some(name))
            .ok_or_else(|| DbError::NoSuchElement(format!("no column named '{}'", name)))
    }

    /// Fixed byte length of one serialized row
    pub fn row_size(&self) -> usize {
        self.columns.iter().map(|c| c.field_type.byte_len()).sum()
    }

    /// Copy of this schema with every column name prefixed by `alias.`
    pub fn with_alias(&self, alias: &str) -> Schema {
        let columns = self.columns.iter()
            .map(|c| ColumnDef {
                field_type: c.field_type,
                name: c.name.as_ref().map(|n| format!("{alias}.{n}")),
            })
            .collect();
        Schema { columns }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.columns.iter().zip(&other.columns).all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &col.name {
                Some(name) => write!(f, "{}({})", col.field_type, name)?,
                None => write!(f, "{}(column{})", col.field_type, i)?,
            }
        }
        Ok(())
    }
}

/*
Unit tests
*/
#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Schema {
        Schema::named(&[(FieldType::Int, "id"), (FieldType::Varchar(8), "name")])
    }

    #[test]
    fn test_row_size() {
        assert_eq!(users().row_size(), 4 + 4 + 8);
        assert_eq!(Schema::from_types(&[FieldType::Int; 3]).row_size(), 12);
    }

    #[test]
    fn test_equality_ignores_names() {
        let anonymous = Schema::from_types(&[FieldType::Int, FieldType::Varchar(8)]);
        assert_eq!(users(), anonymous);
        assert_ne!(users(), Schema::from_types(&[FieldType::Int, FieldType::Varchar(9)]));
        assert_ne!(users(), Schema::from_types(&[FieldType::Int]));
    }

    #[test]
    fn test_merge() {
        let merged = Schema::merge(&users(), &Schema::named(&[(FieldType::Int, "age")]));
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.field_type(2).unwrap(), FieldType::Int);
        assert_eq!(merged.field_name(2).unwrap(), Some("age"));
        assert_eq!(merged.index_of("name").unwrap(), 1);
    }

    #[test]
    fn test_lookup_errors() {
        let schema = users();
        assert!(matches!(schema.field_type(5), Err(DbError::NoSuchElement(_))));
        assert!(matches!(schema.index_of("missing"), Err(DbError::NoSuchElement(_))));
    }

    #[test]
    fn test_alias_and_display() {
        let aliased = users().with_alias("u");
        assert_eq!(aliased.field_name(0).unwrap(), Some("u.id"));
        assert_eq!(aliased.to_string(), "INT(u.id), VARCHAR(8)(u.name)");
        assert_eq!(Schema::from_types(&[FieldType::Int]).to_string(), "INT(column0)");
    }
}
