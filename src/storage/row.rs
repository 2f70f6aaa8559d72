use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use crate::storage::schema::{FieldType, Schema};
use crate::types::{ColumnId, DbError, DbResult, RecordId};

/// Comparison operators usable in row predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    Like,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEq => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEq => "<=",
            CompareOp::Like => "LIKE",
        };
        write!(f, "{s}")
    }
}

/// A typed field value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    pub fn matches_type(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (Field::Int(_), FieldType::Int) | (Field::Text(_), FieldType::Varchar(_))
        )
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Text(_) => None,
        }
    }

    /// Evaluate `self op operand`; fields of different kinds never match
    pub fn compare(&self, op: CompareOp, operand: &Field) -> bool {
        let ordering = match (self, operand) {
            (Field::Int(a), Field::Int(b)) => a.cmp(b),
            (Field::Text(a), Field::Text(b)) => {
                if op == CompareOp::Like {
                    return a.contains(b.as_str());
                }
                a.cmp(b)
            }
            _ => return false,
        };

        match op {
            CompareOp::Equals | CompareOp::Like => ordering == Ordering::Equal,
            CompareOp::NotEquals => ordering != Ordering::Equal,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            CompareOp::GreaterThanOrEq => ordering != Ordering::Less,
            CompareOp::LessThan => ordering == Ordering::Less,
            CompareOp::LessThanOrEq => ordering != Ordering::Greater,
        }
    }

    /// Append the fixed-width encoding of this value to `buf`.
    /// INT: 4 bytes little-endian.
    /// VARCHAR(n): 4 byte little-endian length, then n bytes zero padded.
    pub fn serialize_into(&self, field_type: FieldType, buf: &mut Vec<u8>) -> DbResult<()> {
        match (self, field_type) {
            (Field::Int(v), FieldType::Int) => {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            (Field::Text(s), FieldType::Varchar(max)) => {
                let max = max as usize;
                let mut end = s.len().min(max);
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                buf.extend_from_slice(&(end as u32).to_le_bytes());
                buf.extend_from_slice(&s.as_bytes()[..end]);
                buf.resize(buf.len() + (max - end), 0);
            }
            _ => {
                return Err(DbError::SchemaMismatch(
                    format!("value {} does not fit column type {}", self, field_type)
                ));
            }
        }
        Ok(())
    }

    /// Decode one value of `field_type` from the front of `buf`
    pub fn deserialize(buf: &[u8], field_type: FieldType) -> DbResult<Field> {
        if buf.len() < field_type.byte_len() {
            return Err(DbError::Corrupted(format!("unexpected end while reading {}", field_type)));
        }

        match field_type {
            FieldType::Int => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&buf[..4]);
                Ok(Field::Int(i32::from_le_bytes(raw)))
            }
            FieldType::Varchar(max) => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&buf[..4]);
                let length = u32::from_le_bytes(raw) as usize;
                if length > max as usize {
                    return Err(DbError::Corrupted(
                        format!("text length {} exceeds VARCHAR({})", length, max)
                    ));
                }
                let text = String::from_utf8_lossy(&buf[4..4 + length]).into_owned();
                Ok(Field::Text(text))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{v}"),
            Field::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Text(s.to_string())
    }
}

/// A fixed-arity row of typed values plus its storage location once persisted
#[derive(Debug, Clone)]
pub struct Row {
    schema: Arc<Schema>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Row {
    /// Build a row, checking every value against the schema column at the same position
    pub fn new(schema: Arc<Schema>, fields: Vec<Field>) -> DbResult<Self> {
        if fields.len() != schema.len() {
            return Err(DbError::SchemaMismatch(
                format!("row has {} fields, schema has {}", fields.len(), schema.len())
            ));
        }
        for (i, field) in fields.iter().enumerate() {
            let expected = schema.field_type(i)?;
            if !field.matches_type(expected) {
                return Err(DbError::SchemaMismatch(
                    format!("field {} value {} is not of type {}", i, field, expected)
                ));
            }
        }
        Ok(Self { schema, fields, record_id: None })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get_field(&self, index: ColumnId) -> DbResult<&Field> {
        self.fields.get(index)
            .ok_or_else(|| DbError::NoSuchElement(format!("field {} out of range", index)))
    }

    pub fn set_field(&mut self, index: ColumnId, value: Field) -> DbResult<()> {
        let expected = self.schema.field_type(index)?;
        if !value.matches_type(expected) {
            return Err(DbError::SchemaMismatch(
                format!("field {} value {} is not of type {}", index, value, expected)
            ));
        }
        self.fields[index] = value;
        Ok(())
    }

    #[inline]
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    #[inline]
    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    // convert row to raw slot bytes
    pub fn serialize(&self) -> DbResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.schema.row_size());
        for (i, field) in self.fields.iter().enumerate() {
            field.serialize_into(self.schema.field_type(i)?, &mut buf)?;
        }
        Ok(buf)
    }

    // deserialize row with given schema
    pub fn deserialize(buf: &[u8], schema: &Arc<Schema>) -> DbResult<Self> {
        let mut offset = 0;
        let mut fields = Vec::with_capacity(schema.len());

        for col in schema.columns() {
            fields.push(Field::deserialize(&buf[offset.min(buf.len())..], col.field_type)?);
            offset += col.field_type.byte_len();
        }

        Ok(Row { schema: Arc::clone(schema), fields, record_id: None })
    }
}

/// Rows compare by value; the storage location is ignored
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Row {}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.fields.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", values.join("\t"))
    }
}

/*
Unit tests
*/
#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::named(&[(FieldType::Int, "id"), (FieldType::Varchar(5), "name")]))
    }

    #[test]
    fn test_new_row_type_checked() {
        assert!(Row::new(schema(), vec![Field::Int(1), "bob".into()]).is_ok());
        assert!(matches!(
            Row::new(schema(), vec!["bob".into(), Field::Int(1)]),
            Err(DbError::SchemaMismatch(_))
        ));
        assert!(matches!(
            Row::new(schema(), vec![Field::Int(1)]),
            Err(DbError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_serialized_layout() {
        let row = Row::new(schema(), vec![Field::Int(258), "ab".into()]).unwrap();
        let bytes = row.serialize().unwrap();
        assert_eq!(bytes.len(), schema().row_size());
        assert_eq!(&bytes[..4], &[2, 1, 0, 0]);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[8..], &[b'a', b'b', 0, 0, 0]);

        let decoded = Row::deserialize(&bytes, &schema()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn test_long_text_truncated() {
        let row = Row::new(schema(), vec![Field::Int(1), "abcdefgh".into()]).unwrap();
        let decoded = Row::deserialize(&row.serialize().unwrap(), &schema()).unwrap();
        assert_eq!(decoded.get_field(1).unwrap(), &Field::Text("abcde".to_string()));
    }

    #[test]
    fn test_set_field_checks_type() {
        let mut row = Row::new(schema(), vec![Field::Int(1), "a".into()]).unwrap();
        assert!(row.set_field(0, Field::Int(7)).is_ok());
        assert_eq!(row.get_field(0).unwrap(), &Field::Int(7));
        assert!(row.set_field(0, "x".into()).is_err());
        assert!(matches!(row.get_field(9), Err(DbError::NoSuchElement(_))));
    }

    #[test]
    fn test_compare() {
        assert!(Field::Int(5).compare(CompareOp::Equals, &Field::Int(5)));
        assert!(Field::Int(6).compare(CompareOp::GreaterThan, &Field::Int(5)));
        assert!(Field::Int(5).compare(CompareOp::LessThanOrEq, &Field::Int(5)));
        assert!(!Field::Int(5).compare(CompareOp::NotEquals, &Field::Int(5)));
        assert!(Field::from("hello").compare(CompareOp::Like, &Field::from("ell")));
        assert!(!Field::Int(5).compare(CompareOp::Equals, &Field::from("5")));
    }
}
