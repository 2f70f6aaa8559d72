use std::fmt;
use crate::storage::row::{CompareOp, Field, Row};
use crate::types::{ColumnId, DbResult};

/// Compares one field of a row against a constant operand
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    field: ColumnId,
    op: CompareOp,
    operand: Field,
}

impl Predicate {
    pub fn new(field: ColumnId, op: CompareOp, operand: impl Into<Field>) -> Self {
        Self { field, op, operand: operand.into() }
    }

    pub fn field(&self) -> ColumnId {
        self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Whether `row` satisfies `row[field] op operand`
    pub fn filter(&self, row: &Row) -> DbResult<bool> {
        Ok(row.get_field(self.field)?.compare(self.op, &self.operand))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {} {} {}", self.field, self.op, self.operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::storage::schema::{FieldType, Schema};
    use crate::types::DbError;

    fn row(id: i32, name: &str) -> Row {
        let schema = Arc::new(Schema::from_types(&[FieldType::Int, FieldType::Varchar(8)]));
        Row::new(schema, vec![Field::Int(id), Field::from(name)]).unwrap()
    }

    #[test]
    fn test_int_comparisons() {
        let r = row(5, "abc");
        assert!(Predicate::new(0, CompareOp::Equals, 5).filter(&r).unwrap());
        assert!(Predicate::new(0, CompareOp::GreaterThan, 4).filter(&r).unwrap());
        assert!(!Predicate::new(0, CompareOp::LessThan, 5).filter(&r).unwrap());
        assert!(Predicate::new(0, CompareOp::LessThanOrEq, 5).filter(&r).unwrap());
        assert!(Predicate::new(0, CompareOp::Like, 5).filter(&r).unwrap());
    }

    #[test]
    fn test_text_like_and_mismatched_kinds() {
        let r = row(1, "hello");
        assert!(Predicate::new(1, CompareOp::Like, "ell").filter(&r).unwrap());
        assert!(!Predicate::new(1, CompareOp::Equals, 1).filter(&r).unwrap());
        assert!(matches!(
            Predicate::new(7, CompareOp::Equals, 1).filter(&r),
            Err(DbError::NoSuchElement(_))
        ));
    }
}
