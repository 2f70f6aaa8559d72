use std::sync::Arc;
use crate::execution::operator::{OpIterator, RowIterator, ensure_closed, ensure_open};
use crate::execution::predicate::Predicate;
use crate::storage::row::Row;
use crate::storage::schema::Schema;
use crate::types::DbResult;

/// Relational select.
///
/// Matching rows are materialized when the filter opens, so later changes to the
/// underlying table are not observed until `rewind` rescans the child.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    matches: RowIterator,
    is_open: bool,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        let matches = RowIterator::new(Arc::clone(child.schema()), Vec::new());
        Self { predicate, child, matches, is_open: false }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    // drain the child into a fresh buffer of matching rows
    fn snapshot(&mut self) -> DbResult<()> {
        let mut rows = Vec::new();
        while let Some(row) = self.child.next()? {
            if self.predicate.filter(&row)? {
                rows.push(row);
            }
        }

        self.matches = RowIterator::new(Arc::clone(self.child.schema()), rows);
        self.matches.open()
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> DbResult<()> {
        ensure_closed(self.is_open, "filter")?;
        self.child.open()?;
        if let Err(e) = self.snapshot() {
            self.child.close();
            return Err(e);
        }
        self.is_open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Row>> {
        ensure_open(self.is_open, "filter")?;
        self.matches.next()
    }

    fn rewind(&mut self) -> DbResult<()> {
        ensure_open(self.is_open, "filter")?;
        self.child.rewind()?;
        self.snapshot()
    }

    fn close(&mut self) {
        self.matches.close();
        self.child.close();
        self.is_open = false;
    }

    fn schema(&self) -> &Arc<Schema> {
        self.child.schema()
    }
}
