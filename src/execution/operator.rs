use std::sync::Arc;
use crate::storage::row::Row;
use crate::storage::schema::Schema;
use crate::types::{DbError, DbResult};

/// Pull-based execution node.
///
/// An operator starts closed. `open` prepares it and opens its children, `next`
/// yields rows until `Ok(None)`, `rewind` restarts the output from the first row
/// and `close` releases the operator and its children. Calling `open` twice or
/// `next` on a closed operator is an `IteratorProtocol` error.
pub trait OpIterator: Send {
    fn open(&mut self) -> DbResult<()>;

    /// Next output row, `Ok(None)` at end of sequence
    fn next(&mut self) -> DbResult<Option<Row>>;

    fn rewind(&mut self) -> DbResult<()>;

    fn close(&mut self);

    /// Schema of the rows this operator produces
    fn schema(&self) -> &Arc<Schema>;
}

/// Drain an opened operator into a vector
pub fn collect_rows(op: &mut dyn OpIterator) -> DbResult<Vec<Row>> {
    let mut rows = Vec::new();
    while let Some(row) = op.next()? {
        rows.push(row);
    }
    Ok(rows)
}

pub(crate) fn ensure_open(is_open: bool, operator: &str) -> DbResult<()> {
    if is_open {
        Ok(())
    } else {
        Err(DbError::IteratorProtocol(format!("{operator} is not open")))
    }
}

pub(crate) fn ensure_closed(is_open: bool, operator: &str) -> DbResult<()> {
    if is_open {
        Err(DbError::IteratorProtocol(format!("{operator} opened twice")))
    } else {
        Ok(())
    }
}

/// Operator over an owned, materialized list of rows
pub struct RowIterator {
    schema: Arc<Schema>,
    rows: Vec<Row>,
    cursor: usize,
    is_open: bool,
}

impl RowIterator {
    pub fn new(schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        Self { schema, rows, cursor: 0, is_open: false }
    }
}

impl OpIterator for RowIterator {
    fn open(&mut self) -> DbResult<()> {
        ensure_closed(self.is_open, "row iterator")?;
        self.is_open = true;
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Row>> {
        ensure_open(self.is_open, "row iterator")?;
        let row = self.rows.get(self.cursor).cloned();
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    fn rewind(&mut self) -> DbResult<()> {
        ensure_open(self.is_open, "row iterator")?;
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.is_open = false;
        self.cursor = 0;
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
