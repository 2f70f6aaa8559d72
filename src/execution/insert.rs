use std::sync::Arc;
use tracing::debug;
use crate::execution::operator::{OpIterator, ensure_closed, ensure_open};
use crate::storage::bufferpool::BufferPool;
use crate::storage::row::{Field, Row};
use crate::storage::schema::{FieldType, Schema};
use crate::storage::transaction::TransactionId;
use crate::types::{DbError, DbResult, TableId};

/// Inserts every row of its child into a table and reports how many it inserted.
/// Produces exactly one single-INT row, on the first `next`.
pub struct Insert {
    pool: Arc<BufferPool>,
    txn: TransactionId,
    table_id: TableId,
    child: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    done: bool,
    is_open: bool,
}

impl Insert {
    /// Fails with `SchemaMismatch` unless the child produces the table's column types
    pub fn new(
        pool: Arc<BufferPool>,
        txn: TransactionId,
        child: Box<dyn OpIterator>,
        table_id: TableId,
    ) -> DbResult<Self> {
        let table_schema = pool.catalog().get_schema(table_id)?;
        if child.schema().as_ref() != table_schema.as_ref() {
            return Err(DbError::SchemaMismatch(format!(
                "insert source [{}] does not match table [{}]", child.schema(), table_schema
            )));
        }

        Ok(Insert {
            pool,
            txn,
            table_id,
            child,
            schema: Arc::new(Schema::named(&[(FieldType::Int, "inserted")])),
            done: false,
            is_open: false,
        })
    }
}

impl OpIterator for Insert {
    fn open(&mut self) -> DbResult<()> {
        ensure_closed(self.is_open, "insert")?;
        self.child.open()?;
        self.is_open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Row>> {
        ensure_open(self.is_open, "insert")?;
        if self.done {
            return Ok(None);
        }

        let mut count: i32 = 0;
        while let Some(row) = self.child.next()? {
            self.pool.insert_row(self.txn, self.table_id, row)?;
            count = count.wrapping_add(1);
        }
        self.done = true;

        debug!(txn = %self.txn, table = self.table_id, count, "inserted rows");
        Ok(Some(Row::new(Arc::clone(&self.schema), vec![Field::Int(count)])?))
    }

    /// Rewinds the child only; rows are never inserted twice
    fn rewind(&mut self) -> DbResult<()> {
        ensure_open(self.is_open, "insert")?;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.is_open = false;
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
