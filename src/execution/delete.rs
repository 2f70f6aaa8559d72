use std::sync::Arc;
use tracing::debug;
use crate::execution::operator::{OpIterator, ensure_closed, ensure_open};
use crate::storage::bufferpool::BufferPool;
use crate::storage::row::{Field, Row};
use crate::storage::schema::{FieldType, Schema};
use crate::storage::transaction::TransactionId;
use crate::types::DbResult;

/// Deletes every row its child produces from the table that stores it.
/// Child rows must carry their record id, as rows from a `SeqScan` do.
pub struct Delete {
    pool: Arc<BufferPool>,
    txn: TransactionId,
    child: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    done: bool,
    is_open: bool,
}

impl Delete {
    pub fn new(pool: Arc<BufferPool>, txn: TransactionId, child: Box<dyn OpIterator>) -> Self {
        Delete {
            pool,
            txn,
            child,
            schema: Arc::new(Schema::named(&[(FieldType::Int, "deleted")])),
            done: false,
            is_open: false,
        }
    }
}

impl OpIterator for Delete {
    fn open(&mut self) -> DbResult<()> {
        ensure_closed(self.is_open, "delete")?;
        self.child.open()?;
        self.is_open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Row>> {
        ensure_open(self.is_open, "delete")?;
        if self.done {
            return Ok(None);
        }

        let mut count: i32 = 0;
        while let Some(row) = self.child.next()? {
            self.pool.delete_row(self.txn, &row)?;
            count = count.wrapping_add(1);
        }
        self.done = true;

        debug!(txn = %self.txn, count, "deleted rows");
        Ok(Some(Row::new(Arc::clone(&self.schema), vec![Field::Int(count)])?))
    }

    fn rewind(&mut self) -> DbResult<()> {
        ensure_open(self.is_open, "delete")?;
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
