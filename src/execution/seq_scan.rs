use std::sync::Arc;
use crate::execution::operator::{OpIterator, ensure_closed, ensure_open};
use crate::storage::bufferpool::BufferPool;
use crate::storage::heap_file::HeapFileIterator;
use crate::storage::row::Row;
use crate::storage::schema::Schema;
use crate::storage::transaction::TransactionId;
use crate::types::{DbResult, TableId};

/// Sequential scan over every row of one table, in page then slot order.
/// Output columns are named `alias.column`.
pub struct SeqScan {
    table_id: TableId,
    alias: String,
    schema: Arc<Schema>,
    rows: HeapFileIterator,
    is_open: bool,
}

impl SeqScan {
    pub fn new(pool: Arc<BufferPool>, txn: TransactionId, table_id: TableId, alias: &str) -> DbResult<Self> {
        let file = pool.catalog().get_file(table_id)?;
        let schema = Arc::new(file.schema().with_alias(alias));

        Ok(SeqScan {
            table_id,
            alias: alias.to_string(),
            schema,
            rows: HeapFileIterator::new(file, pool, txn),
            is_open: false,
        })
    }

    /// Scan aliased by the table's catalog name
    pub fn for_table(pool: Arc<BufferPool>, txn: TransactionId, table_id: TableId) -> DbResult<Self> {
        let name = pool.catalog().get_table_name(table_id)?;
        Self::new(pool, txn, table_id, &name)
    }

    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> DbResult<()> {
        ensure_closed(self.is_open, "sequential scan")?;
        self.rows.open()?;
        self.is_open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Row>> {
        ensure_open(self.is_open, "sequential scan")?;
        match self.rows.next()? {
            Some(stored) => {
                // rebind to the aliased schema, keeping the storage location for deletes
                let mut row = Row::new(Arc::clone(&self.schema), stored.fields().to_vec())?;
                row.set_record_id(stored.record_id());
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        ensure_open(self.is_open, "sequential scan")?;
        self.rows.rewind()
    }

    fn close(&mut self) {
        self.rows.close();
        self.is_open = false;
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
