#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;
use drizzle_db::execution::{OpIterator, SeqScan, collect_rows};
use drizzle_db::storage::row::{Field, Row};
use drizzle_db::storage::schema::{FieldType, Schema};
use drizzle_db::storage::transaction::{Transaction, TransactionId};
use drizzle_db::storage::{StorageConfig, StorageEngine};
use drizzle_db::types::TableId;

/// Engine over a fresh temp directory; keep the `TempDir` alive for the test's duration
pub fn setup_engine(capacity: usize) -> (StorageEngine, TempDir) {
    let tmpdir = TempDir::new().expect("create temp dir");
    let mut config = StorageConfig::new(tmpdir.path());
    config.bufferpool_capacity = capacity;
    let engine = StorageEngine::new(config).expect("start storage engine");
    (engine, tmpdir)
}

pub fn reopen_engine(dir: &TempDir, capacity: usize) -> StorageEngine {
    let mut config = StorageConfig::new(dir.path());
    config.bufferpool_capacity = capacity;
    StorageEngine::new(config).expect("reopen storage engine")
}

/// Two INT columns: `id`, `val`
pub fn pair_schema() -> Schema {
    Schema::named(&[(FieldType::Int, "id"), (FieldType::Int, "val")])
}

/// One row per page: an INT id plus a VARCHAR wide enough to fill a page
pub fn wide_schema() -> Schema {
    Schema::named(&[(FieldType::Int, "id"), (FieldType::Varchar(3000), "payload")])
}

pub fn int_row(schema: &Arc<Schema>, values: &[i32]) -> Row {
    Row::new(Arc::clone(schema), values.iter().map(|v| Field::Int(*v)).collect()).unwrap()
}

pub fn wide_row(schema: &Arc<Schema>, id: i32) -> Row {
    Row::new(Arc::clone(schema), vec![Field::Int(id), Field::from("x")]).unwrap()
}

/// Insert rows in one transaction and commit it
pub fn insert_committed(engine: &StorageEngine, table_id: TableId, rows: Vec<Row>) {
    let txn = engine.begin();
    for row in rows {
        engine.buffer_pool.insert_row(txn.id(), table_id, row).unwrap();
    }
    txn.commit(&engine.buffer_pool).unwrap();
}

/// Every row of the table as seen by `txn`
pub fn scan_table(engine: &StorageEngine, txn: TransactionId, table_id: TableId) -> Vec<Row> {
    let mut scan = SeqScan::for_table(Arc::clone(&engine.buffer_pool), txn, table_id).unwrap();
    scan.open().unwrap();
    let rows = collect_rows(&mut scan).unwrap();
    scan.close();
    rows
}

/// Scan in a fresh transaction that commits right after
pub fn scan_committed(engine: &StorageEngine, table_id: TableId) -> Vec<Row> {
    let txn = Transaction::begin();
    let rows = scan_table(engine, txn.id(), table_id);
    txn.commit(&engine.buffer_pool).unwrap();
    rows
}

pub fn first_ints(rows: &[Row]) -> Vec<i32> {
    rows.iter().map(|r| r.get_field(0).unwrap().as_int().unwrap()).collect()
}
