use std::fmt;
use std::sync::PoisonError;
use thiserror::Error;

// global constants
pub const PAGE_SIZE: usize = 4096;
pub const DEFAULT_BUFFERPOOL_SIZE: usize = 50;
pub const DEFAULT_LOCK_POLL_INTERVAL_MS: u64 = 10;
pub const CATALOG_FILE: &str = "catalog.json";
pub const CONFIG_FILE: &str = "config.json";

// global types
pub type TableId = u64;
pub type PageNo = u32;
pub type SlotId = u16;
pub type ColumnId = usize;

/// Identifies one page of one heap file
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: PageNo,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// Storage location of a persisted row
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }
}

/// Access level requested when fetching a page through the buffer pool
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("transaction {0} aborted: {1}")]
    TransactionAborted(u64, String),

    #[error("storage I/O error: {0}")]
    StorageIO(#[from] std::io::Error),

    #[error("buffer pool capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("iterator protocol violation: {0}")]
    IteratorProtocol(String),

    #[error("corrupted data: {0}")]
    Corrupted(String),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("synchronization primitive poisoned: {0}")]
    Poisoned(String),
}

impl<T> From<PoisonError<T>> for DbError {
    fn from(err: PoisonError<T>) -> Self {
        DbError::Poisoned(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
