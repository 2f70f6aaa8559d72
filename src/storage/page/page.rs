use crate::storage::transaction::TransactionId;
use crate::types::{PAGE_SIZE, PageId};

/// Contract shared by every page kind the buffer pool caches
pub trait Page: Send + Sync {

    /// Return page id
    fn get_id(&self) -> PageId;

    /// Serialize page to its exact on-disk byte form
    fn serialize(&self) -> [u8; PAGE_SIZE];

    /// Return the transaction that dirtied the page since its last flush, if any
    fn is_dirty(&self) -> Option<TransactionId>;

    /// Mark the page dirty on behalf of `txn`, or clean when `dirty` is false
    fn mark_dirty(&mut self, dirty: bool, txn: TransactionId);

    /// Return whether page holds no rows
    fn is_empty(&self) -> bool;
}
