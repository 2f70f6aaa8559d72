use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::storage::bufferpool::BufferPool;
use crate::types::DbResult;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique token identifying one transaction
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Mint a fresh id, monotonically increasing across the process
    pub fn next() -> Self {
        TransactionId(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::SeqCst))
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Handle for a running transaction, consumed by commit or abort
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
}

impl Transaction {
    pub fn begin() -> Self {
        let id = TransactionId::next();
        tracing::debug!(txn = %id, "transaction started");
        Self { id }
    }

    #[inline]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Flush every page this transaction dirtied and release its locks
    pub fn commit(self, pool: &BufferPool) -> DbResult<()> {
        pool.transaction_complete(self.id, true)
    }

    /// Discard every page this transaction dirtied and release its locks
    pub fn abort(self, pool: &BufferPool) -> DbResult<()> {
        pool.transaction_complete(self.id, false)
    }
}
