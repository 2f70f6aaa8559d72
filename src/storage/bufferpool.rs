use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use crate::storage::catalog::Catalog;
use crate::storage::lock_manager::{LockManager, LockMode};
use crate::storage::page::heap_page::HeapPage;
use crate::storage::page::page::Page;
use crate::storage::replacement_strategy::{
    ReplacementStrategy, ReplacementStrategyType, replacement_strategy_factory
};
use crate::storage::row::Row;
use crate::storage::transaction::TransactionId;
use crate::types::{DbError, DbResult, PageId, Permission, TableId};

#[derive(Debug)]
pub struct BufferFrame {
    page_id: PageId,
    page: RwLock<HeapPage>,
    pin_count: AtomicUsize   // number of live page guards
}

impl BufferFrame {
    fn new(page: HeapPage) -> Self {
        Self {
            page_id: page.get_id(),
            page: RwLock::new(page),
            pin_count: AtomicUsize::new(0),
        }
    }
}

// RAII wrapper for BufferFrame pin count update
pub struct PageGuard {
    frame: Arc<BufferFrame>,
}

impl PageGuard {
    fn new(frame: Arc<BufferFrame>) -> PageGuard {
        frame.pin_count.fetch_add(1, Ordering::SeqCst);
        Self { frame }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id
    }

    pub fn read(&self) -> DbResult<RwLockReadGuard<'_, HeapPage>> {
        Ok(self.frame.page.read()?)
    }

    /// Mutable access; only valid for the transaction holding the page's exclusive lock
    pub fn write(&self) -> DbResult<RwLockWriteGuard<'_, HeapPage>> {
        Ok(self.frame.page.write()?)
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        // decrement pin count
        self.frame.pin_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-capacity page cache shared by all transactions.
///
/// Every access is preceded by a page lock for the requesting transaction. Pages
/// dirtied by a running transaction are never evicted: commit flushes them, abort
/// drops them from the cache so the next access re-reads the on-disk image.
pub struct BufferPool {
    page_table: RwLock<HashMap<PageId, Arc<BufferFrame>>>,
    capacity: usize,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    strategy: RwLock<Box<dyn ReplacementStrategy>>,
}

impl BufferPool {
    pub fn new(
        capacity: usize,
        strategy_type: ReplacementStrategyType,
        catalog: Arc<Catalog>,
        lock_poll_interval: Duration,
    ) -> Self {
        let strategy = replacement_strategy_factory(
            strategy_type
        );

        BufferPool {
            page_table: RwLock::new(HashMap::new()),
            capacity,
            catalog,
            lock_manager: LockManager::new(lock_poll_interval),
            strategy: RwLock::new(strategy),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Get the current bufferpool size
    pub fn current_size(&self) -> DbResult<usize> {
        Ok(self.page_table.read()?.len())
    }

    pub fn is_cached(&self, page_id: PageId) -> DbResult<bool> {
        Ok(self.page_table.read()?.contains_key(&page_id))
    }

    /// Fetch a page for `txn` under the lock matching `permission`.
    /// Blocks while another transaction holds a conflicting lock; fails with
    /// `TransactionAborted` on deadlock and `CapacityExceeded` when every cached
    /// page is pinned or dirty.
    pub fn get_page(&self, txn: TransactionId, page_id: PageId, permission: Permission) -> DbResult<PageGuard> {
        self.lock_manager.acquire(txn, page_id, permission.into())?;

        // page is already in memory
        {
            let frames = self.page_table.read()?;
            if let Some(frame) = frames.get(&page_id) {
                self.strategy.write()?.update(page_id);
                return Ok(PageGuard::new(Arc::clone(frame)));
            }
        }

        // fetch page from disk
        let page = self.catalog.get_file(page_id.table_id)?.read_page(page_id)?;

        let mut frames = self.page_table.write()?;

        // another transaction may have loaded the same page meanwhile
        if let Some(existing) = frames.get(&page_id) {
            self.strategy.write()?.update(page_id);
            return Ok(PageGuard::new(Arc::clone(existing)));
        }

        if frames.len() >= self.capacity {
            self.evict_one(&mut frames)?;
        }

        let frame = Arc::new(BufferFrame::new(page));
        frames.insert(page_id, Arc::clone(&frame));
        self.strategy.write()?.update(page_id);
        Ok(PageGuard::new(frame))
    }

    /// Insert a row into a table on behalf of `txn`, dirtying the pages it touches
    pub fn insert_row(&self, txn: TransactionId, table_id: TableId, row: Row) -> DbResult<()> {
        let file = self.catalog.get_file(table_id)?;
        let pages = file.insert_row(self, txn, row)?;
        self.mark_dirty(txn, &pages)
    }

    /// Delete a row from the table that stores it on behalf of `txn`
    pub fn delete_row(&self, txn: TransactionId, row: &Row) -> DbResult<()> {
        let record_id = row.record_id()
            .ok_or_else(|| DbError::NoSuchElement("row has no storage location".to_string()))?;
        let file = self.catalog.get_file(record_id.page_id.table_id)?;
        let pages = file.delete_row(self, txn, row)?;
        self.mark_dirty(txn, &pages)
    }

    fn mark_dirty(&self, txn: TransactionId, pages: &[PageGuard]) -> DbResult<()> {
        for guard in pages {
            debug_assert!(self.lock_manager.holds_lock(txn, guard.page_id(), LockMode::Exclusive)?);
            guard.write()?.mark_dirty(true, txn);
        }
        Ok(())
    }

    /// Write a cached page to disk if it is dirty and mark it clean
    pub fn flush_page(&self, page_id: PageId) -> DbResult<()> {
        let frame = self.page_table.read()?
            .get(&page_id)
            .cloned();

        match frame {
            Some(frame) => self.flush_frame(&frame),
            None => Ok(()),
        }
    }

    /// Flush all dirty pages in buffer pool
    pub fn flush_all(&self) -> DbResult<()> {
        // clone refs to avoid holding the table lock during I/O
        let frames: Vec<Arc<BufferFrame>> = {
            let map = self.page_table.read()?;
            map.values().cloned().collect()
        };
        for frame in frames {
            self.flush_frame(&frame)?;
        }
        Ok(())
    }

    fn flush_frame(&self, frame: &BufferFrame) -> DbResult<()> {
        let mut page = frame.page.write()?;
        if let Some(txn) = page.is_dirty() {
            self.catalog.get_file(frame.page_id.table_id)?.write_page(&page)?;
            page.mark_dirty(false, txn);
            debug!(page = %frame.page_id, "flushed page");
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it
    pub fn discard_page(&self, page_id: PageId) -> DbResult<()> {
        let mut frames = self.page_table.write()?;
        frames.remove(&page_id);
        self.strategy.write()?.remove(page_id);
        Ok(())
    }

    /// Release one page lock before the transaction ends; breaks two-phase locking
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) -> DbResult<()> {
        self.lock_manager.release(txn, page_id)
    }

    /// Whether `txn` holds any lock on the page
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> DbResult<bool> {
        self.lock_manager.holds_lock(txn, page_id, LockMode::Shared)
    }

    /// Finish a transaction: on commit flush its dirty pages, on abort discard
    /// them, then release every lock it holds
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> DbResult<()> {
        // only pages locked by txn can carry its changes; frames latched by other
        // transactions must not be touched while txn still holds its locks
        let locked = self.lock_manager.pages_locked_by(txn)?;
        let frames: Vec<Arc<BufferFrame>> = {
            let map = self.page_table.read()?;
            locked.iter().filter_map(|page_id| map.get(page_id).cloned()).collect()
        };

        let mut touched = 0;
        for frame in frames {
            if frame.page.read()?.is_dirty() != Some(txn) {
                continue;
            }
            touched += 1;
            if commit {
                self.flush_frame(&frame)?;
            } else {
                let mut map = self.page_table.write()?;
                if map.get(&frame.page_id).is_some_and(|f| Arc::ptr_eq(f, &frame)) {
                    map.remove(&frame.page_id);
                    self.strategy.write()?.remove(frame.page_id);
                }
            }
        }

        debug!(%txn, commit, pages = touched, "transaction complete");
        self.lock_manager.release_all(txn)
    }

    /// Evict one clean, unpinned page, least recently used first.
    /// Dirty pages belong to running transactions and are never written early.
    fn evict_one(&self, frames: &mut HashMap<PageId, Arc<BufferFrame>>) -> DbResult<()> {
        let mut strategy = self.strategy.write()?;
        let victim = strategy.get_evict().find(|page_id| {
            frames.get(page_id).is_some_and(|frame| {
                frame.pin_count.load(Ordering::SeqCst) == 0
                    && frame.page.try_read().is_ok_and(|page| page.is_dirty().is_none())
            })
        });

        match victim {
            Some(page_id) => {
                frames.remove(&page_id);
                strategy.remove(page_id);
                debug!(page = %page_id, "evicted page");
                Ok(())
            }
            None => {
                warn!(capacity = self.capacity, "no clean unpinned page to evict");
                Err(DbError::CapacityExceeded(
                    format!("all {} cached pages are pinned or dirty", frames.len())
                ))
            }
        }
    }
}
