use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use paste::paste;
use tracing::debug;
use crate::storage::bufferpool::{BufferPool, PageGuard};
use crate::storage::page::heap_page::{HeapPage, slots_per_page};
use crate::storage::page::page::Page;
use crate::storage::row::Row;
use crate::storage::schema::Schema;
use crate::storage::transaction::TransactionId;
use crate::types::{DbError, DbResult, PAGE_SIZE, PageId, PageNo, Permission, TableId};
use crate::with_read_pages;

/// A table's on-disk page store.
///
/// Callers outside the storage layer go through the buffer pool; `read_page` and
/// `write_page` touch the disk directly and are meant for the pool only.
pub trait DbFile: Send + Sync {
    fn get_id(&self) -> TableId;
    fn path(&self) -> &Path;
    fn schema(&self) -> &Arc<Schema>;
    fn page_count(&self) -> usize;

    /// Read a page from disk
    fn read_page(&self, page_id: PageId) -> DbResult<HeapPage>;

    /// Write a page to disk at `page_no * PAGE_SIZE`
    fn write_page(&self, page: &HeapPage) -> DbResult<()>;

    /// Insert a row on behalf of `txn`, returning the pages it modified
    fn insert_row(&self, pool: &BufferPool, txn: TransactionId, row: Row) -> DbResult<Vec<PageGuard>>;

    /// Delete a previously read row on behalf of `txn`, returning the pages it modified
    fn delete_row(&self, pool: &BufferPool, txn: TransactionId, row: &Row) -> DbResult<Vec<PageGuard>>;
}

/// Unordered collection of rows stored as consecutive pages of one file.
/// No file header: page `n` lives at byte offset `n * PAGE_SIZE`.
pub struct HeapFile {
    path: PathBuf,
    id: TableId,
    schema: Arc<Schema>,
    file: Mutex<File>,
    num_pages: AtomicUsize,
}

impl HeapFile {

    /// Create an empty heap file, truncating any existing file at `path`
    pub fn create(path: &Path, schema: Schema) -> DbResult<Self> {
        File::create(path)?;
        Self::open(path, schema)
    }

    /// Open the heap file at `path`, creating it if missing
    pub fn open(path: &Path, schema: Schema) -> DbResult<Self> {
        if schema.is_empty() {
            return Err(DbError::SchemaMismatch("a table needs at least one column".to_string()));
        }
        if slots_per_page(&schema) == 0 {
            return Err(DbError::Unsupported(
                format!("rows of {} bytes do not fit in a {} byte page", schema.row_size(), PAGE_SIZE)
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let length = file.metadata()?.len() as usize;
        if length % PAGE_SIZE != 0 {
            return Err(DbError::Corrupted(
                format!("{} has length {} which is not a multiple of {}", path.display(), length, PAGE_SIZE)
            ));
        }

        let path = path.canonicalize()?;
        Ok(HeapFile {
            id: Self::table_id_for(&path),
            path,
            schema: Arc::new(schema),
            file: Mutex::new(file),
            num_pages: AtomicUsize::new(length / PAGE_SIZE),
        })
    }

    /// Stable id derived from the canonical file path
    fn table_id_for(path: &Path) -> TableId {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish()
    }

    // get offset of page in file
    fn get_offset(page_no: PageNo) -> u64 {
        page_no as u64 * PAGE_SIZE as u64
    }

    /// Append a blank page and persist it, so the buffer pool can load it on a miss
    fn allocate_page(&self) -> DbResult<PageId> {
        let mut file = self.file.lock()?;
        let page_no = self.num_pages.load(Ordering::SeqCst) as PageNo;

        file.seek(SeekFrom::Start(Self::get_offset(page_no)))?;
        file.write_all(&HeapPage::empty_page_data())?;
        file.flush()?;
        self.num_pages.store(page_no as usize + 1, Ordering::SeqCst);

        debug!(table = self.id, page_no, "allocated heap page");
        Ok(PageId::new(self.id, page_no))
    }

    /// Lazy scan over every row of the file on behalf of `txn`
    pub fn iter(self: &Arc<Self>, pool: Arc<BufferPool>, txn: TransactionId) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(self) as Arc<dyn DbFile>, pool, txn)
    }
}

impl DbFile for HeapFile {

    #[inline]
    fn get_id(&self) -> TableId {
        self.id
    }

    #[inline]
    fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    fn page_count(&self) -> usize {
        self.num_pages.load(Ordering::SeqCst)
    }

    fn read_page(&self, page_id: PageId) -> DbResult<HeapPage> {
        if page_id.table_id != self.id || page_id.page_no as usize >= self.page_count() {
            return Err(DbError::NoSuchElement(format!("page {} is not in {}", page_id, self.path.display())));
        }

        let mut buf = [0u8; PAGE_SIZE];
        {
            let mut file = self.file.lock()?;
            file.seek(SeekFrom::Start(Self::get_offset(page_id.page_no)))?;
            file.read_exact(&mut buf)?;
        }

        HeapPage::from_bytes(page_id, Arc::clone(&self.schema), &buf)
    }

    fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        let page_id = page.get_id();
        if page_id.table_id != self.id {
            return Err(DbError::NoSuchElement(format!("page {} is not in {}", page_id, self.path.display())));
        }

        let buf = page.serialize();
        let mut file = self.file.lock()?;
        file.seek(SeekFrom::Start(Self::get_offset(page_id.page_no)))?;
        file.write_all(&buf)?;
        file.flush()?;
        self.num_pages.fetch_max(page_id.page_no as usize + 1, Ordering::SeqCst);
        Ok(())
    }

    fn insert_row(&self, pool: &BufferPool, txn: TransactionId, row: Row) -> DbResult<Vec<PageGuard>> {
        if row.schema().as_ref() != self.schema.as_ref() {
            return Err(DbError::SchemaMismatch(
                format!("row schema [{}] differs from table schema [{}]", row.schema(), self.schema)
            ));
        }

        // first existing page with a free slot wins
        for page_no in 0..self.page_count() {
            let page_id = PageId::new(self.id, page_no as PageNo);
            let guard = pool.get_page(txn, page_id, Permission::ReadWrite)?;
            let has_room = guard.read()?.empty_slot_count() > 0;
            if has_room {
                guard.write()?.insert_row(row)?;
                return Ok(vec![guard]);
            }
        }

        // a concurrent inserter may fill a fresh page before we lock it
        loop {
            let page_id = self.allocate_page()?;
            let guard = pool.get_page(txn, page_id, Permission::ReadWrite)?;
            let (num_slots, has_room) = {
                let page = guard.read()?;
                (page.num_slots(), page.empty_slot_count() > 0)
            };
            if has_room {
                guard.write()?.insert_row(row)?;
                return Ok(vec![guard]);
            }
            if num_slots == 0 {
                return Err(DbError::Unsupported(format!("{} pages hold no rows", self.path.display())));
            }
        }
    }

    fn delete_row(&self, pool: &BufferPool, txn: TransactionId, row: &Row) -> DbResult<Vec<PageGuard>> {
        let record_id = row.record_id()
            .ok_or_else(|| DbError::NoSuchElement("row has no storage location".to_string()))?;
        if record_id.page_id.table_id != self.id {
            return Err(DbError::NoSuchElement(
                format!("row on page {} is not stored in {}", record_id.page_id, self.path.display())
            ));
        }

        let guard = pool.get_page(txn, record_id.page_id, Permission::ReadWrite)?;
        guard.write()?.delete_row(row)?;
        Ok(vec![guard])
    }
}

/// Restartable cursor over a file's rows in page then slot order.
/// Each page is read under a shared lock when the cursor first reaches it.
pub struct HeapFileIterator {
    file: Arc<dyn DbFile>,
    pool: Arc<BufferPool>,
    txn: TransactionId,
    next_page: usize,
    rows: VecDeque<Row>, // remaining rows of the current page
    is_open: bool,
}

impl HeapFileIterator {
    pub fn new(file: Arc<dyn DbFile>, pool: Arc<BufferPool>, txn: TransactionId) -> Self {
        Self {
            file,
            pool,
            txn,
            next_page: 0,
            rows: VecDeque::new(),
            is_open: false,
        }
    }

    pub fn open(&mut self) -> DbResult<()> {
        if self.is_open {
            return Err(DbError::IteratorProtocol("heap file iterator opened twice".to_string()));
        }
        self.is_open = true;
        self.next_page = 0;
        self.rows.clear();
        Ok(())
    }

    /// Next row, `Ok(None)` once every page has been visited
    pub fn next(&mut self) -> DbResult<Option<Row>> {
        if !self.is_open {
            return Err(DbError::IteratorProtocol("heap file iterator is not open".to_string()));
        }

        loop {
            if let Some(row) = self.rows.pop_front() {
                return Ok(Some(row));
            }
            if self.next_page >= self.file.page_count() {
                return Ok(None);
            }

            let page_id = PageId::new(self.file.get_id(), self.next_page as PageNo);
            with_read_pages!(self.pool, self.txn, [(page_id, page)], {
                self.rows.extend(page.iter_rows().cloned());
            });
            self.next_page += 1;
        }
    }

    pub fn rewind(&mut self) -> DbResult<()> {
        if !self.is_open {
            return Err(DbError::IteratorProtocol("heap file iterator is not open".to_string()));
        }
        self.next_page = 0;
        self.rows.clear();
        Ok(())
    }

    pub fn close(&mut self) {
        self.is_open = false;
        self.next_page = 0;
        self.rows.clear();
    }
}
