pub mod bufferpool;
pub mod catalog;
pub mod heap_file;
pub mod lock_manager;
pub mod page;
pub mod replacement_strategy;
pub mod row;
pub mod schema;
pub mod transaction;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::info;
use bufferpool::BufferPool;
use catalog::Catalog;
use heap_file::HeapFile;
use replacement_strategy::ReplacementStrategyType;
use schema::Schema;
use transaction::Transaction;
use crate::types::{
    CONFIG_FILE, DEFAULT_BUFFERPOOL_SIZE, DEFAULT_LOCK_POLL_INTERVAL_MS, DbError, DbResult, TableId
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_dir: PathBuf,
    pub bufferpool_capacity: usize,
    pub bufferpool_replacement_strategy: ReplacementStrategyType,
    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,
}

fn default_lock_poll_interval_ms() -> u64 {
    DEFAULT_LOCK_POLL_INTERVAL_MS
}

impl StorageConfig {
    /// Default settings for a database rooted at `database_dir`
    pub fn new(database_dir: &Path) -> Self {
        StorageConfig {
            database_dir: database_dir.to_path_buf(),
            bufferpool_capacity: DEFAULT_BUFFERPOOL_SIZE,
            bufferpool_replacement_strategy: ReplacementStrategyType::LRU,
            lock_poll_interval_ms: DEFAULT_LOCK_POLL_INTERVAL_MS,
        }
    }

    /// Read `config.json` from `database_dir`, falling back to defaults if absent
    pub fn load_config(database_dir: &Path) -> DbResult<Self> {
        let path = database_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::new(database_dir));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save_config(&self) -> DbResult<()> {
        std::fs::create_dir_all(&self.database_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(self.database_dir.join(CONFIG_FILE), json)?;
        Ok(())
    }
}

/// Owns the catalog and the shared buffer pool of one database directory
pub struct StorageEngine {
    pub config: StorageConfig,
    pub catalog: Arc<Catalog>,
    pub buffer_pool: Arc<BufferPool>,
}

impl StorageEngine {
    /// Open the database directory, creating it if needed, and reload its catalog
    pub fn new(config: StorageConfig) -> DbResult<Self> {
        std::fs::create_dir_all(&config.database_dir)?;
        let catalog = Arc::new(Catalog::load_catalog(&config.database_dir)?);

        let buffer_pool = BufferPool::new(
            config.bufferpool_capacity,
            config.bufferpool_replacement_strategy,
            Arc::clone(&catalog),
            Duration::from_millis(config.lock_poll_interval_ms),
        );

        info!(dir = %config.database_dir.display(), tables = catalog.table_ids()?.len(), "storage engine started");
        Ok(StorageEngine {
            config,
            catalog,
            buffer_pool: Arc::new(buffer_pool),
        })
    }

    /// Create a table backed by `<name>.dat` and persist the catalog.
    /// Fails with `TableExists` if the name is taken; its file and cached pages stay intact.
    pub fn create_table(&self, name: &str, schema: Schema) -> DbResult<TableId> {
        if self.catalog.get_table_id(name).is_ok() {
            return Err(DbError::TableExists(name.to_string()));
        }
        let path = self.config.database_dir.join(format!("{name}.dat"));
        let file = HeapFile::create(&path, schema)?;
        let table_id = self.catalog.add_table(Arc::new(file), name)?;
        self.catalog.save_catalog(&self.config.database_dir)?;
        info!(table = name, table_id, "created table");
        Ok(table_id)
    }

    pub fn begin(&self) -> Transaction {
        Transaction::begin()
    }

    /// Deactivate storage engine, flushing all dirty pages and the catalog
    pub fn deactivate(&self) -> DbResult<()> {
        self.buffer_pool.flush_all()?;
        self.catalog.save_catalog(&self.config.database_dir)
    }
}
