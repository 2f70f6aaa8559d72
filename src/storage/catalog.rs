use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use serde::{Deserialize, Serialize};
use crate::storage::heap_file::{DbFile, HeapFile};
use crate::storage::schema::Schema;
use crate::types::{CATALOG_FILE, DbError, DbResult, TableId};

#[derive(Serialize, Deserialize)]
pub struct CatalogData {
    pub tables: Vec<TableData>,
}

#[derive(Serialize, Deserialize)]
pub struct TableData {
    pub name: String,
    pub path: PathBuf,
    pub schema: Schema,
}

pub struct TableInfo {
    pub name: String,
    pub file: Arc<dyn DbFile>,
}

/// Maps table ids to their backing files and schemas
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, TableInfo>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `catalog.json` from `dir` and reopen every listed heap file.
    /// A missing catalog file yields an empty catalog.
    pub fn load_catalog(dir: &Path) -> DbResult<Self> {
        let catalog = Catalog::new();
        let path = dir.join(CATALOG_FILE);

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(catalog),
            Err(e) => return Err(e.into()),
        };

        let data = serde_json::from_str::<CatalogData>(&text)?;
        for table in data.tables {
            let file = HeapFile::open(&table.path, table.schema)?;
            catalog.add_table(Arc::new(file), &table.name)?;
        }
        Ok(catalog)
    }

    pub fn save_catalog(&self, dir: &Path) -> DbResult<()> {
        let tables = self.tables.read()?;
        let mut data = CatalogData {
            tables: tables.values()
                .map(|info| TableData {
                    name: info.name.clone(),
                    path: info.file.path().to_path_buf(),
                    schema: info.file.schema().as_ref().clone(),
                })
                .collect(),
        };
        data.tables.sort_by(|a, b| a.name.cmp(&b.name));

        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(dir.join(CATALOG_FILE), json)?;
        Ok(())
    }

    /// Register a table; an existing table with the same name or id is replaced
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: &str) -> DbResult<TableId> {
        let id = file.get_id();
        let mut tables = self.tables.write()?;
        tables.retain(|_, info| info.name != name);
        tables.insert(id, TableInfo { name: name.to_string(), file });
        Ok(id)
    }

    pub fn get_file(&self, id: TableId) -> DbResult<Arc<dyn DbFile>> {
        self.tables.read()?
            .get(&id)
            .map(|info| Arc::clone(&info.file))
            .ok_or_else(|| DbError::TableNotFound(format!("table id {}", id)))
    }

    pub fn get_schema(&self, id: TableId) -> DbResult<Arc<Schema>> {
        Ok(Arc::clone(self.get_file(id)?.schema()))
    }

    pub fn get_table_id(&self, name: &str) -> DbResult<TableId> {
        self.tables.read()?
            .iter()
            .find(|(_, info)| info.name == name)
            .map(|(id, _)| *id)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn get_table_name(&self, id: TableId) -> DbResult<String> {
        self.tables.read()?
            .get(&id)
            .map(|info| info.name.clone())
            .ok_or_else(|| DbError::TableNotFound(format!("table id {}", id)))
    }

    pub fn table_ids(&self) -> DbResult<Vec<TableId>> {
        Ok(self.tables.read()?.keys().copied().collect())
    }
}
