//! In-memory catalog
//!
//! Stores table schemas keyed by `fold_name` of their name. Tables can be
//! added at any time through a shared reference; clones share the same
//! storage.
//!
//! ## Catalog files
//!
//! ```toml
//! [[tables]]
//! name = "customers"
//! fields = [
//!     { name = "id", type = "int", primary_key = true, auto_increment = true },
//!     { name = "name", type = "string" },
//! ]
//! ```
//!
//! The same layout is accepted as JSON (`{"tables": [...]}`); the format is
//! chosen by file extension.

use crate::catalog::{Catalog, CatalogError};
use querybind_core::{fold_name, TableSchema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// On-disk catalog layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

/// Catalog backed by a map of table schemas
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: Arc<RwLock<HashMap<String, Arc<TableSchema>>>>,
}

impl MemoryCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog from a list of tables
    pub fn from_tables(tables: Vec<TableSchema>) -> Result<Self, CatalogError> {
        let catalog = Self::new();
        for table in tables {
            catalog.add_table(table)?;
        }
        Ok(catalog)
    }

    /// Add a table; names are unique regardless of case
    pub fn add_table(&self, table: TableSchema) -> Result<Arc<TableSchema>, CatalogError> {
        let key = fold_name(&table.name);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.contains_key(&key) {
            return Err(CatalogError::DuplicateTable(table.name));
        }
        tracing::debug!(table = %table.name, fields = table.fields.len(), "catalog table added");
        let table = Arc::new(table);
        tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Remove a table; queries holding it keep their handle
    pub fn remove_table(&self, name: &str) -> Option<Arc<TableSchema>> {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&fold_name(name))
    }

    /// Get the number of tables
    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load from a `.toml` or `.json` catalog file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::IoError(format!("{}: {}", path.display(), e)))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("toml") => Self::from_toml(&contents),
            Some("json") => Self::from_json(&contents),
            _ => Err(CatalogError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Load from TOML text
    pub fn from_toml(toml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(toml).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        Self::from_tables(file.tables)
    }

    /// Load from JSON text
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        Self::from_tables(file.tables)
    }

    /// Snapshot of the catalog in file layout, tables sorted by name
    pub fn to_file(&self) -> CatalogFile {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<TableSchema> = tables.values().map(|t| (**t).clone()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        CatalogFile { tables: out }
    }
}

impl Catalog for MemoryCatalog {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn lookup_table(&self, name: &str) -> Option<Arc<TableSchema>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&fold_name(name))
            .cloned()
    }

    fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|t| t.name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Builder for creating a MemoryCatalog with several tables
///
/// ```rust,ignore
/// let catalog = MemoryCatalogBuilder::new()
///     .with_table(TableSchema::new("customers").with_field(Field::new("id", LogicalType::Int)))
///     .with_table(TableSchema::new("orders"))
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryCatalogBuilder {
    tables: Vec<TableSchema>,
}

impl MemoryCatalogBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    /// Build the MemoryCatalog
    pub fn build(self) -> Result<MemoryCatalog, CatalogError> {
        MemoryCatalog::from_tables(self.tables)
    }
}
