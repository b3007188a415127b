//! Catalog trait for resolving table names

use querybind_core::TableSchema;
use std::sync::Arc;

/// Errors that can occur when loading or querying a catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Duplicate table: {0}")]
    DuplicateTable(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported catalog file: {0}")]
    UnsupportedFormat(String),
}

/// Read-only source of table schemas.
///
/// Implementations must be safe to share between threads; the builder only
/// ever reads from a catalog.
pub trait Catalog: Send + Sync {
    /// Get the catalog name (e.g., "memory")
    fn name(&self) -> &'static str;

    /// Table by name (case-insensitive); `None` when unknown
    fn lookup_table(&self, name: &str) -> Option<Arc<TableSchema>>;

    /// Names of all tables, sorted
    fn table_names(&self) -> Vec<String>;

    /// Table by name, as a `Result`
    fn table(&self, name: &str) -> Result<Arc<TableSchema>, CatalogError> {
        self.lookup_table(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    /// Whether a table with that name exists
    fn has_table(&self, name: &str) -> bool {
        self.lookup_table(name).is_some()
    }
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn lookup_table(&self, name: &str) -> Option<Arc<TableSchema>> {
        (**self).lookup_table(name)
    }

    fn table_names(&self) -> Vec<String> {
        (**self).table_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Single(Arc<TableSchema>);

    impl Catalog for Single {
        fn name(&self) -> &'static str {
            "single"
        }

        fn lookup_table(&self, name: &str) -> Option<Arc<TableSchema>> {
            self.0.has_name(name).then(|| Arc::clone(&self.0))
        }

        fn table_names(&self) -> Vec<String> {
            vec![self.0.name.clone()]
        }
    }

    #[test]
    fn default_methods() {
        let catalog = Single(Arc::new(TableSchema::new("users")));

        assert!(catalog.has_table("USERS"));
        assert_eq!(
            catalog.table("orders"),
            Err(CatalogError::TableNotFound("orders".to_string()))
        );
    }

    #[test]
    fn shared_catalog_delegates() {
        let catalog: Arc<dyn Catalog> = Arc::new(Single(Arc::new(TableSchema::new("users"))));

        assert_eq!(catalog.name(), "single");
        assert_eq!(catalog.table_names(), vec!["users"]);
    }
}
