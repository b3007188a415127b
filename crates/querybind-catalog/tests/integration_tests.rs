//! Integration tests for catalog loading and lookup
//!
//! ```bash
//! cargo test -p querybind-catalog --test integration_tests
//! ```

mod fixtures;

use pretty_assertions::assert_eq;
use querybind_catalog::{Catalog, CatalogError, MemoryCatalog, MemoryCatalogBuilder};
use std::sync::Arc;

// =============================================================================
// File loading
// =============================================================================

#[test]
fn test_load_toml_catalog() {
    let catalog = MemoryCatalog::from_file(&fixtures::fixture_dir().join("catalog.toml")).unwrap();

    assert_eq!(catalog.table_names(), vec!["customers", "orders"]);
    assert_eq!(*catalog.table("customers").unwrap(), fixtures::customers_table());
    assert_eq!(*catalog.table("orders").unwrap(), fixtures::orders_table());
}

#[test]
fn test_toml_and_json_catalogs_agree() {
    let dir = fixtures::fixture_dir();
    let from_toml = MemoryCatalog::from_file(&dir.join("catalog.toml")).unwrap();
    let from_json = MemoryCatalog::from_file(&dir.join("catalog.json")).unwrap();

    assert_eq!(from_toml.to_file(), from_json.to_file());
}

#[test]
fn test_missing_file() {
    let err = MemoryCatalog::from_file(&fixtures::fixture_dir().join("missing.toml")).unwrap_err();
    assert!(matches!(err, CatalogError::IoError(_)));
}

#[test]
fn test_unsupported_extension() {
    let err = MemoryCatalog::from_file(&fixtures::fixture_dir().join("mod.rs")).unwrap_err();
    assert!(matches!(err, CatalogError::UnsupportedFormat(_)));
}

#[test]
fn test_malformed_catalog() {
    let err = MemoryCatalog::from_toml("tables = 3").unwrap_err();
    assert!(matches!(err, CatalogError::ParseError(_)));
}

#[test]
fn test_duplicate_table_in_file() {
    let err = MemoryCatalog::from_json(
        r#"{"tables": [{"name": "t", "fields": []}, {"name": "T", "fields": []}]}"#,
    )
    .unwrap_err();

    assert_eq!(err, CatalogError::DuplicateTable("T".to_string()));
}

// =============================================================================
// Sharing
// =============================================================================

#[test]
fn test_catalog_shared_between_threads() {
    let catalog: Arc<dyn Catalog> = Arc::new(
        MemoryCatalogBuilder::new()
            .with_table(fixtures::customers_table())
            .with_table(fixtures::orders_table())
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || catalog.lookup_table("ORDERS").map(|t| t.fields.len()))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some(3));
    }
}

#[test]
fn test_removed_table_outlives_catalog_entry() {
    let catalog = MemoryCatalog::new();
    catalog.add_table(fixtures::customers_table()).unwrap();

    let held = catalog.table("customers").unwrap();
    catalog.remove_table("customers");

    assert!(!catalog.has_table("customers"));
    assert_eq!(held.field_names(), vec!["id", "name", "email"]);
}
