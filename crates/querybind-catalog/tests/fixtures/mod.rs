//! Test fixtures for catalog integration tests
//!
//! Table definitions shared by the tests, plus paths to the on-disk catalog
//! files stored next to this module.

use querybind_core::{Field, LogicalType, TableSchema};
use std::path::PathBuf;

/// Customers table with an auto-incremented primary key
pub fn customers_table() -> TableSchema {
    TableSchema::new("customers")
        .with_caption("Customers")
        .with_field(
            Field::new("id", LogicalType::Int)
                .with_primary_key()
                .with_auto_increment(),
        )
        .with_field(Field::new("name", LogicalType::String).with_not_null(true))
        .with_field(Field::new("email", LogicalType::String))
}

/// Orders table with a decimal amount
pub fn orders_table() -> TableSchema {
    TableSchema::new("orders")
        .with_field(Field::new("id", LogicalType::Int).with_primary_key())
        .with_field(Field::new("customer", LogicalType::Int).with_not_null(true))
        .with_field(Field::new(
            "amount",
            LogicalType::Decimal {
                precision: Some(10),
                scale: Some(2),
            },
        ))
}

/// Directory holding the catalog files
pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}
