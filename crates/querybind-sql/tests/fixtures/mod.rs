//! Test fixtures for query building tests

use querybind_catalog::{MemoryCatalog, MemoryCatalogBuilder};
use querybind_core::{Field, LogicalType, TableSchema};
use querybind_sql::SqlParser;
use std::sync::Arc;

fn int_fields(names: &[&str]) -> Vec<Field> {
    names
        .iter()
        .map(|name| Field::new(*name, LogicalType::Int))
        .collect()
}

/// Catalog with `customers`, `orders`, `tbl1` and `tbl2`, plus `select`
/// and `t` whose names only read back when quoted
pub fn catalog() -> MemoryCatalog {
    MemoryCatalogBuilder::new()
        .with_table(
            TableSchema::new("customers")
                .with_field(
                    Field::new("id", LogicalType::Int)
                        .with_primary_key()
                        .with_auto_increment(),
                )
                .with_field(Field::new("name", LogicalType::String).with_not_null(true))
                .with_field(Field::new("email", LogicalType::String)),
        )
        .with_table(
            TableSchema::new("orders")
                .with_field(Field::new("id", LogicalType::Int).with_primary_key())
                .with_field(Field::new("customer", LogicalType::Int))
                .with_field(Field::new("amount", LogicalType::Float)),
        )
        .with_table(TableSchema::from_fields("tbl1", int_fields(&["x", "y"])))
        .with_table(TableSchema::from_fields("tbl2", int_fields(&["y", "z"])))
        .with_table(TableSchema::from_fields("select", int_fields(&["x"])))
        .with_table(TableSchema::from_fields("t", int_fields(&["order", "my col", "a.b"])))
        .build()
        .expect("fixture catalog has unique table names")
}

/// Parser over [`catalog`]
pub fn parser() -> SqlParser {
    SqlParser::new(Arc::new(catalog()))
}
