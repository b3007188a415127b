//! Table catalogs for name resolution
//!
//! The query builder resolves every FROM table through a [`Catalog`]. The
//! catalog hands out shared `Arc<TableSchema>` handles; a query never owns
//! the tables it references.
//!
//! ## Example
//!
//! ```rust,ignore
//! use querybind_catalog::{Catalog, MemoryCatalog};
//!
//! let catalog = MemoryCatalog::from_file(Path::new("catalog.toml"))?;
//! let customers = catalog.table("customers")?;
//! ```

pub mod catalog;
pub mod memory;

pub use catalog::{Catalog, CatalogError};
pub use memory::{CatalogFile, MemoryCatalog, MemoryCatalogBuilder};
