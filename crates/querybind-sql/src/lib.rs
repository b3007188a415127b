//! SELECT statement front-end and query schema builder
//!
//! This crate handles:
//! - Parsing statement text with sqlparser and rejecting unsupported syntax
//! - Lowering the AST into expression fragments
//! - Binding column, WHERE and ORDER BY names against catalog tables
//! - Building the resulting [`QuerySchema`](querybind_core::QuerySchema)
//!
//! ## Example
//!
//! ```rust,ignore
//! use querybind_sql::SqlParser;
//!
//! let parser = SqlParser::new(Arc::new(catalog));
//! let query = parser.parse("SELECT c.name FROM customers c ORDER BY 1")?;
//! println!("{}", parser.to_sql(&query));
//! ```

pub mod builder;
pub mod context;
pub mod lower;
pub mod parser;
pub mod validate;

pub use builder::{build_select_query, OrderByItem, SelectOptions};
pub use context::{ParseContext, StatementText};
pub use lower::{lower_query, SelectParts};
pub use parser::SqlParser;
pub use validate::{bind_variable, validate_expr};
pub use querybind_core::ReservedKeywords;
