//! QueryBind Core
//!
//! Catalog-side table schemas, expression trees, the in-memory query schema,
//! identifier quoting and the stable error and report types.
//! Never rename error kind labels - they are part of the public API.

pub mod config;
pub mod error;
pub mod expr;
pub mod keywords;
pub mod query;
pub mod report;
pub mod schema;

pub use config::{Config, ConfigError, DialectConfig, OutputConfig, OutputFormat};
pub use error::{ErrorKind, ParserError};
pub use expr::{
    AliasExpr, BinaryExpr, BinaryOp, ConstValue, ExprClass, ExprNode, ExprSql, FunctionExpr,
    NArgExpr, UnaryExpr, UnaryOp, VariableBinding, VariableExpr,
};
pub use keywords::ReservedKeywords;
pub use query::{
    ColumnKind, ExpandedColumn, ExpandedSource, FieldColumn, OrderByColumn, OrderByTarget,
    QueryColumn, QueryError, QuerySchema, QueryTable,
};
pub use report::{QueryDescription, Report, ReportVersion};
pub use schema::{fold_name, names_match, Field, LogicalType, TableSchema};
