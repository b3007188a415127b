//! Report schema (stable v1)
//!
//! Serializable description of a parse attempt: either the resolved query
//! or the error. This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::error::ParserError;
use crate::query::{ColumnKind, ExpandedSource, OrderByTarget, QuerySchema};
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub position: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Column descriptor as listed in the statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnEntry {
    pub position: usize,

    /// `field`, `asterisk` or `expression`
    pub kind: String,

    /// SQL text of the column, without alias
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_position: Option<usize>,

    pub visible: bool,
}

/// Column of the expanded list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedEntry {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_position: Option<usize>,

    /// Index of the originating column descriptor
    pub column: usize,

    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByEntry {
    pub target: String,
    pub ascending: bool,
}

/// Description of a successfully built query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescription {
    /// Re-serialized statement
    pub sql: String,

    pub tables: Vec<TableEntry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_table: Option<String>,

    pub columns: Vec<ColumnEntry>,

    pub expanded: Vec<ExpandedEntry>,

    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_expression: Option<String>,

    pub order_by: Vec<OrderByEntry>,

    /// Index in `expanded` of each master table primary key field
    pub pkey_fields_order: Vec<Option<usize>>,
}

impl QueryDescription {
    /// Describe a built query
    pub fn from_query(query: &QuerySchema) -> Self {
        let tables = query
            .tables()
            .iter()
            .enumerate()
            .map(|(position, t)| TableEntry {
                position,
                name: t.table.name.clone(),
                alias: t.alias.clone(),
            })
            .collect();

        let columns = query
            .columns()
            .iter()
            .enumerate()
            .map(|(position, c)| {
                let (kind, text) = match &c.kind {
                    ColumnKind::Field(f) => ("field", f.field.clone()),
                    ColumnKind::Asterisk { scope: None } => ("asterisk", "*".to_string()),
                    ColumnKind::Asterisk { scope: Some(pos) } => {
                        let key = query.tables().get(*pos).map(|t| t.key()).unwrap_or_default();
                        ("asterisk", format!("{}.*", key))
                    }
                    ColumnKind::Expression(expr) => ("expression", expr.to_string()),
                };
                ColumnEntry {
                    position,
                    kind: kind.to_string(),
                    text,
                    alias: query.column_alias(position),
                    table_position: query.table_bound_to_column(position),
                    visible: c.visible,
                }
            })
            .collect();

        let expanded = query
            .fields_expanded()
            .iter()
            .map(|c| ExpandedEntry {
                name: c.name().to_string(),
                table: match &c.source {
                    ExpandedSource::Field(f) => Some(f.table.name.clone()),
                    ExpandedSource::Expression(_) => None,
                },
                table_position: c.table_position(),
                column: c.column,
                visible: c.visible,
            })
            .collect();

        let order_by = query
            .order_by()
            .iter()
            .map(|o| OrderByEntry {
                target: match &o.target {
                    OrderByTarget::Column(i) => query
                        .column_alias(*i)
                        .unwrap_or_else(|| format!("column {}", i + 1)),
                    OrderByTarget::Position(p) => format!("#{}", p + 1),
                    OrderByTarget::Field { table_position, field } => {
                        let key = query
                            .tables()
                            .get(*table_position)
                            .map(|t| t.key())
                            .unwrap_or_default();
                        format!("{}.{}", key, field)
                    }
                },
                ascending: o.ascending,
            })
            .collect();

        Self {
            sql: query.to_sql(),
            tables,
            master_table: query.master_table().map(|t| t.name.clone()),
            columns,
            expanded,
            where_expression: query.where_expression().map(|e| e.to_string()),
            order_by,
            pkey_fields_order: query.pkey_fields_order(),
        }
    }
}

/// Result of one parse attempt (report.json v1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Statement as given
    pub statement: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryDescription>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ParserError>,
}

impl Report {
    /// Report for a successfully built query
    pub fn from_query(statement: impl Into<String>, query: &QuerySchema) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            statement: statement.into(),
            query: Some(QueryDescription::from_query(query)),
            error: None,
        }
    }

    /// Report for a failed parse
    pub fn from_error(statement: impl Into<String>, error: ParserError) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            statement: statement.into(),
            query: None,
            error: Some(error),
        }
    }

    /// Check if the report has an error
    pub fn has_errors(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, LogicalType, TableSchema};
    use std::sync::Arc;

    fn customers() -> Arc<TableSchema> {
        Arc::new(
            TableSchema::new("customers")
                .with_field(Field::new("id", LogicalType::Int).with_primary_key())
                .with_field(Field::new("name", LogicalType::String)),
        )
    }

    #[test]
    fn describe_select_star() {
        let query = QuerySchema::from_table(customers());
        let report = Report::from_query("SELECT * FROM customers", &query);

        assert!(!report.has_errors());
        let description = report.query.unwrap();
        assert_eq!(description.sql, "SELECT * FROM customers");
        assert_eq!(description.master_table.as_deref(), Some("customers"));
        assert_eq!(description.columns[0].kind, "asterisk");
        assert_eq!(description.expanded.len(), 2);
        assert_eq!(description.pkey_fields_order, vec![Some(0)]);
    }

    #[test]
    fn error_report_serialization() {
        let report = Report::from_error(
            "SELECT * FROM nowhere",
            ParserError::reference("Table \"nowhere\" does not exist").at("nowhere", Some(14)),
        );
        assert!(report.has_errors());

        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"error\""));
        assert!(!json.contains("\"query\""));
    }
}
