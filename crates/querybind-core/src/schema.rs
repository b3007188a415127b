//! Table schemas and the canonical type system
//!
//! These are the catalog-side types: a query never owns them, it only holds
//! shared references (`Arc<TableSchema>`) handed out by a catalog.

use serde::{Deserialize, Serialize};

/// Fold a table, field or alias name for comparison.
///
/// Names compare ASCII case-insensitively, the way SQL folds keywords;
/// other characters must match exactly. Every name lookup goes through
/// this function or [`names_match`].
pub fn fold_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Whether two names are equal under [`fold_name`]
pub fn names_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Portable logical type system
///
/// Maps engine-specific column types to a common representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    /// Boolean type
    Bool,

    /// Integer type (any precision)
    Int,

    /// Floating point (any precision)
    Float,

    /// Decimal with precision and scale
    Decimal {
        precision: Option<u16>,
        scale: Option<u16>,
    },

    /// String/text type
    String,

    /// Date (no time component)
    Date,

    /// Timestamp (with time component)
    Timestamp,

    /// Binary large object
    Blob,

    /// Unknown type (cannot infer)
    Unknown,
}

impl Default for LogicalType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "BOOL"),
            Self::Int => write!(f, "INT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Decimal { precision, scale } => {
                match (precision, scale) {
                    (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                    (Some(p), None) => write!(f, "DECIMAL({})", p),
                    _ => write!(f, "DECIMAL"),
                }
            }
            Self::String => write!(f, "STRING"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Blob => write!(f, "BLOB"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A field (column) of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Field name, stored as declared
    pub name: String,

    /// Logical type
    #[serde(rename = "type", default)]
    pub logical_type: LogicalType,

    /// Part of the table's primary key
    #[serde(default)]
    pub primary_key: bool,

    /// Value generated by the engine on insert
    #[serde(default)]
    pub auto_increment: bool,

    /// NOT NULL constraint
    #[serde(default)]
    pub not_null: bool,
}

impl Field {
    /// Create a new nullable, non-key field
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            primary_key: false,
            auto_increment: false,
            not_null: false,
        }
    }

    /// Mark as primary key (implies NOT NULL)
    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// Mark as auto-incremented
    pub fn with_auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set NOT NULL
    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Case-insensitive name comparison
    pub fn has_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

/// A table known to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name, stored as declared
    pub name: String,

    /// Optional human-readable caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Ordered list of fields
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl TableSchema {
    /// Create a new table without fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            caption: None,
            fields: Vec::new(),
        }
    }

    /// Create a table from fields
    pub fn from_fields(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            caption: None,
            fields,
        }
    }

    /// Append a field
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Set caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Find a field by name (case-insensitive)
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.has_name(name))
    }

    /// Position of a field by name (case-insensitive)
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.has_name(name))
    }

    /// Get field names
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Fields making up the primary key, in declaration order
    pub fn primary_key(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.primary_key).collect()
    }

    /// Case-insensitive name comparison
    pub fn has_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }

    /// Whether two schema handles describe the same catalog table
    pub fn same_table(&self, other: &TableSchema) -> bool {
        std::ptr::eq(self, other) || self.has_name(&other.name)
    }
}
