//! Reserved keyword dictionary and identifier quoting

use sqlparser::keywords::{
    ALL_KEYWORDS, ALL_KEYWORDS_INDEX, RESERVED_FOR_COLUMN_ALIAS, RESERVED_FOR_IDENTIFIER,
    RESERVED_FOR_TABLE_ALIAS,
};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Words that cannot be used as unquoted identifiers
const BUILTIN: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "CONSTRAINT", "CREATE",
    "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT", "EXISTS",
    "FALSE", "FOREIGN", "FROM", "FULL", "GROUP", "HAVING", "IN", "INDEX", "INNER", "INSERT",
    "INTERSECT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET",
    "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET", "TABLE",
    "THEN", "TRUE", "UNION", "UNIQUE", "UPDATE", "VALUES", "VIEW", "WHEN", "WHERE", "WITH", "XOR",
];

/// Case-insensitive keyword set
#[derive(Debug, Clone)]
pub struct ReservedKeywords {
    words: HashSet<String>,
}

impl ReservedKeywords {
    /// Create the built-in set
    pub fn new() -> Self {
        Self {
            words: BUILTIN.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Shared instance of the built-in set
    pub fn builtin() -> &'static ReservedKeywords {
        static BUILTIN_SET: OnceLock<ReservedKeywords> = OnceLock::new();
        BUILTIN_SET.get_or_init(ReservedKeywords::new)
    }

    /// Add extra words, e.g. from configuration
    pub fn with_extra<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words
            .extend(words.into_iter().map(|w| w.as_ref().to_ascii_uppercase()));
        self
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_ascii_uppercase())
    }

    /// Whether `name` must be quoted to read back as an identifier: it is
    /// not a plain word, it is in this set, or sqlparser refuses it as a
    /// bare name in some position
    pub fn needs_quoting(&self, name: &str) -> bool {
        let mut chars = name.chars();
        let plain = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        !plain || self.contains(name) || is_parser_reserved(name)
    }

    /// `name`, double-quoted when [`needs_quoting`](Self::needs_quoting)
    pub fn quote(&self, name: &str) -> String {
        if self.needs_quoting(name) {
            format!("\"{}\"", name.replace('"', "\"\""))
        } else {
            name.to_string()
        }
    }
}

impl Default for ReservedKeywords {
    fn default() -> Self {
        Self::new()
    }
}

/// Keywords sqlparser reserves against table aliases, column aliases or
/// identifiers
fn is_parser_reserved(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    let Ok(index) = ALL_KEYWORDS.binary_search(&upper.as_str()) else {
        return false;
    };
    let keyword = ALL_KEYWORDS_INDEX[index];
    RESERVED_FOR_TABLE_ALIAS.contains(&keyword)
        || RESERVED_FOR_COLUMN_ALIAS.contains(&keyword)
        || RESERVED_FOR_IDENTIFIER.contains(&keyword)
}
