//! SQL front-end
//!
//! Parses statement text with sqlparser, lowers the AST into builder
//! fragments and builds the [`QuerySchema`]. Every failure, from the
//! tokenizer up to name binding, comes back as one [`ParserError`].

use crate::builder::build_select_query;
use crate::context::StatementText;
use crate::lower::lower_query;
use querybind_catalog::Catalog;
use querybind_core::{Config, DialectConfig, ErrorKind, ParserError, QuerySchema, ReservedKeywords};
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::{Parser, ParserError as SqlError};
use sqlparser::tokenizer::{Location, Token};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Statement parser bound to a catalog
///
/// A parser holds no per-statement state; one instance can serve any
/// number of threads.
pub struct SqlParser {
    catalog: Arc<dyn Catalog>,
    dialect: Box<dyn Dialect + Send + Sync>,
    keywords: ReservedKeywords,
}

impl SqlParser {
    /// Create a new parser with the generic dialect and built-in keywords
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            dialect: Box::new(GenericDialect {}),
            keywords: ReservedKeywords::new(),
        }
    }

    /// Create a parser from a loaded config
    pub fn from_config(catalog: Arc<dyn Catalog>, config: &Config) -> Self {
        Self::new(catalog)
            .with_dialect(config.dialect)
            .with_reserved_keywords(&config.reserved_keywords)
    }

    /// Select the SQL dialect
    pub fn with_dialect(mut self, dialect: DialectConfig) -> Self {
        self.dialect = match dialect {
            DialectConfig::Ansi => Box::new(GenericDialect {}),
            DialectConfig::Postgres => Box::new(PostgreSqlDialect {}),
            DialectConfig::Sqlite => Box::new(SQLiteDialect {}),
            DialectConfig::Mysql => Box::new(MySqlDialect {}),
        };
        self
    }

    /// Add words to the reserved keyword dictionary
    pub fn with_reserved_keywords<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.keywords = self.keywords.with_extra(words);
        self
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn keywords(&self) -> &ReservedKeywords {
        &self.keywords
    }

    /// Render `query` as SQL, quoting names reserved by this parser
    pub fn to_sql(&self, query: &QuerySchema) -> String {
        query.to_sql_with(&self.keywords)
    }

    /// Parse one SELECT statement into a query schema
    pub fn parse(&self, sql: &str) -> Result<QuerySchema, ParserError> {
        let text = StatementText::new(sql, &*self.dialect);
        let end = Some(text.char_len());

        let result = self.parse_statement(sql, &text);
        match &result {
            Ok(query) => debug!(
                tables = query.tables().len(),
                columns = query.columns().len(),
                "statement parsed"
            ),
            Err(err) if err.kind == ErrorKind::Implementation => warn!(
                message = %err.message,
                token = %err.token,
                position = ?err.position,
                "internal error while parsing"
            ),
            Err(err) => debug!(
                kind = err.kind.as_str(),
                message = %err.message,
                token = %err.token,
                position = ?err.position,
                "statement rejected"
            ),
        }
        result.map_err(|err| err.or_at("", end))
    }

    fn parse_statement(&self, sql: &str, text: &StatementText) -> Result<QuerySchema, ParserError> {
        if sql.trim().is_empty() {
            return Err(ParserError::new(ErrorKind::Input, "No query specified"));
        }

        let mut statements = Parser::parse_sql(&*self.dialect, sql)
            .map_err(|err| self.convert_sql_error(err, text))?;

        let statement = match statements.len() {
            0 => return Err(ParserError::new(ErrorKind::Input, "No query specified")),
            1 => statements.remove(0),
            _ => {
                return Err(ParserError::syntax("Only one statement is supported")
                    .at(";", text.token_offset(&Token::SemiColon, 0)))
            }
        };

        let Statement::Query(query) = statement else {
            let keyword = sql.split_whitespace().next().unwrap_or_default();
            return Err(ParserError::syntax("Only SELECT statements are supported")
                .at(keyword, text.keyword_offset(keyword, 0)));
        };

        let parts = lower_query(&query, text, &self.keywords)?;
        let mut query = build_select_query(
            QuerySchema::new(),
            &*self.catalog,
            parts.columns,
            parts.tables,
            parts.options,
        )?;
        query.set_statement(sql);
        Ok(query)
    }

    /// Map a sqlparser error onto the token and offset it reports
    fn convert_sql_error(&self, err: SqlError, text: &StatementText) -> ParserError {
        let message = match err {
            SqlError::TokenizerError(msg) | SqlError::ParserError(msg) => msg,
            SqlError::RecursionLimitExceeded => {
                return ParserError::syntax("Statement is nested too deeply")
                    .at("", Some(text.char_len()))
            }
        };

        let Some(caps) = sql_error_regex().captures(&message) else {
            let position = location_regex()
                .captures(&message)
                .and_then(|c| location_offset(text, &c[1], &c[2]));
            return ParserError::syntax(format!("Syntax Error: {}", strip_location(&message)))
                .at("", position.or(Some(text.char_len())));
        };

        let expected = caps.name("expected").map_or("", |m| m.as_str());
        let found = caps.name("found").map_or("", |m| m.as_str());
        let (token, position) = match (caps.name("line"), caps.name("column")) {
            (Some(line), Some(column)) => (
                found.to_string(),
                location_offset(text, line.as_str(), column.as_str()),
            ),
            // EOF carries no location
            _ => (String::new(), Some(text.char_len())),
        };

        let mut msg = if !token.is_empty() && self.keywords.contains(&token) {
            format!("\"{}\" is a reserved keyword", token)
        } else {
            format!("Syntax Error near \"{}\"", token)
        };
        if expected.starts_with("identifier") {
            msg.push_str(": identifier was expected");
        }
        ParserError::syntax(msg).at(token, position)
    }
}

fn sql_error_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"Expected:? (?P<expected>.+?), found:? (?P<found>.+?)(?: at Line: (?P<line>\d+), Column:? (?P<column>\d+))?$",
        )
        .expect("error pattern is valid")
    })
}

fn location_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"at Line: (\d+), Column:? (\d+)").expect("location pattern is valid")
    })
}

fn strip_location(message: &str) -> &str {
    match message.find(" at Line:") {
        Some(idx) => &message[..idx],
        None => message,
    }
}

/// Character offset of the line/column pair in a sqlparser message
fn location_offset(text: &StatementText, line: &str, column: &str) -> Option<usize> {
    text.offset(Location::new(line.parse().ok()?, column.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use querybind_catalog::MemoryCatalogBuilder;
    use querybind_core::{Field, LogicalType, TableSchema};

    fn parser() -> SqlParser {
        let catalog = MemoryCatalogBuilder::new()
            .with_table(TableSchema::from_fields(
                "t",
                vec![Field::new("a", LogicalType::Int), Field::new("b", LogicalType::String)],
            ))
            .build()
            .unwrap();
        SqlParser::new(Arc::new(catalog))
    }

    #[test]
    fn blank_input() {
        for sql in ["", "   \n\t"] {
            let err = parser().parse(sql).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Input);
            assert_eq!(err.message, "No query specified");
        }
    }

    #[test]
    fn statement_is_kept() {
        let query = parser().parse("SELECT a FROM t").unwrap();
        assert_eq!(query.statement(), Some("SELECT a FROM t"));
    }

    #[test]
    fn reserved_keyword_where_identifier_expected() {
        let err = parser().parse("SELECT a FROM WHERE").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.message, "\"WHERE\" is a reserved keyword: identifier was expected");
        assert_eq!(err.token, "WHERE");
        assert_eq!(err.position, Some(14));
    }

    #[test]
    fn error_at_end_of_statement() {
        let err = parser().parse("SELECT a FROM").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.token, "");
        assert_eq!(err.position, Some(13));
    }

    #[test]
    fn only_select_statements() {
        let err = parser().parse("DELETE FROM t").unwrap_err();
        assert_eq!(err.message, "Only SELECT statements are supported");
        assert_eq!(err.position, Some(0));

        let err = parser().parse("SELECT a FROM t; SELECT b FROM t").unwrap_err();
        assert_eq!(err.message, "Only one statement is supported");
        assert_eq!(err.position, Some(15));
    }

    #[test]
    fn asterisk_without_tables() {
        let err = parser().parse("SELECT *").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Shape);
        assert_eq!(err.position, Some(7));
    }

    #[test]
    fn offsets_on_later_lines() {
        let text = StatementText::new("SELECT a\nFROM t", &GenericDialect {});
        assert_eq!(location_offset(&text, "2", "6"), Some(14));
        assert_eq!(location_offset(&text, "0", "1"), None);

        let err = parser().parse("SELECT a\nFROM t\nWHERE a >").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.position, Some(25));
    }

    #[test]
    fn to_sql_quotes_configured_keywords() {
        let parser = parser().with_reserved_keywords(&["b"]);
        let query = parser.parse("SELECT \"b\", a FROM t").unwrap();

        assert_eq!(parser.to_sql(&query), "SELECT t.\"b\", t.a FROM t");
        assert_eq!(query.to_sql(), "SELECT t.b, t.a FROM t");
    }
}
