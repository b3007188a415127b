//! Per-statement state
//!
//! [`ParseContext`] carries the query under construction and the map of
//! FROM keys (alias, or table name when unaliased) to the positions using
//! them. [`StatementText`] maps sqlparser locations and bare tokens back to
//! character offsets in the statement so errors can point at the offending
//! token.

use querybind_catalog::Catalog;
use querybind_core::{fold_name, QuerySchema};
use sqlparser::dialect::Dialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer};
use std::collections::HashMap;

/// State for building one SELECT statement
pub struct ParseContext<'a> {
    query: QuerySchema,
    catalog: &'a dyn Catalog,

    /// Folded table name or alias -> FROM positions, in FROM order
    repeated_tables_and_aliases: HashMap<String, Vec<usize>>,
}

impl<'a> ParseContext<'a> {
    /// Create a new context populating `query`
    pub fn new(query: QuerySchema, catalog: &'a dyn Catalog) -> Self {
        Self {
            query,
            catalog,
            repeated_tables_and_aliases: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog
    }

    pub fn query(&self) -> &QuerySchema {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut QuerySchema {
        &mut self.query
    }

    /// Record that FROM position `position` is reachable through `key`
    pub fn register_table_key(&mut self, key: &str, position: usize) {
        self.repeated_tables_and_aliases
            .entry(fold_name(key))
            .or_default()
            .push(position);
    }

    /// FROM positions using `key`, compared under [`fold_name`]
    pub fn positions_for(&self, key: &str) -> Option<&[usize]> {
        self.repeated_tables_and_aliases
            .get(&fold_name(key))
            .map(Vec::as_slice)
    }

    /// Finish the build and hand the query to the caller
    pub fn into_query(self) -> QuerySchema {
        self.query
    }
}

/// Statement text as sqlparser tokens with character offsets
///
/// Locations reported by sqlparser count characters from 1 on each line;
/// offsets here count characters from 0 across the whole statement.
#[derive(Debug, Clone)]
pub struct StatementText {
    /// Non-whitespace tokens and their offsets
    tokens: Vec<(Token, usize)>,

    /// Character offset of each line start
    line_starts: Vec<usize>,
    char_len: usize,
}

impl StatementText {
    /// Tokenize `sql` the way `dialect` does. Text that fails to tokenize
    /// keeps no tokens; the parser reports that failure itself.
    pub fn new(sql: &str, dialect: &dyn Dialect) -> Self {
        let mut line_starts = vec![0];
        let mut char_len = 0;
        for c in sql.chars() {
            char_len += 1;
            if c == '\n' {
                line_starts.push(char_len);
            }
        }

        let mut text = Self {
            tokens: Vec::new(),
            line_starts,
            char_len,
        };
        let tokens = Tokenizer::new(dialect, sql)
            .tokenize_with_location()
            .unwrap_or_default();
        let located: Vec<_> = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Whitespace(_) | Token::EOF))
            .filter_map(|t| Some((t.token, text.offset(t.span.start)?)))
            .collect();
        text.tokens = located;
        text
    }

    /// Length of the statement in characters
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Character offset of a sqlparser location; `None` for empty spans
    pub fn offset(&self, location: Location) -> Option<usize> {
        let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
        let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
        Some(self.line_starts.get(line)? + column)
    }

    /// Offset of the first unquoted `keyword` at or after `from`
    pub fn keyword_offset(&self, keyword: &str, from: usize) -> Option<usize> {
        self.tokens
            .iter()
            .find(|(token, offset)| {
                *offset >= from
                    && matches!(token, Token::Word(w)
                        if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
            })
            .map(|(_, offset)| *offset)
    }

    /// Offset of the first `token` at or after `from`
    pub fn token_offset(&self, token: &Token, from: usize) -> Option<usize> {
        self.tokens
            .iter()
            .find(|(t, offset)| *offset >= from && t == token)
            .map(|(_, offset)| *offset)
    }

    /// Offsets of the items of the comma-separated list starting at `from`
    ///
    /// The list ends at an unbalanced `)`, a `;` or the end of the
    /// statement; commas inside parentheses belong to the enclosing item.
    pub fn list_offsets(&self, from: usize) -> Vec<usize> {
        let mut offsets = Vec::new();
        let mut depth = 0usize;
        let mut item_start = true;

        for (token, offset) in self.tokens.iter().filter(|(_, offset)| *offset >= from) {
            match token {
                Token::RParen if depth == 0 => break,
                Token::SemiColon if depth == 0 => break,
                Token::Comma if depth == 0 => {
                    item_start = true;
                    continue;
                }
                _ => {}
            }
            if item_start {
                offsets.push(*offset);
                item_start = false;
            }
            match token {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                _ => {}
            }
        }
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querybind_catalog::MemoryCatalog;
    use sqlparser::dialect::GenericDialect;

    #[test]
    fn repeated_keys_ignore_case() {
        let catalog = MemoryCatalog::new();
        let mut ctx = ParseContext::new(QuerySchema::new(), &catalog);
        ctx.register_table_key("T", 0);
        ctx.register_table_key("t", 1);
        ctx.register_table_key("orders", 2);

        assert_eq!(ctx.positions_for("t"), Some(&[0, 1][..]));
        assert_eq!(ctx.positions_for("ORDERS"), Some(&[2][..]));
        assert!(ctx.positions_for("x").is_none());
    }

    #[test]
    fn folded_keys_are_ascii_only() {
        let catalog = MemoryCatalog::new();
        let mut ctx = ParseContext::new(QuerySchema::new(), &catalog);
        ctx.register_table_key("Ä", 0);

        assert_eq!(ctx.positions_for("Ä"), Some(&[0][..]));
        assert!(ctx.positions_for("ä").is_none());
    }

    fn text(sql: &str) -> StatementText {
        StatementText::new(sql, &GenericDialect {})
    }

    #[test]
    fn locations_to_offsets() {
        let text = text("SELECT a\nFROM t");

        assert_eq!(text.offset(Location::new(1, 8)), Some(7));
        assert_eq!(text.offset(Location::new(2, 6)), Some(14));
        assert_eq!(text.offset(Location::new(0, 0)), None);
        assert_eq!(text.offset(Location::new(3, 1)), None);
    }

    #[test]
    fn strings_and_comments_are_skipped() {
        let text = text("SELECT 'from' /* from */ FROM t -- where\n WHERE x = 1");

        assert_eq!(text.keyword_offset("FROM", 0), Some(25));
        assert_eq!(text.keyword_offset("where", 0), Some(42));
    }

    #[test]
    fn quoted_words_are_not_keywords() {
        let text = text("SELECT \"from\" FROM t");

        assert_eq!(text.keyword_offset("from", 0), Some(14));
        assert_eq!(text.char_len(), 20);
    }

    #[test]
    fn list_items() {
        let text = text("SELECT COUNT(*), f(a, b), c FROM t ORDER BY 2, c DESC");

        assert_eq!(text.list_offsets(13), vec![13]);
        assert_eq!(text.list_offsets(19), vec![19, 22]);
        let by = text.keyword_offset("BY", 0).unwrap();
        assert_eq!(text.list_offsets(by + 1), vec![44, 47]);
        assert_eq!(text.token_offset(&Token::LParen, 14), Some(18));
    }

    #[test]
    fn offsets_count_characters() {
        let text = text("SELECT 'żółw', name FROM t");
        assert_eq!(text.keyword_offset("name", 0), Some(15));
    }

    #[test]
    fn untokenizable_text_has_no_tokens() {
        let text = text("SELECT 'open");
        assert!(text.keyword_offset("SELECT", 0).is_none());
        assert_eq!(text.char_len(), 12);
    }
}
