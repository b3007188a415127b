//! In-memory query schema
//!
//! A `QuerySchema` is the normalized form of a SELECT statement: the FROM
//! tables (with aliases), the output column descriptors, and the WHERE and
//! ORDER BY clauses. Tables are shared catalog handles; expression nodes are
//! owned by the schema.

use crate::expr::{ExprNode, VariableBinding};
use crate::keywords::ReservedKeywords;
use crate::schema::{names_match, Field, TableSchema};
use std::sync::Arc;

/// A table in the FROM section
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTable {
    /// Catalog table
    pub table: Arc<TableSchema>,

    /// Alias, stored as written
    pub alias: Option<String>,
}

impl QueryTable {
    /// Alias if present, else table name
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table.name)
    }
}

/// A column bound to a table field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldColumn {
    /// Table owning the field
    pub table: Arc<TableSchema>,

    /// Field name as declared in the table
    pub field: String,

    /// FROM position the column is bound to; `None` when not bound to a
    /// specific position
    pub table_position: Option<usize>,
}

impl FieldColumn {
    /// Catalog field, if the table still has it
    pub fn field(&self) -> Option<&Field> {
        self.table.field(&self.field)
    }
}

/// What a column descriptor stands for
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// Bound field reference
    Field(FieldColumn),

    /// `*` (scope `None`) or `table.*` (scope = FROM position)
    Asterisk { scope: Option<usize> },

    /// Arbitrary expression owned by the query
    Expression(ExprNode),
}

/// One entry of the output column list
#[derive(Debug, Clone, PartialEq)]
pub struct QueryColumn {
    pub kind: ColumnKind,

    /// Stored as written, compared case-insensitively
    pub alias: Option<String>,

    pub visible: bool,
}

impl QueryColumn {
    fn new(kind: ColumnKind, visible: bool) -> Self {
        Self {
            kind,
            alias: None,
            visible,
        }
    }

    pub fn is_asterisk(&self) -> bool {
        matches!(self.kind, ColumnKind::Asterisk { .. })
    }

    pub fn is_expression(&self) -> bool {
        matches!(self.kind, ColumnKind::Expression(_))
    }
}

/// Where an expanded column comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandedSource {
    Field(FieldColumn),

    /// Index into `QuerySchema::columns`
    Expression(usize),
}

/// A column of the fully expanded list, see `QuerySchema::fields_expanded`
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedColumn {
    pub source: ExpandedSource,

    /// Explicit alias, or the generated alias of an expression column
    pub alias: Option<String>,

    pub visible: bool,

    /// Index of the originating entry in `QuerySchema::columns`
    pub column: usize,

    /// Whether this entry comes from an asterisk
    pub from_asterisk: bool,
}

impl ExpandedColumn {
    /// Alias if present, else the field name
    pub fn name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        match &self.source {
            ExpandedSource::Field(f) => &f.field,
            ExpandedSource::Expression(_) => "",
        }
    }

    pub fn table_position(&self) -> Option<usize> {
        match &self.source {
            ExpandedSource::Field(f) => f.table_position,
            ExpandedSource::Expression(_) => None,
        }
    }
}

/// Resolved ORDER BY target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderByTarget {
    /// Output column, by alias or name (index into `columns`)
    Column(usize),

    /// Output column by 1-based position (stored 0-based, index into
    /// `fields_expanded()`)
    Position(usize),

    /// Table field that is not necessarily an output column
    Field { table_position: usize, field: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByColumn {
    pub target: OrderByTarget,
    pub ascending: bool,
}

/// Errors raised when a mutation would break a query invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Table \"{0}\" is not used in the query")]
    TableNotInQuery(String),

    #[error("No table at FROM position {0}")]
    TablePositionOutOfRange(usize),

    #[error("No column at position {0}")]
    ColumnOutOfRange(usize),

    #[error("Table at FROM position {0} is still referenced")]
    TableInUse(usize),
}

/// Normalized SELECT statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySchema {
    tables: Vec<QueryTable>,
    columns: Vec<QueryColumn>,
    master_table: Option<Arc<TableSchema>>,
    where_expression: Option<ExprNode>,
    order_by: Vec<OrderByColumn>,
    statement: Option<String>,
}

impl QuerySchema {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Equivalent of `SELECT * FROM table`
    pub fn from_table(table: Arc<TableSchema>) -> Self {
        let mut query = Self::new();
        query.add_table(Arc::clone(&table), None);
        query.master_table = Some(table);
        query.add_asterisk(None, true);
        query
    }

    /// Remove all tables, columns and clauses
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ---- tables -------------------------------------------------------

    /// FROM tables in declaration order
    pub fn tables(&self) -> &[QueryTable] {
        &self.tables
    }

    /// Append a FROM table; returns its position
    pub fn add_table(&mut self, table: Arc<TableSchema>, alias: Option<String>) -> usize {
        let alias = alias.filter(|a| !a.is_empty());
        self.tables.push(QueryTable { table, alias });
        self.tables.len() - 1
    }

    /// Remove the table at `position`.
    ///
    /// Fails while a column, the WHERE clause or an ORDER BY entry still
    /// references that position. References to later positions are shifted.
    pub fn remove_table(&mut self, position: usize) -> Result<QueryTable, QueryError> {
        if position >= self.tables.len() {
            return Err(QueryError::TablePositionOutOfRange(position));
        }
        if self.references_position(position) {
            return Err(QueryError::TableInUse(position));
        }

        let removed = self.tables.remove(position);
        self.shift_positions_after(position);

        let still_used = self
            .tables
            .iter()
            .any(|t| t.table.same_table(&removed.table));
        if !still_used
            && self
                .master_table
                .as_ref()
                .is_some_and(|m| m.same_table(&removed.table))
        {
            self.master_table = None;
        }

        Ok(removed)
    }

    /// First table named `name` (case-insensitive)
    pub fn table(&self, name: &str) -> Option<&Arc<TableSchema>> {
        self.tables
            .iter()
            .find(|t| t.table.has_name(name))
            .map(|t| &t.table)
    }

    /// Whether `table` is used in the FROM section
    pub fn contains(&self, table: &TableSchema) -> bool {
        self.tables.iter().any(|t| t.table.same_table(table))
    }

    /// Alias of the table at `position`
    pub fn table_alias(&self, position: usize) -> Option<&str> {
        self.tables.get(position).and_then(|t| t.alias.as_deref())
    }

    pub fn has_table_alias(&self, position: usize) -> bool {
        self.table_alias(position).is_some()
    }

    /// Set or clear (empty string) the alias of the table at `position`
    pub fn set_table_alias(&mut self, position: usize, alias: &str) -> Result<(), QueryError> {
        let table = self
            .tables
            .get_mut(position)
            .ok_or(QueryError::TablePositionOutOfRange(position))?;
        table.alias = if alias.is_empty() {
            None
        } else {
            Some(alias.to_string())
        };
        Ok(())
    }

    /// First FROM position of table `name`
    pub fn table_position(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.table.has_name(name))
    }

    /// Every FROM position of table `name`
    pub fn table_positions(&self, name: &str) -> Vec<usize> {
        self.tables
            .iter()
            .enumerate()
            .filter(|(_, t)| t.table.has_name(name))
            .map(|(i, _)| i)
            .collect()
    }

    /// First FROM position carrying alias `alias`
    pub fn table_position_for_alias(&self, alias: &str) -> Option<usize> {
        self.tables.iter().position(|t| {
            t.alias
                .as_deref()
                .is_some_and(|a| names_match(a, alias))
        })
    }

    // ---- master table -------------------------------------------------

    /// Table whose rows are editable through this query.
    ///
    /// Without an explicit master, a query whose FROM positions all use the
    /// same table (e.g. `FROM t t1, t t2`) reports that table.
    pub fn master_table(&self) -> Option<&Arc<TableSchema>> {
        if let Some(master) = &self.master_table {
            return Some(master);
        }
        let first = &self.tables.first()?.table;
        if self.tables.iter().all(|t| t.table.same_table(first)) {
            Some(first)
        } else {
            None
        }
    }

    /// Set the master table; it must already be used in the query
    pub fn set_master_table(&mut self, table: Arc<TableSchema>) -> Result<(), QueryError> {
        if !self.contains(&table) {
            return Err(QueryError::TableNotInQuery(table.name.clone()));
        }
        self.master_table = Some(table);
        Ok(())
    }

    // ---- columns ------------------------------------------------------

    /// Output column descriptors, in SELECT order
    pub fn columns(&self) -> &[QueryColumn] {
        &self.columns
    }

    pub fn column(&self, position: usize) -> Option<&QueryColumn> {
        self.columns.get(position)
    }

    /// Append a field column bound to `table_position`
    pub fn add_field(
        &mut self,
        table: Arc<TableSchema>,
        field: impl Into<String>,
        table_position: Option<usize>,
        visible: bool,
    ) -> Result<usize, QueryError> {
        match table_position {
            Some(pos) => {
                let bound = self
                    .tables
                    .get(pos)
                    .ok_or(QueryError::TablePositionOutOfRange(pos))?;
                if !bound.table.same_table(&table) {
                    return Err(QueryError::TableNotInQuery(table.name.clone()));
                }
            }
            None if !self.contains(&table) => {
                return Err(QueryError::TableNotInQuery(table.name.clone()));
            }
            None => {}
        }

        let column = FieldColumn {
            table,
            field: field.into(),
            table_position,
        };
        self.columns
            .push(QueryColumn::new(ColumnKind::Field(column), visible));
        Ok(self.columns.len() - 1)
    }

    /// Append an asterisk; `scope` is a FROM position for `table.*`
    pub fn add_asterisk(&mut self, scope: Option<usize>, visible: bool) -> usize {
        self.columns
            .push(QueryColumn::new(ColumnKind::Asterisk { scope }, visible));
        self.columns.len() - 1
    }

    /// Append an expression column; the query takes ownership of `expr`
    pub fn add_expression(&mut self, expr: ExprNode, visible: bool) -> usize {
        self.columns
            .push(QueryColumn::new(ColumnKind::Expression(expr), visible));
        self.columns.len() - 1
    }

    /// Alias of the column at `position`.
    ///
    /// Expression columns without an explicit alias report a generated
    /// `expr<N>` alias, N being the 1-based ordinal among expression columns.
    pub fn column_alias(&self, position: usize) -> Option<String> {
        let column = self.columns.get(position)?;
        if let Some(alias) = &column.alias {
            return Some(alias.clone());
        }
        if column.is_expression() {
            let ordinal = self.columns[..=position]
                .iter()
                .filter(|c| c.is_expression())
                .count();
            return Some(format!("expr{}", ordinal));
        }
        None
    }

    /// Whether the column at `position` has an explicit alias
    pub fn has_column_alias(&self, position: usize) -> bool {
        self.columns
            .get(position)
            .is_some_and(|c| c.alias.is_some())
    }

    /// Set or clear (empty string) the alias of the column at `position`
    pub fn set_column_alias(&mut self, position: usize, alias: &str) -> Result<(), QueryError> {
        let column = self
            .columns
            .get_mut(position)
            .ok_or(QueryError::ColumnOutOfRange(position))?;
        column.alias = if alias.is_empty() {
            None
        } else {
            Some(alias.to_string())
        };
        Ok(())
    }

    /// Column carrying explicit alias `alias`
    pub fn column_position_for_alias(&self, alias: &str) -> Option<usize> {
        self.columns.iter().position(|c| {
            c.alias
                .as_deref()
                .is_some_and(|a| names_match(a, alias))
        })
    }

    pub fn is_column_visible(&self, position: usize) -> bool {
        self.columns.get(position).is_some_and(|c| c.visible)
    }

    pub fn set_column_visible(&mut self, position: usize, visible: bool) -> Result<(), QueryError> {
        let column = self
            .columns
            .get_mut(position)
            .ok_or(QueryError::ColumnOutOfRange(position))?;
        column.visible = visible;
        Ok(())
    }

    /// FROM position bound to the column at `position`; `None` for
    /// expressions, all-tables asterisks and unbound fields
    pub fn table_bound_to_column(&self, position: usize) -> Option<usize> {
        match &self.columns.get(position)?.kind {
            ColumnKind::Field(f) => f.table_position,
            ColumnKind::Asterisk { scope } => *scope,
            ColumnKind::Expression(_) => None,
        }
    }

    /// Column list with every asterisk replaced by the fields it stands for
    pub fn fields_expanded(&self) -> Vec<ExpandedColumn> {
        let mut out = Vec::new();
        for (index, column) in self.columns.iter().enumerate() {
            match &column.kind {
                ColumnKind::Field(f) => out.push(ExpandedColumn {
                    source: ExpandedSource::Field(f.clone()),
                    alias: column.alias.clone(),
                    visible: column.visible,
                    column: index,
                    from_asterisk: false,
                }),
                ColumnKind::Asterisk { scope } => {
                    let positions: Vec<usize> = match scope {
                        Some(pos) => vec![*pos],
                        None => (0..self.tables.len()).collect(),
                    };
                    for pos in positions {
                        let Some(query_table) = self.tables.get(pos) else {
                            continue;
                        };
                        for field in &query_table.table.fields {
                            out.push(ExpandedColumn {
                                source: ExpandedSource::Field(FieldColumn {
                                    table: Arc::clone(&query_table.table),
                                    field: field.name.clone(),
                                    table_position: Some(pos),
                                }),
                                alias: None,
                                visible: column.visible,
                                column: index,
                                from_asterisk: true,
                            });
                        }
                    }
                }
                ColumnKind::Expression(_) => out.push(ExpandedColumn {
                    source: ExpandedSource::Expression(index),
                    alias: self.column_alias(index),
                    visible: column.visible,
                    column: index,
                    from_asterisk: false,
                }),
            }
        }
        out
    }

    /// Look up an expanded column by alias, field name or `table.field`.
    ///
    /// `qualifier` is the table name or alias of a `table.field` reference.
    /// A column with an alias is only found by its alias. First match wins.
    /// With `include_asterisks == false` only explicitly listed columns are
    /// considered. Returns the index into `fields_expanded()` and the entry.
    pub fn column_info(
        &self,
        qualifier: Option<&str>,
        field_name: &str,
        include_asterisks: bool,
    ) -> Option<(usize, ExpandedColumn)> {
        self.fields_expanded()
            .into_iter()
            .enumerate()
            .filter(|(_, c)| include_asterisks || !c.from_asterisk)
            .find(|(_, c)| {
                if let Some(alias) = &c.alias {
                    return qualifier.is_none() && names_match(alias, field_name);
                }
                let ExpandedSource::Field(f) = &c.source else {
                    return false;
                };
                if !names_match(&f.field, field_name) {
                    return false;
                }
                match qualifier {
                    None => true,
                    Some(q) => {
                        f.table.has_name(q)
                            || f.table_position
                                .and_then(|p| self.table_alias(p))
                                .is_some_and(|a| names_match(a, q))
                    }
                }
            })
    }

    /// First FROM table having field `field_name`; `qualifier` restricts
    /// the search to a table name or alias
    pub fn find_table_field(
        &self,
        qualifier: Option<&str>,
        field_name: &str,
    ) -> Option<(usize, &Field)> {
        self.tables.iter().enumerate().find_map(|(pos, t)| {
            let qualifier_matches = qualifier.map_or(true, |q| {
                t.table.has_name(q) || t.alias.as_deref().is_some_and(|a| names_match(a, q))
            });
            if !qualifier_matches {
                return None;
            }
            t.table.field(field_name).map(|f| (pos, f))
        })
    }

    /// For each primary key field of the master table, its index in
    /// `fields_expanded()`, or `None` when the query does not include it
    pub fn pkey_fields_order(&self) -> Vec<Option<usize>> {
        let Some(master) = self.master_table() else {
            return Vec::new();
        };
        let expanded = self.fields_expanded();
        master
            .primary_key()
            .into_iter()
            .map(|pkey| {
                expanded.iter().position(|c| match &c.source {
                    ExpandedSource::Field(f) => {
                        f.table.same_table(master) && names_match(&f.field, &pkey.name)
                    }
                    ExpandedSource::Expression(_) => false,
                })
            })
            .collect()
    }

    /// Number of master table primary key fields included in the query
    pub fn pkey_fields_count(&self) -> usize {
        self.pkey_fields_order().iter().flatten().count()
    }

    /// Expanded columns of auto-incremented master table fields
    pub fn auto_increment_fields(&self) -> Vec<ExpandedColumn> {
        let Some(master) = self.master_table() else {
            return Vec::new();
        };
        self.fields_expanded()
            .into_iter()
            .filter(|c| match &c.source {
                ExpandedSource::Field(f) => {
                    f.table.same_table(master) && f.field().is_some_and(|fd| fd.auto_increment)
                }
                ExpandedSource::Expression(_) => false,
            })
            .collect()
    }

    // ---- clauses ------------------------------------------------------

    pub fn where_expression(&self) -> Option<&ExprNode> {
        self.where_expression.as_ref()
    }

    /// Replace the WHERE expression; `None` removes it
    pub fn set_where_expression(&mut self, expr: Option<ExprNode>) {
        self.where_expression = expr;
    }

    pub fn order_by(&self) -> &[OrderByColumn] {
        &self.order_by
    }

    /// Append an ORDER BY entry targeting a column, by index
    pub fn append_order_by_column(&mut self, column: usize, ascending: bool) -> Result<(), QueryError> {
        if column >= self.columns.len() {
            return Err(QueryError::ColumnOutOfRange(column));
        }
        self.order_by.push(OrderByColumn {
            target: OrderByTarget::Column(column),
            ascending,
        });
        Ok(())
    }

    /// Append an ORDER BY entry by 0-based position in `fields_expanded()`
    pub fn append_order_by_position(&mut self, position: usize, ascending: bool) -> Result<(), QueryError> {
        if position >= self.fields_expanded().len() {
            return Err(QueryError::ColumnOutOfRange(position));
        }
        self.order_by.push(OrderByColumn {
            target: OrderByTarget::Position(position),
            ascending,
        });
        Ok(())
    }

    /// Append an ORDER BY entry on a table field
    pub fn append_order_by_field(
        &mut self,
        table_position: usize,
        field: impl Into<String>,
        ascending: bool,
    ) -> Result<(), QueryError> {
        if table_position >= self.tables.len() {
            return Err(QueryError::TablePositionOutOfRange(table_position));
        }
        self.order_by.push(OrderByColumn {
            target: OrderByTarget::Field {
                table_position,
                field: field.into(),
            },
            ascending,
        });
        Ok(())
    }

    /// Original statement text, if kept
    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    pub fn set_statement(&mut self, statement: impl Into<String>) {
        self.statement = Some(statement.into());
    }

    // ---- serialization ------------------------------------------------

    /// Re-serialize to SQL text, quoting names the built-in keyword set
    /// or sqlparser reserves.
    ///
    /// Table aliases, column aliases and column order are kept, so parsing
    /// the result against the same catalog gives the same tables and columns.
    pub fn to_sql(&self) -> String {
        self.to_sql_with(ReservedKeywords::builtin())
    }

    /// Re-serialize to SQL text, quoting every name in `keywords`
    pub fn to_sql_with(&self, keywords: &ReservedKeywords) -> String {
        let columns: Vec<String> = (0..self.columns.len())
            .map(|i| {
                let column = &self.columns[i];
                let mut sql = self.column_sql(i, keywords);
                if let Some(alias) = &column.alias {
                    sql.push_str(" AS ");
                    sql.push_str(&keywords.quote(alias));
                }
                sql
            })
            .collect();

        let mut sql = format!("SELECT {}", columns.join(", "));

        if !self.tables.is_empty() {
            let tables: Vec<String> = self
                .tables
                .iter()
                .map(|t| match &t.alias {
                    Some(alias) => {
                        format!("{} {}", keywords.quote(&t.table.name), keywords.quote(alias))
                    }
                    None => keywords.quote(&t.table.name),
                })
                .collect();
            sql.push_str(" FROM ");
            sql.push_str(&tables.join(", "));
        }

        if let Some(expr) = &self.where_expression {
            sql.push_str(" WHERE ");
            sql.push_str(&expr.sql(keywords).to_string());
        }

        if !self.order_by.is_empty() {
            let items: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    let target = match &o.target {
                        OrderByTarget::Column(i) => match &self.columns[*i].alias {
                            Some(alias) => keywords.quote(alias),
                            None => self.column_sql(*i, keywords),
                        },
                        OrderByTarget::Position(p) => (p + 1).to_string(),
                        OrderByTarget::Field {
                            table_position,
                            field,
                        } => self.field_reference_sql(*table_position, field, keywords),
                    };
                    if o.ascending {
                        target
                    } else {
                        format!("{} DESC", target)
                    }
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }

        sql
    }

    fn column_sql(&self, position: usize, keywords: &ReservedKeywords) -> String {
        match &self.columns[position].kind {
            ColumnKind::Field(f) => match f.table_position {
                Some(pos) => self.field_reference_sql(pos, &f.field, keywords),
                None => keywords.quote(&f.field),
            },
            ColumnKind::Asterisk { scope: None } => "*".to_string(),
            ColumnKind::Asterisk { scope: Some(pos) } => match self.tables.get(*pos) {
                Some(t) => format!("{}.*", keywords.quote(t.key())),
                None => "*".to_string(),
            },
            ColumnKind::Expression(expr) => expr.sql(keywords).to_string(),
        }
    }

    /// `key.field` when the key names a single FROM position, else the bare
    /// field name (which binds to the first table having it)
    fn field_reference_sql(
        &self,
        table_position: usize,
        field: &str,
        keywords: &ReservedKeywords,
    ) -> String {
        let Some(table) = self.tables.get(table_position) else {
            return keywords.quote(field);
        };
        let key = table.key();
        let key_count = self
            .tables
            .iter()
            .filter(|t| names_match(t.key(), key))
            .count();
        if key_count == 1 {
            format!("{}.{}", keywords.quote(key), keywords.quote(field))
        } else {
            keywords.quote(field)
        }
    }

    /// Multi-line description for logs
    pub fn debug_string(&self) -> String {
        let mut out = String::from("SELECT:\n");
        for (i, column) in self.columns.iter().enumerate() {
            let alias = column
                .alias
                .as_deref()
                .map(|a| format!(" AS {}", a))
                .unwrap_or_default();
            let hidden = if column.visible { "" } else { " [hidden]" };
            out.push_str(&format!(
                "  {}: {}{}{}\n",
                i,
                self.column_sql(i, ReservedKeywords::builtin()),
                alias,
                hidden
            ));
        }
        out.push_str("FROM:\n");
        for (i, t) in self.tables.iter().enumerate() {
            match &t.alias {
                Some(alias) => out.push_str(&format!("  {}: {} AS {}\n", i, t.table.name, alias)),
                None => out.push_str(&format!("  {}: {}\n", i, t.table.name)),
            }
        }
        if let Some(master) = self.master_table() {
            out.push_str(&format!("MASTER: {}\n", master.name));
        }
        if let Some(expr) = &self.where_expression {
            out.push_str(&format!("WHERE: {}\n", expr));
        }
        if !self.order_by.is_empty() {
            out.push_str(&format!("ORDER BY: {:?}\n", self.order_by));
        }
        out
    }

    // ---- position bookkeeping ----------------------------------------

    fn references_position(&self, position: usize) -> bool {
        let in_columns = self.columns.iter().any(|c| match &c.kind {
            ColumnKind::Field(f) => f.table_position == Some(position),
            ColumnKind::Asterisk { scope } => *scope == Some(position),
            ColumnKind::Expression(expr) => expr_references(expr, position),
        });
        let in_where = self
            .where_expression
            .as_ref()
            .is_some_and(|e| expr_references(e, position));
        let in_order_by = self.order_by.iter().any(|o| {
            matches!(&o.target, OrderByTarget::Field { table_position, .. } if *table_position == position)
        });
        in_columns || in_where || in_order_by
    }

    fn shift_positions_after(&mut self, removed: usize) {
        let shift = |pos: &mut usize| {
            if *pos > removed {
                *pos -= 1;
            }
        };
        for column in &mut self.columns {
            match &mut column.kind {
                ColumnKind::Field(f) => {
                    if let Some(pos) = f.table_position.as_mut() {
                        shift(pos);
                    }
                }
                ColumnKind::Asterisk { scope } => {
                    if let Some(pos) = scope.as_mut() {
                        shift(pos);
                    }
                }
                ColumnKind::Expression(expr) => shift_expr_positions(expr, removed),
            }
        }
        if let Some(expr) = self.where_expression.as_mut() {
            shift_expr_positions(expr, removed);
        }
        for entry in &mut self.order_by {
            if let OrderByTarget::Field { table_position, .. } = &mut entry.target {
                shift(table_position);
            }
        }
    }
}

fn expr_references(expr: &ExprNode, position: usize) -> bool {
    expr.variables().iter().any(|v| match &v.binding {
        Some(VariableBinding::Field { table_position, .. })
        | Some(VariableBinding::TableAsterisk { table_position }) => *table_position == position,
        _ => false,
    })
}

fn shift_expr_positions(expr: &mut ExprNode, removed: usize) {
    expr.for_each_variable_mut(&mut |v| match &mut v.binding {
        Some(VariableBinding::Field { table_position, .. })
        | Some(VariableBinding::TableAsterisk { table_position }) => {
            if *table_position > removed {
                *table_position -= 1;
            }
        }
        _ => {}
    });
}
