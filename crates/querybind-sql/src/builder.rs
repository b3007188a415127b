//! SELECT query builder
//!
//! Turns the fragments produced by the grammar layer (FROM list, column
//! list, WHERE/ORDER BY options) into a [`QuerySchema`]. Tables are
//! resolved first, then columns, then the WHERE and ORDER BY clauses; the
//! first error stops the build and the partially built query is dropped.

use crate::context::ParseContext;
use crate::validate::validate_expr;
use querybind_catalog::Catalog;
use querybind_core::{
    AliasExpr, ExprClass, ExprNode, NArgExpr, ParserError, QueryError, QuerySchema, VariableBinding,
    VariableExpr,
};
use std::sync::Arc;
use tracing::debug;

/// One ORDER BY entry as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByItem {
    /// Name parts of a column alias, column name or `table.field`; the
    /// literal digits for an output position
    pub parts: Vec<String>,

    /// 1-based output position when the entry is an integer literal
    pub column_number: Option<usize>,

    pub ascending: bool,

    /// Character offset of the entry in the statement
    pub position: Option<usize>,
}

impl OrderByItem {
    /// Entry naming a column or field, written as a dotted name
    pub fn name(alias_or_name: impl AsRef<str>, ascending: bool) -> Self {
        let parts = alias_or_name.as_ref().split('.').map(str::to_string).collect();
        Self::from_parts(parts, ascending)
    }

    /// Entry naming a column or field by its parsed name parts
    pub fn from_parts(parts: Vec<String>, ascending: bool) -> Self {
        Self {
            parts,
            column_number: None,
            ascending,
            position: None,
        }
    }

    /// Entry giving a 1-based output position
    pub fn number(column_number: usize, ascending: bool) -> Self {
        Self {
            parts: vec![column_number.to_string()],
            column_number: Some(column_number),
            ascending,
            position: None,
        }
    }

    pub fn at(mut self, position: Option<usize>) -> Self {
        self.position = position;
        self
    }

    /// The entry as written, parts joined with `.`
    pub fn alias_or_name(&self) -> String {
        self.parts.join(".")
    }

    /// Table qualifier (the part before the field name), if any
    fn qualifier(&self) -> Option<&str> {
        self.parts
            .len()
            .checked_sub(2)
            .map(|i| self.parts[i].as_str())
    }

    fn field_name(&self) -> &str {
        self.parts.last().map_or("", String::as_str)
    }
}

/// Optional clauses of a SELECT
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    pub where_expr: Option<ExprNode>,

    /// ORDER BY entries in reduction order: the last declared entry first
    pub order_by: Vec<OrderByItem>,
}

/// Expression classes accepted as expression columns
fn is_expression_column(class: ExprClass) -> bool {
    matches!(
        class,
        ExprClass::Constant
            | ExprClass::Unary
            | ExprClass::Arithmetic
            | ExprClass::Logical
            | ExprClass::Relational
            | ExprClass::Function
            | ExprClass::Aggregate
    )
}

fn implementation_error(err: QueryError) -> ParserError {
    ParserError::implementation(err.to_string())
}

/// Populate `query` from parsed fragments.
///
/// `query` is expected to be empty. On success the populated query is
/// returned; on failure it is dropped and the first error is returned.
pub fn build_select_query(
    query: QuerySchema,
    catalog: &dyn Catalog,
    columns: Option<NArgExpr>,
    tables: Option<NArgExpr>,
    options: Option<SelectOptions>,
) -> Result<QuerySchema, ParserError> {
    let mut ctx = ParseContext::new(query, catalog);

    if let Some(tables) = tables {
        add_tables(&mut ctx, tables)?;
    }

    // Master table when there's only one
    if let [only] = ctx.query().tables() {
        let table = Arc::clone(&only.table);
        ctx.query_mut()
            .set_master_table(table)
            .map_err(implementation_error)?;
    }

    if let Some(columns) = columns {
        for (column_number, item) in columns.args.into_iter().enumerate() {
            add_column_item(&mut ctx, column_number, item)?;
        }
    }

    if let Some(options) = options {
        if let Some(mut where_expr) = options.where_expr {
            validate_expr(&mut where_expr, &ctx, false)?;
            debug!(expr = %where_expr, "WHERE attached");
            ctx.query_mut().set_where_expression(Some(where_expr));
        }

        // Reduction order is reversed; walking it backwards restores the
        // declared order
        for item in options.order_by.iter().rev() {
            add_order_by(&mut ctx, item)?;
        }
    }

    Ok(ctx.into_query())
}

fn add_tables(ctx: &mut ParseContext<'_>, tables: NArgExpr) -> Result<(), ParserError> {
    for (position, item) in tables.args.into_iter().enumerate() {
        let (table_var, alias) = match item {
            ExprNode::Variable(v) => (v, None),
            ExprNode::SpecialBinary(AliasExpr { expr, alias, .. }) => match (*expr, *alias) {
                (ExprNode::Variable(v), ExprNode::Variable(alias)) => (v, Some(alias.name())),
                (expr, _) => {
                    return Err(ParserError::implementation(format!(
                        "Invalid table list item \"{}\"",
                        expr
                    )))
                }
            },
            other => {
                return Err(ParserError::implementation(format!(
                    "Invalid table list item \"{}\"",
                    other
                )))
            }
        };

        let table_name = table_var.name();
        let Some(table) = ctx.catalog().lookup_table(&table_name) else {
            return Err(
                ParserError::reference(format!("Table \"{}\" does not exist", table_name))
                    .at(table_name, table_var.position),
            );
        };

        let key = alias.clone().unwrap_or(table_name);
        ctx.register_table_key(&key, position);
        debug!(table = %table.name, alias = ?alias, position, "FROM table resolved");
        ctx.query_mut().add_table(table, alias);
    }
    Ok(())
}

fn add_column_item(
    ctx: &mut ParseContext<'_>,
    column_number: usize,
    item: ExprNode,
) -> Result<(), ParserError> {
    let (column_expr, alias) = match item {
        ExprNode::SpecialBinary(AliasExpr { expr, alias, .. }) => match *alias {
            ExprNode::Variable(alias) => (*expr, Some(alias.name())),
            _ => {
                return Err(ParserError::shape(format!(
                    "Invalid alias definition for column \"{}\"",
                    expr
                )))
            }
        },
        other => (other, None),
    };

    let class = column_expr.class();
    if class != ExprClass::Variable && !is_expression_column(class) {
        return Err(ParserError::shape(format!(
            "Invalid \"{}\" column definition",
            column_expr
        )));
    }

    add_column(ctx, column_expr)?;

    if let Some(alias) = alias {
        ctx.query_mut()
            .set_column_alias(column_number, &alias)
            .map_err(implementation_error)?;
        debug!(column = column_number, alias = %alias, "column alias set");
    }
    Ok(())
}

/// Append one validated column: `*`, `table.*`, `[table.]field` or an
/// expression
fn add_column(ctx: &mut ParseContext<'_>, mut column_expr: ExprNode) -> Result<(), ParserError> {
    validate_expr(&mut column_expr, ctx, true)?;

    let v = match column_expr {
        ExprNode::Variable(v) => v,
        expr => {
            debug!(expr = %expr, "expression column added");
            ctx.query_mut().add_expression(expr, true);
            return Ok(());
        }
    };

    match &v.binding {
        Some(VariableBinding::AllTablesAsterisk) => {
            if ctx.query().tables().is_empty() {
                return Err(ParserError::shape(
                    "\"*\" could not be used if no tables are specified",
                )
                .at(v.name(), v.position));
            }
            ctx.query_mut().add_asterisk(None, true);
        }
        Some(VariableBinding::TableAsterisk { table_position }) => {
            ctx.query_mut().add_asterisk(Some(*table_position), true);
        }
        Some(VariableBinding::Field {
            table_position,
            field,
        }) => {
            let table = bound_table(ctx, &v, *table_position)?;
            ctx.query_mut()
                .add_field(table, field.clone(), Some(*table_position), true)
                .map_err(implementation_error)?;
        }
        None => {
            return Err(ParserError::implementation(format!(
                "Unbound column \"{}\"",
                v.name()
            )))
        }
    }
    debug!(column = %v.name(), binding = ?v.binding, "column added");
    Ok(())
}

fn bound_table(
    ctx: &ParseContext<'_>,
    v: &VariableExpr,
    table_position: usize,
) -> Result<Arc<querybind_core::TableSchema>, ParserError> {
    ctx.query()
        .tables()
        .get(table_position)
        .map(|t| Arc::clone(&t.table))
        .ok_or_else(|| {
            ParserError::implementation(format!(
                "\"{}\" bound to missing FROM position {}",
                v.name(),
                table_position
            ))
        })
}

/// Resolve one ORDER BY entry: output column by alias or name, then
/// output position, then any field of the FROM tables
fn add_order_by(ctx: &mut ParseContext<'_>, item: &OrderByItem) -> Result<(), ParserError> {
    let entry = item.alias_or_name();
    let located = |err: ParserError| err.at(entry.clone(), item.position);

    if let Some((_, info)) = ctx
        .query()
        .column_info(item.qualifier(), item.field_name(), false)
    {
        ctx.query_mut()
            .append_order_by_column(info.column, item.ascending)
            .map_err(implementation_error)?;
        debug!(entry = %entry, ascending = item.ascending, "ORDER BY column");
        return Ok(());
    }

    if let Some(number) = item.column_number {
        let appended = number
            .checked_sub(1)
            .map(|index| ctx.query_mut().append_order_by_position(index, item.ascending));
        return match appended {
            Some(Ok(())) => {
                debug!(position = number, ascending = item.ascending, "ORDER BY position");
                Ok(())
            }
            _ => Err(located(ParserError::reference(format!(
                "Could not define sorting - no column at position {}",
                number
            )))),
        };
    }

    let Some((table_position, field)) = ctx
        .query()
        .find_table_field(item.qualifier(), item.field_name())
        .map(|(pos, f)| (pos, f.name.clone()))
    else {
        return Err(located(ParserError::reference(format!(
            "Could not define sorting - column name or alias \"{}\" does not exist",
            entry
        ))));
    };

    ctx.query_mut()
        .append_order_by_field(table_position, field, item.ascending)
        .map_err(implementation_error)?;
    debug!(entry = %entry, ascending = item.ascending, "ORDER BY field");
    Ok(())
}
