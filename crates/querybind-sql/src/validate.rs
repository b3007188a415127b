//! Name binding for expression trees
//!
//! Every variable in a column or WHERE expression is bound to a FROM
//! position (or to an asterisk scope) before the expression is attached to
//! the query. The first failing variable stops validation.

use crate::context::ParseContext;
use querybind_core::{names_match, ExprNode, ParserError, VariableBinding, VariableExpr};
use tracing::trace;

/// Bind every variable of `expr`.
///
/// `asterisk_allowed` is true for a top-level column; asterisks are also
/// accepted as direct arguments of aggregates (`COUNT(*)`).
pub fn validate_expr(
    expr: &mut ExprNode,
    ctx: &ParseContext<'_>,
    asterisk_allowed: bool,
) -> Result<(), ParserError> {
    match expr {
        ExprNode::Variable(v) => {
            if v.is_asterisk() && !asterisk_allowed {
                return Err(ParserError::syntax(format!("Syntax Error near \"{}\"", v.name()))
                    .at(v.name(), v.position));
            }
            let binding = bind_variable(v, ctx)?;
            trace!(name = %v.name(), ?binding, "variable bound");
            v.binding = Some(binding);
            Ok(())
        }
        ExprNode::Aggregate(func) => {
            for arg in &mut func.args {
                validate_expr(arg, ctx, true)?;
            }
            Ok(())
        }
        ExprNode::SpecialBinary(alias) => Err(ParserError::syntax(format!(
            "Syntax Error near \"{}\"",
            alias.alias
        ))),
        _ => {
            for child in expr.children_mut() {
                validate_expr(child, ctx, false)?;
            }
            Ok(())
        }
    }
}

/// Resolve `*`, `table.*`, `table.field` or `field` against the FROM tables
pub fn bind_variable(
    v: &VariableExpr,
    ctx: &ParseContext<'_>,
) -> Result<VariableBinding, ParserError> {
    let located = |err: ParserError| err.at(v.name(), v.position);
    let parts: Vec<&str> = v.parts.iter().map(String::as_str).collect();

    match parts.as_slice() {
        ["*"] => Ok(VariableBinding::AllTablesAsterisk),
        [field] => bind_unqualified(field, ctx).map_err(located),
        [table, field] => bind_qualified(table, field, ctx).map_err(located),
        _ => Err(located(
            ParserError::reference("Field not found")
                .with_details(format!("Invalid field reference \"{}\"", v.name())),
        )),
    }
}

fn bind_unqualified(field_name: &str, ctx: &ParseContext<'_>) -> Result<VariableBinding, ParserError> {
    let query = ctx.query();
    let mut first: Option<(usize, String)> = None;

    for (position, query_table) in query.tables().iter().enumerate() {
        let Some(field) = query_table.table.field(field_name) else {
            continue;
        };
        match &first {
            None => first = Some((position, field.name.clone())),
            Some((first_position, _)) => {
                let first_table = &query.tables()[*first_position].table;
                if !first_table.same_table(&query_table.table) {
                    return Err(ParserError::ambiguity("Ambiguous field name").with_details(format!(
                        "Both table \"{}\" and \"{}\" have defined \"{}\" field. \
                         Use \"<tableName>.{}\" notation to specify table name.",
                        first_table.name, query_table.table.name, field_name, field_name
                    )));
                }
            }
        }
    }

    match first {
        Some((table_position, field)) => Ok(VariableBinding::Field {
            table_position,
            field,
        }),
        None => Err(ParserError::reference("Field not found").with_details(format!(
            "Table containing \"{}\" field not found",
            field_name
        ))),
    }
}

fn bind_qualified(
    table_name: &str,
    field_name: &str,
    ctx: &ParseContext<'_>,
) -> Result<VariableBinding, ParserError> {
    let query = ctx.query();

    // A table name is unusable when every position using it carries another alias
    let name_positions = query.table_positions(table_name);
    if !name_positions.is_empty() {
        let covering_alias = name_positions.iter().try_fold(None, |_, pos| {
            match query.table_alias(*pos) {
                Some(alias) if !names_match(alias, table_name) => Some(Some(alias)),
                _ => None,
            }
        });
        if let Some(Some(alias)) = covering_alias {
            return Err(
                ParserError::reference("Could not access the table directly using its name")
                    .with_details(format!(
                        "Table \"{}\" is covered by aliases. Instead of \"{}.{}\", you can write \"{}.{}\"",
                        table_name, table_name, field_name, alias, field_name
                    )),
            );
        }
    }

    let Some(positions) = ctx.positions_for(table_name) else {
        if !name_positions.is_empty() {
            return Err(ParserError::implementation(format!(
                "{}.{}: no FROM positions recorded",
                table_name, field_name
            )));
        }
        return Err(ParserError::reference(format!(
            "Table \"{}\" does not exist",
            table_name
        )));
    };

    if field_name == "*" {
        if positions.len() > 1 {
            return Err(
                ParserError::ambiguity(format!("Ambiguous \"{}.*\" expression", table_name))
                    .with_details(format!(
                        "More than one \"{}\" table or alias defined",
                        table_name
                    )),
            );
        }
        return Ok(VariableBinding::TableAsterisk {
            table_position: positions[0],
        });
    }

    if positions.len() > 1 {
        let containing = positions
            .iter()
            .filter(|pos| query.tables()[**pos].table.field(field_name).is_some())
            .count();
        let details = if containing > 1 {
            format!(
                "More than one \"{}\" table or alias defined containing \"{}\" field",
                table_name, field_name
            )
        } else {
            format!("More than one \"{}\" table or alias defined", table_name)
        };
        return Err(ParserError::ambiguity(format!(
            "Ambiguous \"{}.{}\" expression",
            table_name, field_name
        ))
        .with_details(details));
    }

    let table_position = positions[0];
    let table = &query.tables()[table_position].table;
    match table.field(field_name) {
        Some(field) => Ok(VariableBinding::Field {
            table_position,
            field: field.name.clone(),
        }),
        None => Err(ParserError::reference("Field not found").with_details(format!(
            "Table \"{}\" has no \"{}\" field",
            table_name, field_name
        ))),
    }
}
