//! Lowering of sqlparser's AST into builder fragments
//!
//! The builder works on a small expression vocabulary ([`ExprNode`]); this
//! module maps a parsed `SELECT` onto it and rejects everything the builder
//! does not model. Names are located through the spans sqlparser attaches
//! to identifiers; literals and keywords carry no span and are located
//! through the statement's token stream.

use crate::builder::{OrderByItem, SelectOptions};
use crate::context::StatementText;
use querybind_core::{
    AliasExpr, BinaryOp, ConstValue, ExprNode, NArgExpr, ParserError, ReservedKeywords, UnaryOp,
    VariableExpr,
};
use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr,
    Ident, OrderByExpr, Query, Select, SelectItem, SetExpr, TableFactor, TableWithJoins,
    UnaryOperator, Value, WildcardAdditionalOptions,
};
use sqlparser::tokenizer::Token;
use tracing::trace;

/// Aggregate function names (compared case-insensitively)
const AGGREGATES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// Builder input for one SELECT
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectParts {
    pub columns: Option<NArgExpr>,
    pub tables: Option<NArgExpr>,
    pub options: Option<SelectOptions>,
}

/// Lower a parsed query into builder fragments
pub fn lower_query(
    query: &Query,
    text: &StatementText,
    keywords: &ReservedKeywords,
) -> Result<SelectParts, ParserError> {
    Lowerer { text, keywords }.query(query)
}

struct Lowerer<'a> {
    text: &'a StatementText,
    keywords: &'a ReservedKeywords,
}

impl Lowerer<'_> {
    fn unsupported(&self, construct: &str, keyword: &str) -> ParserError {
        self.unsupported_after(construct, keyword, 0)
    }

    /// Error naming `construct`, located at the first `keyword` at or after `from`
    fn unsupported_after(&self, construct: &str, keyword: &str, from: usize) -> ParserError {
        let position = self.text.keyword_offset(keyword, from);
        ParserError::syntax(format!("{} is not supported", construct)).at(
            if position.is_some() { keyword } else { "" },
            position,
        )
    }

    fn ident_offset(&self, ident: &Ident) -> Option<usize> {
        self.text.offset(ident.span.start)
    }

    fn query(&self, query: &Query) -> Result<SelectParts, ParserError> {
        if query.with.is_some() {
            return Err(self.unsupported("WITH", "WITH"));
        }
        if query.limit.is_some() {
            return Err(self.unsupported("LIMIT", "LIMIT"));
        }
        if query.offset.is_some() {
            return Err(self.unsupported("OFFSET", "OFFSET"));
        }
        if query.fetch.is_some() {
            return Err(self.unsupported("FETCH", "FETCH"));
        }

        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            SetExpr::SetOperation { op, .. } => {
                let op = op.to_string();
                return Err(self.unsupported(&op, &op));
            }
            SetExpr::Query(_) => return Err(self.unsupported("Sub-select", "SELECT")),
            _ => {
                return Err(ParserError::syntax("Only SELECT statements are supported")
                    .at("", Some(0)))
            }
        };

        let select_start = self.text.offset(select.select_token.0.span.start).unwrap_or(0);
        self.check_select(select)?;

        let columns = self.projection(&select.projection, select_start)?;

        let tables = if select.from.is_empty() {
            None
        } else {
            Some(self.from(&select.from, select_start)?)
        };

        let mut options = SelectOptions::default();
        if let Some(selection) = &select.selection {
            options.where_expr = Some(self.expr(selection, select_start)?);
        }
        if let Some(order_by) = &query.order_by {
            let order_start = self
                .text
                .keyword_offset("ORDER", select_start)
                .unwrap_or(select_start);
            if order_by.interpolate.is_some() {
                return Err(self.unsupported_after("INTERPOLATE", "INTERPOLATE", order_start));
            }
            let item_offsets = self
                .text
                .keyword_offset("BY", order_start)
                .map(|by| self.text.list_offsets(by + 1))
                .unwrap_or_default();

            let mut items = order_by
                .exprs
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.order_by_item(item, item_offsets.get(i).copied(), order_start)
                })
                .collect::<Result<Vec<_>, _>>()?;
            // Reduction order: last declared entry first
            items.reverse();
            options.order_by = items;
        }

        let options = if options == SelectOptions::default() {
            None
        } else {
            Some(options)
        };

        Ok(SelectParts {
            columns: Some(columns),
            tables,
            options,
        })
    }

    fn check_select(&self, select: &Select) -> Result<(), ParserError> {
        if select.distinct.is_some() {
            return Err(self.unsupported("DISTINCT", "DISTINCT"));
        }
        if select.top.is_some() {
            return Err(self.unsupported("TOP", "TOP"));
        }
        if select.into.is_some() {
            return Err(self.unsupported("SELECT INTO", "INTO"));
        }
        match &select.group_by {
            GroupByExpr::All(_) => return Err(self.unsupported("GROUP BY", "GROUP")),
            GroupByExpr::Expressions(exprs, _) if !exprs.is_empty() => {
                return Err(self.unsupported("GROUP BY", "GROUP"))
            }
            _ => {}
        }
        if select.having.is_some() {
            return Err(self.unsupported("HAVING", "HAVING"));
        }
        if select.qualify.is_some() {
            return Err(self.unsupported("QUALIFY", "QUALIFY"));
        }
        Ok(())
    }

    /// Reject reserved words used as unquoted identifiers
    fn check_ident(&self, ident: &Ident) -> Result<(), ParserError> {
        if ident.quote_style.is_none() && self.keywords.contains(&ident.value) {
            return Err(ParserError::syntax(format!(
                "\"{}\" is a reserved keyword: identifier was expected",
                ident.value
            ))
            .at(ident.value.clone(), self.ident_offset(ident)));
        }
        Ok(())
    }

    fn name_parts(&self, idents: &[Ident]) -> Result<Vec<String>, ParserError> {
        idents
            .iter()
            .map(|ident| {
                self.check_ident(ident)?;
                Ok(ident.value.clone())
            })
            .collect()
    }

    /// Variable node located at its first identifier
    fn variable(&self, idents: &[Ident]) -> Result<ExprNode, ParserError> {
        let parts = self.name_parts(idents)?;
        let position = idents.first().and_then(|i| self.ident_offset(i));
        trace!(name = %parts.join("."), ?position, "variable located");
        Ok(ExprNode::Variable(VariableExpr::from_parts(parts).at(position)))
    }

    /// `*` or `qualifier.*`
    fn wildcard(
        &self,
        qualifier: &[Ident],
        position: Option<usize>,
    ) -> Result<ExprNode, ParserError> {
        let mut parts = self.name_parts(qualifier)?;
        parts.push("*".to_string());
        let position = qualifier
            .first()
            .and_then(|i| self.ident_offset(i))
            .or(position);
        Ok(ExprNode::Variable(VariableExpr::from_parts(parts).at(position)))
    }

    /// Wildcard modifiers change the column set; none is modelled
    fn check_wildcard_options(
        &self,
        options: &WildcardAdditionalOptions,
        from: usize,
    ) -> Result<(), ParserError> {
        let modifier = if options.opt_ilike.is_some() {
            Some("ILIKE")
        } else if options.opt_exclude.is_some() {
            Some("EXCLUDE")
        } else if options.opt_except.is_some() {
            Some("EXCEPT")
        } else if options.opt_replace.is_some() {
            Some("REPLACE")
        } else if options.opt_rename.is_some() {
            Some("RENAME")
        } else {
            None
        };
        match modifier {
            Some(keyword) => {
                let construct = format!("\"*\" with {}", keyword);
                Err(self.unsupported_after(&construct, keyword, from))
            }
            None => Ok(()),
        }
    }

    fn projection(
        &self,
        items: &[SelectItem],
        select_start: usize,
    ) -> Result<NArgExpr, ParserError> {
        let mut columns = Vec::with_capacity(items.len());
        for item in items {
            let column = match item {
                SelectItem::UnnamedExpr(expr) => self.expr(expr, select_start)?,
                SelectItem::ExprWithAlias { expr, alias } => {
                    let expr = self.expr(expr, select_start)?;
                    self.check_ident(alias)?;
                    ExprNode::alias(expr, alias.value.clone())
                }
                SelectItem::QualifiedWildcard(name, options) => {
                    let position = name.0.first().and_then(|i| self.ident_offset(i));
                    self.check_wildcard_options(options, position.unwrap_or(select_start))?;
                    self.wildcard(&name.0, None)?
                }
                SelectItem::Wildcard(options) => {
                    let position = self.text.offset(options.wildcard_token.0.span.start);
                    self.check_wildcard_options(options, position.unwrap_or(select_start))?;
                    self.wildcard(&[], position)?
                }
            };
            columns.push(column);
        }
        Ok(NArgExpr::new(columns))
    }

    fn from(&self, from: &[TableWithJoins], select_start: usize) -> Result<NArgExpr, ParserError> {
        let mut tables = Vec::with_capacity(from.len());
        for item in from {
            if !item.joins.is_empty() {
                return Err(self.unsupported("JOIN", "JOIN"));
            }
            match &item.relation {
                TableFactor::Table {
                    name,
                    alias,
                    args,
                    with_hints,
                    version,
                    with_ordinality,
                    partitions,
                    json_path,
                } => {
                    if args.is_some()
                        || !with_hints.is_empty()
                        || version.is_some()
                        || *with_ordinality
                        || !partitions.is_empty()
                        || json_path.is_some()
                    {
                        let position = name.0.first().and_then(|i| self.ident_offset(i));
                        return Err(ParserError::syntax(format!(
                            "Table expression \"{}\" is not supported",
                            item.relation
                        ))
                        .at(name.to_string(), position));
                    }

                    let table = self.variable(&name.0)?;
                    let entry = match alias {
                        Some(alias) => {
                            if !alias.columns.is_empty() {
                                return Err(ParserError::syntax(format!(
                                    "Column list of alias \"{}\" is not supported",
                                    alias.name.value
                                ))
                                .at(alias.name.value.clone(), self.ident_offset(&alias.name)));
                            }
                            let alias_var = self.variable(std::slice::from_ref(&alias.name))?;
                            ExprNode::SpecialBinary(AliasExpr {
                                expr: Box::new(table),
                                alias: Box::new(alias_var),
                                explicit_as: false,
                            })
                        }
                        None => table,
                    };
                    tables.push(entry);
                }
                TableFactor::Derived { .. } => {
                    return Err(self.unsupported_after("Sub-select", "SELECT", select_start + 1))
                }
                other => {
                    return Err(ParserError::syntax(format!(
                        "Table expression \"{}\" is not supported",
                        other
                    )))
                }
            }
        }
        Ok(NArgExpr::new(tables))
    }

    fn order_by_item(
        &self,
        item: &OrderByExpr,
        offset: Option<usize>,
        order_start: usize,
    ) -> Result<OrderByItem, ParserError> {
        if let Some(nulls_first) = item.nulls_first {
            let construct = if nulls_first { "NULLS FIRST" } else { "NULLS LAST" };
            return Err(self.unsupported_after(construct, "NULLS", offset.unwrap_or(order_start)));
        }
        if item.with_fill.is_some() {
            return Err(self.unsupported_after("WITH FILL", "WITH", offset.unwrap_or(order_start)));
        }

        let ascending = item.asc.unwrap_or(true);
        match &item.expr {
            Expr::Value(Value::Number(number, _)) => {
                let column_number = number.parse::<usize>().map_err(|_| {
                    ParserError::syntax(format!("Syntax Error near \"{}\"", number))
                        .at(number.clone(), offset)
                })?;
                Ok(OrderByItem::number(column_number, ascending).at(offset))
            }
            Expr::Identifier(ident) => self.order_by_name(std::slice::from_ref(ident), ascending),
            Expr::CompoundIdentifier(idents) => self.order_by_name(idents, ascending),
            other => Err(ParserError::syntax(format!(
                "Sorting by expression \"{}\" is not supported",
                other
            ))
            .at("", offset)),
        }
    }

    fn order_by_name(&self, idents: &[Ident], ascending: bool) -> Result<OrderByItem, ParserError> {
        let parts = self.name_parts(idents)?;
        let position = idents.first().and_then(|i| self.ident_offset(i));
        Ok(OrderByItem::from_parts(parts, ascending).at(position))
    }

    fn expr(&self, expr: &Expr, select_start: usize) -> Result<ExprNode, ParserError> {
        match expr {
            Expr::Identifier(ident) => self.variable(std::slice::from_ref(ident)),
            Expr::CompoundIdentifier(idents) => self.variable(idents),
            Expr::Value(value) => self.value(value).map(ExprNode::constant),
            Expr::Nested(inner) => self.expr(inner, select_start),
            Expr::UnaryOp { op, expr } => {
                let op = match op {
                    UnaryOperator::Plus => UnaryOp::Plus,
                    UnaryOperator::Minus => UnaryOp::Minus,
                    UnaryOperator::Not => UnaryOp::Not,
                    UnaryOperator::PGBitwiseNot => UnaryOp::BitwiseNot,
                    other => {
                        return Err(ParserError::syntax(format!(
                            "Operator \"{}\" is not supported",
                            other
                        )))
                    }
                };
                Ok(ExprNode::unary(op, self.expr(expr, select_start)?))
            }
            Expr::IsNull(inner) => Ok(ExprNode::unary(
                UnaryOp::IsNull,
                self.expr(inner, select_start)?,
            )),
            Expr::IsNotNull(inner) => Ok(ExprNode::unary(
                UnaryOp::IsNotNull,
                self.expr(inner, select_start)?,
            )),
            Expr::BinaryOp { left, op, right } => {
                let op = binary_op(op)?;
                let left = self.expr(left, select_start)?;
                let right = self.expr(right, select_start)?;
                Ok(ExprNode::binary(left, op, right))
            }
            Expr::Like {
                negated,
                any,
                expr,
                pattern,
                escape_char,
            } => {
                if *any {
                    return Err(self.unsupported_after("LIKE ANY", "ANY", select_start));
                }
                if escape_char.is_some() {
                    return Err(self.unsupported_after("LIKE ... ESCAPE", "ESCAPE", select_start));
                }
                let op = if *negated { BinaryOp::NotLike } else { BinaryOp::Like };
                let left = self.expr(expr, select_start)?;
                let right = self.expr(pattern, select_start)?;
                Ok(ExprNode::binary(left, op, right))
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let op = if *negated { BinaryOp::NotIn } else { BinaryOp::In };
                let left = self.expr(expr, select_start)?;
                let items = list
                    .iter()
                    .map(|item| self.expr(item, select_start))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ExprNode::binary(left, op, ExprNode::list(items)))
            }
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let subject = self.expr(expr, select_start)?;
                let low = self.expr(low, select_start)?;
                let high = self.expr(high, select_start)?;
                let (lower_op, upper_op, join) = if *negated {
                    (BinaryOp::Lt, BinaryOp::Gt, BinaryOp::Or)
                } else {
                    (BinaryOp::GtEq, BinaryOp::LtEq, BinaryOp::And)
                };
                Ok(ExprNode::binary(
                    ExprNode::binary(subject.clone(), lower_op, low),
                    join,
                    ExprNode::binary(subject, upper_op, high),
                ))
            }
            Expr::Function(func) => self.function(func, select_start),
            Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. } => {
                Err(self.unsupported_after("Sub-select", "SELECT", select_start + 1))
            }
            other => Err(ParserError::syntax(format!(
                "Expression \"{}\" is not supported",
                other
            ))),
        }
    }

    fn function(&self, func: &Function, select_start: usize) -> Result<ExprNode, ParserError> {
        let name_start = func
            .name
            .0
            .first()
            .and_then(|i| self.ident_offset(i))
            .unwrap_or(select_start);
        if func.over.is_some() {
            return Err(self.unsupported_after("Window function", "OVER", name_start));
        }
        if func.filter.is_some() {
            return Err(self.unsupported_after("FILTER", "FILTER", name_start));
        }
        if func.null_treatment.is_some() {
            return Err(self.unsupported_after("IGNORE/RESPECT NULLS", "NULLS", name_start));
        }
        if !func.within_group.is_empty() {
            return Err(self.unsupported_after("WITHIN GROUP", "WITHIN", name_start));
        }

        let name = self.name_parts(&func.name.0)?.join(".");
        let unsupported_arguments = || {
            ParserError::syntax(format!("Arguments of \"{}\" are not supported", func))
                .at(name.clone(), Some(name_start))
        };
        if !matches!(func.parameters, FunctionArguments::None) {
            return Err(unsupported_arguments());
        }

        let args = match &func.args {
            FunctionArguments::None => Vec::new(),
            FunctionArguments::Subquery(_) => {
                return Err(self.unsupported_after("Sub-select", "SELECT", name_start))
            }
            FunctionArguments::List(list) => {
                if list.duplicate_treatment.is_some() {
                    return Err(ParserError::syntax(format!(
                        "DISTINCT inside \"{}\" is not supported",
                        name
                    ))
                    .at(name.clone(), Some(name_start)));
                }
                if !list.clauses.is_empty() {
                    return Err(unsupported_arguments());
                }
                let arg_offsets = self
                    .text
                    .token_offset(&Token::LParen, name_start)
                    .map(|paren| self.text.list_offsets(paren + 1))
                    .unwrap_or_default();

                list.args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| {
                        self.function_arg(arg, arg_offsets.get(i).copied(), select_start)
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        if AGGREGATES.iter().any(|a| a.eq_ignore_ascii_case(&name)) {
            Ok(ExprNode::aggregate(name, args))
        } else {
            Ok(ExprNode::function(name, args))
        }
    }

    fn function_arg(
        &self,
        arg: &FunctionArg,
        offset: Option<usize>,
        select_start: usize,
    ) -> Result<ExprNode, ParserError> {
        match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => self.expr(expr, select_start),
            FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => self.wildcard(&[], offset),
            FunctionArg::Unnamed(FunctionArgExpr::QualifiedWildcard(name)) => {
                self.wildcard(&name.0, offset)
            }
            other => Err(ParserError::syntax(format!(
                "Named argument \"{}\" is not supported",
                other
            ))
            .at("", offset)),
        }
    }

    fn value(&self, value: &Value) -> Result<ConstValue, ParserError> {
        match value {
            Value::Null => Ok(ConstValue::Null),
            Value::Boolean(b) => Ok(ConstValue::Boolean(*b)),
            Value::SingleQuotedString(s) => Ok(ConstValue::Text(s.clone())),
            Value::Number(n, _) => {
                if let Ok(i) = n.parse::<i64>() {
                    Ok(ConstValue::Integer(i))
                } else {
                    // literals carry no span
                    n.parse::<f64>().map(ConstValue::Real).map_err(|_| {
                        ParserError::syntax(format!("Syntax Error near \"{}\"", n))
                            .at(n.clone(), None)
                    })
                }
            }
            other => Err(ParserError::syntax(format!(
                "Literal \"{}\" is not supported",
                other
            ))),
        }
    }
}

fn binary_op(op: &BinaryOperator) -> Result<BinaryOp, ParserError> {
    Ok(match op {
        BinaryOperator::Plus => BinaryOp::Add,
        BinaryOperator::Minus => BinaryOp::Subtract,
        BinaryOperator::Multiply => BinaryOp::Multiply,
        BinaryOperator::Divide => BinaryOp::Divide,
        BinaryOperator::Modulo => BinaryOp::Modulo,
        BinaryOperator::StringConcat => BinaryOp::Concat,
        BinaryOperator::BitwiseAnd => BinaryOp::BitwiseAnd,
        BinaryOperator::BitwiseOr => BinaryOp::BitwiseOr,
        BinaryOperator::BitwiseXor => BinaryOp::BitwiseXor,
        BinaryOperator::PGBitwiseShiftLeft => BinaryOp::ShiftLeft,
        BinaryOperator::PGBitwiseShiftRight => BinaryOp::ShiftRight,
        BinaryOperator::Eq => BinaryOp::Eq,
        BinaryOperator::NotEq => BinaryOp::NotEq,
        BinaryOperator::Lt => BinaryOp::Lt,
        BinaryOperator::LtEq => BinaryOp::LtEq,
        BinaryOperator::Gt => BinaryOp::Gt,
        BinaryOperator::GtEq => BinaryOp::GtEq,
        BinaryOperator::And => BinaryOp::And,
        BinaryOperator::Or => BinaryOp::Or,
        BinaryOperator::Xor => BinaryOp::Xor,
        other => {
            return Err(ParserError::syntax(format!(
                "Operator \"{}\" is not supported",
                other
            )))
        }
    })
}
