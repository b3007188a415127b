//! Expression nodes produced by the grammar layer
//!
//! One variant per expression class. Column lists and FROM lists are
//! `List` nodes; `expr AS alias` and `table alias` bindings are
//! `SpecialBinary` nodes.

use crate::keywords::ReservedKeywords;
use std::fmt;

/// Expression class, used in messages and for dispatch by callers that only
/// care about the kind of node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprClass {
    Constant,
    Variable,
    Unary,
    Arithmetic,
    Logical,
    Relational,
    Function,
    Aggregate,
    SpecialBinary,
    List,
}

impl ExprClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant => "Const",
            Self::Variable => "Variable",
            Self::Unary => "Unary",
            Self::Arithmetic => "Arithm",
            Self::Logical => "Logical",
            Self::Relational => "Relational",
            Self::Function => "Function",
            Self::Aggregate => "Aggregation",
            Self::SpecialBinary => "SpecialBinary",
            Self::List => "List",
        }
    }
}

/// Literal values, including NULL
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(true) => write!(f, "TRUE"),
            Self::Boolean(false) => write!(f, "FALSE"),
            Self::Integer(v) => write!(f, "{}", v),
            // Debug formatting keeps the fractional part ("1.0", not "1")
            Self::Real(v) => write!(f, "{:?}", v),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Unary operators, prefix and postfix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitwiseNot,
    IsNull,
    IsNotNull,
}

/// Binary operators. The class of an operator decides which `ExprNode`
/// variant carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
    // relational
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    In,
    NotIn,
    // logical
    And,
    Or,
    Xor,
}

impl BinaryOp {
    /// Expression class of nodes using this operator
    pub fn class(&self) -> ExprClass {
        match self {
            Self::Add
            | Self::Subtract
            | Self::Multiply
            | Self::Divide
            | Self::Modulo
            | Self::Concat
            | Self::BitwiseAnd
            | Self::BitwiseOr
            | Self::BitwiseXor
            | Self::ShiftLeft
            | Self::ShiftRight => ExprClass::Arithmetic,
            Self::Eq
            | Self::NotEq
            | Self::Lt
            | Self::LtEq
            | Self::Gt
            | Self::GtEq
            | Self::Like
            | Self::NotLike
            | Self::In
            | Self::NotIn => ExprClass::Relational,
            Self::And | Self::Or | Self::Xor => ExprClass::Logical,
        }
    }

    /// SQL spelling
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Concat => "||",
            Self::BitwiseAnd => "&",
            Self::BitwiseOr => "|",
            Self::BitwiseXor => "^",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
        }
    }
}

/// What a variable was bound to by validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableBinding {
    /// `table.field` or `field`, bound to the table at a FROM position
    Field { table_position: usize, field: String },

    /// `table.*`
    TableAsterisk { table_position: usize },

    /// `*`
    AllTablesAsterisk,
}

/// `field`, `table.field`, `table.*` or `*`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableExpr {
    /// Name parts as written, unquoted: `["t", "f"]` for `t.f`, `["*"]` for `*`
    pub parts: Vec<String>,

    /// Character offset within the statement, when known
    pub position: Option<usize>,

    /// Unset until validation succeeds
    pub binding: Option<VariableBinding>,
}

impl VariableExpr {
    /// Variable from a dotted name; each `.` starts a new part
    pub fn new(name: impl AsRef<str>) -> Self {
        Self::from_parts(name.as_ref().split('.').map(str::to_string).collect())
    }

    /// Variable from already separated name parts
    pub fn from_parts(parts: Vec<String>) -> Self {
        Self {
            parts,
            position: None,
            binding: None,
        }
    }

    pub fn at(mut self, position: Option<usize>) -> Self {
        self.position = position;
        self
    }

    /// Parts joined with `.`, unquoted; used in messages
    pub fn name(&self) -> String {
        self.parts.join(".")
    }

    /// `t` for `t.f` and `t.*`
    pub fn qualifier(&self) -> Option<&str> {
        let index = self.parts.len().checked_sub(2)?;
        Some(&self.parts[index])
    }

    /// `f` for `t.f` and `f`; `*` for asterisks
    pub fn field_name(&self) -> &str {
        self.parts.last().map_or("", String::as_str)
    }

    /// `*` or `t.*`
    pub fn is_asterisk(&self) -> bool {
        self.field_name() == "*"
    }

    /// SQL spelling, quoting every part that needs it
    pub fn to_sql(&self, keywords: &ReservedKeywords) -> String {
        self.parts
            .iter()
            .map(|part| {
                if part == "*" {
                    part.clone()
                } else {
                    keywords.quote(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub arg: Box<ExprNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<ExprNode>,
    pub right: Box<ExprNode>,
}

/// Builtin, user-defined or aggregate function call
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub name: String,
    pub args: Vec<ExprNode>,
}

/// `expr AS alias` or `expr alias`
#[derive(Debug, Clone, PartialEq)]
pub struct AliasExpr {
    pub expr: Box<ExprNode>,

    /// Expected to be a bare `Variable`; anything else is rejected by the
    /// builder
    pub alias: Box<ExprNode>,

    /// Whether the AS keyword was written
    pub explicit_as: bool,
}

/// N-ary list: column lists, FROM lists and IN-lists
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NArgExpr {
    pub args: Vec<ExprNode>,
}

impl NArgExpr {
    pub fn new(args: Vec<ExprNode>) -> Self {
        Self { args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// An expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Constant(ConstValue),
    Variable(VariableExpr),
    Unary(UnaryExpr),
    Arithmetic(BinaryExpr),
    Logical(BinaryExpr),
    Relational(BinaryExpr),
    Function(FunctionExpr),
    Aggregate(FunctionExpr),
    SpecialBinary(AliasExpr),
    List(NArgExpr),
}

impl ExprNode {
    /// Constant node
    pub fn constant(value: ConstValue) -> Self {
        Self::Constant(value)
    }

    /// Unbound variable node from a dotted name
    pub fn variable(name: impl AsRef<str>) -> Self {
        Self::Variable(VariableExpr::new(name))
    }

    /// Unary node
    pub fn unary(op: UnaryOp, arg: ExprNode) -> Self {
        Self::Unary(UnaryExpr {
            op,
            arg: Box::new(arg),
        })
    }

    /// Binary node; the variant follows the operator's class
    pub fn binary(left: ExprNode, op: BinaryOp, right: ExprNode) -> Self {
        let node = BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        match op.class() {
            ExprClass::Relational => Self::Relational(node),
            ExprClass::Logical => Self::Logical(node),
            _ => Self::Arithmetic(node),
        }
    }

    /// Function call node
    pub fn function(name: impl Into<String>, args: Vec<ExprNode>) -> Self {
        Self::Function(FunctionExpr {
            name: name.into(),
            args,
        })
    }

    /// Aggregate call node
    pub fn aggregate(name: impl Into<String>, args: Vec<ExprNode>) -> Self {
        Self::Aggregate(FunctionExpr {
            name: name.into(),
            args,
        })
    }

    /// `expr AS alias` binding
    pub fn alias(expr: ExprNode, alias: impl Into<String>) -> Self {
        Self::SpecialBinary(AliasExpr {
            expr: Box::new(expr),
            alias: Box::new(Self::Variable(VariableExpr::from_parts(vec![alias.into()]))),
            explicit_as: true,
        })
    }

    /// List node
    pub fn list(args: Vec<ExprNode>) -> Self {
        Self::List(NArgExpr::new(args))
    }

    pub fn class(&self) -> ExprClass {
        match self {
            Self::Constant(_) => ExprClass::Constant,
            Self::Variable(_) => ExprClass::Variable,
            Self::Unary(_) => ExprClass::Unary,
            Self::Arithmetic(_) => ExprClass::Arithmetic,
            Self::Logical(_) => ExprClass::Logical,
            Self::Relational(_) => ExprClass::Relational,
            Self::Function(_) => ExprClass::Function,
            Self::Aggregate(_) => ExprClass::Aggregate,
            Self::SpecialBinary(_) => ExprClass::SpecialBinary,
            Self::List(_) => ExprClass::List,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableExpr> {
        match self {
            Self::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Direct children, left to right
    pub fn children(&self) -> Vec<&ExprNode> {
        match self {
            Self::Constant(_) | Self::Variable(_) => Vec::new(),
            Self::Unary(u) => vec![u.arg.as_ref()],
            Self::Arithmetic(b) | Self::Logical(b) | Self::Relational(b) => {
                vec![b.left.as_ref(), b.right.as_ref()]
            }
            Self::Function(f) | Self::Aggregate(f) => f.args.iter().collect(),
            Self::SpecialBinary(a) => vec![a.expr.as_ref(), a.alias.as_ref()],
            Self::List(l) => l.args.iter().collect(),
        }
    }

    /// Direct children, left to right, mutably
    pub fn children_mut(&mut self) -> Vec<&mut ExprNode> {
        match self {
            Self::Constant(_) | Self::Variable(_) => Vec::new(),
            Self::Unary(u) => vec![u.arg.as_mut()],
            Self::Arithmetic(b) | Self::Logical(b) | Self::Relational(b) => {
                vec![b.left.as_mut(), b.right.as_mut()]
            }
            Self::Function(f) | Self::Aggregate(f) => f.args.iter_mut().collect(),
            Self::SpecialBinary(a) => vec![a.expr.as_mut(), a.alias.as_mut()],
            Self::List(l) => l.args.iter_mut().collect(),
        }
    }

    /// Pre-order visit of every variable in the tree
    pub fn variables(&self) -> Vec<&VariableExpr> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a VariableExpr>) {
        if let Self::Variable(v) = self {
            out.push(v);
        }
        for child in self.children() {
            child.collect_variables(out);
        }
    }

    /// Pre-order mutable visit of every variable in the tree
    pub fn for_each_variable_mut(&mut self, f: &mut dyn FnMut(&mut VariableExpr)) {
        if let Self::Variable(v) = self {
            f(v);
        }
        for child in self.children_mut() {
            child.for_each_variable_mut(f);
        }
    }

    fn is_operator(&self) -> bool {
        matches!(
            self,
            Self::Arithmetic(_) | Self::Logical(_) | Self::Relational(_)
        )
    }
}

impl ExprNode {
    /// SQL rendering that quotes names found in `keywords`
    pub fn sql<'a>(&'a self, keywords: &'a ReservedKeywords) -> ExprSql<'a> {
        ExprSql {
            node: self,
            keywords,
        }
    }
}

/// Renders with the built-in keyword set
impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql(ReservedKeywords::builtin()))
    }
}

/// SQL text of an expression, see [`ExprNode::sql`]
pub struct ExprSql<'a> {
    node: &'a ExprNode,
    keywords: &'a ReservedKeywords,
}

impl ExprSql<'_> {
    fn with<'b>(&'b self, node: &'b ExprNode) -> ExprSql<'b> {
        ExprSql {
            node,
            keywords: self.keywords,
        }
    }

    /// Nested operator nodes are parenthesized so re-parsing keeps the tree shape
    fn operand(&self, f: &mut fmt::Formatter<'_>, node: &ExprNode) -> fmt::Result {
        if node.is_operator() {
            write!(f, "({})", self.with(node))
        } else {
            write!(f, "{}", self.with(node))
        }
    }

    fn comma_separated(&self, f: &mut fmt::Formatter<'_>, nodes: &[ExprNode]) -> fmt::Result {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.with(node))?;
        }
        Ok(())
    }
}

impl fmt::Display for ExprSql<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            ExprNode::Constant(value) => write!(f, "{}", value),
            ExprNode::Variable(v) => write!(f, "{}", v.to_sql(self.keywords)),
            ExprNode::Unary(u) => {
                let (prefix, suffix) = match u.op {
                    UnaryOp::Plus => ("+", ""),
                    UnaryOp::Minus => ("-", ""),
                    UnaryOp::Not => ("NOT ", ""),
                    UnaryOp::BitwiseNot => ("~", ""),
                    UnaryOp::IsNull => ("", " IS NULL"),
                    UnaryOp::IsNotNull => ("", " IS NOT NULL"),
                };
                write!(f, "{}", prefix)?;
                self.operand(f, &u.arg)?;
                write!(f, "{}", suffix)
            }
            ExprNode::Arithmetic(b) | ExprNode::Logical(b) | ExprNode::Relational(b) => {
                self.operand(f, &b.left)?;
                write!(f, " {} ", b.op.as_sql())?;
                match (b.op, b.right.as_ref()) {
                    (BinaryOp::In | BinaryOp::NotIn, ExprNode::List(list)) => {
                        write!(f, "(")?;
                        self.comma_separated(f, &list.args)?;
                        write!(f, ")")
                    }
                    _ => self.operand(f, &b.right),
                }
            }
            ExprNode::Function(func) | ExprNode::Aggregate(func) => {
                write!(f, "{}(", func.name)?;
                self.comma_separated(f, &func.args)?;
                write!(f, ")")
            }
            ExprNode::SpecialBinary(a) => {
                let separator = if a.explicit_as { " AS " } else { " " };
                write!(f, "{}{}{}", self.with(&a.expr), separator, self.with(&a.alias))
            }
            ExprNode::List(list) => self.comma_separated(f, &list.args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_variant_follows_operator_class() {
        let a = || ExprNode::variable("a");
        let one = || ExprNode::constant(ConstValue::Integer(1));

        assert_eq!(ExprNode::binary(a(), BinaryOp::Add, one()).class(), ExprClass::Arithmetic);
        assert_eq!(ExprNode::binary(a(), BinaryOp::Lt, one()).class(), ExprClass::Relational);
        assert_eq!(ExprNode::binary(a(), BinaryOp::Or, one()).class(), ExprClass::Logical);
    }

    #[test]
    fn variable_name_parts() {
        let v = VariableExpr::new("t.*");
        assert_eq!(v.qualifier(), Some("t"));
        assert!(v.is_asterisk());

        let v = VariableExpr::new("name");
        assert_eq!(v.qualifier(), None);
        assert_eq!(v.field_name(), "name");
        assert!(!v.is_asterisk());

        // a quoted name keeps its dot inside one part
        let v = VariableExpr::from_parts(vec!["t".to_string(), "a.b".to_string()]);
        assert_eq!(v.qualifier(), Some("t"));
        assert_eq!(v.field_name(), "a.b");
        assert_eq!(v.name(), "t.a.b");
    }

    #[test]
    fn display_quotes_names_that_need_it() {
        let keywords = ReservedKeywords::new();
        let quoted = |parts: &[&str]| {
            ExprNode::Variable(VariableExpr::from_parts(
                parts.iter().map(|p| p.to_string()).collect(),
            ))
        };

        let sum = ExprNode::binary(quoted(&["order"]), BinaryOp::Add, quoted(&["t", "my col"]));
        assert_eq!(sum.sql(&keywords).to_string(), "\"order\" + t.\"my col\"");
        assert_eq!(quoted(&["t", "a.b"]).to_string(), "t.\"a.b\"");
        assert_eq!(quoted(&["select", "*"]).to_string(), "\"select\".*");

        let configured = ReservedKeywords::new().with_extra(["email"]);
        let email = ExprNode::alias(quoted(&["email"]), "mail");
        assert_eq!(email.to_string(), "email AS mail");
        assert_eq!(email.sql(&configured).to_string(), "\"email\" AS mail");
    }

    #[test]
    fn display_parenthesizes_nested_operators() {
        let sum = ExprNode::binary(
            ExprNode::variable("a"),
            BinaryOp::Add,
            ExprNode::constant(ConstValue::Integer(1)),
        );
        let cmp = ExprNode::binary(sum, BinaryOp::Gt, ExprNode::variable("t.b"));

        assert_eq!(cmp.to_string(), "(a + 1) > t.b");
    }

    #[test]
    fn display_in_list_and_literals() {
        let node = ExprNode::binary(
            ExprNode::variable("status"),
            BinaryOp::NotIn,
            ExprNode::list(vec![
                ExprNode::constant(ConstValue::Text("it's".to_string())),
                ExprNode::constant(ConstValue::Null),
                ExprNode::constant(ConstValue::Real(1.0)),
            ]),
        );

        assert_eq!(node.to_string(), "status NOT IN ('it''s', NULL, 1.0)");
    }

    #[test]
    fn display_functions_and_unary() {
        let count = ExprNode::aggregate("COUNT", vec![ExprNode::variable("*")]);
        assert_eq!(count.to_string(), "COUNT(*)");

        let is_null = ExprNode::unary(UnaryOp::IsNull, ExprNode::variable("x"));
        assert_eq!(is_null.to_string(), "x IS NULL");
    }

    #[test]
    fn variables_are_visited_in_order() {
        let node = ExprNode::function(
            "COALESCE",
            vec![ExprNode::variable("a"), ExprNode::variable("b.c")],
        );
        let names: Vec<String> = node.variables().iter().map(|v| v.name()).collect();

        assert_eq!(names, vec!["a", "b.c"]);
    }
}
