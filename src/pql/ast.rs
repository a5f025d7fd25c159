//! PQL abstract syntax tree
//!
//! The AST is a closed set of node kinds built by the parser and never
//! mutated afterwards. Compilation and validation walk it with exhaustive
//! matches so a new node kind is a compile-time event everywhere it matters.

use serde::Serialize;

/// Scalar literal value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Check if this value is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Check if this value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }
}

/// Comparison operand: absent (EXISTS), a scalar, or a list (IN, BETWEEN)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    None,
    Scalar(Value),
    List(Vec<Value>),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Like,
    NotLike,
    In,
    NotIn,
    Exists,
    NotExists,
    Between,
    NotBetween,
}

impl ComparisonOp {
    /// Operators that require numeric-typed fields
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            ComparisonOp::Gt
                | ComparisonOp::Lt
                | ComparisonOp::GtEq
                | ComparisonOp::LtEq
                | ComparisonOp::Between
                | ComparisonOp::NotBetween
        )
    }

    /// The PQL spelling of this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::NotLike => "NOT LIKE",
            ComparisonOp::In => "IN",
            ComparisonOp::NotIn => "NOT IN",
            ComparisonOp::Exists => "EXISTS",
            ComparisonOp::NotExists => "NOT EXISTS",
            ComparisonOp::Between => "BETWEEN",
            ComparisonOp::NotBetween => "NOT BETWEEN",
        }
    }
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
}

/// A field listed in SEARCH_FIELDS with its relevance weight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedField {
    pub name: String,
    pub weight: f64,
}

/// Filter expression node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node")]
pub enum Expr {
    /// Field-operator-value comparison
    Comparison {
        field: String,
        op: ComparisonOp,
        value: Operand,
        negated: bool,
    },
    /// AND / OR combination
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Approximate string match with a similarity threshold
    Fuzzy {
        field: String,
        term: String,
        threshold: f64,
        negated: bool,
    },
    /// Phonetic-code equality
    SoundsLike {
        field: String,
        term: String,
        negated: bool,
    },
    /// Weighted multi-field search wrapping one inner condition
    SearchFields {
        fields: Vec<WeightedField>,
        inner: Box<Expr>,
    },
}

/// WHERE clause wrapping the root filter expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhereClause {
    pub root: Expr,
}

/// ORDER BY SCORE direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreDirection {
    Asc,
    Desc,
}

/// A parsed PQL query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectStatement {
    /// Selected field names, `["*"]` when omitted
    pub fields: Vec<String>,
    /// Optional source name from the FROM clause
    pub source: Option<String>,
    /// Optional filter
    pub where_clause: Option<WhereClause>,
    /// Optional ORDER BY SCORE direction
    pub order_by_score: Option<ScoreDirection>,
    /// Row limit, supplied by execution options rather than the grammar
    pub limit: Option<u64>,
    /// Row offset, supplied by execution options rather than the grammar
    pub offset: Option<u64>,
}

impl Default for SelectStatement {
    fn default() -> Self {
        SelectStatement {
            fields: vec!["*".to_string()],
            source: None,
            where_clause: None,
            order_by_score: None,
            limit: None,
            offset: None,
        }
    }
}

impl Expr {
    /// Walk the expression tree, invoking the visitor on every node
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Logical { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::SearchFields { inner, .. } => inner.visit(f),
            Expr::Comparison { .. } | Expr::Fuzzy { .. } | Expr::SoundsLike { .. } => {}
        }
    }
}
