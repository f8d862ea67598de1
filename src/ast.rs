//! Tokens and the abstract syntax tree for chart formulas.
//!
//! A formula like
//!
//! ```text
//! Sun.Sign IN ('Aries', 'Leo') AND Mars.House == 10
//! ```
//!
//! lexes into a flat [`Token`] sequence and parses into an immutable
//! [`Expr`] tree. Every node carries the [`Span`] of the source text it
//! was built from; spans feed error messages and the evaluator's
//! explanation trace and play no part in evaluation itself.
//!
//! The tree owns its children exclusively (`Box`/`Vec`, no back-references),
//! so it is acyclic by construction and safe to share read-only behind an
//! `Arc` once built — which is exactly what [`FormulaCache`](crate::FormulaCache)
//! does.

use std::fmt;

use crate::value::Value;

/// Half-open range of character offsets into the formula text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A lexical token: its kind plus where it sits in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

/// The token alphabet of the formula language.
///
/// Keywords (`AND`, `OR`, `NOT`, `IN`, `true`, `false`) are recognized
/// case-insensitively by the lexer; everything else that looks like a word
/// becomes a case-sensitive `Identifier`.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(f64),
    Str(String),
    Bool(bool),

    And,
    Or,
    Not,
    In,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    Dot,
    Comma,
    LParen,
    RParen,

    Eof,
}

impl TokenKind {
    /// Short description used in "expected X, found Y" parse errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier '{name}'"),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::Bool(b) => format!("boolean {b}"),
            TokenKind::And => "'AND'".to_string(),
            TokenKind::Or => "'OR'".to_string(),
            TokenKind::Not => "'NOT'".to_string(),
            TokenKind::In => "'IN'".to_string(),
            TokenKind::Eq => "'=='".to_string(),
            TokenKind::Ne => "'!='".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Le => "'<='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Ge => "'>='".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Eof => "end of formula".to_string(),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Short-circuiting logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        })
    }
}

/// One node of a parsed formula: its shape plus its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

/// The closed set of formula node shapes, one per grammar production.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A number, string or boolean constant.
    Literal(Value),

    /// Dotted property path, e.g. `Sun.Sign`. Resolved against the chart
    /// context at evaluation time, never at parse time.
    Property(Vec<String>),

    /// `left <op> right` with a comparison operator.
    Comparison {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `left AND right` / `left OR right`, short-circuiting.
    Logical {
        op: LogicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `NOT operand`.
    Not(Box<Expr>),

    /// `needle IN (lit, lit, ...)`. The haystack is restricted to
    /// literals by the grammar, so it is stored pre-evaluated.
    InSet {
        needle: Box<Expr>,
        haystack: Vec<Value>,
    },

    /// Aggregator invocation, e.g. `count(House == 10)`.
    Call { name: String, args: Vec<Expr> },
}
