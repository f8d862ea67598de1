//! Error taxonomy for the formula engine.
//!
//! Each stage has its own error type with enough structure (offsets,
//! expected/found descriptions, offending names) for a caller to build an
//! actionable message without re-scanning the formula text. [`FormulaError`]
//! is the umbrella type returned by the convenience entry points.

use thiserror::Error;

/// Result alias used by the top-level entry points.
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors produced while tokenizing formula text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    /// A character outside the token alphabet.
    #[error("unexpected character '{unexpected}' at offset {position}")]
    UnexpectedChar { position: usize, unexpected: char },

    /// A string literal with no closing quote.
    #[error("unterminated string starting at offset {position}")]
    UnterminatedString { position: usize },
}

/// Errors produced while building an AST from tokens.
///
/// No partial AST is ever returned alongside one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The token stream did not match the grammar.
    #[error("at offset {position}: expected {expected}, found {found}")]
    UnexpectedToken {
        position: usize,
        expected: String,
        found: String,
    },

    /// Parenthesis/call/NOT nesting exceeded the fixed cap.
    #[error("max nesting exceeded (limit {limit})")]
    NestingTooDeep { limit: usize },
}

/// Errors produced while walking an AST against a chart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A property path whose body or field does not exist in the context.
    ///
    /// Deliberately an error rather than a silent `false`: a typo in a
    /// property name must surface instead of turning a comparison vacuous.
    #[error("unknown property '{}'", path.join("."))]
    UnknownProperty { path: Vec<String> },

    /// Operands of incompatible types, or a non-boolean where a boolean
    /// is required.
    #[error("type mismatch: {detail}")]
    TypeMismatch { detail: String },

    /// A call to a function that is not in the builtin table.
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// An aggregate mean over an empty body collection.
    #[error("division by zero: {detail}")]
    DivisionByZero { detail: String },
}

/// Errors produced while loading a [`ChartContext`](crate::ChartContext)
/// from a JSON document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("chart document must be a JSON object")]
    NotAnObject,

    #[error("body '{body}' is missing field '{field}'")]
    MissingField { body: String, field: String },

    #[error("{location}: expected {expected}")]
    WrongType { location: String, expected: String },
}

/// Umbrella error for the compile-and-evaluate entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
