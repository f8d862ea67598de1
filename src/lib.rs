//! # Horolang - a formula language for chart data
//!
//! A small, restricted expression language for stating predicates and
//! scores over a computed astrological chart:
//!
//! ```text
//! Sun.Sign IN ('Aries', 'Leo') AND Mars.House == 10
//! count(Retrograde) >= 3 OR has_aspect('Sun', 'Moon', 'Trine')
//! ```
//!
//! The pipeline is: formula text → [`lexer`] → tokens → [`parser`] →
//! immutable AST → [`evaluator`] against a read-only [`ChartContext`].
//! A [`FormulaCache`] sits in front of the lexer and parser and memoizes
//! ASTs by formula text, so repeated formulas skip both stages.
//!
//! The language is not a scripting language: there is no assignment, no
//! arithmetic, no user-defined functions — only boolean and numeric
//! predicates over chart facts, plus a fixed table of aggregators
//! (`count`, `any`, `all`, `avg`, `has_aspect`).
//!
//! ## Example
//!
//! ```
//! use horolang::{ChartContext, Evaluator, FormulaCache, PropertyBag, Value};
//!
//! let mut chart = ChartContext::new();
//! chart.insert_body("Sun", PropertyBag {
//!     sign: "Leo".into(),
//!     house: 10,
//!     degree: 12.5,
//!     speed: 0.95,
//!     retrograde: false,
//!     absolute_degree: 132.5,
//! });
//!
//! let cache = FormulaCache::new(64);
//! let ast = cache
//!     .get_or_parse("Sun.Sign IN ('Aries', 'Leo') AND Sun.House == 10")
//!     .unwrap();
//!
//! let value = Evaluator::new(&chart).evaluate(&ast).unwrap();
//! assert_eq!(value, Value::Bool(true));
//! ```
//!
//! Errors are structured and explicit: misspelled properties, cross-type
//! comparisons and unknown functions fail loudly instead of evaluating to
//! a vacuous `false`. In a batch, each formula fails independently — one
//! formula's error never suppresses its siblings.

pub mod ast;
pub mod cache;
pub mod chart;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{CmpOp, Expr, ExprKind, LogicOp, Span, Token, TokenKind};
pub use cache::FormulaCache;
pub use chart::{Aspect, ChartContext, PropertyBag};
pub use error::{ChartError, EvalError, FormulaError, FormulaResult, LexError, ParseError};
pub use evaluator::{Evaluation, Evaluator, TraceEntry};
pub use lexer::{Lexer, tokenize};
pub use parser::{MAX_DEPTH, Parser, parse};
pub use value::Value;

/// Compile formula text into an AST (lex + parse, no evaluation).
pub fn compile(formula: &str) -> FormulaResult<Expr> {
    Ok(parser::parse(lexer::tokenize(formula)?)?)
}

/// Compile and evaluate a formula against a chart in one step.
///
/// Convenience for one-off evaluation; batch callers should compile
/// through a [`FormulaCache`] and reuse the AST.
pub fn evaluate_formula(formula: &str, chart: &ChartContext) -> FormulaResult<Value> {
    let ast = compile(formula)?;
    Ok(Evaluator::new(chart).evaluate(&ast)?)
}
