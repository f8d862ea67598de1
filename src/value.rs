use std::fmt;

use crate::error::EvalError;

/// A runtime value in the formula language.
///
/// The language is deliberately small: chart facts are either numbers
/// (houses, degrees, speeds), strings (signs, dignities, aspect kinds) or
/// booleans (retrograde flags, predicate results). There are no nulls —
/// a missing fact is an evaluation error, never a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric value; houses and counts are carried as whole `f64`s.
    Number(f64),

    /// UTF-8 string (sign names, aspect kinds, dignities).
    Str(String),

    /// Boolean (retrograde flags and every predicate result).
    Bool(bool),
}

impl Value {
    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }

    /// Extract a boolean, or fail with a type mismatch naming `role`.
    pub fn expect_bool(&self, role: &str) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::TypeMismatch {
                detail: format!("{role} must be a boolean, got {}", other.type_name()),
            }),
        }
    }

    /// Extract a number, or fail with a type mismatch naming `role`.
    pub fn expect_number(&self, role: &str) -> Result<f64, EvalError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(EvalError::TypeMismatch {
                detail: format!("{role} must be a number, got {}", other.type_name()),
            }),
        }
    }

    /// Extract a string, or fail with a type mismatch naming `role`.
    pub fn expect_str(&self, role: &str) -> Result<&str, EvalError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(EvalError::TypeMismatch {
                detail: format!("{role} must be a string, got {}", other.type_name()),
            }),
        }
    }

    /// Equality under the language's coercion rule: same-type values
    /// compare exactly (case-sensitive for strings), cross-type comparison
    /// is a type mismatch rather than `false`.
    pub fn try_eq(&self, other: &Value) -> Result<bool, EvalError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(a == b),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (a, b) => Err(EvalError::TypeMismatch {
                detail: format!("cannot compare {} with {}", a.type_name(), b.type_name()),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_equality() {
        assert_eq!(Value::Number(10.0).try_eq(&Value::Number(10.0)), Ok(true));
        assert_eq!(
            Value::from("Leo").try_eq(&Value::from("leo")),
            Ok(false),
            "string equality is case-sensitive"
        );
        assert_eq!(Value::Bool(true).try_eq(&Value::Bool(true)), Ok(true));
    }

    #[test]
    fn cross_type_equality_is_an_error() {
        let err = Value::from("Leo").try_eq(&Value::Number(5.0)).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }
}
