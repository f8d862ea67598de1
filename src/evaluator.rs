//! Tree-walking evaluation of parsed formulas against a chart context.
//!
//! Evaluation is a pure function of `(AST, ChartContext)`: no I/O, no
//! global state, no suspension points. It terminates because the AST is
//! finite and its depth was capped at parse time.
//!
//! Failure policy is explicit throughout: a misspelled property, a
//! cross-type comparison or an unknown function is an [`EvalError`], never
//! a silent `false`.

use crate::ast::{CmpOp, Expr, ExprKind, LogicOp, Span};
use crate::chart::{ChartContext, PropertyBag};
use crate::error::EvalError;
use crate::value::Value;

/// One step of an explanation trace: a sub-expression's source span and
/// the value it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub span: Span,
    pub value: Value,
}

/// Result of [`Evaluator::explain`]: the formula's value plus the ordered
/// trace of every sub-expression evaluation that contributed to it.
///
/// Short-circuited operands are absent from the trace because they were
/// genuinely never evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    pub trace: Vec<TraceEntry>,
}

/// Inner-scope binding for aggregator predicates: inside `count(...)`,
/// `any(...)`, `all(...)` and `avg(...)` a single-segment property path
/// resolves against the body currently being visited.
#[derive(Debug, Clone, Copy, Default)]
struct Scope<'a> {
    body: Option<&'a PropertyBag>,
}

/// Walks an AST against one read-only chart context.
///
/// The evaluator borrows its context, so a single [`ChartContext`] can back
/// any number of evaluators (and threads) at once.
pub struct Evaluator<'c> {
    chart: &'c ChartContext,
}

impl<'c> Evaluator<'c> {
    pub fn new(chart: &'c ChartContext) -> Self {
        Evaluator { chart }
    }

    /// Evaluate a formula to its value.
    pub fn evaluate(&self, ast: &Expr) -> Result<Value, EvalError> {
        self.eval(ast, Scope::default(), &mut None)
    }

    /// Evaluate a formula and record an explanation trace.
    ///
    /// The trace is pure decoration: the value is identical to what
    /// [`evaluate`](Self::evaluate) returns for the same inputs.
    pub fn explain(&self, ast: &Expr) -> Result<Evaluation, EvalError> {
        let mut trace = Some(Vec::new());
        let value = self.eval(ast, Scope::default(), &mut trace)?;
        Ok(Evaluation {
            value,
            trace: trace.unwrap_or_default(),
        })
    }

    fn eval(
        &self,
        expr: &Expr,
        scope: Scope<'_>,
        trace: &mut Option<Vec<TraceEntry>>,
    ) -> Result<Value, EvalError> {
        let value = match &expr.kind {
            ExprKind::Literal(value) => value.clone(),

            ExprKind::Property(path) => self.resolve_property(path, scope)?,

            ExprKind::Comparison { op, left, right } => {
                let lhs = self.eval(left, scope, trace)?;
                let rhs = self.eval(right, scope, trace)?;
                compare(*op, &lhs, &rhs)?
            }

            ExprKind::Logical { op, left, right } => {
                let lhs = self.eval(left, scope, trace)?.expect_bool("logical operand")?;
                // Short-circuit: once the left side decides, the right
                // side is not evaluated and cannot raise.
                match (op, lhs) {
                    (LogicOp::And, false) => Value::Bool(false),
                    (LogicOp::Or, true) => Value::Bool(true),
                    _ => {
                        let rhs =
                            self.eval(right, scope, trace)?.expect_bool("logical operand")?;
                        Value::Bool(rhs)
                    }
                }
            }

            ExprKind::Not(operand) => {
                let inner = self.eval(operand, scope, trace)?.expect_bool("NOT operand")?;
                Value::Bool(!inner)
            }

            ExprKind::InSet { needle, haystack } => {
                let needle = self.eval(needle, scope, trace)?;
                let mut found = false;
                for candidate in haystack {
                    if needle.try_eq(candidate)? {
                        found = true;
                        break;
                    }
                }
                // An empty haystack is simply false, never an error.
                Value::Bool(found)
            }

            ExprKind::Call { name, args } => self.call(name, args, scope, trace)?,
        };

        if let Some(entries) = trace {
            entries.push(TraceEntry {
                span: expr.span,
                value: value.clone(),
            });
        }
        Ok(value)
    }

    /// Resolve a dotted path. The first segment must name a body in the
    /// context and the second a field on its bag; inside an aggregator a
    /// lone segment resolves against the body under iteration. Everything
    /// else is `UnknownProperty`.
    fn resolve_property(&self, path: &[String], scope: Scope<'_>) -> Result<Value, EvalError> {
        let unknown = || EvalError::UnknownProperty {
            path: path.to_vec(),
        };

        match path {
            [field] => match scope.body {
                Some(bag) => bag.field(field).ok_or_else(unknown),
                None => Err(unknown()),
            },
            [body, field] => self
                .chart
                .body(body)
                .ok_or_else(unknown)?
                .field(field)
                .ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }

    /// Dispatch into the fixed aggregator table. Aggregators visit bodies
    /// in the context's insertion order, so results are deterministic for
    /// a given context.
    fn call(
        &self,
        name: &str,
        args: &[Expr],
        scope: Scope<'_>,
        trace: &mut Option<Vec<TraceEntry>>,
    ) -> Result<Value, EvalError> {
        match name {
            "count" => {
                let predicate = self.single_arg(name, args)?;
                let mut matches = 0usize;
                for (_, bag) in self.chart.bodies() {
                    if self.eval_predicate(predicate, bag, trace)? {
                        matches += 1;
                    }
                }
                Ok(Value::Number(matches as f64))
            }

            "any" => {
                let predicate = self.single_arg(name, args)?;
                for (_, bag) in self.chart.bodies() {
                    if self.eval_predicate(predicate, bag, trace)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }

            "all" => {
                let predicate = self.single_arg(name, args)?;
                for (_, bag) in self.chart.bodies() {
                    if !self.eval_predicate(predicate, bag, trace)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }

            "avg" => {
                let selector = self.single_arg(name, args)?;
                if self.chart.body_count() == 0 {
                    return Err(EvalError::DivisionByZero {
                        detail: "avg over an empty body collection".to_string(),
                    });
                }
                let mut sum = 0.0;
                for (_, bag) in self.chart.bodies() {
                    let scope = Scope { body: Some(bag) };
                    sum += self
                        .eval(selector, scope, trace)?
                        .expect_number("avg selector")?;
                }
                Ok(Value::Number(sum / self.chart.body_count() as f64))
            }

            "has_aspect" => {
                let [a, b, kind] = args else {
                    return Err(EvalError::TypeMismatch {
                        detail: format!("has_aspect expects 3 arguments, got {}", args.len()),
                    });
                };
                let a = self.eval(a, scope, trace)?;
                let a = a.expect_str("has_aspect body name")?.to_string();
                let b = self.eval(b, scope, trace)?;
                let b = b.expect_str("has_aspect body name")?.to_string();
                let kind = self.eval(kind, scope, trace)?;
                let kind = kind.expect_str("has_aspect kind")?.to_string();

                let found = self
                    .chart
                    .aspects()
                    .iter()
                    .any(|aspect| aspect.links(&a, &b) && aspect.kind == kind);
                Ok(Value::Bool(found))
            }

            _ => Err(EvalError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    fn single_arg<'a>(&self, name: &str, args: &'a [Expr]) -> Result<&'a Expr, EvalError> {
        match args {
            [arg] => Ok(arg),
            _ => Err(EvalError::TypeMismatch {
                detail: format!("{name} expects 1 argument, got {}", args.len()),
            }),
        }
    }

    fn eval_predicate(
        &self,
        predicate: &Expr,
        bag: &PropertyBag,
        trace: &mut Option<Vec<TraceEntry>>,
    ) -> Result<bool, EvalError> {
        let scope = Scope { body: Some(bag) };
        self.eval(predicate, scope, trace)?
            .expect_bool("aggregator predicate")
    }
}

/// Comparison under the coercion rule: equality works within one type,
/// ordered comparison is numeric only. Degree comparisons are linear —
/// circular wraparound is deliberately not modeled here.
fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let result = match op {
        CmpOp::Eq => left.try_eq(right)?,
        CmpOp::Ne => !left.try_eq(right)?,
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let (a, b) = match (left, right) {
                (Value::Number(a), Value::Number(b)) => (*a, *b),
                _ => {
                    return Err(EvalError::TypeMismatch {
                        detail: format!(
                            "'{op}' requires numbers, got {} and {}",
                            left.type_name(),
                            right.type_name()
                        ),
                    });
                }
            };
            match op {
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            }
        }
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::PropertyBag;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn bag(sign: &str, house: u8, speed: f64) -> PropertyBag {
        PropertyBag {
            sign: sign.to_string(),
            house,
            degree: 10.0,
            speed,
            retrograde: speed < 0.0,
            absolute_degree: 100.0,
        }
    }

    fn chart() -> ChartContext {
        let mut context = ChartContext::new();
        context.insert_body("Sun", bag("Leo", 10, 0.95));
        context.insert_body("Moon", bag("Aquarius", 4, 13.2));
        context.insert_body("Mars", bag("Libra", 6, -0.2));
        context
    }

    fn eval(formula: &str, context: &ChartContext) -> Result<Value, EvalError> {
        let ast = parse(tokenize(formula).unwrap()).unwrap();
        Evaluator::new(context).evaluate(&ast)
    }

    #[test]
    fn property_comparison() {
        let context = chart();
        assert_eq!(eval("Sun.Sign == 'Leo'", &context), Ok(Value::Bool(true)));
        assert_eq!(eval("Mars.House == 10", &context), Ok(Value::Bool(false)));
        assert_eq!(eval("Mars.Speed < 0", &context), Ok(Value::Bool(true)));
    }

    #[test]
    fn bare_boolean_property() {
        let context = chart();
        assert_eq!(
            eval("Mars.Retrograde AND Sun.House == 10", &context),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn unknown_property_is_explicit() {
        let context = chart();
        assert_eq!(
            eval("Pluto2.Sign == 'Aries'", &context),
            Err(EvalError::UnknownProperty {
                path: vec!["Pluto2".to_string(), "Sign".to_string()]
            })
        );
        assert_eq!(
            eval("Sun.Dignity == 'Exalted'", &context),
            Err(EvalError::UnknownProperty {
                path: vec!["Sun".to_string(), "Dignity".to_string()]
            })
        );
    }

    #[test]
    fn lone_path_segment_outside_aggregator_is_unknown() {
        let context = chart();
        assert!(matches!(
            eval("Retrograde", &context),
            Err(EvalError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn aggregators_bind_the_current_body() {
        let context = chart();
        assert_eq!(eval("count(House == 10)", &context), Ok(Value::Number(1.0)));
        assert_eq!(eval("count(Retrograde)", &context), Ok(Value::Number(1.0)));
        assert_eq!(eval("any(Sign == 'Leo')", &context), Ok(Value::Bool(true)));
        assert_eq!(eval("all(House > 0)", &context), Ok(Value::Bool(true)));
        assert_eq!(eval("all(Sign == 'Leo')", &context), Ok(Value::Bool(false)));
    }

    #[test]
    fn avg_over_bodies() {
        let context = chart();
        let expected = (10.0 + 4.0 + 6.0) / 3.0;
        assert_eq!(eval("avg(House) > 6", &context), Ok(Value::Bool(expected > 6.0)));
    }

    #[test]
    fn avg_over_empty_chart_divides_by_zero() {
        let context = ChartContext::new();
        assert!(matches!(
            eval("avg(House)", &context),
            Err(EvalError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn unknown_function() {
        let context = chart();
        assert_eq!(
            eval("tally(House == 10)", &context),
            Err(EvalError::UnknownFunction {
                name: "tally".to_string()
            })
        );
    }

    #[test]
    fn wrong_arity_is_a_type_mismatch() {
        let context = chart();
        assert!(matches!(
            eval("count(House == 10, Sign == 'Leo')", &context),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn has_aspect_matches_unordered_pair() {
        let mut context = chart();
        context.push_aspect(crate::chart::Aspect {
            first: "Sun".to_string(),
            second: "Moon".to_string(),
            kind: "Trine".to_string(),
            orb: 2.1,
            applying: true,
        });
        assert_eq!(
            eval("has_aspect('Moon', 'Sun', 'Trine')", &context),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            eval("has_aspect('Sun', 'Moon', 'Square')", &context),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn trace_matches_plain_evaluation() {
        let context = chart();
        let ast = parse(tokenize("Sun.House == 10 AND Mars.Retrograde").unwrap()).unwrap();
        let evaluator = Evaluator::new(&context);

        let plain = evaluator.evaluate(&ast).unwrap();
        let explained = evaluator.explain(&ast).unwrap();
        assert_eq!(plain, explained.value);

        // Every sub-expression that ran appears, root last.
        assert!(!explained.trace.is_empty());
        let last = explained.trace.last().unwrap();
        assert_eq!(last.span, ast.span);
        assert_eq!(last.value, explained.value);
    }

    #[test]
    fn short_circuit_skips_the_trace_too() {
        let context = chart();
        let ast = parse(tokenize("false AND tally()").unwrap()).unwrap();
        let explained = Evaluator::new(&context).explain(&ast).unwrap();
        assert_eq!(explained.value, Value::Bool(false));
        // Only the literal and the root conjunction were evaluated.
        assert_eq!(explained.trace.len(), 2);
    }
}
