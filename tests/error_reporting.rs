//! Errors must carry enough structure for a caller to build an actionable
//! message without re-scanning the formula text.

use horolang::{ChartContext, EvalError, FormulaError, LexError, ParseError, compile};

#[test]
fn lex_error_names_the_character_and_offset() {
    let err = compile("Sun.Sign #= 'Leo'").unwrap_err();
    assert_eq!(
        err,
        FormulaError::Lex(LexError::UnexpectedChar {
            position: 9,
            unexpected: '#'
        })
    );
    assert_eq!(err.to_string(), "unexpected character '#' at offset 9");
}

#[test]
fn unterminated_string_points_at_the_open_quote() {
    let err = compile("Sun.Sign == 'Leo").unwrap_err();
    assert_eq!(
        err,
        FormulaError::Lex(LexError::UnterminatedString { position: 12 })
    );
}

#[test]
fn parse_error_reports_expected_and_found() {
    let err = compile("Sun.Sign ==").unwrap_err();
    match err {
        FormulaError::Parse(ParseError::UnexpectedToken {
            position,
            expected,
            found,
        }) => {
            assert_eq!(position, 11);
            assert!(expected.contains("property"), "expected: {expected}");
            assert_eq!(found, "end of formula");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn dangling_dot_is_reported_at_the_gap() {
    let err = compile("Sun. == 'Leo'").unwrap_err();
    match err {
        FormulaError::Parse(ParseError::UnexpectedToken { expected, found, .. }) => {
            assert!(expected.contains("identifier"), "expected: {expected}");
            assert_eq!(found, "'=='");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn in_against_a_non_literal_names_the_offender() {
    let err = compile("Sun.Sign IN ('Aries', Moon.Sign)").unwrap_err();
    match err {
        FormulaError::Parse(ParseError::UnexpectedToken {
            position, found, ..
        }) => {
            assert_eq!(position, 22);
            assert_eq!(found, "identifier 'Moon'");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn eval_errors_render_the_offending_name() {
    let context = ChartContext::new();
    let err = horolang::evaluate_formula("Vertex.Sign == 'Leo'", &context).unwrap_err();
    assert_eq!(err.to_string(), "unknown property 'Vertex.Sign'");

    let err = horolang::evaluate_formula("median(1)", &context).unwrap_err();
    assert_eq!(
        err,
        FormulaError::Eval(EvalError::UnknownFunction {
            name: "median".to_string()
        })
    );
    assert_eq!(err.to_string(), "unknown function 'median'");
}

#[test]
fn no_partial_ast_escapes_a_failed_parse() {
    // A syntactically broken tail poisons the whole formula.
    assert!(compile("Sun.House == 10 AND").is_err());
    assert!(compile("(Sun.House == 10").is_err());
    assert!(compile("IN ('Aries')").is_err());
}
