use std::mem;

use crate::ast::{CmpOp, Expr, ExprKind, LogicOp, Span, Token, TokenKind};
use crate::error::ParseError;
use crate::value::Value;

/// Maximum depth of the expression tree a formula may build: parenthesized
/// groups, calls, `NOT` chains and `AND`/`OR` chains all count, because a
/// flat `a AND b AND c ...` chain still accumulates one tree level per
/// operator.
///
/// Evaluation is a recursive tree walk, so bounding the built tree's depth
/// also bounds the evaluator's stack usage against adversarial formulas.
pub const MAX_DEPTH: usize = 64;

/// Recursive-descent parser over a token sequence.
///
/// Precedence, lowest to highest: `OR`, `AND`, `NOT`, comparison.
/// `A OR B AND C` therefore parses as `A OR (B AND C)`.
///
/// ```text
/// expr        := or_expr
/// or_expr     := and_expr (OR and_expr)*
/// and_expr    := not_expr (AND not_expr)*
/// not_expr    := NOT not_expr | comparison
/// comparison  := operand ( cmp_op operand | IN '(' literal_list ')' )?
/// operand     := property_path | literal | call | '(' expr ')'
/// ```
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// [`tokenize`](crate::lexer::tokenize) already terminates its output
    /// with `Eof`; a sequence arriving without one (including an empty
    /// sequence) gets the sentinel appended so `current()` is total.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token::new(TokenKind::Eof, Span::new(end, end)));
        }
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn current(&self) -> &Token {
        // The Eof sentinel is never advanced past.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        mem::discriminant(&self.current().kind) == mem::discriminant(kind)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            position: token.span.start,
            expected: expected.to_string(),
            found: token.kind.describe(),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            let token = self.current().clone();
            self.advance();
            Ok(token)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(ParseError::NestingTooDeep { limit: MAX_DEPTH })
        } else {
            Ok(())
        }
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Parse a complete formula: one expression followed by end of input.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        if self.current().kind != TokenKind::Eof {
            return Err(self.unexpected("end of formula"));
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        // Each wrap deepens the left-leaning chain by one level, so flat
        // chains are charged against the cap just like nested parentheses.
        let mut wraps = 0usize;
        while self.check(&TokenKind::Or) {
            self.advance();
            self.descend()?;
            wraps += 1;
            let right = self.parse_and()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Logical {
                    op: LogicOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        self.depth -= wraps;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;

        let mut wraps = 0usize;
        while self.check(&TokenKind::And) {
            self.advance();
            self.descend()?;
            wraps += 1;
            let right = self.parse_not()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Logical {
                    op: LogicOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        self.depth -= wraps;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            let not_span = self.current().span;
            self.advance();
            self.descend()?;
            let operand = self.parse_not()?;
            self.ascend();
            let span = not_span.to(operand.span);
            return Ok(Expr::new(ExprKind::Not(Box::new(operand)), span));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;

        let op = match &self.current().kind {
            TokenKind::Eq => Some(CmpOp::Eq),
            TokenKind::Ne => Some(CmpOp::Ne),
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Le => Some(CmpOp::Le),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::Ge => Some(CmpOp::Ge),
            TokenKind::In => {
                self.advance();
                return self.parse_in_set(left);
            }
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let right = self.parse_operand()?;
            let span = left.span.to(right.span);
            return Ok(Expr::new(
                ExprKind::Comparison {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            ));
        }
        Ok(left)
    }

    /// `IN '(' (literal (',' literal)*)? ')'` — the haystack is literals
    /// only, which keeps set membership bounded and pre-evaluable. The
    /// empty list is legal and always evaluates to false.
    fn parse_in_set(&mut self, needle: Expr) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen, "'(' after IN")?;

        let mut haystack = Vec::new();
        if !self.check(&TokenKind::RParen) {
            haystack.push(self.parse_literal_value()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                haystack.push(self.parse_literal_value()?);
            }
        }
        let rparen = self.expect(TokenKind::RParen, "')' to close IN list")?;

        let span = needle.span.to(rparen.span);
        Ok(Expr::new(
            ExprKind::InSet {
                needle: Box::new(needle),
                haystack,
            },
            span,
        ))
    }

    fn parse_literal_value(&mut self) -> Result<Value, ParseError> {
        let value = match &self.current().kind {
            TokenKind::Number(n) => Value::Number(*n),
            TokenKind::Str(s) => Value::Str(s.clone()),
            TokenKind::Bool(b) => Value::Bool(*b),
            _ => return Err(self.unexpected("a literal (number, string or boolean)")),
        };
        self.advance();
        Ok(value)
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Value::Number(n)), token.span))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Value::Str(s)), token.span))
            }
            TokenKind::Bool(b) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Value::Bool(b)), token.span))
            }
            TokenKind::LParen => {
                self.advance();
                self.descend()?;
                let inner = self.parse_expression()?;
                self.ascend();
                let rparen = self.expect(TokenKind::RParen, "')'")?;
                // Widen the span to cover the parentheses so traces quote
                // the group as written.
                Ok(Expr::new(inner.kind, token.span.to(rparen.span)))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.parse_call(name, token.span)
                } else {
                    self.parse_property_path(name, token.span)
                }
            }
            _ => Err(self.unexpected("a property, literal, function call or '('")),
        }
    }

    /// `IDENTIFIER ('.' IDENTIFIER)*` — the lexer emits the dots; the
    /// parser assembles the path. Path validity is the evaluator's job.
    fn parse_property_path(&mut self, first: String, first_span: Span) -> Result<Expr, ParseError> {
        let mut path = vec![first];
        let mut span = first_span;

        while self.check(&TokenKind::Dot) {
            self.advance();
            let segment = self.expect(
                TokenKind::Identifier(String::new()),
                "identifier after '.'",
            )?;
            if let TokenKind::Identifier(name) = segment.kind {
                path.push(name);
            }
            span = span.to(segment.span);
        }

        Ok(Expr::new(ExprKind::Property(path), span))
    }

    fn parse_call(&mut self, name: String, name_span: Span) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        self.descend()?;

        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            args.push(self.parse_expression()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }

        self.ascend();
        let rparen = self.expect(TokenKind::RParen, "')' to close argument list")?;

        Ok(Expr::new(
            ExprKind::Call { name, args },
            name_span.to(rparen.span),
        ))
    }
}

/// Parse a token sequence into an AST.
pub fn parse(tokens: Vec<Token>) -> Result<Expr, ParseError> {
    Parser::new(tokens).parse()
}
