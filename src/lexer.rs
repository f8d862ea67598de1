use crate::ast::{Span, Token, TokenKind};
use crate::error::LexError;

/// Hand-rolled lexer over the formula text.
///
/// Offsets are character offsets (the input is collected into a `Vec<char>`
/// up front), which is what every error and span in the engine reports.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Read a quoted string. Sign and aspect names contain no control
    /// characters, so there is no escape processing: the literal runs to
    /// the matching quote.
    fn read_string(&mut self, quote: char) -> Result<TokenKind, LexError> {
        let start = self.position;
        self.advance(); // consume opening quote

        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch == quote {
                self.advance();
                return Ok(TokenKind::Str(result));
            }
            result.push(ch);
            self.advance();
        }

        Err(LexError::UnterminatedString { position: start })
    }

    fn read_number(&mut self) -> TokenKind {
        let mut number = String::new();

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !number.contains('.')
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Only digits and at most one interior dot reach this point, so
        // the parse cannot fail.
        TokenKind::Number(number.parse::<f64>().unwrap_or(0.0))
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let start = self.position;
        let kind = match self.current_char() {
            None => TokenKind::Eof,
            Some('(') => {
                self.advance();
                TokenKind::LParen
            }
            Some(')') => {
                self.advance();
                TokenKind::RParen
            }
            Some('.') => {
                self.advance();
                TokenKind::Dot
            }
            Some(',') => {
                self.advance();
                TokenKind::Comma
            }
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::Eq
                } else {
                    return Err(LexError::UnexpectedChar {
                        position: start,
                        unexpected: '=',
                    });
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::Ne
                } else {
                    return Err(LexError::UnexpectedChar {
                        position: start,
                        unexpected: '!',
                    });
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::Le
                } else {
                    self.advance();
                    TokenKind::Lt
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::Ge
                } else {
                    self.advance();
                    TokenKind::Gt
                }
            }
            Some(quote @ ('"' | '\'')) => self.read_string(quote)?,
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();

                // Keywords are case-insensitive; property identifiers
                // stay case-sensitive.
                match ident.to_ascii_lowercase().as_str() {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    "in" => TokenKind::In,
                    "true" => TokenKind::Bool(true),
                    "false" => TokenKind::Bool(false),
                    _ => TokenKind::Identifier(ident),
                }
            }
            Some(ch) => {
                return Err(LexError::UnexpectedChar {
                    position: start,
                    unexpected: ch,
                });
            }
        };

        Ok(Token::new(kind, Span::new(start, self.position)))
    }

    /// Tokenize the whole input, ending with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// Tokenize a formula string.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("AND and Or NOT in True FALSE"),
            vec![
                TokenKind::And,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::In,
                TokenKind::Bool(true),
                TokenKind::Bool(false),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dotted_path_lexes_as_three_tokens() {
        assert_eq!(
            kinds("Sun.Sign"),
            vec![
                TokenKind::Identifier("Sun".into()),
                TokenKind::Dot,
                TokenKind::Identifier("Sign".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(
            kinds("== != < <= > >="),
            vec![
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Gt,
                TokenKind::Ge,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(
            kinds("10 29.5 'Aries' \"Leo\""),
            vec![
                TokenKind::Number(10.0),
                TokenKind::Number(29.5),
                TokenKind::Str("Aries".into()),
                TokenKind::Str("Leo".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn spans_track_character_offsets() {
        let tokens = tokenize("Sun == 5").unwrap();
        assert_eq!(tokens[0].span, Span::new(0, 3));
        assert_eq!(tokens[1].span, Span::new(4, 6));
        assert_eq!(tokens[2].span, Span::new(7, 8));
    }

    #[test]
    fn stray_characters_are_rejected() {
        assert_eq!(
            tokenize("Sun @ Moon").unwrap_err(),
            LexError::UnexpectedChar {
                position: 4,
                unexpected: '@'
            }
        );
        assert!(matches!(
            tokenize("# comment").unwrap_err(),
            LexError::UnexpectedChar { unexpected: '#', .. }
        ));
        assert!(matches!(
            tokenize("a = b").unwrap_err(),
            LexError::UnexpectedChar { unexpected: '=', .. }
        ));
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(
            tokenize("Sign == 'Aries").unwrap_err(),
            LexError::UnterminatedString { position: 8 }
        );
    }
}
