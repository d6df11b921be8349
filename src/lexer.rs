//! Lexer for ABNF grammar syntax
//!
//! Converts grammar text into a stream of tokens, skipping whitespace and
//! `;` comments. Line folding is not resolved here: every token records
//! whether it starts in column 1, and the parser treats such a token as the
//! beginning of the next rule.

use crate::ast::CodeRange;
use crate::error::GrammarSyntaxError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    RuleName(String),
    /// `=`
    Equals,
    /// `=/`
    IncrementalEquals,
    Slash,
    Star,
    Number(usize),
    LParen,
    RParen,
    LBracket,
    RBracket,
    CharVal { text: String, case_sensitive: bool },
    NumVal(Vec<CodeRange>),
    ProseVal(String),
}

/// A token with its source position (1-based line and column)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

impl SpannedToken {
    /// Tokens in column 1 begin a new rule; anything indented continues one
    pub fn starts_line(&self) -> bool {
        self.column == 1
    }
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, GrammarSyntaxError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.input.len() {
                break;
            }

            let (line, column) = (self.line, self.column);
            let token = self.next_token()?;
            tokens.push(SpannedToken {
                token,
                line,
                column,
            });
        }

        Ok(tokens)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == ';' {
                while let Some(ch) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> GrammarSyntaxError {
        GrammarSyntaxError::new(self.line, self.column, message)
    }

    fn next_token(&mut self) -> Result<Token, GrammarSyntaxError> {
        match self.peek() {
            Some('=') => {
                self.advance();
                if self.peek() == Some('/') {
                    self.advance();
                    Ok(Token::IncrementalEquals)
                } else {
                    Ok(Token::Equals)
                }
            }
            Some('/') => {
                self.advance();
                Ok(Token::Slash)
            }
            Some('*') => {
                self.advance();
                Ok(Token::Star)
            }
            Some('(') => {
                self.advance();
                Ok(Token::LParen)
            }
            Some(')') => {
                self.advance();
                Ok(Token::RParen)
            }
            Some('[') => {
                self.advance();
                Ok(Token::LBracket)
            }
            Some(']') => {
                self.advance();
                Ok(Token::RBracket)
            }
            Some('"') => {
                let text = self.read_quoted()?;
                Ok(Token::CharVal {
                    text,
                    case_sensitive: false,
                })
            }
            Some('<') => self.read_prose(),
            Some('%') => self.read_percent(),
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) if ch.is_ascii_alphabetic() => Ok(self.read_rulename()),
            Some(ch) => Err(self.error(format!("unexpected character {:?}", ch))),
            None => Err(self.error("unexpected end of grammar")),
        }
    }

    fn read_rulename(&mut self) -> Token {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Token::RuleName(name)
    }

    fn read_number(&mut self) -> Result<Token, GrammarSyntaxError> {
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        digits
            .parse()
            .map(Token::Number)
            .map_err(|_| self.error(format!("repeat count {} is too large", digits)))
    }

    /// `"text"`: no escapes, no line breaks
    fn read_quoted(&mut self) -> Result<String, GrammarSyntaxError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(text);
                }
                '\n' | '\r' => break,
                _ => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        Err(GrammarSyntaxError::new(
            line,
            column,
            "unterminated quoted string",
        ))
    }

    fn read_prose(&mut self) -> Result<Token, GrammarSyntaxError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // '<'
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '>' => {
                    self.advance();
                    return Ok(Token::ProseVal(text));
                }
                '\n' | '\r' => break,
                _ => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        Err(GrammarSyntaxError::new(
            line,
            column,
            "unterminated prose value",
        ))
    }

    /// `%s"..."`, `%i"..."`, or a numeric value `%b` / `%d` / `%x`
    fn read_percent(&mut self) -> Result<Token, GrammarSyntaxError> {
        self.advance(); // '%'
        let marker = self
            .peek()
            .ok_or_else(|| self.error("expected b, d, x, s or i after '%'"))?;

        match marker.to_ascii_lowercase() {
            's' | 'i' if self.peek_at(1) == Some('"') => {
                self.advance();
                let text = self.read_quoted()?;
                Ok(Token::CharVal {
                    text,
                    case_sensitive: marker.eq_ignore_ascii_case(&'s'),
                })
            }
            'b' => self.read_num_val(2),
            'd' => self.read_num_val(10),
            'x' => self.read_num_val(16),
            _ => Err(self.error(format!(
                "expected b, d, x, s or i after '%', found {:?}",
                marker
            ))),
        }
    }

    fn read_num_val(&mut self, radix: u32) -> Result<Token, GrammarSyntaxError> {
        self.advance(); // base marker
        let first = self.read_code_point(radix)?;

        if self.peek() == Some('-') {
            self.advance();
            let high = self.read_code_point(radix)?;
            if first > high {
                return Err(self.error(format!(
                    "numeric range starts above its end ({:X} > {:X})",
                    first, high
                )));
            }
            return Ok(Token::NumVal(vec![CodeRange::new(first, high)]));
        }

        let mut values = vec![CodeRange::single(first)];
        while self.peek() == Some('.') {
            self.advance();
            values.push(CodeRange::single(self.read_code_point(radix)?));
        }
        Ok(Token::NumVal(values))
    }

    fn read_code_point(&mut self, radix: u32) -> Result<u32, GrammarSyntaxError> {
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_digit(radix) {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if digits.is_empty() {
            return Err(self.error(format!("expected base-{} digits in numeric value", radix)));
        }

        match u32::from_str_radix(&digits, radix) {
            Ok(value) if value <= char::MAX as u32 => Ok(value),
            _ => Err(self.error(format!(
                "numeric value {} is outside the Unicode range",
                digits
            ))),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::RuleName(name) => write!(f, "rule name '{}'", name),
            Token::Equals => write!(f, "'='"),
            Token::IncrementalEquals => write!(f, "'=/'"),
            Token::Slash => write!(f, "'/'"),
            Token::Star => write!(f, "'*'"),
            Token::Number(n) => write!(f, "number {}", n),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::CharVal { text, .. } => write!(f, "string \"{}\"", text),
            Token::NumVal(_) => write!(f, "numeric value"),
            Token::ProseVal(text) => write!(f, "prose <{}>", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_simple_rule() {
        assert_eq!(
            tokens(r#"rule = "hello""#),
            vec![
                Token::RuleName("rule".to_string()),
                Token::Equals,
                Token::CharVal {
                    text: "hello".to_string(),
                    case_sensitive: false
                },
            ]
        );
    }

    #[test]
    fn test_incremental_and_repeat() {
        assert_eq!(
            tokens("digits =/ 2*3DIGIT"),
            vec![
                Token::RuleName("digits".to_string()),
                Token::IncrementalEquals,
                Token::Number(2),
                Token::Star,
                Token::Number(3),
                Token::RuleName("DIGIT".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let toks = tokens("; header comment\na = b ; trailing\n");
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[0], Token::RuleName("a".to_string()));
    }

    #[test]
    fn test_line_start_flag() {
        let toks = Lexer::new("a = b\n    c\nd = e").tokenize().unwrap();
        let starts: Vec<bool> = toks.iter().map(|t| t.starts_line()).collect();
        assert_eq!(starts, vec![true, false, false, false, true, false, false]);
        assert_eq!((toks[3].line, toks[3].column), (2, 5));
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(
            tokens("%x30-39 %d13.10 %b1"),
            vec![
                Token::NumVal(vec![CodeRange::new(0x30, 0x39)]),
                Token::NumVal(vec![CodeRange::single(13), CodeRange::single(10)]),
                Token::NumVal(vec![CodeRange::single(1)]),
            ]
        );
    }

    #[test]
    fn test_case_sensitive_strings() {
        assert_eq!(
            tokens(r#"%s"aB" %i"cd""#),
            vec![
                Token::CharVal {
                    text: "aB".to_string(),
                    case_sensitive: true
                },
                Token::CharVal {
                    text: "cd".to_string(),
                    case_sensitive: false
                },
            ]
        );
    }

    #[test]
    fn test_prose() {
        assert_eq!(
            tokens("x = <any text, really>"),
            vec![
                Token::RuleName("x".to_string()),
                Token::Equals,
                Token::ProseVal("any text, really".to_string()),
            ]
        );
    }

    #[test]
    fn test_errors_carry_position() {
        let err = Lexer::new("a = \"open\nb = c").tokenize().unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));
        assert!(err.message.contains("unterminated"));

        let err = Lexer::new("a = %x39-30").tokenize().unwrap_err();
        assert!(err.message.contains("range"));

        let err = Lexer::new("a = %q12").tokenize().unwrap_err();
        assert!(err.message.contains("after '%'"));

        let err = Lexer::new("a = %x110000").tokenize().unwrap_err();
        assert!(err.message.contains("Unicode"));

        let err = Lexer::new("a = b_c").tokenize().unwrap_err();
        assert_eq!((err.line, err.column), (1, 6));
    }
}
