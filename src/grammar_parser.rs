//! Handwritten recursive descent parser for ABNF grammars
//!
//! Consumes the token stream from [`crate::lexer`] and produces one
//! [`RuleDefinition`] per `name = elements` / `name =/ elements` statement.
//! Concatenation binds tighter than alternation; groups and single-element
//! sequences are flattened while parsing.

use crate::ast::{DefinedAs, Node, RuleDefinition};
use crate::error::GrammarSyntaxError;
use crate::lexer::{Lexer, SpannedToken, Token};

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    /// Position reported when the token stream runs out
    end: (usize, usize),
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>, end: (usize, usize)) -> Self {
        Parser {
            tokens,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn matches(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == expected)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// True when the next token belongs to the current rule
    fn in_rule(&self) -> bool {
        self.peek().is_some_and(|t| !t.starts_line())
    }

    fn error_here(&self, message: impl Into<String>) -> GrammarSyntaxError {
        let (line, column) = self
            .peek()
            .map(|t| (t.line, t.column))
            .unwrap_or(self.end);
        GrammarSyntaxError::new(line, column, message)
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(t) if t.starts_line() => format!("{} at the start of a new rule", t.token),
            Some(t) => t.token.to_string(),
            None => "end of grammar".to_string(),
        }
    }

    // rulelist: rule*
    pub fn parse_rulelist(&mut self) -> Result<Vec<RuleDefinition>, GrammarSyntaxError> {
        let mut rules = Vec::new();

        while !self.at_end() {
            rules.push(self.parse_rule()?);
        }

        Ok(rules)
    }

    // rule: rulename defined-as elements
    fn parse_rule(&mut self) -> Result<RuleDefinition, GrammarSyntaxError> {
        let start = self.consume().ok_or_else(|| self.error_here("expected rule name"))?;
        let (line, column, starts_line) = (start.line, start.column, start.starts_line());

        let name = match start.token {
            Token::RuleName(name) if starts_line => name,
            Token::RuleName(name) => {
                return Err(GrammarSyntaxError::new(
                    line,
                    column,
                    format!("rule '{}' must start in column 1", name),
                ))
            }
            other => {
                return Err(GrammarSyntaxError::new(
                    line,
                    column,
                    format!("expected rule name, found {}", other),
                ))
            }
        };

        let defined_as = match self.peek().map(|t| &t.token) {
            Some(Token::Equals) if self.in_rule() => DefinedAs::Basic,
            Some(Token::IncrementalEquals) if self.in_rule() => DefinedAs::Incremental,
            _ => {
                return Err(self.error_here(format!(
                    "expected '=' or '=/' after rule name '{}', found {}",
                    name,
                    self.describe_next()
                )))
            }
        };
        self.consume();

        if !self.in_rule() {
            return Err(self.error_here(format!("rule '{}' has no elements", name)));
        }

        let elements = self.parse_alternation()?;

        // Anything left on the rule's lines is a stray token like ')'
        if self.in_rule() {
            return Err(self.error_here(format!(
                "unexpected {} in rule '{}'",
                self.describe_next(),
                name
            )));
        }

        Ok(RuleDefinition {
            name,
            defined_as,
            elements,
            line,
        })
    }

    // alternation: concatenation *("/" concatenation)
    fn parse_alternation(&mut self) -> Result<Node, GrammarSyntaxError> {
        let mut alts = vec![self.parse_concatenation()?];

        while self.in_rule() && self.matches(&Token::Slash) {
            self.consume();
            alts.push(self.parse_concatenation()?);
        }

        Ok(Node::alternation(alts))
    }

    // concatenation: repetition *(repetition)
    fn parse_concatenation(&mut self) -> Result<Node, GrammarSyntaxError> {
        let mut items = vec![self.parse_repetition()?];

        while self.in_rule()
            && !self.matches(&Token::Slash)
            && !self.matches(&Token::RParen)
            && !self.matches(&Token::RBracket)
        {
            items.push(self.parse_repetition()?);
        }

        Ok(Node::concat(items))
    }

    // repetition: [repeat] element
    // repeat: 1*DIGIT / (*DIGIT "*" *DIGIT)
    fn parse_repetition(&mut self) -> Result<Node, GrammarSyntaxError> {
        let (line, column) = self
            .peek()
            .map(|t| (t.line, t.column))
            .unwrap_or(self.end);

        let min = match self.peek().map(|t| &t.token) {
            Some(Token::Number(n)) if self.in_rule() => {
                let n = *n;
                self.consume();
                Some(n)
            }
            _ => None,
        };

        let bounds = if self.in_rule() && self.matches(&Token::Star) {
            self.consume();
            let max = match self.peek().map(|t| &t.token) {
                Some(Token::Number(n)) if self.in_rule() => {
                    let n = *n;
                    self.consume();
                    Some(n)
                }
                _ => None,
            };
            Some((min.unwrap_or(0), max))
        } else {
            min.map(|n| (n, Some(n)))
        };

        let element = self.parse_element()?;

        match bounds {
            None => Ok(element),
            Some((min, Some(max))) if min > max => Err(GrammarSyntaxError::new(
                line,
                column,
                format!("repeat minimum {} exceeds maximum {}", min, max),
            )),
            Some((min, max)) => Ok(Node::repeat(element, min, max)),
        }
    }

    // element: rulename / group / option / char-val / num-val / prose-val
    fn parse_element(&mut self) -> Result<Node, GrammarSyntaxError> {
        if !self.in_rule() {
            return Err(self.error_here(format!(
                "expected element, found {}",
                self.describe_next()
            )));
        }

        let Some(next) = self.consume() else {
            return Err(self.error_here("expected element, found end of grammar"));
        };
        let open = (next.line, next.column);

        match next.token {
            Token::RuleName(name) => Ok(Node::RuleRef(name)),
            Token::CharVal {
                text,
                case_sensitive,
            } => Ok(Node::Literal {
                text,
                case_sensitive,
            }),
            Token::NumVal(ranges) => Ok(Node::NumericValue(ranges)),
            Token::ProseVal(text) => Ok(Node::Prose(text)),
            Token::LParen => {
                let inner = self.parse_group_body(open, "group")?;
                self.expect_close(&Token::RParen, open, "group")?;
                Ok(inner)
            }
            Token::LBracket => {
                let inner = self.parse_group_body(open, "option")?;
                self.expect_close(&Token::RBracket, open, "option")?;
                Ok(Node::optional(inner))
            }
            other => Err(GrammarSyntaxError::new(
                open.0,
                open.1,
                format!("expected element, found {}", other),
            )),
        }
    }

    fn parse_group_body(
        &mut self,
        open: (usize, usize),
        what: &str,
    ) -> Result<Node, GrammarSyntaxError> {
        if self.in_rule() && (self.matches(&Token::RParen) || self.matches(&Token::RBracket)) {
            return Err(GrammarSyntaxError::new(open.0, open.1, format!("empty {}", what)));
        }
        self.parse_alternation()
    }

    fn expect_close(
        &mut self,
        close: &Token,
        open: (usize, usize),
        what: &str,
    ) -> Result<(), GrammarSyntaxError> {
        if self.in_rule() && self.matches(close) {
            self.consume();
            return Ok(());
        }
        Err(self.error_here(format!(
            "expected {} to close {} opened at line {}, column {}, found {}",
            close,
            what,
            open.0,
            open.1,
            self.describe_next()
        )))
    }
}

/// Parse ABNF source text into its rule definitions, in source order
pub fn parse_abnf(input: &str) -> Result<Vec<RuleDefinition>, GrammarSyntaxError> {
    let tokens = Lexer::new(input).tokenize()?;

    let line_count = input.lines().count().max(1);
    let last_column = input.lines().last().map_or(0, |l| l.chars().count()) + 1;

    let mut parser = Parser::new(tokens, (line_count, last_column));
    parser.parse_rulelist()
}
