//! Error types for grammar loading and document validation

use std::fmt;

/// The ABNF source itself is malformed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("grammar syntax error at line {line}, column {column}: {message}")]
pub struct GrammarSyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl GrammarSyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        GrammarSyntaxError {
            line,
            column,
            message: message.into(),
        }
    }
}

/// A rule name is referenced but never defined
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct UndefinedRuleError {
    pub name: String,
    /// Rule whose body holds the reference, when known
    pub referenced_from: Option<String>,
}

impl fmt::Display for UndefinedRuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.referenced_from {
            Some(from) => write!(f, "undefined rule '{}' referenced from '{}'", self.name, from),
            None => write!(f, "undefined rule '{}'", self.name),
        }
    }
}

/// The requested start rule does not exist
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown start rule '{name}'")]
pub struct UnknownStartRuleError {
    pub name: String,
}

/// Errors raised while loading a grammar
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error(transparent)]
    Syntax(#[from] GrammarSyntaxError),

    #[error(transparent)]
    UndefinedRule(#[from] UndefinedRuleError),

    #[error(transparent)]
    UnknownStartRule(#[from] UnknownStartRuleError),
}

/// Matching reached a `<prose>` placeholder the grammar never made precise
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {column}: grammar is unspecified at <{prose}> (in {})", RulePath(.rule_stack))]
pub struct UnspecifiedGrammarError {
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub prose: String,
    pub rule_stack: Vec<String>,
}

/// The document does not conform to the grammar
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {column}: expected {expected} in {}, found {}", RulePath(.rule_stack), Found(.found))]
pub struct ValidationError {
    /// Codepoint offset of the failure
    pub position: usize,
    pub line: usize,
    pub column: usize,
    /// Rules entered from the start rule down to the failure
    pub rule_stack: Vec<String>,
    pub expected: String,
    /// Codepoint at the failure, `None` at end of input
    pub found: Option<char>,
}

/// Why a single document failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Unspecified(#[from] UnspecifiedGrammarError),

    #[error(transparent)]
    UndefinedRule(#[from] UndefinedRuleError),

    #[error("line {line}, column {column}: rule nesting exceeded the limit of {limit}")]
    DepthLimitExceeded {
        limit: usize,
        position: usize,
        line: usize,
        column: usize,
    },
}

impl ValidateError {
    /// Line and column of the failure, when it has one
    pub fn line_col(&self) -> Option<(usize, usize)> {
        match self {
            ValidateError::Invalid(e) => Some((e.line, e.column)),
            ValidateError::Unspecified(e) => Some((e.line, e.column)),
            ValidateError::DepthLimitExceeded { line, column, .. } => Some((*line, *column)),
            ValidateError::UndefinedRule(_) => None,
        }
    }
}

/// Any error from the one-call [`crate::Grammar::validate`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Validate(#[from] ValidateError),
}

impl From<UnknownStartRuleError> for Error {
    fn from(e: UnknownStartRuleError) -> Self {
        Error::Grammar(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

struct RulePath<'a>(&'a [String]);

impl fmt::Display for RulePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<top>");
        }
        write!(f, "{}", self.0.join(" > "))
    }
}

struct Found<'a>(&'a Option<char>);

impl fmt::Display for Found<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ch) => write!(f, "{:?}", ch),
            None => write!(f, "end of input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError {
            position: 2,
            line: 1,
            column: 3,
            rule_stack: vec!["start".to_string(), "DIGIT".to_string()],
            expected: "%x30-39".to_string(),
            found: Some('a'),
        };
        insta::assert_snapshot!(err.to_string(), @"line 1, column 3: expected %x30-39 in start > DIGIT, found 'a'");
    }

    #[test]
    fn test_end_of_input_display() {
        let err = ValidationError {
            position: 0,
            line: 1,
            column: 1,
            rule_stack: vec![],
            expected: "\"x\"".to_string(),
            found: None,
        };
        assert_eq!(
            err.to_string(),
            "line 1, column 1: expected \"x\" in <top>, found end of input"
        );
    }

    #[test]
    fn test_grammar_error_is_transparent() {
        let err: GrammarError = GrammarSyntaxError::new(4, 7, "unbalanced ')'").into();
        assert_eq!(
            err.to_string(),
            "grammar syntax error at line 4, column 7: unbalanced ')'"
        );

        let err: GrammarError = UndefinedRuleError {
            name: "b".to_string(),
            referenced_from: Some("a".to_string()),
        }
        .into();
        assert_eq!(err.to_string(), "undefined rule 'b' referenced from 'a'");
    }

    #[test]
    fn test_line_col() {
        let err = ValidateError::DepthLimitExceeded {
            limit: 8,
            position: 10,
            line: 2,
            column: 4,
        };
        assert_eq!(err.line_col(), Some((2, 4)));
        assert_eq!(
            err.to_string(),
            "line 2, column 4: rule nesting exceeded the limit of 8"
        );
    }
}
