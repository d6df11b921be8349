//! Whole-document validation against a start rule

use crate::ast::Rule;
use crate::error::{UnspecifiedGrammarError, ValidateError, ValidationError};
use crate::input_stream::InputStream;
use crate::matcher::{MatchError, Matcher};
use crate::parse_context::{Expected, ParseContext, ParseFailure, RecordedFailure};
use crate::parse_tree::Match;
use crate::registry::Grammar;
use std::sync::Arc;

/// Rule nesting allowed by default
///
/// Each nested rule takes several kilobytes of stack in a debug build; this
/// keeps a full-depth validation well inside a spawned thread's 2 MiB.
const DEFAULT_MAX_DEPTH: usize = 128;

/// Limits applied to each validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Deepest rule nesting allowed before the validation is aborted
    pub max_depth: usize,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        ValidatorOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Checks documents against one start rule of a [`Grammar`]
///
/// Cheap to create and to share between threads; every call to
/// [`Validator::parse_all`] uses its own parse context and cache.
#[derive(Debug, Clone)]
pub struct Validator<'g> {
    grammar: &'g Grammar,
    rule_index: usize,
    rule: &'g Rule,
    options: ValidatorOptions,
}

impl<'g> Validator<'g> {
    pub(crate) fn new(
        grammar: &'g Grammar,
        rule_index: usize,
        rule: &'g Rule,
        options: ValidatorOptions,
    ) -> Self {
        Validator {
            grammar,
            rule_index,
            rule,
            options,
        }
    }

    /// Name of the start rule, as spelled in the grammar
    pub fn start_rule(&self) -> &str {
        &self.rule.name
    }

    /// Match the whole document against the start rule
    ///
    /// Succeeds only when every codepoint of `document` is consumed. A
    /// failed document that reached a `<prose>` placeholder is reported as
    /// [`ValidateError::Unspecified`], even when a mismatch got further.
    pub fn parse_all(&self, document: &str) -> Result<Arc<Match>, ValidateError> {
        let matcher = Matcher::new(self.grammar, document);
        let mut ctx = ParseContext::new(self.options.max_depth);

        let outcome = matcher.match_rule(self.rule_index, self.rule, 0, &mut ctx);
        log::debug!(
            "validated {} codepoints against {}: {} cache entries, {} hits, {} misses",
            matcher.input().len(),
            self.rule.name,
            ctx.cache().len(),
            ctx.cache().hits(),
            ctx.cache().misses()
        );

        let input = matcher.input();
        match outcome {
            Ok(matched) if matched.consumed == input.len() => Ok(matched),
            Ok(matched) => {
                let end = matched.end();
                let failure = match ctx.take_deepest() {
                    Some(deepest) if deepest.failure.position >= end => deepest,
                    _ => self.at_start_rule(ParseFailure {
                        position: end,
                        expected: Expected::EndOfInput,
                    }),
                };
                Err(report(ctx.take_reached_prose().unwrap_or(failure), input))
            }
            Err(MatchError::Mismatch(failure)) => {
                let failure = ctx
                    .take_reached_prose()
                    .or_else(|| ctx.take_deepest())
                    .unwrap_or_else(|| self.at_start_rule(failure));
                Err(report(failure, input))
            }
            Err(MatchError::Undefined(e)) => Err(ValidateError::UndefinedRule(e)),
            Err(MatchError::DepthExceeded { limit, position }) => {
                let (line, column) = input.line_col(position);
                Err(ValidateError::DepthLimitExceeded {
                    limit,
                    position,
                    line,
                    column,
                })
            }
        }
    }

    fn at_start_rule(&self, failure: ParseFailure) -> RecordedFailure {
        RecordedFailure {
            failure,
            rule_stack: vec![self.rule.name.clone()],
        }
    }

    /// Like [`Validator::parse_all`], without the parse tree
    pub fn validate(&self, document: &str) -> Result<(), ValidateError> {
        self.parse_all(document).map(|_| ())
    }
}

fn report(recorded: RecordedFailure, input: &InputStream) -> ValidateError {
    let RecordedFailure {
        failure: ParseFailure { position, expected },
        rule_stack,
    } = recorded;
    let (line, column) = input.line_col(position);

    match expected {
        Expected::Prose(prose) => ValidateError::Unspecified(UnspecifiedGrammarError {
            position,
            line,
            column,
            prose,
            rule_stack,
        }),
        expected => ValidateError::Invalid(ValidationError {
            position,
            line,
            column,
            rule_stack,
            expected: expected.to_string(),
            found: input.char_at(position),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_requires_full_input() {
        let grammar = Grammar::from_abnf("start = 1*DIGIT\n").unwrap();
        let validator = grammar.get("start").unwrap();

        let tree = validator.parse_all("12345").unwrap();
        assert_eq!(tree.consumed, 5);
        assert_eq!(tree.rule_name(), Some("start"));

        let err = validator.parse_all("12a45").unwrap_err();
        match err {
            ValidateError::Invalid(e) => {
                assert_eq!((e.line, e.column), (1, 3));
                assert_eq!(e.rule_stack, vec!["start", "DIGIT"]);
                assert_eq!(e.expected, "%x30-39");
                assert_eq!(e.found, Some('a'));
            }
            other => panic!("Expected invalid document, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_input_without_deeper_failure() {
        let grammar = Grammar::from_abnf("start = \"ab\"\n").unwrap();
        let err = grammar.get("start").unwrap().validate("abc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 1, column 3: expected end of input in start, found 'c'"
        );
    }

    #[test]
    fn test_empty_document() {
        let grammar = Grammar::from_abnf("start = *ALPHA\nword = 1*ALPHA\n").unwrap();
        assert!(grammar.get("start").unwrap().validate("").is_ok());

        let err = grammar.get("word").unwrap().validate("").unwrap_err();
        match err {
            ValidateError::Invalid(e) => {
                assert_eq!(e.position, 0);
                assert_eq!(e.found, None);
            }
            other => panic!("Expected invalid document, got {:?}", other),
        }
    }

    #[test]
    fn test_prose_reports_unspecified() {
        let grammar = Grammar::from_abnf("start = \"v=\" version\nversion = <defined elsewhere>\n")
            .unwrap();
        let err = grammar.get("start").unwrap().validate("v=1").unwrap_err();
        match err {
            ValidateError::Unspecified(e) => {
                assert_eq!(e.prose, "defined elsewhere");
                assert_eq!(e.column, 3);
                assert_eq!(e.rule_stack, vec!["start", "version"]);
            }
            other => panic!("Expected unspecified grammar, got {:?}", other),
        }
    }

    #[test]
    fn test_prose_reached_before_deeper_mismatch() {
        let grammar = Grammar::from_abnf("start = <anything at all> / \"a\" \"b\"\n").unwrap();
        let validator = grammar.get("start").unwrap();

        match validator.validate("ac").unwrap_err() {
            ValidateError::Unspecified(e) => {
                assert_eq!(e.prose, "anything at all");
                assert_eq!(e.position, 0);
                assert_eq!(e.rule_stack, vec!["start"]);
            }
            other => panic!("Expected unspecified grammar, got {:?}", other),
        }
        assert!(validator.validate("ab").is_ok());

        // Trailing input after a shorter alternative
        match validator.validate("abc").unwrap_err() {
            ValidateError::Unspecified(e) => assert_eq!(e.column, 1),
            other => panic!("Expected unspecified grammar, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_limit_is_reported() {
        let grammar = Grammar::from_abnf("list = \"x\" [ list ]\n").unwrap();
        let validator = grammar
            .get_with("list", ValidatorOptions::new().with_max_depth(10))
            .unwrap();

        assert!(validator.validate("xxxxx").is_ok());
        let err = validator.validate(&"x".repeat(20)).unwrap_err();
        assert_eq!(
            err,
            ValidateError::DepthLimitExceeded {
                limit: 10,
                position: 10,
                line: 1,
                column: 11,
            }
        );
    }

    #[test]
    fn test_options_default() {
        assert_eq!(ValidatorOptions::default().max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(ValidatorOptions::new().with_max_depth(4).max_depth, 4);
    }
}
