//! Per-validation matching state
//!
//! Tracks the stack of rules being matched, the furthest failure seen so
//! far (the one worth reporting) and the furthest `<prose>` placeholder
//! reached, along with the rule nesting limit and the packrat cache. A
//! context is created for one validation and dropped with it.

use crate::ast::{fmt_code_ranges, CodeRange};
use crate::cache::ParseCache;
use std::fmt;

/// What the matcher was looking for when it failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    Literal { text: String, case_sensitive: bool },
    Ranges(Vec<CodeRange>),
    Repetition { min: usize, found: usize },
    /// A `<prose>` placeholder was reached
    Prose(String),
    EndOfInput,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Literal {
                text,
                case_sensitive: true,
            } => write!(f, "%s\"{}\"", text),
            Expected::Literal { text, .. } => write!(f, "\"{}\"", text),
            Expected::Ranges(ranges) if ranges.is_empty() => write!(f, "no alternative"),
            Expected::Ranges(ranges) => fmt_code_ranges(ranges, f),
            Expected::Repetition { min, found } => {
                write!(f, "at least {} repetitions (matched {})", min, found)
            }
            Expected::Prose(text) => write!(f, "<{}>", text),
            Expected::EndOfInput => write!(f, "end of input"),
        }
    }
}

/// A recoverable mismatch at one position
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} at position {position}")]
pub struct ParseFailure {
    pub position: usize,
    pub expected: Expected,
}

impl ParseFailure {
    pub fn is_prose(&self) -> bool {
        matches!(self.expected, Expected::Prose(_))
    }

    /// Whether this failure should be reported in preference to `other`
    ///
    /// Further input wins; at the same position a prose failure beats an
    /// ordinary mismatch. Otherwise the earlier failure stays.
    pub fn supersedes(&self, other: &ParseFailure) -> bool {
        self.position > other.position
            || (self.position == other.position && self.is_prose() && !other.is_prose())
    }
}

/// A failure kept for reporting, with the rules that were open when it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFailure {
    pub failure: ParseFailure,
    /// Rule names from the start rule down to the failure
    pub rule_stack: Vec<String>,
}

#[derive(Debug)]
pub struct ParseContext {
    rule_stack: Vec<String>,
    deepest: Option<RecordedFailure>,
    reached_prose: Option<RecordedFailure>,
    max_depth: usize,
    cache: ParseCache,
}

impl ParseContext {
    pub fn new(max_depth: usize) -> Self {
        ParseContext {
            rule_stack: Vec::new(),
            deepest: None,
            reached_prose: None,
            max_depth,
            cache: ParseCache::new(),
        }
    }

    /// Push a rule onto the stack; `false` when the nesting limit is reached
    pub fn enter_rule(&mut self, name: &str) -> bool {
        if self.rule_stack.len() >= self.max_depth {
            return false;
        }
        self.rule_stack.push(name.to_string());
        true
    }

    pub fn exit_rule(&mut self) {
        self.rule_stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.rule_stack.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn rule_stack(&self) -> &[String] {
        &self.rule_stack
    }

    pub fn current_rule(&self) -> Option<&str> {
        self.rule_stack.last().map(String::as_str)
    }

    /// Build a failure at `position` and remember it if it is the deepest so far
    ///
    /// The rule stack is only copied when the failure is kept.
    pub fn fail(&mut self, position: usize, expected: Expected) -> ParseFailure {
        let failure = ParseFailure { position, expected };

        if self
            .deepest
            .as_ref()
            .map_or(true, |current| failure.supersedes(&current.failure))
        {
            self.deepest = Some(self.record(&failure));
        }

        if failure.is_prose()
            && self
                .reached_prose
                .as_ref()
                .map_or(true, |current| position > current.failure.position)
        {
            self.reached_prose = Some(self.record(&failure));
        }

        failure
    }

    fn record(&self, failure: &ParseFailure) -> RecordedFailure {
        RecordedFailure {
            failure: failure.clone(),
            rule_stack: self.rule_stack.clone(),
        }
    }

    pub fn deepest(&self) -> Option<&RecordedFailure> {
        self.deepest.as_ref()
    }

    pub fn take_deepest(&mut self) -> Option<RecordedFailure> {
        self.deepest.take()
    }

    /// The furthest `<prose>` placeholder reached, even if a mismatch went further
    pub fn reached_prose(&self) -> Option<&RecordedFailure> {
        self.reached_prose.as_ref()
    }

    pub fn take_reached_prose(&mut self) -> Option<RecordedFailure> {
        self.reached_prose.take()
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ParseCache {
        &mut self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_exit_rule() {
        let mut ctx = ParseContext::new(2);

        assert!(ctx.enter_rule("outer"));
        assert!(ctx.enter_rule("inner"));
        assert_eq!(ctx.rule_stack(), ["outer", "inner"]);
        assert_eq!(ctx.current_rule(), Some("inner"));

        // Limit reached: nothing is pushed
        assert!(!ctx.enter_rule("third"));
        assert_eq!(ctx.depth(), 2);

        ctx.exit_rule();
        ctx.exit_rule();
        assert_eq!(ctx.depth(), 0);
        assert_eq!(ctx.current_rule(), None);
    }

    #[test]
    fn test_deepest_failure_is_kept() {
        let mut ctx = ParseContext::new(8);
        ctx.enter_rule("a");

        ctx.fail(3, Expected::EndOfInput);
        ctx.fail(1, Expected::Ranges(vec![CodeRange::new(0x30, 0x39)]));
        assert_eq!(ctx.deepest().unwrap().failure.position, 3);

        // Same position, ordinary mismatch: first one stays
        ctx.fail(3, Expected::Ranges(vec![CodeRange::single(0x41)]));
        assert_eq!(ctx.deepest().unwrap().failure.expected, Expected::EndOfInput);

        // Same position, prose wins
        ctx.fail(3, Expected::Prose("anything".to_string()));
        assert!(ctx.deepest().unwrap().failure.is_prose());

        ctx.enter_rule("b");
        ctx.fail(5, Expected::EndOfInput);
        let deepest = ctx.take_deepest().unwrap();
        assert_eq!(deepest.failure.position, 5);
        assert_eq!(deepest.rule_stack, vec!["a", "b"]);
        assert!(ctx.deepest().is_none());
    }

    #[test]
    fn test_reached_prose_outlives_deeper_mismatch() {
        let mut ctx = ParseContext::new(8);
        ctx.enter_rule("start");
        assert!(ctx.reached_prose().is_none());

        ctx.fail(0, Expected::Prose("anything at all".to_string()));
        ctx.fail(1, Expected::EndOfInput);
        assert_eq!(ctx.deepest().unwrap().failure.position, 1);

        let prose = ctx.take_reached_prose().unwrap();
        assert_eq!(prose.failure.position, 0);
        assert_eq!(
            prose.failure.expected,
            Expected::Prose("anything at all".to_string())
        );
        assert_eq!(prose.rule_stack, vec!["start"]);
    }

    #[test]
    fn test_rule_stack_copied_only_when_kept() {
        let mut ctx = ParseContext::new(8);
        ctx.enter_rule("outer");
        ctx.fail(4, Expected::EndOfInput);

        // A shallower failure under another rule leaves the record alone
        ctx.enter_rule("inner");
        ctx.fail(2, Expected::EndOfInput);
        assert_eq!(ctx.deepest().unwrap().rule_stack, vec!["outer"]);
    }

    #[test]
    fn test_expected_display() {
        assert_eq!(
            Expected::Literal {
                text: "GET".to_string(),
                case_sensitive: false
            }
            .to_string(),
            "\"GET\""
        );
        assert_eq!(
            Expected::Literal {
                text: "x".to_string(),
                case_sensitive: true
            }
            .to_string(),
            "%s\"x\""
        );
        assert_eq!(
            Expected::Ranges(vec![CodeRange::new(0x30, 0x39)]).to_string(),
            "%x30-39"
        );
        assert_eq!(
            Expected::Repetition { min: 2, found: 1 }.to_string(),
            "at least 2 repetitions (matched 1)"
        );
        assert_eq!(Expected::Prose("text".to_string()).to_string(), "<text>");
    }
}
