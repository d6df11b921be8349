//! Matching engine
//!
//! A recursive descent interpreter over [`Node`] trees. Every node kind is
//! matched at an explicit codepoint position and either yields a [`Match`]
//! or a [`ParseFailure`]. Alternation tries every alternative and keeps the
//! longest; rule matches are memoized per position in the context's cache.
//!
//! Left recursion never reaches this module: grammars containing it are
//! rejected when they are loaded.

use crate::ast::{CodeRange, Node, Rule};
use crate::error::UndefinedRuleError;
use crate::input_stream::InputStream;
use crate::parse_context::{Expected, ParseContext, ParseFailure};
use crate::parse_tree::{Match, MatchKind};
use crate::registry::Grammar;
use std::sync::Arc;

/// Why a node failed to match
///
/// Only [`MatchError::Mismatch`] is recoverable; the other variants abort
/// the whole validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Mismatch(#[from] ParseFailure),

    #[error(transparent)]
    Undefined(#[from] UndefinedRuleError),

    #[error("rule nesting exceeded the limit of {limit} at position {position}")]
    DepthExceeded { limit: usize, position: usize },
}

pub type MatchResult = Result<Arc<Match>, MatchError>;

/// Matches grammar nodes against one input
pub struct Matcher<'g> {
    grammar: &'g Grammar,
    input: InputStream,
}

impl<'g> Matcher<'g> {
    pub fn new(grammar: &'g Grammar, input: &str) -> Self {
        Matcher {
            grammar,
            input: InputStream::new(input),
        }
    }

    pub fn input(&self) -> &InputStream {
        &self.input
    }

    pub fn match_node(&self, node: &Node, position: usize, ctx: &mut ParseContext) -> MatchResult {
        match node {
            Node::Literal {
                text,
                case_sensitive,
            } => self.match_literal(text, *case_sensitive, position, ctx),
            Node::NumericValue(ranges) => self.match_numeric(ranges, position, ctx),
            Node::Prose(text) => Err(ctx.fail(position, Expected::Prose(text.clone())).into()),
            Node::Concatenation(nodes) => self.match_concatenation(nodes, position, ctx),
            Node::Alternation(nodes) => self.match_alternation(nodes, position, ctx),
            Node::Optional(node) => self.match_optional(node, position, ctx),
            Node::Repetition { node, min, max } => {
                self.match_repetition(node, *min, *max, position, ctx)
            }
            Node::RuleRef(name) => self.match_rule_ref(name, position, ctx),
        }
    }

    /// Match a rule by its grammar index, going through the cache
    pub fn match_rule(
        &self,
        index: usize,
        rule: &Rule,
        position: usize,
        ctx: &mut ParseContext,
    ) -> MatchResult {
        if let Some(cached) = ctx.cache_mut().get(index, position) {
            return cached.map_err(MatchError::Mismatch);
        }

        if !ctx.enter_rule(&rule.name) {
            return Err(MatchError::DepthExceeded {
                limit: ctx.max_depth(),
                position,
            });
        }
        log::trace!("enter {} at {} (depth {})", rule.name, position, ctx.depth());

        let result = self.match_node(&rule.definition, position, ctx);
        ctx.exit_rule();

        match result {
            Ok(body) => {
                let matched = Arc::new(Match::new(
                    MatchKind::Rule {
                        name: rule.name.clone(),
                    },
                    position,
                    body.consumed,
                    vec![body],
                ));
                ctx.cache_mut().insert(index, position, Ok(matched.clone()));
                Ok(matched)
            }
            Err(MatchError::Mismatch(failure)) => {
                ctx.cache_mut().insert(index, position, Err(failure.clone()));
                Err(MatchError::Mismatch(failure))
            }
            Err(abort) => Err(abort),
        }
    }

    fn match_rule_ref(&self, name: &str, position: usize, ctx: &mut ParseContext) -> MatchResult {
        let (index, rule) = self.grammar.rule_entry(name).ok_or_else(|| UndefinedRuleError {
            name: name.to_string(),
            referenced_from: ctx.current_rule().map(str::to_string),
        })?;
        self.match_rule(index, rule, position, ctx)
    }

    fn match_literal(
        &self,
        text: &str,
        case_sensitive: bool,
        position: usize,
        ctx: &mut ParseContext,
    ) -> MatchResult {
        let mut pos = position;
        for expected in text.chars() {
            match self.input.char_at(pos) {
                Some(ch) if chars_equal(ch, expected, case_sensitive) => pos += 1,
                _ => {
                    let expected = Expected::Literal {
                        text: text.to_string(),
                        case_sensitive,
                    };
                    return Err(ctx.fail(position, expected).into());
                }
            }
        }

        Ok(Arc::new(Match::leaf(MatchKind::Literal, position, pos - position)))
    }

    fn match_numeric(
        &self,
        ranges: &[CodeRange],
        position: usize,
        ctx: &mut ParseContext,
    ) -> MatchResult {
        for (offset, range) in ranges.iter().enumerate() {
            let matched = self
                .input
                .char_at(position + offset)
                .is_some_and(|ch| range.contains(ch));
            if !matched {
                return Err(ctx.fail(position, Expected::Ranges(ranges.to_vec())).into());
            }
        }

        Ok(Arc::new(Match::leaf(
            MatchKind::NumericValue,
            position,
            ranges.len(),
        )))
    }

    fn match_concatenation(
        &self,
        nodes: &[Node],
        position: usize,
        ctx: &mut ParseContext,
    ) -> MatchResult {
        let mut pos = position;
        let mut children = Vec::with_capacity(nodes.len());

        for node in nodes {
            let child = self.match_node(node, pos, ctx)?;
            pos = child.end();
            children.push(child);
        }

        Ok(Arc::new(Match::new(
            MatchKind::Concatenation,
            position,
            pos - position,
            children,
        )))
    }

    fn match_alternation(
        &self,
        nodes: &[Node],
        position: usize,
        ctx: &mut ParseContext,
    ) -> MatchResult {
        let mut best: Option<(usize, Arc<Match>)> = None;
        let mut failure: Option<ParseFailure> = None;

        for (index, node) in nodes.iter().enumerate() {
            match self.match_node(node, position, ctx) {
                Ok(candidate) => {
                    let longer = best
                        .as_ref()
                        .map_or(true, |(_, current)| candidate.consumed > current.consumed);
                    if longer {
                        best = Some((index, candidate));
                    }
                }
                Err(MatchError::Mismatch(f)) => {
                    let deeper = failure.as_ref().map_or(true, |current| f.supersedes(current));
                    if deeper {
                        failure = Some(f);
                    }
                }
                Err(abort) => return Err(abort),
            }
        }

        match (best, failure) {
            (Some((alternative, child)), _) => Ok(Arc::new(Match::new(
                MatchKind::Alternation { alternative },
                position,
                child.consumed,
                vec![child],
            ))),
            (None, Some(failure)) => Err(failure.into()),
            (None, None) => Err(ctx.fail(position, Expected::Ranges(Vec::new())).into()),
        }
    }

    fn match_optional(&self, node: &Node, position: usize, ctx: &mut ParseContext) -> MatchResult {
        let children = match self.match_node(node, position, ctx) {
            Ok(child) => vec![child],
            Err(MatchError::Mismatch(_)) => Vec::new(),
            Err(abort) => return Err(abort),
        };
        let consumed = children.first().map_or(0, |child| child.consumed);

        Ok(Arc::new(Match::new(
            MatchKind::Optional,
            position,
            consumed,
            children,
        )))
    }

    fn match_repetition(
        &self,
        node: &Node,
        min: usize,
        max: Option<usize>,
        position: usize,
        ctx: &mut ParseContext,
    ) -> MatchResult {
        let mut pos = position;
        let mut children: Vec<Arc<Match>> = Vec::new();
        let mut stalled = false;

        while max.map_or(true, |max| children.len() < max) {
            match self.match_node(node, pos, ctx) {
                Ok(child) => {
                    // A zero-length iteration would repeat forever; it also
                    // matches every remaining required iteration
                    stalled = child.consumed == 0;
                    pos = child.end();
                    children.push(child);
                    if stalled {
                        break;
                    }
                }
                Err(MatchError::Mismatch(_)) => break,
                Err(abort) => return Err(abort),
            }
        }

        let count = children.len();
        if count < min && !stalled {
            return Err(ctx.fail(pos, Expected::Repetition { min, found: count }).into());
        }

        Ok(Arc::new(Match::new(
            MatchKind::Repetition { count },
            position,
            pos - position,
            children,
        )))
    }
}

fn chars_equal(actual: char, expected: char, case_sensitive: bool) -> bool {
    if case_sensitive {
        actual == expected
    } else {
        actual.eq_ignore_ascii_case(&expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::GrammarOptions;

    fn grammar(source: &str) -> Grammar {
        Grammar::load(source, &GrammarOptions::new().with_core_rules(false)).unwrap()
    }

    fn empty() -> Grammar {
        grammar("unused = \"\"\n")
    }

    fn consumed(grammar: &Grammar, node: &Node, input: &str) -> Result<usize, MatchError> {
        grammar.match_node(node, input, 0).map(|m| m.consumed)
    }

    #[test]
    fn test_literal_case_folding() {
        let g = empty();
        assert_eq!(consumed(&g, &Node::literal("abc"), "ABCd"), Ok(3));
        assert!(consumed(&g, &Node::case_sensitive("abc"), "ABC").is_err());
        assert_eq!(consumed(&g, &Node::case_sensitive("aBc"), "aBc"), Ok(3));
        // Only ASCII letters fold
        assert!(consumed(&g, &Node::literal("é"), "É").is_err());
    }

    #[test]
    fn test_literal_failure_position() {
        let g = empty();
        let err = g.match_node(&Node::literal("xyz"), "axy!", 1).unwrap_err();
        match err {
            MatchError::Mismatch(f) => {
                assert_eq!(f.position, 1);
                assert_eq!(f.expected.to_string(), "\"xyz\"");
            }
            other => panic!("Expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_value() {
        let g = empty();
        assert_eq!(consumed(&g, &Node::range(0x30, 0x39), "7"), Ok(1));
        assert!(consumed(&g, &Node::range(0x30, 0x39), "x").is_err());
        assert_eq!(consumed(&g, &Node::codepoints(&[0x0D, 0x0A]), "\r\n"), Ok(2));
        assert!(consumed(&g, &Node::codepoints(&[0x0D, 0x0A]), "\r").is_err());
        assert_eq!(consumed(&g, &Node::range(0x4E00, 0x9FFF), "世"), Ok(1));
    }

    #[test]
    fn test_alternation_prefers_longest() {
        let g = empty();
        let node = Node::Alternation(vec![Node::literal("a"), Node::literal("ab")]);
        let m = g.match_node(&node, "ab", 0).unwrap();
        assert_eq!(m.consumed, 2);
        assert_eq!(m.kind, MatchKind::Alternation { alternative: 1 });
    }

    #[test]
    fn test_alternation_tie_goes_to_first() {
        let g = empty();
        let node = Node::Alternation(vec![Node::literal("x"), Node::range(0x78, 0x78)]);
        let m = g.match_node(&node, "x", 0).unwrap();
        assert_eq!(m.kind, MatchKind::Alternation { alternative: 0 });
    }

    #[test]
    fn test_alternation_reports_deepest_failure() {
        let g = empty();
        let node = Node::Alternation(vec![
            Node::literal("q"),
            Node::Concatenation(vec![Node::literal("a"), Node::literal("b")]),
        ]);
        match g.match_node(&node, "ac", 0).unwrap_err() {
            MatchError::Mismatch(f) => {
                assert_eq!(f.position, 1);
                assert_eq!(f.expected.to_string(), "\"b\"");
            }
            other => panic!("Expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_concatenation_does_not_backtrack() {
        let g = empty();
        // *"a" takes both a's, so the trailing "a" cannot match
        let node = Node::Concatenation(vec![
            Node::repeat(Node::literal("a"), 0, None),
            Node::literal("a"),
        ]);
        assert!(consumed(&g, &node, "aa").is_err());
    }

    #[test]
    fn test_optional() {
        let g = empty();
        let node = Node::optional(Node::literal("x"));
        assert_eq!(consumed(&g, &node, "x"), Ok(1));
        assert_eq!(consumed(&g, &node, "y"), Ok(0));
    }

    #[test]
    fn test_repetition_bounds() {
        let g = empty();
        let digits = |min, max| Node::repeat(Node::range(0x30, 0x39), min, max);

        assert_eq!(consumed(&g, &digits(0, None), "123x"), Ok(3));
        assert_eq!(consumed(&g, &digits(0, Some(2)), "123"), Ok(2));
        assert_eq!(consumed(&g, &digits(3, Some(3)), "123"), Ok(3));

        match g.match_node(&digits(2, None), "1x", 0).unwrap_err() {
            MatchError::Mismatch(f) => {
                assert_eq!(f.position, 1);
                assert_eq!(f.expected, Expected::Repetition { min: 2, found: 1 });
            }
            other => panic!("Expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_length_iteration_stops_repetition() {
        let g = empty();
        let node = Node::repeat(Node::optional(Node::literal("a")), 3, None);
        let m = g.match_node(&node, "ab", 0).unwrap();
        assert_eq!(m.consumed, 1);
        assert_eq!(m.kind, MatchKind::Repetition { count: 2 });
    }

    #[test]
    fn test_prose_fails_as_unspecified() {
        let g = empty();
        match g.match_node(&Node::Prose("anything".to_string()), "x", 0).unwrap_err() {
            MatchError::Mismatch(f) => assert!(f.is_prose()),
            other => panic!("Expected mismatch, got {:?}", other),
        }

        // An alternative can still succeed past a prose placeholder
        let node = Node::Alternation(vec![Node::Prose("p".to_string()), Node::literal("x")]);
        assert_eq!(consumed(&g, &node, "x"), Ok(1));
    }

    #[test]
    fn test_undefined_rule_aborts() {
        let g = empty();
        let node = Node::Alternation(vec![Node::rule_ref("nope"), Node::literal("x")]);
        assert_eq!(
            consumed(&g, &node, "x"),
            Err(MatchError::Undefined(UndefinedRuleError {
                name: "nope".to_string(),
                referenced_from: None,
            }))
        );
    }

    #[test]
    fn test_rule_matches_are_cached() {
        let g = grammar("s = a \"x\" / a \"y\"\na = 1*\"a\"\n");
        let (index, rule) = g.rule_entry("s").unwrap();
        let matcher = Matcher::new(&g, "aaay");
        let mut ctx = ParseContext::new(32);

        let m = matcher.match_rule(index, rule, 0, &mut ctx).unwrap();
        assert_eq!(m.consumed, 4);
        assert_eq!(m.find_rule("a").unwrap().consumed, 3);

        // `a` at 0 is matched once and then served from the cache
        assert_eq!(ctx.cache().hits(), 1);
        assert_eq!(ctx.cache().len(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let g = grammar("nest = \"(\" nest \")\" / \"x\"\n");
        let (index, rule) = g.rule_entry("nest").unwrap();
        let matcher = Matcher::new(&g, "((((x))))");

        let mut ctx = ParseContext::new(3);
        assert_eq!(
            matcher.match_rule(index, rule, 0, &mut ctx).unwrap_err(),
            MatchError::DepthExceeded {
                limit: 3,
                position: 3
            }
        );

        let mut ctx = ParseContext::new(16);
        assert_eq!(matcher.match_rule(index, rule, 0, &mut ctx).unwrap().consumed, 9);
    }
}
