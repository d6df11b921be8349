//! AST (Abstract Syntax Tree) for ABNF grammars
//!
//! This module defines the data structures representing parsed ABNF rules.
//! Nodes are plain data; matching lives in [`crate::matcher`].

use std::fmt;

/// Inclusive codepoint range used by numeric values (`%x30-39`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeRange {
    pub low: u32,
    pub high: u32,
}

impl CodeRange {
    pub fn new(low: u32, high: u32) -> Self {
        CodeRange { low, high }
    }

    pub fn single(value: u32) -> Self {
        CodeRange { low: value, high: value }
    }

    pub fn contains(&self, ch: char) -> bool {
        let cp = ch as u32;
        self.low <= cp && cp <= self.high
    }
}

/// One ABNF rule body
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Quoted string; case insensitive unless written as `%s"..."`
    Literal { text: String, case_sensitive: bool },

    /// Numeric value; every range consumes exactly one codepoint, in order
    NumericValue(Vec<CodeRange>),

    /// `<free text>`: a placeholder the grammar never made precise
    Prose(String),

    Concatenation(Vec<Node>),

    /// Longest successful alternative wins
    Alternation(Vec<Node>),

    /// `[ ... ]`
    Optional(Box<Node>),

    /// `min*max`; `max` is `None` when unbounded
    Repetition {
        node: Box<Node>,
        min: usize,
        max: Option<usize>,
    },

    /// Reference to a rule, resolved by name when matching
    RuleRef(String),
}

/// A named rule as stored in the registry
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub definition: Node,
    /// Line of the first definition in the grammar source (0 for built-ins)
    pub line: usize,
}

/// How a rule definition combines with an earlier one of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinedAs {
    /// `=`
    Basic,
    /// `=/`
    Incremental,
}

/// A single `name = elements` statement from the grammar source
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    pub name: String,
    pub defined_as: DefinedAs,
    pub elements: Node,
    pub line: usize,
}

impl Rule {
    pub fn new(name: String, definition: Node, line: usize) -> Self {
        Rule { name, definition, line }
    }
}

impl Node {
    pub fn literal(text: impl Into<String>) -> Self {
        Node::Literal {
            text: text.into(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(text: impl Into<String>) -> Self {
        Node::Literal {
            text: text.into(),
            case_sensitive: true,
        }
    }

    pub fn range(low: u32, high: u32) -> Self {
        Node::NumericValue(vec![CodeRange::new(low, high)])
    }

    pub fn codepoints(values: &[u32]) -> Self {
        Node::NumericValue(values.iter().map(|&v| CodeRange::single(v)).collect())
    }

    pub fn rule_ref(name: impl Into<String>) -> Self {
        Node::RuleRef(name.into())
    }

    pub fn optional(node: Node) -> Self {
        Node::Optional(Box::new(node))
    }

    pub fn repeat(node: Node, min: usize, max: Option<usize>) -> Self {
        Node::Repetition {
            node: Box::new(node),
            min,
            max,
        }
    }

    /// Concatenation of `nodes`, or the node itself when there is only one
    pub fn concat(mut nodes: Vec<Node>) -> Self {
        if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            Node::Concatenation(nodes)
        }
    }

    /// Alternation of `nodes`, or the node itself when there is only one
    pub fn alternation(mut nodes: Vec<Node>) -> Self {
        if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            Node::Alternation(nodes)
        }
    }

    /// Append `other` as further alternatives (`=/`)
    pub fn append_alternatives(self, other: Node) -> Node {
        let mut alts = match self {
            Node::Alternation(alts) => alts,
            node => vec![node],
        };
        match other {
            Node::Alternation(more) => alts.extend(more),
            node => alts.push(node),
        }
        Node::Alternation(alts)
    }

    /// Call `f` for every rule name referenced anywhere inside this node
    pub fn for_each_rule_ref<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Node::RuleRef(name) => f(name),
            Node::Concatenation(nodes) | Node::Alternation(nodes) => {
                for node in nodes {
                    node.for_each_rule_ref(f);
                }
            }
            Node::Optional(node) | Node::Repetition { node, .. } => node.for_each_rule_ref(f),
            Node::Literal { .. } | Node::NumericValue(_) | Node::Prose(_) => {}
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Node::Alternation(_) => 0,
            Node::Concatenation(_) => 1,
            Node::Repetition { .. } => 2,
            _ => 3,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "( {} )", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for CodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{:02X}", self.low)
        } else {
            write!(f, "{:02X}-{:02X}", self.low, self.high)
        }
    }
}

/// Renders a sequence of ranges in `%x` notation
pub(crate) fn fmt_code_ranges(ranges: &[CodeRange], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "%x")?;
    for (i, range) in ranges.iter().enumerate() {
        if i > 0 {
            write!(f, ".")?;
        }
        write!(f, "{}", range)?;
    }
    Ok(())
}

impl fmt::Display for Node {
    /// Writes the node back in ABNF notation
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal {
                text,
                case_sensitive,
            } => {
                if *case_sensitive {
                    write!(f, "%s\"{}\"", text)
                } else {
                    write!(f, "\"{}\"", text)
                }
            }
            Node::NumericValue(ranges) => fmt_code_ranges(ranges, f),
            Node::Prose(text) => write!(f, "<{}>", text),
            Node::Concatenation(nodes) => {
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    node.fmt_operand(f, 2)?;
                }
                Ok(())
            }
            Node::Alternation(nodes) => {
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " / ")?;
                    }
                    node.fmt_operand(f, 1)?;
                }
                Ok(())
            }
            Node::Optional(node) => write!(f, "[ {} ]", node),
            Node::Repetition { node, min, max } => {
                match (*min, *max) {
                    (min, Some(max)) if min == max => write!(f, "{}", min)?,
                    (0, None) => write!(f, "*")?,
                    (min, None) => write!(f, "{}*", min)?,
                    (0, Some(max)) => write!(f, "*{}", max)?,
                    (min, Some(max)) => write!(f, "{}*{}", min, max)?,
                }
                node.fmt_operand(f, 3)
            }
            Node::RuleRef(name) => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.definition)
    }
}
