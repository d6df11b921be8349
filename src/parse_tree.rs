//! Parse tree produced by a successful match
//!
//! A [`Match`] records a span of the input (codepoint positions) and how it
//! was matched. Subtrees are shared through `Arc`, so a rule match taken
//! from the parse cache is reused without copying.

use std::sync::Arc;

/// How a [`Match`] was produced; mirrors the grammar node kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    Literal,
    NumericValue,
    Concatenation,
    /// Index of the alternative that won
    Alternation { alternative: usize },
    Optional,
    /// Number of iterations, including a final zero-length one
    Repetition { count: usize },
    Rule { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub consumed: usize,
    pub kind: MatchKind,
    pub children: Vec<Arc<Match>>,
}

impl Match {
    pub fn new(kind: MatchKind, start: usize, consumed: usize, children: Vec<Arc<Match>>) -> Self {
        Match {
            start,
            consumed,
            kind,
            children,
        }
    }

    pub fn leaf(kind: MatchKind, start: usize, consumed: usize) -> Self {
        Self::new(kind, start, consumed, Vec::new())
    }

    /// Position just past the match
    pub fn end(&self) -> usize {
        self.start + self.consumed
    }

    /// The matched text, given the input the match was made against
    pub fn text(&self, input: &str) -> String {
        input.chars().skip(self.start).take(self.consumed).collect()
    }

    pub fn rule_name(&self) -> Option<&str> {
        match &self.kind {
            MatchKind::Rule { name } => Some(name),
            _ => None,
        }
    }

    /// First rule match named `name` (case insensitive), in pre-order
    ///
    /// The search includes `self`.
    pub fn find_rule(&self, name: &str) -> Option<&Match> {
        if self
            .rule_name()
            .is_some_and(|rule| rule.eq_ignore_ascii_case(name))
        {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_rule(name))
    }

    /// Every rule match named `name`, in pre-order
    pub fn find_all_rules<'a>(&'a self, name: &str, out: &mut Vec<&'a Match>) {
        if self
            .rule_name()
            .is_some_and(|rule| rule.eq_ignore_ascii_case(name))
        {
            out.push(self);
        }
        for child in &self.children {
            child.find_all_rules(name, out);
        }
    }

    /// Render the tree as XML
    ///
    /// Rule matches become elements named after the rule; matched text
    /// becomes character data. Other match kinds add no markup.
    pub fn to_xml(&self, input: &str) -> String {
        let chars: Vec<char> = input.chars().collect();
        let mut out = String::new();
        self.write_xml(&chars, &mut out);
        out
    }

    fn write_xml(&self, chars: &[char], out: &mut String) {
        if let MatchKind::Rule { name } = &self.kind {
            if self.consumed == 0 {
                out.push_str(&format!("<{}/>", name));
                return;
            }
            out.push_str(&format!("<{}>", name));
            self.write_children(chars, out);
            out.push_str(&format!("</{}>", name));
        } else {
            self.write_children(chars, out);
        }
    }

    fn write_children(&self, chars: &[char], out: &mut String) {
        if self.children.is_empty() {
            let end = self.end().min(chars.len());
            let text: String = chars[self.start.min(end)..end].iter().collect();
            out.push_str(&escape_xml_text(&text));
        } else {
            for child in &self.children {
                child.write_xml(chars, out);
            }
        }
    }
}

fn escape_xml_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
