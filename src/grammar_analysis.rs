//! Grammar Analysis
//!
//! Static checks run once when a grammar is loaded: references to undefined
//! rules, which rules can match the empty string, and left recursion (a rule
//! that can reach itself without consuming input). The matcher relies on
//! the last check; a left-recursive rule would re-enter itself forever.

use crate::ast::{Node, Rule};
use crate::error::UndefinedRuleError;
use crate::registry::rule_key;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// Analysis results for a rule table keyed by normalized rule name
#[derive(Debug, Clone)]
pub struct GrammarAnalysis {
    /// Rules that can match the empty string
    pub nullable_rules: HashSet<String>,

    /// Rules whose leftmost position can derive the rule itself
    pub left_recursive_rules: HashSet<String>,

    /// Direct left edges: rules reachable at the leftmost position of each body
    left_edges: HashMap<String, Vec<String>>,
}

impl GrammarAnalysis {
    pub fn analyze(rules: &IndexMap<String, Rule>) -> Self {
        let nullable_rules = compute_nullable_set(rules);

        let left_edges: HashMap<String, Vec<String>> = rules
            .iter()
            .map(|(key, rule)| {
                let mut edges = Vec::new();
                collect_left_refs(&rule.definition, &nullable_rules, &mut edges);
                (key.clone(), edges)
            })
            .collect();

        let reachable = compute_left_reachable(&left_edges);
        let left_recursive_rules = reachable
            .iter()
            .filter(|(key, set)| set.contains(key.as_str()))
            .map(|(key, _)| key.clone())
            .collect();

        GrammarAnalysis {
            nullable_rules,
            left_recursive_rules,
            left_edges,
        }
    }

    pub fn is_nullable(&self, rule: &str) -> bool {
        self.nullable_rules.contains(&rule_key(rule))
    }

    pub fn is_left_recursive(&self, rule: &str) -> bool {
        self.left_recursive_rules.contains(&rule_key(rule))
    }

    /// Shortest chain of left edges leading from `rule` back to itself
    ///
    /// Returns normalized rule names, starting and ending with `rule`.
    pub fn left_recursion_cycle(&self, rule: &str) -> Option<Vec<String>> {
        let start = rule_key(rule);
        let mut previous: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(start.as_str());

        while let Some(current) = queue.pop_front() {
            for next in self.left_edges.get(current).into_iter().flatten() {
                if next == &start {
                    let mut path = vec![start.clone()];
                    let mut step = current;
                    while step != start {
                        path.push(step.to_string());
                        step = *previous.get(step)?;
                    }
                    path.push(start.clone());
                    path.reverse();
                    return Some(path);
                }
                if !previous.contains_key(next.as_str()) {
                    previous.insert(next.as_str(), current);
                    queue.push_back(next.as_str());
                }
            }
        }

        None
    }
}

/// First reference to a rule missing from `rules`, in definition order
pub fn find_undefined_reference(rules: &IndexMap<String, Rule>) -> Option<UndefinedRuleError> {
    for rule in rules.values() {
        let mut missing = None;
        rule.definition.for_each_rule_ref(&mut |name| {
            if missing.is_none() && !rules.contains_key(&rule_key(name)) {
                missing = Some(name.to_string());
            }
        });

        if let Some(name) = missing {
            return Some(UndefinedRuleError {
                name,
                referenced_from: Some(rule.name.clone()),
            });
        }
    }
    None
}

/// Compute nullable set for all rules using fixpoint iteration
fn compute_nullable_set(rules: &IndexMap<String, Rule>) -> HashSet<String> {
    let mut nullable: HashSet<String> = HashSet::new();
    let mut changed = true;

    while changed {
        changed = false;

        for (key, rule) in rules {
            if nullable.contains(key) {
                continue;
            }
            if is_node_nullable(&rule.definition, &nullable) {
                nullable.insert(key.clone());
                changed = true;
            }
        }
    }

    nullable
}

/// Check if a node can match the empty string, given the rules known nullable so far
pub fn is_node_nullable(node: &Node, nullable_rules: &HashSet<String>) -> bool {
    match node {
        Node::Literal { text, .. } => text.is_empty(),
        Node::NumericValue(ranges) => ranges.is_empty(),
        Node::Prose(_) => false,
        Node::Concatenation(nodes) => nodes.iter().all(|n| is_node_nullable(n, nullable_rules)),
        Node::Alternation(nodes) => nodes.iter().any(|n| is_node_nullable(n, nullable_rules)),
        Node::Optional(_) => true,
        Node::Repetition { node, min, max } => {
            *min == 0 || *max == Some(0) || is_node_nullable(node, nullable_rules)
        }
        Node::RuleRef(name) => nullable_rules.contains(&rule_key(name)),
    }
}

/// Push every rule that can be entered before any input is consumed
///
/// Returns whether `node` is nullable, so callers know whether to keep
/// scanning the next element of a concatenation.
fn collect_left_refs(node: &Node, nullable_rules: &HashSet<String>, out: &mut Vec<String>) -> bool {
    match node {
        Node::RuleRef(name) => {
            let key = rule_key(name);
            let nullable = nullable_rules.contains(&key);
            if !out.contains(&key) {
                out.push(key);
            }
            nullable
        }
        Node::Concatenation(nodes) => {
            for node in nodes {
                if !collect_left_refs(node, nullable_rules, out) {
                    return false;
                }
            }
            true
        }
        Node::Alternation(nodes) => {
            let mut any_nullable = false;
            for node in nodes {
                any_nullable |= collect_left_refs(node, nullable_rules, out);
            }
            any_nullable
        }
        Node::Optional(node) => {
            collect_left_refs(node, nullable_rules, out);
            true
        }
        Node::Repetition { max: Some(0), .. } => true,
        Node::Repetition { node, min, .. } => {
            let inner = collect_left_refs(node, nullable_rules, out);
            *min == 0 || inner
        }
        Node::Literal { .. } | Node::NumericValue(_) | Node::Prose(_) => {
            is_node_nullable(node, nullable_rules)
        }
    }
}

/// Transitive closure of the left edges, by fixpoint iteration
fn compute_left_reachable(
    left_edges: &HashMap<String, Vec<String>>,
) -> HashMap<String, HashSet<String>> {
    let mut reachable: HashMap<String, HashSet<String>> = left_edges
        .iter()
        .map(|(key, edges)| (key.clone(), edges.iter().cloned().collect()))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;

        for key in left_edges.keys() {
            let current: Vec<String> = reachable
                .get(key)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();

            let mut additions = Vec::new();
            for name in &current {
                if let Some(further) = reachable.get(name) {
                    additions.extend(further.iter().cloned());
                }
            }

            if let Some(set) = reachable.get_mut(key) {
                for name in additions {
                    if set.insert(name) {
                        changed = true;
                    }
                }
            }
        }
    }

    reachable
}
