//! Rule registry and loaded grammars
//!
//! [`RuleRegistry`] collects rule definitions while a grammar is being
//! loaded. [`RuleRegistry::finish`] checks the rule set and freezes it into a
//! [`Grammar`], which is immutable from then on and can be shared by any
//! number of concurrent validations.
//!
//! Rule names are case insensitive: the table is keyed by the ASCII-lowercased
//! name, while each [`Rule`] keeps the spelling of its first definition.

use crate::ast::{DefinedAs, Node, Rule, RuleDefinition};
use crate::core_rules::CORE_RULES;
use crate::error::{
    GrammarError, GrammarSyntaxError, UndefinedRuleError, UnknownStartRuleError,
};
use crate::grammar_analysis::{find_undefined_reference, GrammarAnalysis};
use crate::grammar_parser::parse_abnf;
use crate::matcher::{MatchError, Matcher};
use crate::parse_context::ParseContext;
use crate::parse_tree::Match;
use crate::validator::{Validator, ValidatorOptions};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Registry key for a rule name
pub fn rule_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Options applied while loading a grammar
#[derive(Debug, Clone)]
pub struct GrammarOptions {
    /// Fall back to the RFC 5234 core rules (ALPHA, DIGIT, ...) for names the
    /// grammar does not define
    pub core_rules: bool,
}

impl Default for GrammarOptions {
    fn default() -> Self {
        GrammarOptions { core_rules: true }
    }
}

impl GrammarOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_core_rules(mut self, enabled: bool) -> Self {
        self.core_rules = enabled;
        self
    }
}

/// Mutable rule table used while a grammar is being loaded
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: IndexMap<String, Rule>,
    /// Fallback definitions, consulted for names the grammar leaves undefined
    builtin: IndexMap<String, Rule>,
    warnings: Vec<String>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that falls back to the RFC 5234 core rules
    pub fn with_core_rules() -> Result<Self, GrammarSyntaxError> {
        let mut builtin = IndexMap::new();
        for def in parse_abnf(CORE_RULES)? {
            builtin.insert(rule_key(&def.name), Rule::new(def.name, def.elements, 0));
        }
        Ok(RuleRegistry {
            builtin,
            ..Self::default()
        })
    }

    /// Insert a rule, replace it (`=`), or append alternatives to it (`=/`)
    pub fn define(
        &mut self,
        name: &str,
        node: Node,
        defined_as: DefinedAs,
        line: usize,
    ) -> Result<(), GrammarSyntaxError> {
        let key = rule_key(name);

        match defined_as {
            DefinedAs::Basic => {
                if let Some(existing) = self.rules.get_mut(&key) {
                    let warning = format!(
                        "rule '{}' on line {} replaces the definition from line {}",
                        name, line, existing.line
                    );
                    log::warn!("{}", warning);
                    self.warnings.push(warning);
                    existing.definition = node;
                    existing.line = line;
                } else {
                    self.rules.insert(key, Rule::new(name.to_string(), node, line));
                }
            }
            DefinedAs::Incremental => {
                if let Some(existing) = self.rules.get_mut(&key) {
                    let body = std::mem::replace(&mut existing.definition, Node::Alternation(vec![]));
                    existing.definition = body.append_alternatives(node);
                } else if let Some(core) = self.builtin.get(&key) {
                    let body = core.definition.clone().append_alternatives(node);
                    self.rules.insert(key, Rule::new(core.name.clone(), body, line));
                } else {
                    return Err(GrammarSyntaxError::new(
                        line,
                        1,
                        format!("'=/' adds alternatives to rule '{}', which is not defined", name),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Define every statement of a parsed grammar, in source order
    pub fn define_all(&mut self, definitions: Vec<RuleDefinition>) -> Result<(), GrammarSyntaxError> {
        for def in definitions {
            self.define(&def.name, def.elements, def.defined_as, def.line)?;
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Node, UndefinedRuleError> {
        let key = rule_key(name);
        self.rules
            .get(&key)
            .or_else(|| self.builtin.get(&key))
            .map(|rule| &rule.definition)
            .ok_or_else(|| UndefinedRuleError {
                name: name.to_string(),
                referenced_from: None,
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Number of rules the grammar itself defines
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check the rule set and freeze it
    ///
    /// Adds the fallback rules the grammar does not define itself, then
    /// rejects references to undefined rules and left recursion.
    pub fn finish(self) -> Result<Grammar, GrammarError> {
        let RuleRegistry {
            mut rules,
            builtin,
            warnings,
        } = self;

        let defined = rules.len();
        for (key, rule) in builtin {
            rules.entry(key).or_insert(rule);
        }

        if let Some(missing) = find_undefined_reference(&rules) {
            return Err(missing.into());
        }

        let analysis = GrammarAnalysis::analyze(&rules);
        if let Some(rule) = rules
            .values()
            .find(|rule| analysis.is_left_recursive(&rule.name))
        {
            let cycle = analysis
                .left_recursion_cycle(&rule.name)
                .unwrap_or_else(|| vec![rule_key(&rule.name)]);
            let path: Vec<&str> = cycle
                .iter()
                .map(|key| rules.get(key).map_or(key.as_str(), |r| r.name.as_str()))
                .collect();
            return Err(GrammarSyntaxError::new(
                rule.line,
                1,
                format!(
                    "rule '{}' is left-recursive ({})",
                    rule.name,
                    path.join(" -> ")
                ),
            )
            .into());
        }

        log::debug!(
            "grammar loaded: {} rules defined, {} core rules added, {} nullable",
            defined,
            rules.len() - defined,
            analysis.nullable_rules.len()
        );

        Ok(Grammar { rules, warnings })
    }
}

/// A checked, immutable rule set
#[derive(Debug, Clone)]
pub struct Grammar {
    rules: IndexMap<String, Rule>,
    warnings: Vec<String>,
}

impl Grammar {
    /// Load an ABNF grammar with the default options
    pub fn from_abnf(source: &str) -> Result<Self, GrammarError> {
        Self::load(source, &GrammarOptions::default())
    }

    pub fn load(source: &str, options: &GrammarOptions) -> Result<Self, GrammarError> {
        let definitions = parse_abnf(source)?;

        let mut registry = if options.core_rules {
            RuleRegistry::with_core_rules()?
        } else {
            RuleRegistry::new()
        };
        registry.define_all(definitions)?;
        registry.finish()
    }

    pub fn resolve(&self, name: &str) -> Result<&Node, UndefinedRuleError> {
        self.rule(name)
            .map(|rule| &rule.definition)
            .ok_or_else(|| UndefinedRuleError {
                name: name.to_string(),
                referenced_from: None,
            })
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(&rule_key(name))
    }

    /// Rule and its stable index, used as the rule's identity in parse caches
    pub(crate) fn rule_entry(&self, name: &str) -> Option<(usize, &Rule)> {
        self.rules
            .get_full(&rule_key(name))
            .map(|(index, _, rule)| (index, rule))
    }

    /// Rules in definition order, followed by the core rules that were added
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Redefinitions noticed while loading
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Validator handle for `start`, with default options
    pub fn get(&self, start: &str) -> Result<Validator<'_>, UnknownStartRuleError> {
        self.get_with(start, ValidatorOptions::default())
    }

    pub fn get_with(
        &self,
        start: &str,
        options: ValidatorOptions,
    ) -> Result<Validator<'_>, UnknownStartRuleError> {
        let (index, rule) = self.rule_entry(start).ok_or_else(|| UnknownStartRuleError {
            name: start.to_string(),
        })?;
        Ok(Validator::new(self, index, rule, options))
    }

    /// Check `document` against `start` in one call
    pub fn validate(&self, start: &str, document: &str) -> crate::error::Result<Arc<Match>> {
        let validator = self.get(start)?;
        Ok(validator.parse_all(document)?)
    }

    /// Match a single node at `position` without requiring the whole input
    pub fn match_node(
        &self,
        node: &Node,
        input: &str,
        position: usize,
    ) -> Result<Arc<Match>, MatchError> {
        let matcher = Matcher::new(self, input);
        let mut ctx = ParseContext::new(ValidatorOptions::default().max_depth);
        matcher.match_node(node, position, &mut ctx)
    }
}

impl fmt::Display for Grammar {
    /// Writes the rule set back as ABNF, one rule per line
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.rules.values() {
            writeln!(f, "{}", rule)?;
        }
        Ok(())
    }
}
