//! Packrat cache for rule matches
//!
//! One cache lives for one validation. Entries are keyed by the rule's index
//! in the grammar and the start position, so a rule is matched at most once
//! per position however many alternatives reach it.

use crate::parse_context::ParseFailure;
use crate::parse_tree::Match;
use std::collections::HashMap;
use std::sync::Arc;

pub type CachedOutcome = Result<Arc<Match>, ParseFailure>;

#[derive(Debug, Default)]
pub struct ParseCache {
    entries: HashMap<(usize, usize), CachedOutcome>,
    hits: usize,
    misses: usize,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the outcome of rule `rule` at `position`, counting hits and misses
    pub fn get(&mut self, rule: usize, position: usize) -> Option<CachedOutcome> {
        match self.entries.get(&(rule, position)) {
            Some(outcome) => {
                self.hits += 1;
                Some(outcome.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, rule: usize, position: usize, outcome: CachedOutcome) {
        self.entries.insert((rule, position), outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_context::Expected;
    use crate::parse_tree::MatchKind;

    #[test]
    fn test_hits_and_misses() {
        let mut cache = ParseCache::new();
        assert!(cache.get(0, 3).is_none());

        let m = Arc::new(Match::leaf(MatchKind::Literal, 3, 2));
        cache.insert(0, 3, Ok(m.clone()));
        cache.insert(
            1,
            3,
            Err(ParseFailure {
                position: 3,
                expected: Expected::EndOfInput,
            }),
        );

        assert_eq!(cache.get(0, 3), Some(Ok(m)));
        assert!(matches!(cache.get(1, 3), Some(Err(f)) if f.position == 3));
        assert!(cache.get(0, 4).is_none());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 2);
    }
}
