//! Validating many documents with one validator
//!
//! Every document is checked independently; a failure is recorded and the
//! run moves on to the next document.

use crate::error::ValidateError;
use crate::validator::Validator;
use std::fmt;
use std::time::{Duration, Instant};

/// Result of validating one document
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub name: String,
    pub error: Option<ValidateError>,
    pub elapsed: Duration,
}

impl DocumentOutcome {
    pub fn new(name: impl Into<String>, error: Option<ValidateError>, elapsed: Duration) -> Self {
        DocumentOutcome {
            name: name.into(),
            error,
            elapsed,
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for DocumentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "PASS {}", self.name),
            Some(error) => write!(f, "FAIL {}: {}", self.name, error),
        }
    }
}

/// Outcomes of a corpus run, in input order
#[derive(Debug, Clone, Default)]
pub struct CorpusReport {
    pub outcomes: Vec<DocumentOutcome>,
}

impl CorpusReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: DocumentOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(DocumentOutcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn elapsed(&self) -> Duration {
        self.outcomes.iter().map(|o| o.elapsed).sum()
    }
}

impl fmt::Display for CorpusReport {
    /// One-line summary
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} total",
            self.passed(),
            self.failed(),
            self.total()
        )
    }
}

/// Validate one document, timing the run
pub fn check_document(validator: &Validator<'_>, name: impl Into<String>, text: &str) -> DocumentOutcome {
    let started = Instant::now();
    let error = validator.validate(text).err();
    let outcome = DocumentOutcome::new(name, error, started.elapsed());
    match &outcome.error {
        None => log::info!("{}: valid", outcome.name),
        Some(error) => log::info!("{}: {}", outcome.name, error),
    }
    outcome
}

/// Validate every `(name, text)` pair, never stopping at a failure
pub fn validate_corpus<I, N, T>(validator: &Validator<'_>, documents: I) -> CorpusReport
where
    I: IntoIterator<Item = (N, T)>,
    N: Into<String>,
    T: AsRef<str>,
{
    let mut report = CorpusReport::new();
    for (name, text) in documents {
        report.push(check_document(validator, name, text.as_ref()));
    }
    log::debug!("corpus run: {}", report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Grammar;

    #[test]
    fn test_corpus_continues_after_failures() {
        let grammar = Grammar::from_abnf("number = 1*DIGIT\n").unwrap();
        let validator = grammar.get("number").unwrap();

        let report = validate_corpus(
            &validator,
            vec![("one", "1"), ("bad", "1x"), ("two", "22"), ("empty", "")],
        );

        assert_eq!(report.total(), 4);
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 2);
        assert!(!report.all_passed());

        let names: Vec<&str> = report.failures().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["bad", "empty"]);
        assert_eq!(report.to_string(), "2 passed, 2 failed, 4 total");
    }

    #[test]
    fn test_outcome_display() {
        let grammar = Grammar::from_abnf("a = \"a\"\n").unwrap();
        let validator = grammar.get("a").unwrap();

        assert_eq!(check_document(&validator, "ok.txt", "A").to_string(), "PASS ok.txt");
        assert_eq!(
            check_document(&validator, "bad.txt", "b").to_string(),
            "FAIL bad.txt: line 1, column 1: expected \"a\" in a, found 'b'"
        );
    }
}
