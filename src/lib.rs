//! rustabnf - ABNF grammar engine
//!
//! Loads grammars written in ABNF (RFC 5234, with the RFC 7405 `%s`/`%i`
//! string prefixes) and validates documents against any rule of them.
//!
//! # Quick Start
//!
//! ```rust
//! use rustabnf::Grammar;
//!
//! let grammar = Grammar::from_abnf(r#"
//! greeting = "Hello, " name "!"
//! name     = 1*ALPHA
//! "#).expect("Invalid grammar");
//!
//! let validator = grammar.get("greeting").expect("Unknown rule");
//! let tree = validator.parse_all("hello, World!").expect("Invalid document");
//!
//! assert_eq!(tree.find_rule("name").unwrap().text("hello, World!"), "World");
//! assert!(validator.validate("Hello, 42!").is_err());
//! ```
//!
//! # Matching
//!
//! - Alternation takes the longest matching alternative; on a tie the one
//!   declared first wins.
//! - Rule matches are memoized per position for the duration of one
//!   validation.
//! - Left-recursive grammars are rejected when loaded.
//! - `<prose>` placeholders never match and are reported as
//!   [`UnspecifiedGrammarError`].

pub mod ast;
pub mod cache;
pub mod core_rules;
pub mod corpus;
pub mod error;
pub mod grammar_analysis;
pub mod grammar_parser;
pub mod input_stream;
pub mod lexer;
pub mod matcher;
pub mod parse_context;
pub mod parse_tree;
pub mod registry;
pub mod validator;

// Re-export main API
pub use ast::{CodeRange, DefinedAs, Node, Rule, RuleDefinition};
pub use corpus::{check_document, validate_corpus, CorpusReport, DocumentOutcome};
pub use error::{
    Error, GrammarError, GrammarSyntaxError, Result, UndefinedRuleError,
    UnknownStartRuleError, UnspecifiedGrammarError, ValidateError, ValidationError,
};
pub use grammar_parser::parse_abnf;
pub use matcher::MatchError;
pub use parse_tree::{Match, MatchKind};
pub use registry::{Grammar, GrammarOptions, RuleRegistry};
pub use validator::{Validator, ValidatorOptions};
