//! # Recognizer
//!
//! Parses token streams against a [`Grammar`] without generating code.
//!
//! ## Overview
//!
//! The [`Recognizer`] walks the grammar model directly: recursive descent
//! with one token of lookahead, longest-match backtracking where a decision
//! has an LL(1) conflict, and precedence climbing for binary-operator left
//! recursion (`e : e '*' e | e '+' e | NUMBER`). The result is an
//! arena-backed [`ParseTree`].
//!
//! ```rust
//! use quarry::grammar::parse_grammar;
//! use quarry::lexer::tokenize;
//! use quarry::parser::parse;
//!
//! let grammar = parse_grammar("list : '[' (N (',' N)*)? ']' ; N : [0-9]+ ;").unwrap();
//! let tokens = tokenize(&grammar, "[1,2]").unwrap();
//! let tree = parse(&grammar, &tokens).unwrap();
//! assert_eq!(tree.to_lisp(&grammar), "(list [ 1 , 2 ])");
//! ```
//!
//! ## Profiling
//!
//! [`parse_profiled`] runs the same engine with counters attached and
//! returns a [`Profile`] next to an identical tree.

mod engine;
pub mod profile;
pub mod tree;

pub use engine::Recognizer;
pub use profile::{AmbiguityEvent, DecisionProfile, Profile, Profiler, RuleProfile};
pub use tree::{Node, NodeId, NodeKind, ParseTree};

use crate::analysis::{FirstFollow, LeftRecursion};
use crate::error::RecognizeError;
use crate::grammar::Grammar;
use crate::lexer::Token;

/// Default bound on rule nesting; sub-rule blocks do not count
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Recognizer settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase", default))]
pub struct RecognizerConfig {
    /// Maximum rule nesting before [`RecognizeError::DepthLimit`]
    pub max_depth: usize,
    /// Try every conflicting alternative and keep the longest match instead
    /// of taking the first
    pub speculation: bool,
    /// Fail unless the start rule is followed by `EOF`
    pub require_eof: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            speculation: true,
            require_eof: true,
        }
    }
}

impl RecognizerConfig {
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn with_speculation(mut self, speculation: bool) -> Self {
        self.speculation = speculation;
        self
    }

    #[must_use]
    pub const fn with_require_eof(mut self, require_eof: bool) -> Self {
        self.require_eof = require_eof;
        self
    }
}

/// Parse `tokens` from the start rule of `grammar`
///
/// Computes the analyses the recognizer needs on every call; build a
/// [`Recognizer`] to parse many inputs.
///
/// # Errors
///
/// See [`Recognizer::parse_rule`].
pub fn parse(grammar: &Grammar, tokens: &[Token]) -> Result<ParseTree, RecognizeError> {
    parse_with(grammar, tokens, &RecognizerConfig::default())
}

/// [`parse`] with explicit settings
///
/// # Errors
///
/// See [`Recognizer::parse_rule`].
pub fn parse_with(grammar: &Grammar, tokens: &[Token], config: &RecognizerConfig) -> Result<ParseTree, RecognizeError> {
    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    Recognizer::new(grammar, &sets, &recursion)
        .with_config(config.clone())
        .parse(tokens)
}

/// [`parse`] with a [`Profile`] of the run
///
/// # Errors
///
/// See [`Recognizer::parse_rule`].
pub fn parse_profiled(grammar: &Grammar, tokens: &[Token]) -> Result<(ParseTree, Profile), RecognizeError> {
    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    Recognizer::new(grammar, &sets, &recursion).parse_profiled(tokens, grammar.start_rule())
}
