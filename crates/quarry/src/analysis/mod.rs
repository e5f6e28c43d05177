//! # Static Analysis
//!
//! Passes over a validated [`Grammar`](crate::grammar::Grammar) that never
//! mutate it and always give the same answer for the same grammar.
//!
//! ## Passes
//!
//! - [`compute_first_follow`]: nullable flags, FIRST/FOLLOW sets and the
//!   predict sets of every decision; the other passes build on it
//! - [`analyze_left_recursion`]: `None`/`Direct`/`Indirect` per rule and
//!   whether precedence climbing can parse it
//! - [`detect_ambiguity`]: conservative LL(1) conflicts
//! - [`analyze_call_graph`]: rule dependencies, cycles and unreachable rules
//!
//! Results can be memoized across calls with an [`AnalysisCache`] keyed by
//! the grammar's content hash.
//!
//! ## Example
//!
//! ```rust
//! use quarry::analysis::{analyze_left_recursion, compute_first_follow, RecursionKind};
//! use quarry::grammar::parse_grammar;
//!
//! let grammar = parse_grammar("expr : expr '+' expr | NUMBER ; NUMBER : [0-9]+ ;").unwrap();
//! let sets = compute_first_follow(&grammar);
//! let recursion = analyze_left_recursion(&grammar, &sets);
//! let expr = grammar.rule_by_name("expr").unwrap().id;
//! assert_eq!(recursion.kind(expr), RecursionKind::Direct);
//! assert!(recursion.rule(expr).eliminable);
//! ```

pub mod ambiguity;
pub mod cache;
pub mod call_graph;
pub mod first_follow;
pub mod left_recursion;
pub mod token_set;

pub use ambiguity::{Ambiguities, Conflict, detect_ambiguity};
pub use cache::{AnalysisCache, AnalysisKind, CacheKey, CacheStats};
pub use call_graph::{CallGraph, analyze_call_graph};
pub use first_follow::{DecisionLookahead, FirstFollow, compute_first_follow};
pub use left_recursion::{LeftRecursion, RecursionKind, RuleRecursion, analyze_left_recursion};
pub use token_set::TokenSet;
