//! # Quarry
//!
//! Grammar analysis and parser generation for ANTLR4-style grammars.
//!
//! ## Overview
//!
//! Quarry reads a grammar written in the familiar `grammar X; rule : ... ;`
//! notation and lets you:
//!
//! - **Validate** it: undefined and duplicate rules, naming conventions
//! - **Analyze** it: FIRST/FOLLOW sets, left recursion, LL(1) ambiguity,
//!   rule call graph
//! - **Recognize** samples without generating code, with profiling
//! - **Generate** a parser: a complete Rust lexer and parser, or token and
//!   rule tables for Python, Java, JavaScript, TypeScript, Go and C#
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry::ops::{ParseOptions, parse_sample, validate_grammar};
//!
//! let grammar = r"
//!     grammar Calc;
//!     expr : expr ('*' | '/') expr
//!          | expr ('+' | '-') expr
//!          | '(' expr ')'
//!          | NUMBER
//!          ;
//!     NUMBER : [0-9]+ ;
//!     WS     : [ \t\r\n]+ -> skip ;
//! ";
//!
//! let report = validate_grammar(grammar).unwrap();
//! assert_eq!(report.grammar_name, "Calc");
//! assert!(report.warnings.is_empty());
//!
//! let parsed = parse_sample(grammar, "2 + 3 * 4", &ParseOptions::default()).unwrap();
//! assert_eq!(parsed.parse_tree, "(expr (expr 2) + (expr (expr 3) * (expr 4)))");
//! ```
//!
//! ## Modules
//!
//! - [`grammar`] - Grammar text, model and two-pass builder
//! - [`automaton`] - Augmented transition network and its renderings
//! - [`analysis`] - FIRST/FOLLOW, left recursion, ambiguity, call graph, cache
//! - [`lexer`] - NFA-based tokenizer
//! - [`parser`] - Recognizer, parse trees and profiling
//! - [`codegen`] - Backend registry and code generators
//! - [`ops`] - The operations and their reports, plus [`Session`]
//! - [`error`] - Error types and diagnostics
//! - [`testing`] - Sentence generators for property tests
//!
//! ## Feature Flags
//!
//! - `serialize` (default): `serde::Serialize` on reports
//! - `codegen-rust` (default): the Rust backend
//! - `diagnostics`: `miette::Diagnostic` on error types
//! - `parallel`: [`Session::analyze_all`] runs analyses on the rayon pool

pub mod analysis;
pub mod automaton;
pub mod codegen;
pub mod error;
pub mod grammar;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod testing;
pub mod text;

// Re-export commonly used types
pub use analysis::{AnalysisCache, FirstFollow, LeftRecursion, RecursionKind, TokenSet};
pub use automaton::{Automaton, build_automaton};
pub use codegen::{Backend, BackendRegistry, CodegenOptions, GeneratedFile, GeneratedSource, emit};
pub use error::{CodegenError, Error, GrammarError, LexError, ParseError, RecognizeError, Result};
pub use grammar::{Grammar, GrammarBuilder, RuleKind, parse_grammar};
pub use lexer::{Token, tokenize};
pub use ops::{ParseOptions, Session, SessionConfig};
pub use parser::{ParseTree, Recognizer, RecognizerConfig, parse};
pub use text::Span;
