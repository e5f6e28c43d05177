//! # Grammar Model
//!
//! Reading grammar text into a validated, immutable [`Grammar`].
//!
//! ## Overview
//!
//! Grammars are written in an ANTLR4-flavoured notation:
//!
//! ```text
//! grammar Calc;
//! expr : expr ('*' | '/') expr  # mul
//!      | expr ('+' | '-') expr  # add
//!      | NUMBER                 # num
//!      ;
//! NUMBER : [0-9]+ ;
//! WS     : [ \t\r\n]+ -> skip ;
//! ```
//!
//! Construction happens in two passes (see [`builder`]): names are collected
//! first so rules can be used before they are declared, then every reference
//! is resolved. Lexer rule names are `ALL_UPPERCASE` and parser rule names
//! start with a lowercase letter; the resulting [`RuleKind`] is stored on the
//! grammar rather than re-derived from names later.
//!
//! ## Token Vocabulary
//!
//! Token id 0 is `EOF`, followed by `tokens { }` entries, then literals used
//! in parser rules without a lexer rule of their own (in order of first
//! use), then non-fragment lexer rules in declaration order. The same order
//! decides which token wins when two rules match the same input.

pub mod ast;
pub mod builder;
pub mod charset;
pub mod model;
pub mod source;

pub use builder::{GrammarBuilder, parse_grammar};
pub use charset::CharSet;
pub use model::{
    Alternative, Assoc, Block, Decision, DecisionId, DecisionKind, Element, Grammar, LexPattern,
    LexerCommand, LexerRule, ParserRule, RepeatOp, RuleId, RuleKind, Symbol, TokenDef, TokenId,
    TokenSource,
};
