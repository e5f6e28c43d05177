//! # Error Types
//!
//! Typed failures for every layer of the engine.
//!
//! ## Overview
//!
//! - [`GrammarError`]: malformed or inconsistent grammar text
//! - [`LexError`]: no lexer rule matches at an input offset
//! - [`RecognizeError`]: a sample cannot be parsed ([`ParseError`]), or the
//!   grammar uses a recursion shape the recognizer declines to run
//! - [`CodegenError`]: code generation failures, including unknown targets
//! - [`Error`]: umbrella type returned by the [`crate::ops`] layer
//!
//! None of these abort the process; callers render them as they see fit.
//! [`diagnostics`] has helpers for suggestions and line/column rendering.
//!
//! ## Diagnostics Support
//!
//! With the `diagnostics` feature every error derives [`miette::Diagnostic`]
//! with a stable code and a labelled span where one exists.

pub mod diagnostics;

use crate::text::Span;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

fn hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map_or_else(String::new, |s| format!(" (did you mean `{s}`?)"))
}

/// Errors raised while reading grammar text into a [`crate::grammar::Grammar`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("Syntax error at offset {}: {message}", .span.start)]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::syntax)))]
    Syntax {
        message: String,
        #[cfg_attr(feature = "diagnostics", label("here"))]
        span: Span,
    },

    #[error("Undefined rule `{name}` referenced from `{referencing_rule}`{}", hint(.suggestion))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::undefined_rule)))]
    UndefinedRule {
        name: String,
        referencing_rule: String,
        #[cfg_attr(feature = "diagnostics", help)]
        suggestion: Option<String>,
        #[cfg_attr(feature = "diagnostics", label("not declared"))]
        span: Span,
    },

    #[error("Duplicate rule `{name}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::duplicate_rule)))]
    DuplicateRule {
        name: String,
        #[cfg_attr(feature = "diagnostics", label("declared again here"))]
        span: Span,
    },

    #[error("Rule `{name}` breaks the naming convention: {reason}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grammar::naming_convention),
            help("lexer rules are ALL_UPPERCASE, parser rules start with a lowercase letter")
        )
    )]
    NamingConvention {
        name: String,
        reason: String,
        #[cfg_attr(feature = "diagnostics", label)]
        span: Span,
    },

    #[error("Grammar declares no parser rules")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::no_parser_rules)))]
    NoParserRules,

    #[error("Unknown start rule `{name}`{}", hint(.suggestion))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unknown_start_rule)))]
    UnknownStartRule {
        name: String,
        #[cfg_attr(feature = "diagnostics", help)]
        suggestion: Option<String>,
    },

    #[error("Lexer rule `{referencing_rule}` references parser rule `{name}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::parser_rule_in_lexer)))]
    ParserRuleInLexer {
        name: String,
        referencing_rule: String,
        #[cfg_attr(feature = "diagnostics", label)]
        span: Span,
    },

    #[error("Lexer rule `{name}` is recursive")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::recursive_lexer_rule)))]
    RecursiveLexerRule { name: String },

    #[error("Unsupported lexer command `{command}` in rule `{rule}`")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grammar::unsupported_lexer_command),
            help("supported commands are skip, channel(NAME) and type(NAME)")
        )
    )]
    UnsupportedLexerCommand {
        command: String,
        rule: String,
        #[cfg_attr(feature = "diagnostics", label)]
        span: Span,
    },
}

impl GrammarError {
    /// Source span of the offending text, when the error has one
    #[must_use]
    pub const fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. }
            | Self::UndefinedRule { span, .. }
            | Self::DuplicateRule { span, .. }
            | Self::NamingConvention { span, .. }
            | Self::ParserRuleInLexer { span, .. }
            | Self::UnsupportedLexerCommand { span, .. } => Some(*span),
            Self::NoParserRules | Self::UnknownStartRule { .. } | Self::RecursiveLexerRule { .. } => {
                None
            }
        }
    }

    pub(crate) fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }
}

/// No lexer rule matches the input at `offset`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::no_match)))]
#[error("No token matches {found:?} at offset {offset}")]
pub struct LexError {
    pub offset: usize,
    pub found: char,
    #[cfg_attr(feature = "diagnostics", label("no lexer rule starts here"))]
    pub span: Span,
}

impl LexError {
    #[must_use]
    pub fn new(offset: usize, found: char) -> Self {
        Self {
            offset,
            found,
            span: Span::new(offset, offset + found.len_utf8()),
        }
    }
}

/// The current token does not satisfy any viable alternative
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(parser::unexpected_token)))]
#[error("Unexpected {found} at offset {offset}, expected one of: {}", .expected.join(", "))]
pub struct ParseError {
    /// Display names of the token kinds viable at `offset`, sorted
    pub expected: Vec<String>,
    /// Display name of the token kind found
    pub found: String,
    /// Source text of the token found
    pub found_text: String,
    pub offset: usize,
    #[cfg_attr(feature = "diagnostics", label("unexpected token"))]
    pub span: Span,
}

impl ParseError {
    /// Whether `name` is among the expected token kinds
    #[must_use]
    pub fn expects(&self, name: &str) -> bool {
        self.expected.iter().any(|e| e == name)
    }
}

/// Failures of [`crate::parser::parse`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum RecognizeError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Parse(#[from] ParseError),

    #[error("Rule `{rule}` is {kind} left-recursive and cannot be parsed")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(parser::unsupported_left_recursion),
            help("only direct binary-operator recursion (`e: e op e | ...`) is rewritten")
        )
    )]
    UnsupportedLeftRecursion { rule: String, kind: String },

    #[error("Recursion depth limit {limit} exceeded in rule `{rule}` at offset {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::depth_limit)))]
    DepthLimit {
        rule: String,
        limit: usize,
        offset: usize,
    },

    #[error("Unknown start rule `{0}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::unknown_start_rule)))]
    UnknownStartRule(String),
}

impl RecognizeError {
    /// The wrapped [`ParseError`], if this is a token mismatch
    #[must_use]
    pub const fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// Failures of [`crate::codegen::emit`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum CodegenError {
    #[error("Unsupported target `{target}` (supported: {})", .supported.join(", "))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codegen::unsupported_target)))]
    UnsupportedTarget {
        target: String,
        supported: Vec<String>,
    },

    #[error("Rule `{rule}` is {kind} left-recursive; generated parsers cannot run it")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codegen::left_recursion)))]
    UnsupportedLeftRecursion { rule: String, kind: String },

    #[error("Generated file `{file}` is not valid: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codegen::invalid_output)))]
    InvalidOutput { file: String, message: String },
}

/// Umbrella error of the [`crate::ops`] layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum Error {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Recognize(#[from] RecognizeError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Codegen(#[from] CodegenError),

    #[error("Unknown parser rule `{name}`{}", hint(.suggestion))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(ops::unknown_rule)))]
    UnknownRule {
        name: String,
        #[cfg_attr(feature = "diagnostics", help)]
        suggestion: Option<String>,
    },
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Recognize(RecognizeError::Parse(err))
    }
}

impl Error {
    /// Stable short name of the error kind, used in reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Grammar(_) => "GrammarError",
            Self::Lex(_) => "LexError",
            Self::Recognize(RecognizeError::Parse(_)) => "ParseError",
            Self::Recognize(RecognizeError::UnsupportedLeftRecursion { .. }) => {
                "UnsupportedLeftRecursionError"
            }
            Self::Recognize(_) => "RecognizeError",
            Self::Codegen(CodegenError::UnsupportedTarget { .. }) => "UnsupportedTargetError",
            Self::Codegen(_) => "CodegenError",
            Self::UnknownRule { .. } => "UnknownRuleError",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_rule_message_with_hint() {
        let err = GrammarError::UndefinedRule {
            name: "exprr".into(),
            referencing_rule: "stat".into(),
            suggestion: Some("expr".into()),
            span: Span::new(3, 8),
        };
        assert_eq!(
            err.to_string(),
            "Undefined rule `exprr` referenced from `stat` (did you mean `expr`?)"
        );
        assert_eq!(err.span(), Some(Span::new(3, 8)));
    }

    #[test]
    fn test_parse_error_message() {
        let err = ParseError {
            expected: vec!["'route'".into(), "EOF".into()],
            found: "METHOD".into(),
            found_text: "GET".into(),
            offset: 0,
            span: Span::new(0, 3),
        };
        assert!(err.expects("'route'"));
        assert_eq!(
            err.to_string(),
            "Unexpected METHOD at offset 0, expected one of: 'route', EOF"
        );
    }

    #[test]
    fn test_error_kind_names() {
        let err: Error = LexError::new(4, '@').into();
        assert_eq!(err.kind(), "LexError");
        let err: Error = CodegenError::UnsupportedTarget {
            target: "cobol".into(),
            supported: vec!["rust".into()],
        }
        .into();
        assert_eq!(err.kind(), "UnsupportedTargetError");
    }
}
