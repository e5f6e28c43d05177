//! Unresolved syntax tree of a grammar file.
//!
//! Produced by [`super::source::parse_source`] and consumed by the builder,
//! which resolves names and decides rule kinds.

use super::charset::CharSet;
use super::model::RepeatOp;
use crate::text::Span;
use compact_str::CompactString;

/// A name together with where it was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub text: CompactString,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarFile {
    pub name: Option<Ident>,
    pub channels: Vec<Ident>,
    pub virtual_tokens: Vec<Ident>,
    pub rules: Vec<RuleDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecl {
    pub name: Ident,
    pub fragment: bool,
    pub alternatives: Vec<AltSyntax>,
    /// `-> skip`, `-> channel(X)` etc. gathered from every alternative
    pub commands: Vec<CommandSyntax>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltSyntax {
    pub elements: Vec<ElementSyntax>,
    pub label: Option<Ident>,
    pub right_assoc: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSyntax {
    pub kind: ElementKind,
    /// `name=` / `name+=` prefix
    pub label: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Ref(CompactString),
    Literal(CompactString),
    Set(CharSet),
    /// `'a'..'z'`
    Range(char, char),
    /// `.`
    Any,
    /// `~x`
    Not(Box<ElementSyntax>),
    Block(Vec<AltSyntax>),
    Repeat {
        body: Box<ElementSyntax>,
        op: RepeatOp,
        greedy: bool,
    },
}

impl ElementKind {
    /// Constructs only meaningful inside lexer rules
    #[must_use]
    pub fn lexer_only(&self) -> Option<&'static str> {
        match self {
            Self::Set(_) => Some("character set"),
            Self::Range(..) => Some("character range"),
            Self::Not(_) => Some("negated set"),
            Self::Any => Some("wildcard `.`"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSyntax {
    pub name: CompactString,
    pub arg: Option<CompactString>,
    pub span: Span,
}
