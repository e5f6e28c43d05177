use crate::grammar::{Grammar, TokenId};
use crate::text::Span;
use compact_str::CompactString;

/// A token produced by the lexer.
///
/// Tokens on a channel other than the default one are kept in the stream
/// but never seen by the recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenId,
    /// The source text this token covers
    pub text: CompactString,
    /// Byte range in the input
    pub span: Span,
    /// Channel index (0 is the default channel)
    pub channel: u16,
}

impl Token {
    /// The end-of-input marker appended after the last real token
    #[must_use]
    pub fn eof(offset: usize) -> Self {
        Self {
            kind: TokenId::EOF,
            text: CompactString::const_new("<EOF>"),
            span: Span::at(offset),
            channel: 0,
        }
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenId::EOF
    }

    /// Whether the token sits on a channel the parser ignores
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.channel != 0
    }

    /// `KIND 'text' @ start..end`, used in token listings
    #[must_use]
    pub fn describe(&self, grammar: &Grammar) -> String {
        format!(
            "{} {:?} @ {}",
            grammar.token(self.kind).display(),
            self.text.as_str(),
            self.span
        )
    }
}
