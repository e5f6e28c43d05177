//! # Lexer
//!
//! Turns input text into [`Token`]s using the lexer rules of a [`Grammar`].
//!
//! ## Overview
//!
//! Every non-fragment lexer rule and every implicit literal is compiled into
//! one Thompson NFA, with fragment references inlined. At each position the
//! NFA is simulated to find the longest match (maximal munch). When several
//! rules match the same length, the one earliest in the token vocabulary
//! wins, so keywords declared before identifiers take precedence.
//!
//! Rules containing a non-greedy loop (`'/*' .*? '*/'`) stop at their first
//! accepting position.
//!
//! ## Commands
//!
//! - `-> skip` drops the token
//! - `-> channel(NAME)` keeps it on a hidden channel
//! - `-> type(NAME)` emits it as another token kind
//!
//! An `EOF` token is always appended.
//!
//! ```rust
//! use quarry::grammar::parse_grammar;
//! use quarry::lexer::tokenize;
//!
//! let grammar = parse_grammar("q : SELECT ID ; SELECT : 'SELECT' ; ID : [A-Z]+ ; WS : ' '+ -> skip ;").unwrap();
//! let tokens = tokenize(&grammar, "SELECT NAME").unwrap();
//! let kinds: Vec<_> = tokens.iter().map(|t| grammar.token(t.kind).name.as_str()).collect();
//! assert_eq!(kinds, ["SELECT", "ID", "EOF"]);
//! ```

mod nfa;
mod token;

pub use token::Token;

use crate::error::LexError;
use crate::grammar::Grammar;
use crate::text::Span;
use nfa::{Matcher, Nfa};
use tracing::{debug, trace};

/// A lexer compiled for one grammar
#[derive(Debug, Clone)]
pub struct Lexer<'g> {
    grammar: &'g Grammar,
    nfa: Nfa,
}

impl<'g> Lexer<'g> {
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        let nfa = Nfa::build(grammar);
        debug!(states = nfa.state_count(), "compiled lexer automaton");
        Self { grammar, nfa }
    }

    /// Number of NFA states, including the shared start state
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.nfa.state_count()
    }

    /// Split `input` into tokens, ending with `EOF`
    ///
    /// # Errors
    ///
    /// Returns [`LexError`] at the first offset where no rule matches.
    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexError> {
        let mut matcher = Matcher::new(&self.nfa);
        let mut tokens = Vec::new();
        let mut pos = 0;
        while pos < input.len() {
            let Some((end, kind)) = matcher.longest_match(input, pos) else {
                let found = input[pos..].chars().next().unwrap_or('\0');
                return Err(LexError::new(pos, found));
            };
            let def = self.grammar.token(kind);
            if def.skip {
                trace!(token = %def.name, start = pos, end, "skipped");
            } else {
                tokens.push(Token {
                    kind: def.emit_as,
                    text: input[pos..end].into(),
                    span: Span::new(pos, end),
                    channel: def.channel,
                });
            }
            pos = end;
        }
        tokens.push(Token::eof(input.len()));
        debug!(count = tokens.len(), "tokenized input");
        Ok(tokens)
    }
}

/// Tokenize `input` with the lexer rules of `grammar`
///
/// # Errors
///
/// Returns [`LexError`] at the first offset where no rule matches.
pub fn tokenize(grammar: &Grammar, input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(grammar).tokenize(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_grammar;

    fn kinds(grammar: &Grammar, tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| grammar.token(t.kind).display().to_string())
            .collect()
    }

    #[test]
    fn test_keyword_declared_first_wins_tie() {
        let grammar = parse_grammar(
            "q : (SELECT | IDENTIFIER)* ; SELECT : 'SELECT' ; IDENTIFIER : [A-Za-z]+ ; WS : [ ]+ -> skip ;",
        )
        .unwrap();
        let tokens = tokenize(&grammar, "SELECT SELECTED").unwrap();
        assert_eq!(kinds(&grammar, &tokens), ["SELECT", "IDENTIFIER", "EOF"]);
        assert_eq!(tokens[1].text, "SELECTED");
    }

    #[test]
    fn test_longest_match_over_priority() {
        let grammar = parse_grammar("s : ('<' | '<=' | ID)* ; ID : [a-z]+ ;").unwrap();
        let tokens = tokenize(&grammar, "a<=b<c").unwrap();
        assert_eq!(kinds(&grammar, &tokens), ["ID", "'<='", "ID", "'<'", "ID", "EOF"]);
    }

    #[test]
    fn test_implicit_literal_beats_later_rule() {
        let grammar = parse_grammar("s : 'route' ID ; ID : [a-z]+ ; WS : ' ' -> skip ;").unwrap();
        let tokens = tokenize(&grammar, "route routes").unwrap();
        assert_eq!(kinds(&grammar, &tokens), ["'route'", "ID", "EOF"]);
    }

    #[test]
    fn test_non_greedy_comment_and_channels() {
        let grammar = parse_grammar(
            "s : ID* ; ID : [a-z]+ ; COMMENT : '/*' .*? '*/' -> channel(HIDDEN) ; WS : [ \\n]+ -> skip ;",
        )
        .unwrap();
        let tokens = tokenize(&grammar, "a /* one */ b /* two */").unwrap();
        assert_eq!(kinds(&grammar, &tokens), ["ID", "COMMENT", "ID", "COMMENT", "EOF"]);
        assert_eq!(tokens[1].text, "/* one */");
        assert!(tokens[1].is_hidden());
        assert!(!tokens[2].is_hidden());
    }

    #[test]
    fn test_fragments_are_inlined() {
        let grammar = parse_grammar(
            "s : NUM ; NUM : DIGIT+ ('.' DIGIT+)? ; fragment DIGIT : [0-9] ;",
        )
        .unwrap();
        let tokens = tokenize(&grammar, "3.25").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "3.25");
        assert!(grammar.token_by_name("DIGIT").is_none());
    }

    #[test]
    fn test_type_command_retypes() {
        let grammar = parse_grammar("s : ID+ ; ID : [a-z]+ ; UP : [A-Z]+ -> type(ID) ;").unwrap();
        let tokens = tokenize(&grammar, "abCD").unwrap();
        assert_eq!(kinds(&grammar, &tokens), ["ID", "ID", "EOF"]);
    }

    #[test]
    fn test_lex_error_offset() {
        let grammar = parse_grammar("s : ID* ; ID : [a-z]+ ; WS : ' ' -> skip ;").unwrap();
        let err = tokenize(&grammar, "ab c#d").unwrap_err();
        assert_eq!(err.offset, 4);
        assert_eq!(err.found, '#');
    }

    #[test]
    fn test_unicode_and_eof_span() {
        let grammar = parse_grammar("s : W ; W : ~[ ]+ ;").unwrap();
        let tokens = tokenize(&grammar, "héllo").unwrap();
        assert_eq!(tokens[0].text, "héllo");
        assert_eq!(tokens[1].span, Span::at("héllo".len()));
        assert!(tokens[1].is_eof());
    }
}
