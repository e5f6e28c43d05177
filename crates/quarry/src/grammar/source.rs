//! Reader for ANTLR-style grammar text.
//!
//! Two stages: a scanner turning text into [`Tok`]s (literals and character
//! sets are decoded here), then a recursive-descent parser building the
//! unresolved [`GrammarFile`]. Embedded actions, `options` blocks and named
//! `@` actions are accepted and dropped.

use super::ast::{AltSyntax, CommandSyntax, ElementKind, ElementSyntax, GrammarFile, Ident, RuleDecl};
use super::charset::CharSet;
use super::model::RepeatOp;
use crate::error::GrammarError;
use crate::text::Span;
use compact_str::CompactString;
use tracing::trace;

type Result<T> = std::result::Result<T, GrammarError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokKind {
    Ident(CompactString),
    Literal(CompactString),
    Set(CharSet),
    /// Body of a `{ ... }` block
    Action(String),
    Colon,
    Semi,
    Pipe,
    LParen,
    RParen,
    Question,
    Star,
    Plus,
    Tilde,
    Dot,
    Hash,
    Comma,
    Lt,
    Gt,
    At,
    Assign,
    PlusAssign,
    Arrow,
    Range,
    Eof,
}

impl TokKind {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("`{name}`"),
            Self::Literal(text) => format!("'{text}'"),
            Self::Set(set) => set.to_string(),
            Self::Action(_) => "an action block".to_string(),
            Self::Eof => "end of input".to_string(),
            other => format!("`{}`", other.punct()),
        }
    }

    const fn punct(&self) -> &'static str {
        match self {
            Self::Colon => ":",
            Self::Semi => ";",
            Self::Pipe => "|",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Question => "?",
            Self::Star => "*",
            Self::Plus => "+",
            Self::Tilde => "~",
            Self::Dot => ".",
            Self::Hash => "#",
            Self::Comma => ",",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::At => "@",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::Arrow => "->",
            Self::Range => "..",
            _ => "",
        }
    }
}

#[derive(Debug, Clone)]
struct Tok {
    kind: TokKind,
    span: Span,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>, start: usize) -> GrammarError {
        GrammarError::syntax(message, Span::new(start, self.pos.max(start)))
    }

    fn tokens(mut self) -> Result<Vec<Tok>> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(c) = self.bump() else {
                out.push(Tok {
                    kind: TokKind::Eof,
                    span: Span::at(start),
                });
                return Ok(out);
            };
            let kind = match c {
                c if c.is_ascii_alphabetic() || c == '_' => {
                    while self
                        .peek()
                        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
                    {
                        self.bump();
                    }
                    TokKind::Ident(CompactString::from(&self.src[start..self.pos]))
                }
                '\'' => TokKind::Literal(self.literal(start)?),
                '[' => TokKind::Set(self.char_set(start)?),
                '{' => TokKind::Action(self.action(start)?),
                ':' => TokKind::Colon,
                ';' => TokKind::Semi,
                '|' => TokKind::Pipe,
                '(' => TokKind::LParen,
                ')' => TokKind::RParen,
                '?' => TokKind::Question,
                '*' => TokKind::Star,
                '+' if self.peek() == Some('=') => {
                    self.bump();
                    TokKind::PlusAssign
                }
                '+' => TokKind::Plus,
                '~' => TokKind::Tilde,
                '.' if self.peek() == Some('.') => {
                    self.bump();
                    TokKind::Range
                }
                '.' => TokKind::Dot,
                '#' => TokKind::Hash,
                ',' => TokKind::Comma,
                '<' => TokKind::Lt,
                '>' => TokKind::Gt,
                '@' => TokKind::At,
                '=' => TokKind::Assign,
                '-' if self.peek() == Some('>') => {
                    self.bump();
                    TokKind::Arrow
                }
                other => return Err(self.error(format!("unexpected character {other:?}"), start)),
            };
            out.push(Tok {
                kind,
                span: Span::new(start, self.pos),
            });
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.src[self.pos..].find("*/") {
                        Some(end) => self.pos += end + 2,
                        None => {
                            self.pos = self.src.len();
                            return Err(self.error("unterminated block comment", start));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Decode an escape after `\`
    fn escape(&mut self, start: usize) -> Result<char> {
        let Some(c) = self.bump() else {
            return Err(self.error("unterminated escape sequence", start));
        };
        Ok(match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '\\' | '\'' | '"' | ']' | '[' | '-' | '^' => c,
            'u' => {
                let digits: String = if self.peek() == Some('{') {
                    self.bump();
                    let mut digits = String::new();
                    while let Some(d) = self.bump() {
                        if d == '}' {
                            break;
                        }
                        digits.push(d);
                    }
                    digits
                } else {
                    (0..4).filter_map(|_| self.bump()).collect()
                };
                u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(format!("invalid unicode escape `\\u{digits}`"), start))?
            }
            'p' | 'P' => {
                return Err(self.error("unicode property escapes are not supported", start));
            }
            other => return Err(self.error(format!("unknown escape `\\{other}`"), start)),
        })
    }

    fn literal(&mut self, start: usize) -> Result<CompactString> {
        let mut text = CompactString::default();
        loop {
            match self.bump() {
                Some('\'') => break,
                Some('\\') => text.push(self.escape(self.pos - 1)?),
                Some('\n') | None => {
                    return Err(self.error("unterminated string literal", start));
                }
                Some(c) => text.push(c),
            }
        }
        if text.is_empty() {
            return Err(self.error("empty string literal", start));
        }
        Ok(text)
    }

    fn set_char(&mut self, start: usize) -> Result<char> {
        match self.bump() {
            Some('\\') => self.escape(self.pos - 1),
            Some(c) => Ok(c),
            None => Err(self.error("unterminated character set", start)),
        }
    }

    fn char_set(&mut self, start: usize) -> Result<CharSet> {
        let mut ranges = Vec::new();
        loop {
            if self.peek() == Some(']') {
                self.bump();
                break;
            }
            let lo = self.set_char(start)?;
            if self.peek() == Some('-') && self.peek_second().is_some_and(|c| c != ']') {
                self.bump();
                let hi = self.set_char(start)?;
                if hi < lo {
                    return Err(self.error(format!("inverted range `{lo}-{hi}`"), start));
                }
                ranges.push((lo, hi));
            } else {
                ranges.push((lo, lo));
            }
        }
        Ok(CharSet::new(ranges))
    }

    fn action(&mut self, start: usize) -> Result<String> {
        let body_start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.src[body_start..self.pos - 1].to_string());
                    }
                }
                '\'' | '"' => {
                    while let Some(q) = self.bump() {
                        if q == '\\' {
                            self.bump();
                        } else if q == c || q == '\n' {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
        Err(self.error("unterminated action block", start))
    }
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokKind {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &TokKind {
        self.toks
            .get(self.pos + n)
            .or_else(|| self.toks.last())
            .map_or(&TokKind::Eof, |t| &t.kind)
    }

    fn span(&self) -> Span {
        self.toks
            .get(self.pos)
            .or_else(|| self.toks.last())
            .map_or(Span::default(), |t| t.span)
    }

    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.toks.get(i))
            .map_or(0, |t| t.span.end)
    }

    fn bump(&mut self) -> Tok {
        let tok = self.toks.get(self.pos).or_else(|| self.toks.last()).cloned();
        if self.pos < self.toks.len() {
            self.pos += 1;
        }
        tok.unwrap_or(Tok {
            kind: TokKind::Eof,
            span: Span::default(),
        })
    }

    fn eat(&mut self, kind: &TokKind) -> bool {
        if self.peek() == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn is_keyword(&self, n: usize, word: &str) -> bool {
        matches!(self.peek_at(n), TokKind::Ident(name) if name == word)
    }

    fn unexpected(&self, context: &str) -> GrammarError {
        GrammarError::syntax(
            format!("{context}, found {}", self.peek().describe()),
            self.span(),
        )
    }

    fn expect(&mut self, kind: &TokKind, context: &str) -> Result<Span> {
        if self.peek() == kind {
            Ok(self.bump().span)
        } else {
            Err(self.unexpected(context))
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<Ident> {
        if let TokKind::Ident(text) = self.peek() {
            let text = text.clone();
            let span = self.bump().span;
            Ok(Ident { text, span })
        } else {
            Err(self.unexpected(context))
        }
    }

    fn file(&mut self) -> Result<GrammarFile> {
        let mut file = GrammarFile::default();

        if (self.is_keyword(0, "lexer") || self.is_keyword(0, "parser")) && self.is_keyword(1, "grammar") {
            self.pos += 1;
        }
        if self.is_keyword(0, "grammar") {
            self.pos += 1;
            file.name = Some(self.expect_ident("expected a grammar name after `grammar`")?);
            self.expect(&TokKind::Semi, "expected `;` after the grammar name")?;
        }

        loop {
            let next_is_block = matches!(self.peek_at(1), TokKind::Action(_));
            match self.peek() {
                TokKind::Ident(word) if next_is_block && word == "options" => self.pos += 2,
                TokKind::Ident(word) if next_is_block && (word == "channels" || word == "tokens") => {
                    let is_channels = word == "channels";
                    self.pos += 1;
                    let tok = self.bump();
                    if let TokKind::Action(body) = tok.kind {
                        let names = body
                            .split(',')
                            .map(str::trim)
                            .filter(|n| !n.is_empty())
                            .map(|n| Ident {
                                text: n.into(),
                                span: tok.span,
                            });
                        if is_channels {
                            file.channels.extend(names);
                        } else {
                            file.virtual_tokens.extend(names);
                        }
                    }
                }
                TokKind::Ident(word) if word == "import" => {
                    return Err(GrammarError::syntax("grammar imports are not supported", self.span()));
                }
                TokKind::At => {
                    self.pos += 1;
                    self.expect_ident("expected an action name after `@`")?;
                    if self.peek() == &TokKind::Colon && self.peek_at(1) == &TokKind::Colon {
                        self.pos += 2;
                        self.expect_ident("expected an action name after `::`")?;
                    }
                    if !matches!(self.bump().kind, TokKind::Action(_)) {
                        return Err(GrammarError::syntax("expected `{` after a named action", self.span()));
                    }
                }
                _ => break,
            }
        }

        while self.peek() != &TokKind::Eof {
            if self.is_keyword(0, "mode") && matches!(self.peek_at(1), TokKind::Ident(_)) && self.peek_at(2) == &TokKind::Semi {
                return Err(GrammarError::syntax("lexer modes are not supported", self.span()));
            }
            let rule = self.rule()?;
            trace!(rule = %rule.name.text, alternatives = rule.alternatives.len(), "parsed rule");
            file.rules.push(rule);
        }
        Ok(file)
    }

    fn rule(&mut self) -> Result<RuleDecl> {
        let fragment = self.is_keyword(0, "fragment") && matches!(self.peek_at(1), TokKind::Ident(_));
        if fragment {
            self.pos += 1;
        }
        let name = self.expect_ident("expected a rule name")?;

        // Rule arguments, return values and per-rule options carry no grammar meaning here.
        loop {
            match self.peek() {
                TokKind::Ident(word) if word == "returns" || word == "locals" => {
                    self.pos += 1;
                    if matches!(self.peek(), TokKind::Set(_)) {
                        self.pos += 1;
                    }
                }
                TokKind::Ident(word) if word == "options" && matches!(self.peek_at(1), TokKind::Action(_)) => {
                    self.pos += 2;
                }
                TokKind::Set(_) | TokKind::Action(_) => self.pos += 1,
                TokKind::At => {
                    self.pos += 1;
                    self.expect_ident("expected an action name after `@`")?;
                }
                _ => break,
            }
        }

        self.expect(
            &TokKind::Colon,
            &format!("expected `:` after rule name `{}`", name.text),
        )?;
        let mut commands = Vec::new();
        let alternatives = self.alternatives(Some(&mut commands))?;
        self.expect(
            &TokKind::Semi,
            &format!("expected `;` to close rule `{}`", name.text),
        )?;
        Ok(RuleDecl {
            name,
            fragment,
            alternatives,
            commands,
        })
    }

    fn alternatives(&mut self, mut commands: Option<&mut Vec<CommandSyntax>>) -> Result<Vec<AltSyntax>> {
        let mut alts = vec![self.alternative(commands.as_deref_mut())?];
        while self.eat(&TokKind::Pipe) {
            alts.push(self.alternative(commands.as_deref_mut())?);
        }
        Ok(alts)
    }

    fn alternative(&mut self, commands: Option<&mut Vec<CommandSyntax>>) -> Result<AltSyntax> {
        let start = self.span().start;
        let mut right_assoc = false;
        if self.eat(&TokKind::Lt) {
            loop {
                let key = self.expect_ident("expected an element option name")?;
                self.expect(&TokKind::Assign, "expected `=` in element option")?;
                let value = self.expect_ident("expected an element option value")?;
                if key.text == "assoc" {
                    right_assoc = value.text == "right";
                }
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
            self.expect(&TokKind::Gt, "expected `>` to close element options")?;
        }

        let mut elements = Vec::new();
        loop {
            match self.peek() {
                TokKind::Pipe | TokKind::Semi | TokKind::RParen | TokKind::Hash | TokKind::Arrow | TokKind::Eof => {
                    break;
                }
                TokKind::Action(_) => {
                    self.pos += 1;
                    self.eat(&TokKind::Question);
                }
                _ => elements.push(self.element()?),
            }
        }

        let label = if self.eat(&TokKind::Hash) {
            Some(self.expect_ident("expected an alternative label after `#`")?)
        } else {
            None
        };

        if self.peek() == &TokKind::Arrow {
            let arrow = self.span();
            self.pos += 1;
            let Some(commands) = commands else {
                return Err(GrammarError::syntax("lexer commands are only allowed at the end of a rule alternative", arrow));
            };
            loop {
                let name = self.expect_ident("expected a lexer command after `->`")?;
                let mut span = name.span;
                let arg = if self.eat(&TokKind::LParen) {
                    let arg = self.expect_ident("expected a lexer command argument")?;
                    span = span.cover(self.expect(&TokKind::RParen, "expected `)` after the command argument")?);
                    Some(arg.text)
                } else {
                    None
                };
                commands.push(CommandSyntax {
                    name: name.text,
                    arg,
                    span,
                });
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
        }

        Ok(AltSyntax {
            elements,
            label,
            right_assoc,
            span: Span::new(start, self.prev_end().max(start)),
        })
    }

    fn element(&mut self) -> Result<ElementSyntax> {
        let start = self.span().start;
        let label = if matches!(self.peek(), TokKind::Ident(_))
            && matches!(self.peek_at(1), TokKind::Assign | TokKind::PlusAssign)
        {
            let label = self.expect_ident("expected a label")?;
            self.pos += 1;
            Some(label)
        } else {
            None
        };
        let atom = self.atom()?;
        let op = match self.peek() {
            TokKind::Question => Some(RepeatOp::Optional),
            TokKind::Star => Some(RepeatOp::ZeroOrMore),
            TokKind::Plus => Some(RepeatOp::OneOrMore),
            _ => None,
        };
        let kind = if let Some(op) = op {
            self.pos += 1;
            let greedy = !self.eat(&TokKind::Question);
            ElementKind::Repeat {
                body: Box::new(atom),
                op,
                greedy,
            }
        } else {
            atom.kind
        };
        Ok(ElementSyntax {
            kind,
            label,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn atom(&mut self) -> Result<ElementSyntax> {
        let start = self.span().start;
        let tok = self.bump();
        let kind = match tok.kind {
            TokKind::Ident(name) => ElementKind::Ref(name),
            TokKind::Literal(text) if self.peek() == &TokKind::Range => {
                self.pos += 1;
                let hi = match self.bump().kind {
                    TokKind::Literal(hi) => hi,
                    _ => return Err(GrammarError::syntax("expected a literal after `..`", tok.span)),
                };
                match (single_char(&text), single_char(&hi)) {
                    (Some(lo), Some(hi)) if lo <= hi => ElementKind::Range(lo, hi),
                    _ => {
                        return Err(GrammarError::syntax(
                            "range bounds must be single characters in ascending order",
                            Span::new(start, self.prev_end()),
                        ));
                    }
                }
            }
            TokKind::Literal(text) => ElementKind::Literal(text),
            TokKind::Set(set) => ElementKind::Set(set),
            TokKind::Dot => ElementKind::Any,
            TokKind::Tilde => ElementKind::Not(Box::new(self.atom()?)),
            TokKind::LParen => {
                let alts = self.alternatives(None)?;
                self.expect(&TokKind::RParen, "expected `)` to close the group")?;
                ElementKind::Block(alts)
            }
            other => {
                return Err(GrammarError::syntax(
                    format!("expected a rule element, found {}", other.describe()),
                    tok.span,
                ));
            }
        };
        Ok(ElementSyntax {
            kind,
            label: None,
            span: Span::new(start, self.prev_end()),
        })
    }
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

/// Parse grammar text into its unresolved syntax tree
///
/// # Errors
///
/// Returns [`GrammarError::Syntax`] for malformed text.
pub fn parse_source(source: &str) -> Result<GrammarFile> {
    let toks = Scanner::new(source).tokens()?;
    let mut parser = Parser { toks, pos: 0 };
    parser.file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_rules_and_labels() {
        let file = parse_source(
            "grammar Expr;\n\
             // comment\n\
             expr : expr '*' expr # mul\n     | INT # int\n     ;\n\
             INT : [0-9]+ ;\n\
             WS : [ \\t\\r\\n]+ -> skip ;",
        )
        .unwrap();
        assert_eq!(file.name.unwrap().text, "Expr");
        assert_eq!(file.rules.len(), 3);
        let expr = &file.rules[0];
        assert_eq!(expr.alternatives.len(), 2);
        assert_eq!(expr.alternatives[0].label.as_ref().unwrap().text, "mul");
        assert_eq!(expr.alternatives[0].elements.len(), 3);
        let ws = &file.rules[2];
        assert_eq!(ws.commands.len(), 1);
        assert_eq!(ws.commands[0].name, "skip");
        match &ws.alternatives[0].elements[0].kind {
            ElementKind::Repeat { body, op, greedy } => {
                assert_eq!(*op, RepeatOp::OneOrMore);
                assert!(*greedy);
                assert!(matches!(&body.kind, ElementKind::Set(set) if set.contains('\t')));
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn test_negation_ranges_and_escapes() {
        let file = parse_source(
            "STRING : '\"' (~[\"\\\\])* '\"' ;\nLOWER : 'a'..'z' ;\nNL : '\\n' ;\nBLOCK : '/*' .*? '*/' -> channel(HIDDEN) ;",
        )
        .unwrap();
        let string = &file.rules[0].alternatives[0].elements;
        assert_eq!(string.len(), 3);
        assert!(matches!(string[0].kind, ElementKind::Literal(ref s) if s == "\""));
        assert!(matches!(file.rules[1].alternatives[0].elements[0].kind, ElementKind::Range('a', 'z')));
        assert!(matches!(file.rules[2].alternatives[0].elements[0].kind, ElementKind::Literal(ref s) if s == "\n"));
        let block = &file.rules[3];
        assert_eq!(block.commands[0].arg.as_deref(), Some("HIDDEN"));
        assert!(matches!(
            block.alternatives[0].elements[1].kind,
            ElementKind::Repeat { greedy: false, .. }
        ));
    }

    #[test]
    fn test_prequel_and_actions_are_skipped() {
        let file = parse_source(
            "parser grammar P;\noptions { tokenVocab=L; }\n@header { package x; }\nchannels { COMMENTS }\ntokens { INDENT, DEDENT }\n\
             a : {this.x();} b=ID {p()}? c+=ID* ;",
        )
        .unwrap();
        assert_eq!(file.channels.len(), 1);
        assert_eq!(file.virtual_tokens.len(), 2);
        let elements = &file.rules[0].alternatives[0].elements;
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].label.as_ref().unwrap().text, "b");
        assert_eq!(elements[1].label.as_ref().unwrap().text, "c");
    }

    #[test]
    fn test_assoc_option() {
        let file = parse_source("e : <assoc=right> e '^' e | INT ;").unwrap();
        assert!(file.rules[0].alternatives[0].right_assoc);
        assert!(!file.rules[0].alternatives[1].right_assoc);
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse_source("expr 'x' ;").unwrap_err();
        assert!(err.to_string().contains("expected `:` after rule name `expr`"));
        assert!(parse_source("A : 'abc ;").unwrap_err().to_string().contains("unterminated string literal"));
        assert!(parse_source("a : b").unwrap_err().to_string().contains("expected `;` to close rule `a`"));
        assert!(parse_source("mode X;").is_err());
        assert!(parse_source("A : '' ;").is_err());
    }

    #[test]
    fn test_empty_alternative() {
        let file = parse_source("a : 'x' | ;").unwrap();
        assert_eq!(file.rules[0].alternatives.len(), 2);
        assert!(file.rules[0].alternatives[1].elements.is_empty());
    }
}
