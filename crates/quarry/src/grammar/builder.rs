//! Two-pass construction of a [`Grammar`] from grammar text.
//!
//! Pass 1 interns every rule name and fixes its [`RuleKind`] from the naming
//! convention, so rules may be referenced before they are declared. Pass 2
//! resolves references, builds the token vocabulary and numbers decisions.

use super::ast::{AltSyntax, ElementKind, ElementSyntax, GrammarFile, Ident, RuleDecl};
use super::charset::CharSet;
use super::model::{
    Alternative, Assoc, Block, Decision, DecisionId, DecisionKind, Element, Grammar, LexPattern,
    LexerCommand, LexerRule, ParserRule, RepeatOp, RuleId, RuleKind, Symbol, TokenDef, TokenId,
    TokenSource,
};
use super::source::parse_source;
use crate::error::GrammarError;
use crate::error::diagnostics::did_you_mean;
use crate::text::Span;
use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use lasso::{Rodeo, Spur};
use tracing::{debug, instrument};

type Result<T> = std::result::Result<T, GrammarError>;

/// Channels every grammar has, in index order
const BUILTIN_CHANNELS: [&str; 2] = ["DEFAULT_TOKEN_CHANNEL", "HIDDEN"];

/// Parse and validate grammar text
///
/// The first declared parser rule becomes the start rule. Use
/// [`GrammarBuilder`] to pick another one.
///
/// # Errors
///
/// Returns a [`GrammarError`] describing the first problem found.
///
/// ```rust
/// use quarry::grammar::{parse_grammar, RuleKind};
///
/// let grammar = parse_grammar("grammar G; sum : NUM ('+' NUM)* ; NUM : [0-9]+ ;").unwrap();
/// assert_eq!(grammar.rule_kind("sum"), Some(RuleKind::Parser));
/// assert_eq!(grammar.rule_kind("NUM"), Some(RuleKind::Lexer));
/// ```
pub fn parse_grammar(source: &str) -> Result<Grammar> {
    GrammarBuilder::new(source).build()
}

/// Grammar construction with options
#[derive(Debug, Clone)]
pub struct GrammarBuilder<'a> {
    source: &'a str,
    start_rule: Option<String>,
}

impl<'a> GrammarBuilder<'a> {
    #[must_use]
    pub const fn new(source: &'a str) -> Self {
        Self {
            source,
            start_rule: None,
        }
    }

    /// Use `name` as the entry rule instead of the first parser rule
    #[must_use]
    pub fn start_rule(mut self, name: impl Into<String>) -> Self {
        self.start_rule = Some(name.into());
        self
    }

    /// Parse, resolve and validate the grammar
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] describing the first problem found.
    #[instrument(level = "debug", skip_all)]
    pub fn build(&self) -> Result<Grammar> {
        let file = parse_source(self.source)?;
        let mut builder = Builder::new(&file);
        builder.declare()?;
        builder.resolve_lexer_rules()?;
        builder.check_lexer_recursion()?;
        builder.assign_tokens()?;
        builder.resolve_parser_rules()?;
        builder.finish(self.start_rule.as_deref())
    }
}

/// What a declared name is bound to during construction
#[derive(Debug, Clone, Copy)]
enum Slot {
    Eof,
    Virtual(TokenId),
    Lexer(usize),
    Parser(RuleId),
}

struct Builder<'f> {
    file: &'f GrammarFile,
    names: Rodeo,
    slots: HashMap<Spur, Slot, ahash::RandomState>,
    lexer_decls: Vec<&'f RuleDecl>,
    parser_decls: Vec<&'f RuleDecl>,
    channels: Vec<CompactString>,
    lexer_rules: Vec<LexerRule>,
    tokens: Vec<TokenDef>,
    literal_tokens: HashMap<CompactString, TokenId, ahash::RandomState>,
    parser_rules: Vec<ParserRule>,
    decisions: Vec<Decision>,
}

impl<'f> Builder<'f> {
    fn new(file: &'f GrammarFile) -> Self {
        let mut channels: Vec<CompactString> = BUILTIN_CHANNELS.iter().map(|c| (*c).into()).collect();
        for channel in &file.channels {
            if !channels.contains(&channel.text) {
                channels.push(channel.text.clone());
            }
        }
        Self {
            file,
            names: Rodeo::default(),
            slots: HashMap::default(),
            lexer_decls: Vec::new(),
            parser_decls: Vec::new(),
            channels,
            lexer_rules: Vec::new(),
            tokens: Vec::new(),
            literal_tokens: HashMap::default(),
            parser_rules: Vec::new(),
            decisions: Vec::new(),
        }
    }

    fn bind(&mut self, name: &Ident, slot: Slot) -> Result<()> {
        let key = self.names.get_or_intern(name.text.as_str());
        if self.slots.insert(key, slot).is_some() {
            return Err(GrammarError::DuplicateRule {
                name: name.text.to_string(),
                span: name.span,
            });
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Slot> {
        self.names.get(name).and_then(|key| self.slots.get(&key).copied())
    }

    fn undefined(&self, name: &str, referencing_rule: &Ident, span: Span) -> GrammarError {
        let suggestion = did_you_mean(
            name,
            self.names
                .strings()
                .filter(|candidate| *candidate != "EOF"),
        );
        GrammarError::UndefinedRule {
            name: name.to_string(),
            referencing_rule: referencing_rule.text.to_string(),
            suggestion,
            span,
        }
    }

    // ---- pass 1 ----

    fn declare(&mut self) -> Result<()> {
        self.bind(
            &Ident {
                text: "EOF".into(),
                span: Span::default(),
            },
            Slot::Eof,
        )?;
        let file = self.file;
        for (i, name) in file.virtual_tokens.iter().enumerate() {
            if classify(name)? != RuleKind::Lexer {
                return Err(GrammarError::NamingConvention {
                    name: name.text.to_string(),
                    reason: "token names must be ALL_UPPERCASE".into(),
                    span: name.span,
                });
            }
            self.bind(name, Slot::Virtual(token_id(i + 1)))?;
        }
        for decl in &file.rules {
            let slot = match classify(&decl.name)? {
                RuleKind::Lexer => {
                    self.lexer_decls.push(decl);
                    Slot::Lexer(self.lexer_decls.len() - 1)
                }
                RuleKind::Parser => {
                    if decl.fragment {
                        return Err(naming(&decl.name, "`fragment` applies only to lexer rules", decl.name.span));
                    }
                    if let Some(command) = decl.commands.first() {
                        return Err(naming(
                            &decl.name,
                            format!("lexer command `{}` used in a parser rule", command.name),
                            command.span,
                        ));
                    }
                    self.parser_decls.push(decl);
                    Slot::Parser(rule_id(self.parser_decls.len() - 1))
                }
            };
            self.bind(&decl.name, slot)?;
        }
        if self.parser_decls.is_empty() {
            return Err(GrammarError::NoParserRules);
        }
        debug!(
            lexer_rules = self.lexer_decls.len(),
            parser_rules = self.parser_decls.len(),
            "declared rules"
        );
        Ok(())
    }

    // ---- pass 2: lexer rules ----

    fn resolve_lexer_rules(&mut self) -> Result<()> {
        let decls = self.lexer_decls.clone();
        for decl in decls {
            let alternatives = decl
                .alternatives
                .iter()
                .map(|alt| self.lex_sequence(decl, alt))
                .collect::<Result<Vec<_>>>()?;
            let commands = self.lexer_commands(decl)?;
            self.lexer_rules.push(LexerRule {
                name: decl.name.text.clone(),
                alternatives,
                commands,
                fragment: decl.fragment,
                token: None,
                span: decl.name.span,
            });
        }
        Ok(())
    }

    fn lex_sequence(&self, decl: &RuleDecl, alt: &AltSyntax) -> Result<LexPattern> {
        alt.elements
            .iter()
            .map(|e| self.lex_pattern(decl, e))
            .collect::<Result<Vec<_>>>()
            .map(LexPattern::Seq)
    }

    fn lex_pattern(&self, decl: &RuleDecl, element: &ElementSyntax) -> Result<LexPattern> {
        Ok(match &element.kind {
            ElementKind::Ref(name) => match self.lookup(name) {
                Some(Slot::Lexer(index)) => LexPattern::Ref(index),
                Some(Slot::Parser(_)) => {
                    return Err(GrammarError::ParserRuleInLexer {
                        name: name.to_string(),
                        referencing_rule: decl.name.text.to_string(),
                        span: element.span,
                    });
                }
                Some(Slot::Eof | Slot::Virtual(_)) | None => {
                    return Err(self.undefined(name, &decl.name, element.span));
                }
            },
            ElementKind::Literal(text) => LexPattern::Literal(text.clone()),
            ElementKind::Set(set) => LexPattern::Set(set.clone()),
            ElementKind::Range(lo, hi) => LexPattern::Set(CharSet::new([(*lo, *hi)])),
            ElementKind::Any => LexPattern::Set(CharSet::any()),
            ElementKind::Not(inner) => LexPattern::Set(negatable(inner)?.complement()),
            ElementKind::Block(alts) => LexPattern::Alt(
                alts.iter()
                    .map(|alt| self.lex_sequence(decl, alt))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ElementKind::Repeat { body, op, greedy } => LexPattern::Repeat {
                pattern: Box::new(self.lex_pattern(decl, body)?),
                op: *op,
                greedy: *greedy,
            },
        })
    }

    fn lexer_commands(&self, decl: &RuleDecl) -> Result<Vec<LexerCommand>> {
        decl.commands
            .iter()
            .map(|command| {
                let unsupported = || GrammarError::UnsupportedLexerCommand {
                    command: match &command.arg {
                        Some(arg) => format!("{}({arg})", command.name),
                        None => command.name.to_string(),
                    },
                    rule: decl.name.text.to_string(),
                    span: command.span,
                };
                match (command.name.as_str(), &command.arg) {
                    ("skip", None) => Ok(LexerCommand::Skip),
                    ("channel", Some(channel)) if self.channels.contains(channel) => {
                        Ok(LexerCommand::Channel(channel.clone()))
                    }
                    ("type", Some(kind)) => Ok(LexerCommand::Type(kind.clone())),
                    _ => Err(unsupported()),
                }
            })
            .collect()
    }

    /// Reject lexer rules that reach themselves through references
    fn check_lexer_recursion(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        fn refs(pattern: &LexPattern, out: &mut Vec<usize>) {
            match pattern {
                LexPattern::Ref(index) => out.push(*index),
                LexPattern::Seq(items) | LexPattern::Alt(items) => {
                    items.iter().for_each(|p| refs(p, out));
                }
                LexPattern::Repeat { pattern, .. } => refs(pattern, out),
                LexPattern::Literal(_) | LexPattern::Set(_) => {}
            }
        }

        let edges: Vec<Vec<usize>> = self
            .lexer_rules
            .iter()
            .map(|rule| {
                let mut out = Vec::new();
                rule.alternatives.iter().for_each(|p| refs(p, &mut out));
                out
            })
            .collect();
        let mut marks = vec![Mark::Unvisited; edges.len()];
        for root in 0..edges.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            marks[root] = Mark::Active;
            while let Some((node, next)) = stack.pop() {
                if let Some(&target) = edges[node].get(next) {
                    stack.push((node, next + 1));
                    match marks[target] {
                        Mark::Active => {
                            return Err(GrammarError::RecursiveLexerRule {
                                name: self.lexer_rules[target].name.to_string(),
                            });
                        }
                        Mark::Unvisited => {
                            marks[target] = Mark::Active;
                            stack.push((target, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                }
            }
        }
        Ok(())
    }

    // ---- pass 2: token vocabulary ----

    fn assign_tokens(&mut self) -> Result<()> {
        self.tokens.push(TokenDef {
            id: TokenId::EOF,
            name: "EOF".into(),
            literal: None,
            source: TokenSource::Eof,
            channel: 0,
            skip: false,
            emit_as: TokenId::EOF,
        });
        for name in &self.file.virtual_tokens {
            let id = token_id(self.tokens.len());
            self.tokens.push(TokenDef {
                id,
                name: name.text.clone(),
                literal: None,
                source: TokenSource::Virtual,
                channel: 0,
                skip: false,
                emit_as: id,
            });
        }

        let mut rule_literals: HashMap<CompactString, usize, ahash::RandomState> = HashMap::default();
        for (index, rule) in self.lexer_rules.iter().enumerate() {
            if let (false, Some(literal)) = (rule.fragment, rule.single_literal()) {
                rule_literals.entry(literal.into()).or_insert(index);
            }
        }

        let mut implicit: Vec<CompactString> = Vec::new();
        for decl in &self.parser_decls {
            for alt in &decl.alternatives {
                collect_literals(&alt.elements, &mut |literal| {
                    if !rule_literals.contains_key(literal) && !implicit.iter().any(|l| l == literal) {
                        implicit.push(literal.clone());
                    }
                });
            }
        }
        for (n, literal) in implicit.into_iter().enumerate() {
            let id = token_id(self.tokens.len());
            self.literal_tokens.insert(literal.clone(), id);
            self.tokens.push(TokenDef {
                id,
                name: format_compact!("T__{n}"),
                literal: Some(literal),
                source: TokenSource::Implicit,
                channel: 0,
                skip: false,
                emit_as: id,
            });
        }

        for index in 0..self.lexer_rules.len() {
            if self.lexer_rules[index].fragment {
                continue;
            }
            let id = token_id(self.tokens.len());
            let rule = &mut self.lexer_rules[index];
            rule.token = Some(id);
            let mut channel = 0;
            for command in &rule.commands {
                if let LexerCommand::Channel(name) = command {
                    channel = self
                        .channels
                        .iter()
                        .position(|c| c == name)
                        .and_then(|i| u16::try_from(i).ok())
                        .unwrap_or(0);
                }
            }
            self.tokens.push(TokenDef {
                id,
                name: rule.name.clone(),
                literal: rule.single_literal().map(CompactString::from),
                source: TokenSource::Lexer(index),
                channel,
                skip: rule.is_skip(),
                emit_as: id,
            });
        }
        for (literal, index) in rule_literals {
            if let Some(id) = self.lexer_rules[index].token {
                self.literal_tokens.insert(literal, id);
            }
        }

        // `-> type(X)` needs every token id assigned first
        for index in 0..self.lexer_rules.len() {
            let rule = &self.lexer_rules[index];
            let Some(id) = rule.token else { continue };
            let target = rule.commands.iter().rev().find_map(|c| match c {
                LexerCommand::Type(name) => Some(name.clone()),
                _ => None,
            });
            if let Some(name) = target {
                let emit_as = match self.lookup(&name) {
                    Some(Slot::Virtual(token)) => Some(token),
                    Some(Slot::Lexer(other)) => self.lexer_rules[other].token,
                    _ => None,
                };
                let decl = self.lexer_decls[index];
                let emit_as = emit_as.ok_or_else(|| self.undefined(&name, &decl.name, decl.name.span))?;
                self.tokens[id.index()].emit_as = emit_as;
            }
        }
        debug!(tokens = self.tokens.len(), "assigned token vocabulary");
        Ok(())
    }

    // ---- pass 2: parser rules ----

    fn resolve_parser_rules(&mut self) -> Result<()> {
        let decls = self.parser_decls.clone();
        for (index, decl) in decls.into_iter().enumerate() {
            let id = rule_id(index);
            let decision = (decl.alternatives.len() >= 2)
                .then(|| self.decision(id, DecisionKind::Rule, decl.alternatives.len()));
            let alternatives = decl
                .alternatives
                .iter()
                .map(|alt| self.alternative(id, decl, alt))
                .collect::<Result<Vec<_>>>()?;
            self.parser_rules.push(ParserRule {
                id,
                name: decl.name.text.clone(),
                alternatives,
                decision,
                span: decl.name.span,
            });
        }
        Ok(())
    }

    fn decision(&mut self, rule: RuleId, kind: DecisionKind, alternatives: usize) -> DecisionId {
        let id = DecisionId(u32::try_from(self.decisions.len()).unwrap_or(u32::MAX));
        self.decisions.push(Decision {
            id,
            rule,
            kind,
            alternatives,
        });
        id
    }

    fn alternative(&mut self, rule: RuleId, decl: &RuleDecl, alt: &AltSyntax) -> Result<Alternative> {
        let elements = alt
            .elements
            .iter()
            .map(|e| self.element(rule, decl, e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Alternative {
            elements,
            label: alt.label.as_ref().map(|l| l.text.clone()),
            assoc: if alt.right_assoc { Assoc::Right } else { Assoc::Left },
        })
    }

    fn element(&mut self, rule: RuleId, decl: &RuleDecl, element: &ElementSyntax) -> Result<Element> {
        let label = element.label.as_ref().map(|l| l.text.clone());
        Ok(match &element.kind {
            ElementKind::Ref(name) => match self.lookup(name) {
                Some(Slot::Parser(callee)) => Element::Rule {
                    rule: callee,
                    label,
                },
                Some(Slot::Lexer(index)) => match self.lexer_rules[index].token {
                    Some(token) => Element::Token { token, label },
                    None => {
                        return Err(GrammarError::syntax(
                            format!(
                                "fragment rule `{name}` cannot be referenced from parser rule `{}`",
                                decl.name.text
                            ),
                            element.span,
                        ));
                    }
                },
                Some(Slot::Virtual(token)) => Element::Token { token, label },
                Some(Slot::Eof) => Element::Token {
                    token: TokenId::EOF,
                    label,
                },
                None => return Err(self.undefined(name, &decl.name, element.span)),
            },
            ElementKind::Literal(text) => match self.literal_tokens.get(text) {
                Some(&token) => Element::Token { token, label },
                None => {
                    return Err(GrammarError::syntax(
                        format!("literal '{text}' has no token"),
                        element.span,
                    ));
                }
            },
            ElementKind::Block(alts) => {
                let decision = (alts.len() >= 2).then(|| self.decision(rule, DecisionKind::Block, alts.len()));
                let alternatives = alts
                    .iter()
                    .map(|alt| self.alternative(rule, decl, alt))
                    .collect::<Result<Vec<_>>>()?;
                Element::Block(Block {
                    alternatives,
                    decision,
                })
            }
            ElementKind::Repeat { body, op, greedy } => {
                let kind = match op {
                    RepeatOp::Optional => DecisionKind::Optional,
                    RepeatOp::ZeroOrMore => DecisionKind::Star,
                    RepeatOp::OneOrMore => DecisionKind::Plus,
                };
                let decision = self.decision(rule, kind, 2);
                let mut body = self.element(rule, decl, body)?;
                if let (Some(label), Element::Token { label: slot, .. } | Element::Rule { label: slot, .. }) =
                    (label, &mut body)
                {
                    slot.get_or_insert(label);
                }
                Element::Repeat {
                    body: Box::new(body),
                    op: *op,
                    greedy: *greedy,
                    decision,
                }
            }
            kind @ (ElementKind::Set(_) | ElementKind::Range(..) | ElementKind::Any | ElementKind::Not(_)) => {
                let what = kind.lexer_only().unwrap_or("lexer construct");
                return Err(naming(
                    &decl.name,
                    format!("{what} used in a parser rule"),
                    element.span,
                ));
            }
        })
    }

    fn finish(self, start_rule: Option<&str>) -> Result<Grammar> {
        let start = match start_rule {
            None => RuleId(0),
            Some(name) => match self.lookup(name) {
                Some(Slot::Parser(id)) => id,
                _ => {
                    return Err(GrammarError::UnknownStartRule {
                        name: name.to_string(),
                        suggestion: did_you_mean(name, self.parser_rules.iter().map(|r| r.name.as_str())),
                    });
                }
            },
        };

        let mut symbols = HashMap::with_capacity_and_hasher(self.slots.len(), ahash::RandomState::new());
        for (key, slot) in &self.slots {
            let symbol = match *slot {
                Slot::Eof => Symbol::Token(TokenId::EOF),
                Slot::Virtual(token) => Symbol::Token(token),
                Slot::Lexer(index) => Symbol::Lexer(index),
                Slot::Parser(id) => Symbol::Parser(id),
            };
            symbols.insert(CompactString::from(self.names.resolve(key)), symbol);
        }

        let name = self
            .file
            .name
            .as_ref()
            .map_or_else(|| CompactString::const_new("Grammar"), |n| n.text.clone());
        debug!(
            grammar = %name,
            parser_rules = self.parser_rules.len(),
            lexer_rules = self.lexer_rules.len(),
            tokens = self.tokens.len(),
            decisions = self.decisions.len(),
            "built grammar"
        );
        Ok(Grammar {
            name,
            lexer_rules: self.lexer_rules,
            parser_rules: self.parser_rules,
            tokens: self.tokens,
            channels: self.channels,
            decisions: self.decisions,
            start,
            symbols,
        })
    }
}

/// Rule kind implied by the name, or the convention it breaks
fn classify(name: &Ident) -> Result<RuleKind> {
    match name.text.chars().next() {
        Some(c) if c.is_lowercase() => Ok(RuleKind::Parser),
        Some(c) if c.is_uppercase() => {
            if name
                .text
                .chars()
                .all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_')
            {
                Ok(RuleKind::Lexer)
            } else {
                Err(naming(name, "lexer rule names must be ALL_UPPERCASE", name.span))
            }
        }
        _ => Err(naming(name, "rule names must start with a letter", name.span)),
    }
}

fn naming(name: &Ident, reason: impl Into<String>, span: Span) -> GrammarError {
    GrammarError::NamingConvention {
        name: name.text.to_string(),
        reason: reason.into(),
        span,
    }
}

/// Character set operand of `~`
fn negatable(element: &ElementSyntax) -> Result<CharSet> {
    let fail = || {
        GrammarError::syntax(
            "`~` applies only to character sets, ranges and single characters",
            element.span,
        )
    };
    match &element.kind {
        ElementKind::Set(set) => Ok(set.clone()),
        ElementKind::Range(lo, hi) => Ok(CharSet::new([(*lo, *hi)])),
        ElementKind::Literal(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(CharSet::single(c)),
                _ => Err(fail()),
            }
        }
        ElementKind::Block(alts) => alts.iter().try_fold(CharSet::default(), |acc, alt| match alt.elements.as_slice() {
            [only] => Ok(acc.union(&negatable(only)?)),
            _ => Err(fail()),
        }),
        _ => Err(fail()),
    }
}

fn collect_literals(elements: &[ElementSyntax], visit: &mut impl FnMut(&CompactString)) {
    for element in elements {
        match &element.kind {
            ElementKind::Literal(text) => visit(text),
            ElementKind::Block(alts) => {
                for alt in alts {
                    collect_literals(&alt.elements, visit);
                }
            }
            ElementKind::Repeat { body, .. } => collect_literals(std::slice::from_ref(&**body), visit),
            _ => {}
        }
    }
}

fn token_id(index: usize) -> TokenId {
    TokenId(u32::try_from(index).unwrap_or(u32::MAX))
}

fn rule_id(index: usize) -> RuleId {
    RuleId(u32::try_from(index).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES: &str = r"
        grammar Routes;
        file : route* EOF ;
        route : 'route' METHOD PATH '->' handler ';' ;
        handler : ID ('.' ID)* ;
        METHOD : 'GET' | 'POST' ;
        PATH : '/' [a-z/]* ;
        ID : [A-Za-z_]+ ;
        WS : [ \t\r\n]+ -> skip ;
    ";

    #[test]
    fn test_forward_references_resolve() {
        let grammar = parse_grammar(ROUTES).unwrap();
        assert_eq!(grammar.name(), "Routes");
        assert_eq!(grammar.parser_rules().len(), 3);
        assert_eq!(grammar.rule(grammar.start_rule()).name, "file");
        assert_eq!(grammar.rule_kind("route"), Some(RuleKind::Parser));
        assert_eq!(grammar.rule_kind("PATH"), Some(RuleKind::Lexer));
    }

    #[test]
    fn test_token_vocabulary_order() {
        let grammar = parse_grammar(ROUTES).unwrap();
        let names: Vec<_> = grammar.tokens().iter().map(|t| t.display().to_string()).collect();
        assert_eq!(
            names,
            ["EOF", "'route'", "'->'", "';'", "'.'", "METHOD", "PATH", "ID", "WS"]
        );
        assert_eq!(grammar.tokens()[1].name, "T__0");
        assert!(grammar.token_by_name("WS").unwrap().skip);
        assert_eq!(grammar.token_by_name("'->'").unwrap().name, "T__1");
    }

    #[test]
    fn test_literal_display_is_not_charset_escaped() {
        let grammar = parse_grammar("s : '-' | '^' | '[' ']' | '\\'' ;").unwrap();
        let names: Vec<_> = grammar.tokens().iter().skip(1).map(|t| t.display().to_string()).collect();
        assert_eq!(names, ["'-'", "'^'", "'['", "']'", "'\\''"]);
        assert!(grammar.token_by_name("'-'").is_some());
        assert!(grammar.to_string().contains("'-'"));
    }

    #[test]
    fn test_literal_matching_lexer_rule_reuses_token() {
        let grammar = parse_grammar("s : 'select' ID ; SELECT : 'select' ; ID : [a-z]+ ;").unwrap();
        assert!(grammar.tokens().iter().all(|t| t.source != TokenSource::Implicit));
        let rule = grammar.rule_by_name("s").unwrap();
        let select = grammar.token_by_name("SELECT").unwrap().id;
        assert!(matches!(rule.alternatives[0].elements[0], Element::Token { token, .. } if token == select));
    }

    #[test]
    fn test_undefined_rule_suggests() {
        let err = parse_grammar("stat : exprr ';' ; expr : INT ; INT : [0-9]+ ;").unwrap_err();
        match err {
            GrammarError::UndefinedRule {
                name,
                referencing_rule,
                suggestion,
                ..
            } => {
                assert_eq!(name, "exprr");
                assert_eq!(referencing_rule, "stat");
                assert_eq!(suggestion.as_deref(), Some("expr"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_naming_and_duplicates() {
        assert!(matches!(
            parse_grammar("s : A ; Ident : 'x' ; A : 'a' ;"),
            Err(GrammarError::NamingConvention { name, .. }) if name == "Ident"
        ));
        assert!(matches!(
            parse_grammar("s : [a-z]+ ;"),
            Err(GrammarError::NamingConvention { name, .. }) if name == "s"
        ));
        assert!(matches!(
            parse_grammar("s : 'a' -> skip ;"),
            Err(GrammarError::NamingConvention { .. })
        ));
        assert!(matches!(
            parse_grammar("fragment s : 'a' ;"),
            Err(GrammarError::NamingConvention { .. })
        ));
        assert!(matches!(
            parse_grammar("s : A ; A : 'a' ; A : 'b' ;"),
            Err(GrammarError::DuplicateRule { name, .. }) if name == "A"
        ));
        assert!(matches!(parse_grammar("A : 'a' ;"), Err(GrammarError::NoParserRules)));
    }

    #[test]
    fn test_lexer_reference_errors() {
        assert!(matches!(
            parse_grammar("s : A ; A : s ;"),
            Err(GrammarError::ParserRuleInLexer { .. })
        ));
        assert!(matches!(
            parse_grammar("s : A ; A : 'a' B ; B : 'b' A ;"),
            Err(GrammarError::RecursiveLexerRule { .. })
        ));
        assert!(matches!(
            parse_grammar("s : A ; A : 'a' -> more ;"),
            Err(GrammarError::UnsupportedLexerCommand { .. })
        ));
    }

    #[test]
    fn test_decisions_numbered_in_order() {
        let grammar = parse_grammar("s : a? (B | C)* | D ; a : B ; B : 'b' ; C : 'c' ; D : 'd' ;").unwrap();
        let kinds: Vec<_> = grammar.decisions().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            [
                DecisionKind::Rule,
                DecisionKind::Optional,
                DecisionKind::Star,
                DecisionKind::Block
            ]
        );
        assert_eq!(grammar.rule_by_name("s").unwrap().decision, Some(DecisionId(0)));
        assert_eq!(grammar.rule_by_name("a").unwrap().decision, None);
    }

    #[test]
    fn test_start_rule_option() {
        let grammar = GrammarBuilder::new(ROUTES).start_rule("route").build().unwrap();
        assert_eq!(grammar.rule(grammar.start_rule()).name, "route");
        let err = GrammarBuilder::new(ROUTES).start_rule("rout").build().unwrap_err();
        assert!(matches!(
            err,
            GrammarError::UnknownStartRule { suggestion: Some(s), .. } if s == "route"
        ));
    }

    #[test]
    fn test_channels_and_type_commands() {
        let grammar = parse_grammar(
            "grammar C; channels { COMMENTS } tokens { NAME } s : NAME ; \
             KW : 'kw' -> type(NAME) ; C : '#' ~[\\n]* -> channel(COMMENTS) ;",
        )
        .unwrap();
        let name = grammar.token_by_name("NAME").unwrap().id;
        assert_eq!(grammar.token_by_name("KW").unwrap().emit_as, name);
        let comment = grammar.token_by_name("C").unwrap();
        assert_eq!(grammar.channel_name(comment.channel), "COMMENTS");
    }

    #[test]
    fn test_content_hash_ignores_layout() {
        let a = parse_grammar("s : A+ ; // trailing\nA : 'a' ;").unwrap();
        let b = parse_grammar("s\n  : A+\n  ;\nA : 'a';").unwrap();
        let c = parse_grammar("s : A* ; A : 'a' ;").unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }
}
