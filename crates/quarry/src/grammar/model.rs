//! Resolved grammar model.
//!
//! Every name is resolved to an id and every rule carries an explicit
//! [`RuleKind`]. A [`Grammar`] is immutable once built and is shared by
//! every downstream component.

use super::charset::{CharSet, quote_literal};
use crate::text::Span;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::fmt::{self, Write};
use std::hash::{BuildHasher, Hash, Hasher};

/// Index into [`Grammar::tokens`]. Id 0 is always `EOF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

impl TokenId {
    pub const EOF: Self = Self(0);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into [`Grammar::parser_rules`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

impl RuleId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into [`Grammar::decisions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecisionId(pub u32);

impl DecisionId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a rule produces tokens or parse-tree nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Lexer,
    Parser,
}

impl RuleKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexer => "lexer",
            Self::Parser => "parser",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepeatOp {
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl RepeatOp {
    #[must_use]
    pub const fn suffix(self) -> char {
        match self {
            Self::Optional => '?',
            Self::ZeroOrMore => '*',
            Self::OneOrMore => '+',
        }
    }

    #[must_use]
    pub const fn min(self) -> usize {
        match self {
            Self::OneOrMore => 1,
            Self::Optional | Self::ZeroOrMore => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Assoc {
    #[default]
    Left,
    Right,
}

/// One matcher of a lexer rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexPattern {
    Literal(CompactString),
    Set(CharSet),
    /// Reference to another lexer rule (by lexer rule index), inlined when compiled
    Ref(usize),
    Seq(Vec<LexPattern>),
    Alt(Vec<LexPattern>),
    Repeat {
        pattern: Box<LexPattern>,
        op: RepeatOp,
        greedy: bool,
    },
}

impl LexPattern {
    /// Whether a non-greedy loop appears anywhere in the pattern
    #[must_use]
    pub fn has_lazy_loop(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Set(_) | Self::Ref(_) => false,
            Self::Seq(items) | Self::Alt(items) => items.iter().any(Self::has_lazy_loop),
            Self::Repeat { pattern, greedy, .. } => !greedy || pattern.has_lazy_loop(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexerCommand {
    Skip,
    Channel(CompactString),
    Type(CompactString),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerRule {
    pub name: CompactString,
    /// Each alternative is usually a [`LexPattern::Seq`]
    pub alternatives: Vec<LexPattern>,
    pub commands: Vec<LexerCommand>,
    pub fragment: bool,
    /// Token produced by this rule; `None` for fragments
    pub token: Option<TokenId>,
    pub span: Span,
}

impl LexerRule {
    #[must_use]
    pub fn is_skip(&self) -> bool {
        self.commands.contains(&LexerCommand::Skip)
    }

    /// The literal this rule matches when its whole body is one literal
    #[must_use]
    pub fn single_literal(&self) -> Option<&str> {
        match self.alternatives.as_slice() {
            [LexPattern::Literal(lit)] => Some(lit.as_str()),
            [LexPattern::Seq(items)] => match items.as_slice() {
                [LexPattern::Literal(lit)] => Some(lit.as_str()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Where a token kind comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSource {
    Eof,
    /// Declared in a `tokens { }` block; never produced by the lexer
    Virtual,
    /// A literal used in a parser rule with no lexer rule of its own
    Implicit,
    /// Produced by the lexer rule with this index
    Lexer(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDef {
    pub id: TokenId,
    /// Identifier form: the lexer rule name, `T__n` for implicit literals, or `EOF`
    pub name: CompactString,
    pub literal: Option<CompactString>,
    pub source: TokenSource,
    /// Channel index (0 is the default channel)
    pub channel: u16,
    pub skip: bool,
    /// Kind emitted instead of this one (`-> type(X)`)
    pub emit_as: TokenId,
}

impl TokenDef {
    /// Name shown to users: quoted literal for implicit tokens
    #[must_use]
    pub fn display(&self) -> CompactString {
        match (&self.source, &self.literal) {
            (TokenSource::Implicit, Some(lit)) => CompactString::from(quote_literal(lit)),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    Token {
        token: TokenId,
        label: Option<CompactString>,
    },
    Rule {
        rule: RuleId,
        label: Option<CompactString>,
    },
    Block(Block),
    Repeat {
        body: Box<Element>,
        op: RepeatOp,
        greedy: bool,
        decision: DecisionId,
    },
}

impl Element {
    /// Field label attached with `name=` / `name+=`
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Token { label, .. } | Self::Rule { label, .. } => label.as_deref(),
            Self::Block(_) | Self::Repeat { .. } => None,
        }
    }

    /// Single terminal, possibly wrapped in a one-alternative block
    #[must_use]
    pub fn as_token(&self) -> Option<TokenId> {
        match self {
            Self::Token { token, .. } => Some(*token),
            Self::Block(block) => match block.alternatives.as_slice() {
                [alt] => match alt.elements.as_slice() {
                    [only] => only.as_token(),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        }
    }
}

/// Parenthesized sub-alternatives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub alternatives: Vec<Alternative>,
    /// Set when the block has two or more alternatives
    pub decision: Option<DecisionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alternative {
    pub elements: Vec<Element>,
    pub label: Option<CompactString>,
    pub assoc: Assoc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserRule {
    pub id: RuleId,
    pub name: CompactString,
    pub alternatives: Vec<Alternative>,
    /// Set when the rule has two or more alternatives
    pub decision: Option<DecisionId>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    /// Choice between a rule's alternatives
    Rule,
    /// Choice inside a parenthesized block
    Block,
    /// `x?`
    Optional,
    /// Loop continue/exit of `x*`
    Star,
    /// Loop continue/exit of `x+`
    Plus,
}

impl DecisionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Block => "block",
            Self::Optional => "optional",
            Self::Star => "star",
            Self::Plus => "plus",
        }
    }
}

/// A choice point the recognizer resolves with lookahead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub id: DecisionId,
    pub rule: RuleId,
    pub kind: DecisionKind,
    /// Number of outcomes (2 for repetitions: enter or exit)
    pub alternatives: usize,
}

/// What a name in the grammar refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// Lexer rule index
    Lexer(usize),
    Parser(RuleId),
    /// `tokens { }` entry or the built-in `EOF`
    Token(TokenId),
}

impl Symbol {
    #[must_use]
    pub const fn kind(self) -> RuleKind {
        match self {
            Self::Lexer(_) | Self::Token(_) => RuleKind::Lexer,
            Self::Parser(_) => RuleKind::Parser,
        }
    }
}

/// A validated grammar
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) name: CompactString,
    pub(crate) lexer_rules: Vec<LexerRule>,
    pub(crate) parser_rules: Vec<ParserRule>,
    pub(crate) tokens: Vec<TokenDef>,
    pub(crate) channels: Vec<CompactString>,
    pub(crate) decisions: Vec<Decision>,
    pub(crate) start: RuleId,
    pub(crate) symbols: HashMap<CompactString, Symbol, ahash::RandomState>,
}

impl Grammar {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn lexer_rules(&self) -> &[LexerRule] {
        &self.lexer_rules
    }

    #[must_use]
    pub fn parser_rules(&self) -> &[ParserRule] {
        &self.parser_rules
    }

    #[must_use]
    pub fn tokens(&self) -> &[TokenDef] {
        &self.tokens
    }

    #[must_use]
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    #[must_use]
    pub fn channels(&self) -> &[CompactString] {
        &self.channels
    }

    #[must_use]
    pub fn rule(&self, id: RuleId) -> &ParserRule {
        &self.parser_rules[id.index()]
    }

    #[must_use]
    pub fn token(&self, id: TokenId) -> &TokenDef {
        &self.tokens[id.index()]
    }

    #[must_use]
    pub fn decision(&self, id: DecisionId) -> &Decision {
        &self.decisions[id.index()]
    }

    #[must_use]
    pub fn start_rule(&self) -> RuleId {
        self.start
    }

    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    /// Kind of the rule or token called `name`
    #[must_use]
    pub fn rule_kind(&self, name: &str) -> Option<RuleKind> {
        self.symbol(name).map(Symbol::kind)
    }

    #[must_use]
    pub fn rule_by_name(&self, name: &str) -> Option<&ParserRule> {
        match self.symbol(name)? {
            Symbol::Parser(id) => Some(self.rule(id)),
            _ => None,
        }
    }

    /// Token by identifier (`ID`, `EOF`) or by quoted literal (`'+'`)
    #[must_use]
    pub fn token_by_name(&self, name: &str) -> Option<&TokenDef> {
        match self.symbol(name) {
            Some(Symbol::Token(id)) => Some(self.token(id)),
            Some(Symbol::Lexer(index)) => self.lexer_rules[index].token.map(|id| self.token(id)),
            _ => self.tokens.iter().find(|t| t.display() == name),
        }
    }

    #[must_use]
    pub fn channel_name(&self, channel: u16) -> &str {
        self.channels
            .get(channel as usize)
            .map_or("DEFAULT_TOKEN_CHANNEL", |c| c.as_str())
    }

    /// Stable hash of the grammar's meaning
    ///
    /// Whitespace, comments and dropped actions in the source text do not
    /// affect it.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let state = ahash::RandomState::with_seeds(
            0x5171_a6e0_90b2_c2f1,
            0x2b6d_1e08_f7a3_94c5,
            0x9e37_79b9_7f4a_7c15,
            0xc2b2_ae3d_27d4_eb4f,
        );
        let mut hasher = state.build_hasher();
        self.to_string().hash(&mut hasher);
        self.rule(self.start).name.hash(&mut hasher);
        hasher.finish()
    }

    /// Render one alternative in grammar syntax
    #[must_use]
    pub fn render_alternative(&self, alt: &Alternative) -> String {
        let mut out = String::new();
        if alt.assoc == Assoc::Right {
            out.push_str("<assoc=right> ");
        }
        let parts: Vec<String> = alt.elements.iter().map(|e| self.render_element(e)).collect();
        out.push_str(&parts.join(" "));
        if let Some(label) = &alt.label {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "# {label}");
        }
        out
    }

    /// Render one element in grammar syntax
    #[must_use]
    pub fn render_element(&self, element: &Element) -> String {
        match element {
            Element::Token { token, label } => with_label(label.as_deref(), &self.token(*token).display()),
            Element::Rule { rule, label } => with_label(label.as_deref(), &self.rule(*rule).name),
            Element::Block(block) => {
                let alts: Vec<String> = block
                    .alternatives
                    .iter()
                    .map(|a| self.render_alternative(a))
                    .collect();
                format!("({})", alts.join(" | "))
            }
            Element::Repeat { body, op, greedy, .. } => {
                let inner = self.render_element(body);
                let lazy = if *greedy { "" } else { "?" };
                format!("{inner}{}{lazy}", op.suffix())
            }
        }
    }

    /// Render a lexer pattern in grammar syntax
    #[must_use]
    pub fn render_pattern(&self, pattern: &LexPattern) -> String {
        match pattern {
            LexPattern::Literal(lit) => quote_literal(lit),
            LexPattern::Set(set) => set.to_string(),
            LexPattern::Ref(index) => self.lexer_rules[*index].name.to_string(),
            LexPattern::Seq(items) => items
                .iter()
                .map(|p| self.render_pattern(p))
                .collect::<Vec<_>>()
                .join(" "),
            LexPattern::Alt(items) => format!(
                "({})",
                items
                    .iter()
                    .map(|p| self.render_pattern(p))
                    .collect::<Vec<_>>()
                    .join(" | ")
            ),
            LexPattern::Repeat { pattern, op, greedy } => {
                let inner = match pattern.as_ref() {
                    LexPattern::Seq(items) if items.len() > 1 => format!("({})", self.render_pattern(pattern)),
                    _ => self.render_pattern(pattern),
                };
                format!("{inner}{}{}", op.suffix(), if *greedy { "" } else { "?" })
            }
        }
    }
}

fn with_label(label: Option<&str>, text: &str) -> String {
    match label {
        Some(label) => format!("{label}={text}"),
        None => text.to_string(),
    }
}

impl fmt::Display for Grammar {
    /// Canonical grammar text: parser rules, then lexer rules
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "grammar {};", self.name)?;
        let virtual_tokens: Vec<&str> = self
            .tokens
            .iter()
            .filter(|t| t.source == TokenSource::Virtual)
            .map(|t| t.name.as_str())
            .collect();
        if !virtual_tokens.is_empty() {
            writeln!(f, "tokens {{ {} }}", virtual_tokens.join(", "))?;
        }
        for rule in &self.parser_rules {
            let alts: Vec<String> = rule
                .alternatives
                .iter()
                .map(|a| self.render_alternative(a))
                .collect();
            writeln!(f, "{} : {} ;", rule.name, alts.join(" | "))?;
        }
        for rule in &self.lexer_rules {
            let alts: Vec<String> = rule
                .alternatives
                .iter()
                .map(|p| self.render_pattern(p))
                .collect();
            let fragment = if rule.fragment { "fragment " } else { "" };
            write!(f, "{fragment}{} : {}", rule.name, alts.join(" | "))?;
            let commands: Vec<String> = rule
                .commands
                .iter()
                .map(|c| match c {
                    LexerCommand::Skip => "skip".to_string(),
                    LexerCommand::Channel(name) => format!("channel({name})"),
                    LexerCommand::Type(name) => format!("type({name})"),
                })
                .collect();
            if !commands.is_empty() {
                write!(f, " -> {}", commands.join(", "))?;
            }
            writeln!(f, " ;")?;
        }
        Ok(())
    }
}
