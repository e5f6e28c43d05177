//! Reference Rust backend.
//!
//! Produces a module with a regex-driven lexer, a recursive-descent parser
//! that mirrors the recognizer (one token of lookahead, longest-match fallback
//! on conflicts, precedence climbing for operator rules) and optional
//! listener and visitor traits. Generated code depends on the `regex` crate.

use super::ir::{ChoiceIr, ElementIr, ParserIr, RepeatKind, RuleIr};
use super::registry::{Backend, BackendCapabilities};
use super::{CodegenOptions, GeneratedFile, to_pascal_case};
use crate::error::CodegenError;
use proc_macro2::{Delimiter, Ident, Literal, Spacing, TokenStream, TokenTree};
use quote::{format_ident, quote};

#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend;

impl Backend for RustBackend {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "rust",
            language: "Rust",
            full_parser: true,
            supports_listener: true,
            supports_visitor: true,
            supports_left_recursion: false,
        }
    }

    fn generate(&self, ir: &ParserIr, options: &CodegenOptions) -> Result<Vec<GeneratedFile>, CodegenError> {
        if let Some(rule) = ir.unsupported.first() {
            let kind = ir
                .rules
                .iter()
                .find(|r| &r.name == rule)
                .map_or_else(|| "left".to_string(), |r| r.left_recursion.clone());
            return Err(CodegenError::UnsupportedLeftRecursion {
                rule: rule.clone(),
                kind,
            });
        }

        let module = options.module_for(&ir.driver.grammar);
        let generator = Generator { ir };
        let grammar = &ir.driver.grammar;
        let mut files = vec![
            render(format!("{module}/mod.rs"), grammar, generator.module(options))?,
            render(format!("{module}/lexer.rs"), grammar, generator.lexer())?,
            render(format!("{module}/parser.rs"), grammar, generator.parser())?,
        ];
        if options.generate_listener {
            files.push(render(format!("{module}/listener.rs"), grammar, generator.listener())?);
        }
        if options.generate_visitor {
            files.push(render(format!("{module}/visitor.rs"), grammar, generator.visitor())?);
        }
        Ok(files)
    }
}

fn render(path: String, grammar: &str, tokens: TokenStream) -> Result<GeneratedFile, CodegenError> {
    if let Err(err) = syn::parse2::<syn::File>(tokens.clone()) {
        return Err(CodegenError::InvalidOutput {
            file: path,
            message: err.to_string(),
        });
    }
    let mut contents = format!("// Generated by quarry from grammar `{grammar}`; do not edit.\n\n");
    contents.push_str(&layout(tokens));
    Ok(GeneratedFile { path, contents })
}

/// Identifier from grammar text, with anything non-alphanumeric replaced
fn ident(text: &str) -> Ident {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        format_ident!("{}", cleaned)
    } else {
        format_ident!("_{}", cleaned)
    }
}

fn rule_fn(name: &str) -> Ident {
    format_ident!("parse_{}", ident(name))
}

fn prec_fn(name: &str) -> Ident {
    format_ident!("parse_{}_prec", ident(name))
}

struct Generator<'a> {
    ir: &'a ParserIr,
}

impl Generator<'_> {
    fn module(&self, options: &CodegenOptions) -> TokenStream {
        let doc = format!(" Parser for the `{}` grammar.", self.ir.driver.grammar);
        let listener = options.generate_listener.then(|| quote!(pub mod listener;));
        let visitor = options.generate_visitor.then(|| quote!(pub mod visitor;));
        quote! {
            #![doc = #doc]

            pub mod lexer;
            pub mod parser;
            #listener
            #visitor

            #[derive(Debug)]
            pub enum Error {
                Pattern(regex::Error),
                Lex(lexer::LexError),
                Parse(parser::ParseError),
            }

            impl std::fmt::Display for Error {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    match self {
                        Self::Pattern(err) => write!(f, "invalid token pattern: {err}"),
                        Self::Lex(err) => write!(f, "{err}"),
                        Self::Parse(err) => write!(f, "{err}"),
                    }
                }
            }

            impl std::error::Error for Error {}

            /// Tokenize and parse `input` from the start rule
            pub fn parse(input: &str) -> Result<parser::Tree, Error> {
                let lexer = lexer::Lexer::new().map_err(Error::Pattern)?;
                let tokens = lexer.tokenize(input).map_err(Error::Lex)?;
                parser::parse(&tokens).map_err(Error::Parse)
            }
        }
    }

    fn lexer(&self) -> TokenStream {
        let consts = self.ir.tokens.iter().map(|t| {
            let name = ident(&t.name);
            let id = Literal::u32_unsuffixed(t.id);
            let doc = format!(" `{}`", t.display);
            quote! {
                #[doc = #doc]
                pub const #name: TokenKind = #id;
            }
        });
        let names = self.ir.tokens.iter().map(|t| t.display.as_str());
        let count = Literal::usize_unsuffixed(self.ir.tokens.len());
        let rules: Vec<TokenStream> = self
            .ir
            .lexed_tokens()
            .filter_map(|t| {
                let pattern = t.pattern.as_deref()?;
                let kind = ident(&self.ir.token(t.emit_as).name);
                let skip = t.skip;
                let channel = t.channel;
                Some(quote!((#kind, #pattern, #skip, #channel)))
            })
            .collect();
        let rule_count = Literal::usize_unsuffixed(rules.len());

        quote! {
            #![allow(dead_code)]

            pub type TokenKind = u32;

            #(#consts)*

            pub const TOKEN_NAMES: [&str; #count] = [#(#names),*];

            /// Token kind, pattern, skip flag and channel, in priority order
            const RULES: [(TokenKind, &str, bool, u16); #rule_count] = [#(#rules),*];

            #[derive(Debug, Clone, PartialEq, Eq)]
            pub struct Token {
                pub kind: TokenKind,
                pub text: String,
                pub start: usize,
                pub end: usize,
                pub channel: u16,
            }

            impl Token {
                pub fn name(&self) -> &'static str {
                    TOKEN_NAMES.get(self.kind as usize).copied().unwrap_or("<invalid>")
                }
            }

            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct LexError {
                pub offset: usize,
            }

            impl std::fmt::Display for LexError {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "no token matches the input at offset {}", self.offset)
                }
            }

            impl std::error::Error for LexError {}

            pub struct Lexer {
                rules: Vec<(TokenKind, regex::Regex, bool, u16)>,
            }

            impl Lexer {
                pub fn new() -> Result<Self, regex::Error> {
                    let mut rules = Vec::with_capacity(RULES.len());
                    for (kind, pattern, skip, channel) in RULES {
                        rules.push((kind, regex::Regex::new(&format!("^(?:{pattern})"))?, skip, channel));
                    }
                    Ok(Self { rules })
                }

                /// Longest match wins; ties go to the earlier rule
                pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexError> {
                    let mut tokens = Vec::new();
                    let mut pos = 0;
                    while pos < input.len() {
                        let rest = &input[pos..];
                        let mut best: Option<(usize, TokenKind, bool, u16)> = None;
                        for (kind, regex, skip, channel) in &self.rules {
                            if let Some(m) = regex.find(rest) {
                                if m.end() > best.map_or(0, |b| b.0) {
                                    best = Some((m.end(), *kind, *skip, *channel));
                                }
                            }
                        }
                        let Some((len, kind, skip, channel)) = best else {
                            return Err(LexError { offset: pos });
                        };
                        if !skip {
                            tokens.push(Token {
                                kind,
                                text: rest[..len].to_string(),
                                start: pos,
                                end: pos + len,
                                channel,
                            });
                        }
                        pos += len;
                    }
                    tokens.push(Token {
                        kind: EOF,
                        text: "<EOF>".to_string(),
                        start: input.len(),
                        end: input.len(),
                        channel: 0,
                    });
                    Ok(tokens)
                }
            }
        }
    }

    fn parser(&self) -> TokenStream {
        let start = rule_fn(&self.ir.driver.start_rule);
        let rules = self.ir.rules.iter().map(|r| self.rule(r));
        quote! {
            #![allow(non_snake_case, dead_code, unused_mut, unused_variables, clippy::all)]

            use super::lexer::{self, Token, TokenKind};

            #[derive(Debug, Clone, PartialEq, Eq)]
            pub enum Tree {
                Rule {
                    rule: &'static str,
                    alternative: usize,
                    children: Vec<Tree>,
                },
                Token(Token),
            }

            impl Tree {
                /// Source text under this node, without `EOF`
                pub fn text(&self) -> String {
                    let mut out = String::new();
                    self.collect_text(&mut out);
                    out
                }

                fn collect_text(&self, out: &mut String) {
                    match self {
                        Tree::Token(token) => {
                            if token.kind != lexer::EOF {
                                out.push_str(&token.text);
                            }
                        }
                        Tree::Rule { children, .. } => {
                            for child in children {
                                child.collect_text(out);
                            }
                        }
                    }
                }

                pub fn to_lisp(&self) -> String {
                    match self {
                        Tree::Token(token) => token.text.clone(),
                        Tree::Rule { rule, children, .. } => {
                            if children.is_empty() {
                                return (*rule).to_string();
                            }
                            let inner: Vec<String> = children.iter().map(Tree::to_lisp).collect();
                            format!("({} {})", rule, inner.join(" "))
                        }
                    }
                }
            }

            #[derive(Debug, Clone, PartialEq, Eq)]
            pub struct ParseError {
                pub offset: usize,
                pub found: TokenKind,
                pub expected: Vec<TokenKind>,
            }

            impl std::fmt::Display for ParseError {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    let name = |kind: TokenKind| lexer::TOKEN_NAMES.get(kind as usize).copied().unwrap_or("<invalid>");
                    let expected: Vec<&str> = self.expected.iter().map(|&k| name(k)).collect();
                    write!(
                        f,
                        "expected {} but found {} at offset {}",
                        expected.join(", "),
                        name(self.found),
                        self.offset
                    )
                }
            }

            impl std::error::Error for ParseError {}

            pub type Step<T> = Result<T, ParseError>;

            type Alt<'t> = fn(&mut Parser<'t>) -> Step<Vec<Tree>>;

            pub struct Parser<'t> {
                tokens: Vec<&'t Token>,
                pos: usize,
                farthest: Option<ParseError>,
            }

            impl<'t> Parser<'t> {
                /// Parser over the default-channel tokens of `tokens`
                pub fn new(tokens: &'t [Token]) -> Self {
                    Self {
                        tokens: tokens.iter().filter(|t| t.channel == 0).collect(),
                        pos: 0,
                        farthest: None,
                    }
                }

                /// Parse the start rule and require `EOF` after it
                pub fn parse(&mut self) -> Step<Tree> {
                    let tree = self.#start()?;
                    if self.la() != lexer::EOF {
                        return self.fail(&[lexer::EOF]);
                    }
                    Ok(tree)
                }

                fn la(&self) -> TokenKind {
                    self.tokens.get(self.pos).map_or(lexer::EOF, |t| t.kind)
                }

                fn offset(&self) -> usize {
                    self.tokens
                        .get(self.pos)
                        .or_else(|| self.tokens.last())
                        .map_or(0, |t| t.start)
                }

                /// Record a failure here; the error reported is always the farthest one
                fn fail<T>(&mut self, expected: &[TokenKind]) -> Step<T> {
                    let offset = self.offset();
                    let err = match self.farthest.take() {
                        Some(far) if far.offset > offset => far,
                        Some(mut far) if far.offset == offset => {
                            for &kind in expected {
                                if !far.expected.contains(&kind) {
                                    far.expected.push(kind);
                                }
                            }
                            far
                        }
                        _ => ParseError {
                            offset,
                            found: self.la(),
                            expected: expected.to_vec(),
                        },
                    };
                    self.farthest = Some(err.clone());
                    Err(err)
                }

                fn expect(&mut self, kind: TokenKind) -> Step<Tree> {
                    match self.tokens.get(self.pos).copied() {
                        Some(token) if token.kind == kind => {
                            self.pos += 1;
                            Ok(Tree::Token(token.clone()))
                        }
                        _ => self.fail(&[kind]),
                    }
                }

                /// Try every alternative predicted by the lookahead and keep
                /// the longest match, the earlier one on ties
                fn choose(&mut self, alternatives: &[(usize, &[TokenKind], Alt<'t>)]) -> Step<(usize, Vec<Tree>)> {
                    let la = self.la();
                    let mark = self.pos;
                    let mut best: Option<(usize, usize, Vec<Tree>)> = None;
                    let mut failure = None;
                    for &(index, predict, parse) in alternatives {
                        if !predict.contains(&la) {
                            continue;
                        }
                        match parse(self) {
                            Ok(children) => {
                                if best.as_ref().is_none_or(|(end, _, _)| self.pos > *end) {
                                    best = Some((self.pos, index, children));
                                }
                            }
                            Err(err) => failure = Some(err),
                        }
                        self.pos = mark;
                    }
                    if let Some((end, index, children)) = best {
                        self.pos = end;
                        return Ok((index, children));
                    }
                    match failure {
                        Some(err) => Err(self.farthest.clone().unwrap_or(err)),
                        None => {
                            let mut expected: Vec<TokenKind> =
                                alternatives.iter().flat_map(|(_, predict, _)| predict.iter().copied()).collect();
                            expected.sort_unstable();
                            expected.dedup();
                            self.fail(&expected)
                        }
                    }
                }

                /// Run `parse`, rewinding on failure
                fn attempt(&mut self, parse: impl FnOnce(&mut Self) -> Step<Vec<Tree>>) -> Option<Vec<Tree>> {
                    let mark = self.pos;
                    match parse(self) {
                        Ok(children) => Some(children),
                        Err(_) => {
                            self.pos = mark;
                            None
                        }
                    }
                }

                #(#rules)*
            }

            /// Parse `tokens` from the start rule
            pub fn parse(tokens: &[Token]) -> Step<Tree> {
                Parser::new(tokens).parse()
            }
        }
    }

    fn rule(&self, rule: &RuleIr) -> TokenStream {
        let name = rule.name.as_str();
        let parse = rule_fn(name);
        let mut docs: Vec<String> = rule.choices.iter().map(|c| format!(" `{name} : {}`", c.text)).collect();
        docs.extend(rule.operators.iter().map(|o| format!(" `{name} : {}`", o.text)));

        if rule.uses_precedence() {
            let climb = prec_fn(name);
            let table = self.choice_table(&rule.choices);
            let arms = rule.operators.iter().map(|op| {
                let tokens = op.tokens.iter().map(|&t| self.token(t));
                let precedence = op.precedence;
                let next = if op.right_assoc { op.precedence } else { op.precedence + 1 };
                let alternative = op.alternative;
                quote!(#(#tokens)|* if #precedence >= min => (#alternative, #next),)
            });
            return quote! {
                #(#[doc = #docs])*
                pub fn #parse(&mut self) -> Step<Tree> {
                    self.#climb(0)
                }

                fn #climb(&mut self, min: u32) -> Step<Tree> {
                    let p = self;
                    let (alternative, children) = p.choose(#table)?;
                    let mut lhs = Tree::Rule { rule: #name, alternative, children };
                    loop {
                        let la = p.la();
                        let (alternative, next) = match la {
                            #(#arms)*
                            _ => break,
                        };
                        let op = p.expect(la)?;
                        let rhs = p.#climb(next)?;
                        lhs = Tree::Rule { rule: #name, alternative, children: vec![lhs, op, rhs] };
                    }
                    Ok(lhs)
                }
            };
        }

        let body = match rule.choices.as_slice() {
            [only] => {
                let elements = self.elements(&only.elements);
                let index = only.index;
                quote!({
                    let mut children = Vec::new();
                    #elements
                    (#index, children)
                })
            }
            choices => {
                let table = self.choice_table(choices);
                quote!(p.choose(#table)?)
            }
        };
        quote! {
            #(#[doc = #docs])*
            pub fn #parse(&mut self) -> Step<Tree> {
                let p = self;
                let (alternative, children) = #body;
                Ok(Tree::Rule { rule: #name, alternative, children })
            }
        }
    }

    fn token(&self, id: u32) -> TokenStream {
        let name = ident(&self.ir.token(id).name);
        quote!(lexer::#name)
    }

    fn token_list(&self, ids: &[u32]) -> TokenStream {
        let tokens = ids.iter().map(|&t| self.token(t));
        quote!(&[#(#tokens),*] as &[TokenKind])
    }

    fn elements(&self, elements: &[ElementIr]) -> TokenStream {
        let items = elements.iter().map(|e| self.element(e));
        quote!(#(#items)*)
    }

    /// `[(index, predict, parse)]` for [`Parser::choose`]
    fn choice_table(&self, choices: &[ChoiceIr]) -> TokenStream {
        let rows = choices.iter().map(|choice| {
            let index = choice.index;
            let predict = self.token_list(&choice.predict);
            let body = self.elements(&choice.elements);
            quote! {
                (#index, #predict, (|p: &mut Self| -> Step<Vec<Tree>> {
                    let mut children = Vec::new();
                    #body
                    Ok(children)
                }) as Alt<'t>)
            }
        });
        quote!(&[#(#rows),*])
    }

    fn element(&self, element: &ElementIr) -> TokenStream {
        match element {
            ElementIr::Token { token, .. } => {
                let token = self.token(*token);
                quote!(children.push(p.expect(#token)?);)
            }
            ElementIr::Rule { rule, precedence, .. } => {
                let name = &self.ir.rule(*rule).name;
                match precedence {
                    Some(min) => {
                        let climb = prec_fn(name);
                        quote!(children.push(p.#climb(#min)?);)
                    }
                    None => {
                        let parse = rule_fn(name);
                        quote!(children.push(p.#parse()?);)
                    }
                }
            }
            ElementIr::Block { choices } => match choices.as_slice() {
                [only] => {
                    let body = self.elements(&only.elements);
                    quote!({ #body })
                }
                _ => {
                    let table = self.choice_table(choices);
                    quote!({
                        let (_, mut inner) = p.choose(#table)?;
                        children.append(&mut inner);
                    })
                }
            },
            ElementIr::Repeat {
                body,
                repeat,
                enter,
                ..
            } => {
                let enter = self.token_list(enter);
                let once = self.element(body);
                let attempt = quote! {
                    |p: &mut Self| -> Step<Vec<Tree>> {
                        let mut children = Vec::new();
                        #once
                        Ok(children)
                    }
                };
                let many = quote! {
                    loop {
                        if !(#enter).contains(&p.la()) {
                            break;
                        }
                        let mark = p.pos;
                        match p.attempt(#attempt) {
                            Some(mut inner) if p.pos > mark => children.append(&mut inner),
                            _ => break,
                        }
                    }
                };
                match repeat {
                    RepeatKind::Optional => quote! {
                        if (#enter).contains(&p.la()) {
                            if let Some(mut inner) = p.attempt(#attempt) {
                                children.append(&mut inner);
                            }
                        }
                    },
                    RepeatKind::ZeroOrMore => many,
                    RepeatKind::OneOrMore => quote!(#once #many),
                }
            }
        }
    }

    fn listener(&self) -> TokenStream {
        let name = format_ident!("{}Listener", to_pascal_case(&self.ir.driver.grammar));
        let rules: Vec<&str> = self.ir.rules.iter().map(|r| r.name.as_str()).collect();
        let enter: Vec<Ident> = rules.iter().map(|r| format_ident!("enter_{}", ident(r))).collect();
        let exit: Vec<Ident> = rules.iter().map(|r| format_ident!("exit_{}", ident(r))).collect();
        quote! {
            #![allow(non_snake_case, unused_variables)]

            use super::lexer::Token;
            use super::parser::Tree;

            /// Callbacks fired by [`walk`] in depth-first order
            pub trait #name {
                #(
                    fn #enter(&mut self, node: &Tree) {}
                    fn #exit(&mut self, node: &Tree) {}
                )*
                fn visit_token(&mut self, token: &Token) {}
            }

            pub fn walk<L: #name + ?Sized>(listener: &mut L, tree: &Tree) {
                match tree {
                    Tree::Token(token) => listener.visit_token(token),
                    Tree::Rule { rule, children, .. } => {
                        match *rule {
                            #(#rules => listener.#enter(tree),)*
                            _ => {}
                        }
                        for child in children {
                            walk(listener, child);
                        }
                        match *rule {
                            #(#rules => listener.#exit(tree),)*
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    fn visitor(&self) -> TokenStream {
        let name = format_ident!("{}Visitor", to_pascal_case(&self.ir.driver.grammar));
        let rules: Vec<&str> = self.ir.rules.iter().map(|r| r.name.as_str()).collect();
        let visit: Vec<Ident> = rules.iter().map(|r| format_ident!("visit_{}", ident(r))).collect();
        quote! {
            #![allow(non_snake_case, unused_variables)]

            use super::lexer::Token;
            use super::parser::Tree;

            /// Per-rule visit methods; each defaults to visiting the children
            pub trait #name {
                type Output: Default;

                #(
                    fn #visit(&mut self, node: &Tree) -> Self::Output {
                        self.visit_children(node)
                    }
                )*

                fn visit_token(&mut self, token: &Token) -> Self::Output {
                    Self::Output::default()
                }

                /// Visits every child and returns the last result
                fn visit_children(&mut self, node: &Tree) -> Self::Output {
                    let mut result = Self::Output::default();
                    if let Tree::Rule { children, .. } = node {
                        for child in children {
                            result = self.visit(child);
                        }
                    }
                    result
                }

                fn visit(&mut self, node: &Tree) -> Self::Output {
                    match node {
                        Tree::Token(token) => self.visit_token(token),
                        Tree::Rule { rule, .. } => match *rule {
                            #(#rules => self.#visit(node),)*
                            _ => self.visit_children(node),
                        },
                    }
                }
            }
        }
    }
}

/// Print a token stream with line breaks and indentation
///
/// Breaks after `;`, `,` and attributes inside braces and indents brace
/// groups. Generic angle brackets are detected heuristically; the output
/// is always token-for-token the input.
fn layout(stream: TokenStream) -> String {
    let mut printer = Printer {
        glue: true,
        ..Printer::default()
    };
    printer.stream(stream, true);
    let mut out = printer.out;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

const KEYWORDS: [&str; 18] = [
    "as", "break", "const", "dyn", "else", "for", "if", "impl", "in", "let", "match", "move", "mut", "ref", "return",
    "static", "where", "while",
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Prev {
    #[default]
    Start,
    Ident(String),
    Lifetime,
    Punct(char, Spacing),
    GenericClose,
    Literal,
    Close,
}

#[derive(Debug, Default)]
struct Printer {
    out: String,
    indent: usize,
    /// No space before the next token
    glue: bool,
    /// The next token starts a new line
    hard_break: bool,
    /// The next token starts a new line unless it continues an expression
    soft_break: bool,
    /// Leave an empty line before the next item
    blank: bool,
    generics: usize,
    closure: bool,
    prev: Prev,
    after_fn: bool,
}

impl Printer {
    fn newline(&mut self) {
        while self.out.ends_with(' ') {
            self.out.pop();
        }
        if !self.out.is_empty() {
            self.out.push('\n');
            if self.blank {
                self.out.push('\n');
            }
        }
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.glue = true;
        self.hard_break = false;
        self.soft_break = false;
        self.blank = false;
    }

    fn write(&mut self, text: &str, space: bool) {
        if self.hard_break || self.soft_break {
            self.newline();
        } else if space && !self.glue {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.glue = false;
    }

    fn stream(&mut self, stream: TokenStream, block: bool) {
        for tree in stream {
            match tree {
                TokenTree::Ident(ident) => self.ident(ident.to_string()),
                TokenTree::Literal(literal) => {
                    self.write(&literal.to_string(), true);
                    self.prev = Prev::Literal;
                    self.after_fn = false;
                }
                TokenTree::Punct(punct) => self.punct(punct.as_char(), punct.spacing(), block),
                TokenTree::Group(group) => match group.delimiter() {
                    Delimiter::Brace => self.brace(group.stream(), block),
                    Delimiter::Parenthesis => self.delimited('(', ')', group.stream()),
                    Delimiter::Bracket => self.delimited('[', ']', group.stream()),
                    Delimiter::None => self.stream(group.stream(), block),
                },
            }
        }
    }

    fn ident(&mut self, text: String) {
        if text == "else" || text == "as" {
            self.soft_break = false;
        }
        self.write(&text, true);
        self.after_fn = matches!(&self.prev, Prev::Ident(p) if p == "fn");
        self.prev = if matches!(self.prev, Prev::Punct('\'', _)) {
            Prev::Lifetime
        } else {
            Prev::Ident(text)
        };
    }

    fn opens_generics(&self) -> bool {
        match &self.prev {
            Prev::Ident(name) => name.starts_with(|c: char| c.is_ascii_uppercase()) || name == "impl" || self.after_fn,
            Prev::Punct(':', _) => true,
            _ => false,
        }
    }

    fn punct(&mut self, c: char, spacing: Spacing, block: bool) {
        if c != '#' {
            self.soft_break = false;
        }
        let after_joint = matches!(self.prev, Prev::Punct(_, Spacing::Joint));
        let generic_open = c == '<' && !after_joint && self.opens_generics();
        let generic_close = c == '>' && self.generics > 0 && !after_joint;
        let closing_pipe = c == '|' && self.closure;
        let opening_pipe = c == '|'
            && !self.closure
            && matches!(self.prev, Prev::Start | Prev::Punct(',' | '=', _));
        let macro_bang = c == '!' && matches!(&self.prev, Prev::Ident(p) if !KEYWORDS.contains(&p.as_str()));
        let space = !(matches!(c, ',' | ';' | '.' | '?' | ':') || generic_open || generic_close || closing_pipe || macro_bang);
        let second_colon = c == ':' && matches!(self.prev, Prev::Punct(':', Spacing::Joint));

        self.write(c.encode_utf8(&mut [0; 4]), space);

        if generic_open {
            self.generics += 1;
        }
        if generic_close {
            self.generics -= 1;
        }
        if opening_pipe {
            self.closure = true;
        }
        if closing_pipe {
            self.closure = false;
        }
        self.glue = spacing == Spacing::Joint
            || matches!(c, '.' | '&' | '!' | '#' | '\'')
            || generic_open
            || second_colon
            || opening_pipe;
        self.prev = if generic_close {
            Prev::GenericClose
        } else {
            Prev::Punct(c, spacing)
        };
        self.after_fn = false;
        if block && matches!(c, ';' | ',') {
            self.hard_break = true;
        }
    }

    fn brace(&mut self, inner: TokenStream, block: bool) {
        self.write("{", true);
        if inner.is_empty() {
            self.out.push('}');
        } else {
            self.indent += 1;
            self.newline();
            self.prev = Prev::Start;
            let generics = std::mem::take(&mut self.generics);
            self.stream(inner, true);
            self.generics = generics;
            self.indent -= 1;
            self.hard_break = false;
            self.soft_break = false;
            self.newline();
            self.out.push('}');
        }
        self.glue = false;
        self.prev = Prev::Close;
        self.after_fn = false;
        if block {
            self.soft_break = true;
            self.blank = self.indent == 0;
        }
    }

    fn delimited(&mut self, open: char, close: char, inner: TokenStream) {
        let attribute = open == '[' && matches!(self.prev, Prev::Punct('#' | '!', _));
        let space = match &self.prev {
            Prev::Ident(name) => KEYWORDS.contains(&name.as_str()),
            Prev::GenericClose | Prev::Close => false,
            _ => true,
        };
        self.write(open.encode_utf8(&mut [0; 4]), space);
        self.glue = true;
        self.prev = Prev::Start;
        let generics = std::mem::take(&mut self.generics);
        let closure = std::mem::take(&mut self.closure);
        self.stream(inner, false);
        self.generics = generics;
        self.closure = closure;
        self.glue = true;
        self.write(close.encode_utf8(&mut [0; 4]), false);
        self.prev = Prev::Close;
        self.after_fn = false;
        if attribute {
            self.hard_break = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_left_recursion, compute_first_follow};
    use crate::automaton::build_automaton;
    use crate::grammar::parse_grammar;

    const CALC: &str = "grammar Calc;
        e : e ('*'|'/') e | e ('+'|'-') e | <assoc=right> e '^' e | '-' e | '(' e ')' | N ;
        N : [0-9]+ ;
        WS : ' '+ -> skip ;";

    fn generate(source: &str, options: &CodegenOptions) -> Result<Vec<GeneratedFile>, CodegenError> {
        let grammar = parse_grammar(source).unwrap();
        let atn = build_automaton(&grammar);
        let sets = compute_first_follow(&grammar);
        let recursion = analyze_left_recursion(&grammar, &sets);
        RustBackend.generate(&ParserIr::build(&grammar, &atn, &sets, &recursion), options)
    }

    #[test]
    fn test_calc_output_is_valid_rust() {
        let options = CodegenOptions {
            generate_visitor: true,
            ..CodegenOptions::default()
        };
        let files = generate(CALC, &options).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            ["calc/mod.rs", "calc/lexer.rs", "calc/parser.rs", "calc/listener.rs", "calc/visitor.rs"]
        );
        for file in &files {
            assert!(syn::parse_file(&file.contents).is_ok(), "{}:\n{}", file.path, file.contents);
        }

        let parser = &files[2].contents;
        assert!(parser.contains("fn parse_e_prec(&mut self, min: u32) -> Step<Tree>"));
        assert!(parser.contains("lexer::T__0 | lexer::T__1 if 6u32 >= min => (0usize, 7u32),"));
        assert!(parser.contains("lexer::T__4 if 4u32 >= min => (2usize, 4u32),"));
        assert!(parser.contains("children.push(p.parse_e_prec(3u32)?);"));
        assert!(files[1].contents.contains("pub const N: TokenKind = 8;"));
        assert!(files[3].contents.contains("pub trait CalcListener"));
    }

    #[test]
    fn test_routes_output_is_valid_rust() {
        let source = "grammar Routes;
            file : route* EOF ;
            route : 'route' METHOD PATH '->' handler ';' ;
            handler : ID ('.' ID)* ;
            METHOD : 'GET' | 'POST' ;
            PATH : '/' [a-z/]* ;
            ID : [A-Za-z_]+ ;
            WS : [ \\t\\r\\n]+ -> skip ;";
        let files = generate(source, &CodegenOptions::default()).unwrap();
        for file in &files {
            assert!(syn::parse_file(&file.contents).is_ok(), "{}:\n{}", file.path, file.contents);
        }
        assert!(files[2].contents.contains("pub fn parse_handler(&mut self) -> Step<Tree>"));
        assert!(files[2].contents.contains("the longest match, the earlier one on ties"));
    }

    #[test]
    fn test_indirect_recursion_is_rejected() {
        let err = generate("a : b 'x' | 'y' ; b : a 'z' ;", &CodegenOptions::default()).unwrap_err();
        assert_eq!(
            err,
            CodegenError::UnsupportedLeftRecursion {
                rule: "a".into(),
                kind: "indirect".into(),
            }
        );
    }

    #[test]
    fn test_layout() {
        let tokens = quote! {
            fn f<'a>(x: &'a [u8]) -> Option<Vec<u8>> {
                if x.len() >= 2 { Some(x.to_vec()) } else { None }
            }
        };
        assert_eq!(
            layout(tokens),
            "fn f<'a>(x: &'a [u8]) -> Option<Vec<u8>> {\n    if x.len() >= 2 {\n        Some(x.to_vec())\n    } else {\n        None\n    }\n}\n"
        );
    }
}
