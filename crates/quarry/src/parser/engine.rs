//! Recursive descent with one token of lookahead.
//!
//! Decisions are resolved with the predict sets from
//! [`FirstFollow`]. When the current token predicts exactly one
//! alternative that alternative is committed. When it predicts several
//! (an LL(1) conflict) every viable alternative is tried and the one that
//! consumes the most tokens wins, the earlier one on ties. Attempts are
//! rolled back by truncating the tree arena and the winner is parsed again.
//! Rule matches made while exploring are memoized by start position, so the
//! second pass does not repeat nested exploration.
//!
//! Rules of the shape `e : e op e | ... | primary` are parsed by precedence
//! climbing instead of recursion on the left operand.

use super::RecognizerConfig;
use super::profile::{Probe, Profile, Profiler, Resolution};
use super::tree::{NodeId, ParseTree};
use crate::analysis::left_recursion::operator_tokens;
use crate::analysis::{FirstFollow, LeftRecursion, RecursionKind, TokenSet};
use crate::error::{ParseError, RecognizeError};
use crate::grammar::{Assoc, DecisionId, Element, Grammar, RepeatOp, RuleId, TokenId};
use crate::lexer::Token;
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, trace};

type Children = SmallVec<[NodeId; 4]>;

/// Operator table of a rule parsed by precedence climbing
///
/// Alternative `i` of a rule with `n` alternatives has precedence `n - i`,
/// so earlier alternatives bind tighter.
#[derive(Debug, Clone)]
struct Precedence {
    /// Left-recursive alternatives and the tokens their operator matches
    operators: Vec<(usize, TokenSet)>,
    primaries: Vec<usize>,
}

/// A grammar prepared for recognizing token streams
///
/// ```rust
/// use quarry::analysis::{analyze_left_recursion, compute_first_follow};
/// use quarry::grammar::parse_grammar;
/// use quarry::lexer::tokenize;
/// use quarry::parser::Recognizer;
///
/// let grammar = parse_grammar("e : e '*' e | e '+' e | N ; N : [0-9]+ ; WS : ' '+ -> skip ;").unwrap();
/// let sets = compute_first_follow(&grammar);
/// let recursion = analyze_left_recursion(&grammar, &sets);
/// let recognizer = Recognizer::new(&grammar, &sets, &recursion);
///
/// let tokens = tokenize(&grammar, "1 + 2 * 3").unwrap();
/// let tree = recognizer.parse(&tokens).unwrap();
/// assert_eq!(tree.to_lisp(&grammar), "(e (e 1) + (e (e 2) * (e 3)))");
/// ```
#[derive(Debug, Clone)]
pub struct Recognizer<'a> {
    grammar: &'a Grammar,
    sets: &'a FirstFollow,
    recursion: &'a LeftRecursion,
    config: RecognizerConfig,
    precedence: Vec<Option<Precedence>>,
}

impl<'a> Recognizer<'a> {
    #[must_use]
    pub fn new(grammar: &'a Grammar, sets: &'a FirstFollow, recursion: &'a LeftRecursion) -> Self {
        let precedence = grammar
            .parser_rules()
            .iter()
            .map(|rule| {
                let info = recursion.rule(rule.id);
                if info.kind != RecursionKind::Direct || !info.eliminable {
                    return None;
                }
                let operators = info
                    .alternatives
                    .iter()
                    .map(|&i| {
                        let tokens = operator_tokens(&rule.alternatives[i].elements[1])
                            .unwrap_or_default()
                            .into_iter()
                            .collect();
                        (i, tokens)
                    })
                    .collect();
                let primaries = (0..rule.alternatives.len())
                    .filter(|i| !info.alternatives.contains(i))
                    .collect();
                Some(Precedence {
                    operators,
                    primaries,
                })
            })
            .collect();
        Self {
            grammar,
            sets,
            recursion,
            config: RecognizerConfig::default(),
            precedence,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RecognizerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    #[must_use]
    pub const fn grammar(&self) -> &'a Grammar {
        self.grammar
    }

    /// Whether `rule` is parsed by precedence climbing
    #[must_use]
    pub fn uses_precedence(&self, rule: RuleId) -> bool {
        self.precedence[rule.index()].is_some()
    }

    /// Parse `tokens` from the grammar's start rule
    ///
    /// # Errors
    ///
    /// See [`Recognizer::parse_rule`].
    pub fn parse(&self, tokens: &[Token]) -> Result<ParseTree, RecognizeError> {
        self.parse_rule(tokens, self.grammar.start_rule())
    }

    /// Parse `tokens` starting at `rule`
    ///
    /// Tokens on hidden channels are ignored. A missing trailing `EOF` is
    /// implied.
    ///
    /// # Errors
    ///
    /// - [`RecognizeError::UnsupportedLeftRecursion`] if a rule reachable
    ///   from `rule` is left-recursive in a shape precedence climbing cannot
    ///   handle; reported before any token is read
    /// - [`RecognizeError::Parse`] on a token mismatch, at the farthest
    ///   offset any alternative reached
    /// - [`RecognizeError::DepthLimit`] when rule nesting exceeds
    ///   [`RecognizerConfig::max_depth`]
    pub fn parse_rule(&self, tokens: &[Token], rule: RuleId) -> Result<ParseTree, RecognizeError> {
        self.run(tokens, rule, &mut ())
    }

    /// Parse `tokens` starting at the parser rule called `name`
    ///
    /// # Errors
    ///
    /// [`RecognizeError::UnknownStartRule`] if there is no such parser rule,
    /// otherwise as [`Recognizer::parse_rule`].
    pub fn parse_named(&self, tokens: &[Token], name: &str) -> Result<ParseTree, RecognizeError> {
        let rule = self
            .grammar
            .rule_by_name(name)
            .ok_or_else(|| RecognizeError::UnknownStartRule(name.to_string()))?;
        self.parse_rule(tokens, rule.id)
    }

    /// Parse like [`Recognizer::parse_rule`] while collecting a [`Profile`]
    ///
    /// The tree is identical to the unprofiled one.
    ///
    /// # Errors
    ///
    /// As [`Recognizer::parse_rule`].
    pub fn parse_profiled(&self, tokens: &[Token], rule: RuleId) -> Result<(ParseTree, Profile), RecognizeError> {
        let mut profiler = Profiler::new(self.grammar);
        let started = Instant::now();
        let tree = self.run(tokens, rule, &mut profiler)?;
        let visible = tokens.iter().filter(|t| !t.is_hidden()).count();
        let profile = profiler.finish(started.elapsed(), visible, tree.len());
        Ok((tree, profile))
    }

    /// Fail if left recursion the engine cannot run is reachable from `start`
    ///
    /// # Errors
    ///
    /// [`RecognizeError::UnsupportedLeftRecursion`] naming the first such rule.
    pub fn check_supported(&self, start: RuleId) -> Result<(), RecognizeError> {
        let reachable = reachable_rules(self.grammar, start);
        match self.recursion.unsupported().find(|r| reachable[r.rule.index()]) {
            Some(info) => Err(RecognizeError::UnsupportedLeftRecursion {
                rule: self.grammar.rule(info.rule).name.to_string(),
                kind: info.kind.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn run<P: Probe>(&self, tokens: &[Token], start: RuleId, probe: &mut P) -> Result<ParseTree, RecognizeError> {
        self.check_supported(start)?;
        let end = tokens.last().map_or(0, |t| t.span.end);
        let mut engine = Engine {
            rec: self,
            tokens: tokens.iter().filter(|t| !t.is_hidden()).collect(),
            eof: Token::eof(end),
            pos: 0,
            high_water: 0,
            depth: 0,
            tree: ParseTree::new(),
            farthest: 0,
            expected: TokenSet::new(),
            trial: 0,
            memo: HashMap::default(),
            probe,
        };
        let root = match engine.rule(start, 0) {
            Ok(root) => root,
            Err(failure) => return Err(engine.error(failure)),
        };
        if self.config.require_eof && engine.la() != TokenId::EOF {
            engine.expect(&TokenSet::with(TokenId::EOF));
            return Err(engine.error(Failure::Mismatch));
        }
        debug!(
            rule = %self.grammar.rule(start).name,
            nodes = engine.tree.len(),
            "recognized input"
        );
        Ok(engine.tree.finish(root))
    }
}

/// Rules reachable from `start` through any reference
fn reachable_rules(grammar: &Grammar, start: RuleId) -> Vec<bool> {
    fn collect(elements: &[Element], out: &mut Vec<RuleId>) {
        for element in elements {
            match element {
                Element::Token { .. } => {}
                Element::Rule { rule, .. } => out.push(*rule),
                Element::Block(block) => {
                    for alt in &block.alternatives {
                        collect(&alt.elements, out);
                    }
                }
                Element::Repeat { body, .. } => collect(std::slice::from_ref(&**body), out),
            }
        }
    }

    let mut reached = vec![false; grammar.parser_rules().len()];
    let mut stack = vec![start];
    reached[start.index()] = true;
    let mut callees = Vec::new();
    while let Some(rule) = stack.pop() {
        callees.clear();
        for alt in &grammar.rule(rule).alternatives {
            collect(&alt.elements, &mut callees);
        }
        for callee in &callees {
            if !reached[callee.index()] {
                reached[callee.index()] = true;
                stack.push(*callee);
            }
        }
    }
    reached
}

enum Failure {
    /// No alternative matched; details are in the engine's farthest failure
    Mismatch,
    Fatal(RecognizeError),
}

type Step<T = ()> = Result<T, Failure>;

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    pos: usize,
    nodes: usize,
    children: usize,
}

struct Engine<'r, P> {
    rec: &'r Recognizer<'r>,
    /// Default-channel tokens
    tokens: Vec<&'r Token>,
    eof: Token,
    pos: usize,
    /// Farthest position consumed since the innermost speculation began
    high_water: usize,
    depth: usize,
    tree: ParseTree,
    farthest: usize,
    /// Tokens that would have been accepted at `farthest`
    expected: TokenSet,
    /// Nesting of exploratory attempts; nodes built while positive are discarded
    trial: usize,
    /// Outcome of rules attempted while exploring: end position, or `None` on mismatch
    memo: HashMap<(RuleId, usize, usize), Option<usize>, ahash::RandomState>,
    probe: &'r mut P,
}

impl<P: Probe> Engine<'_, P> {
    fn current(&self) -> &Token {
        self.tokens.get(self.pos).copied().unwrap_or(&self.eof)
    }

    fn la(&self) -> TokenId {
        self.current().kind
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
            self.high_water = self.high_water.max(self.pos);
        }
    }

    /// Record that one of `set` would have been accepted here
    fn expect(&mut self, set: &TokenSet) {
        match self.pos.cmp(&self.farthest) {
            Ordering::Greater => {
                self.farthest = self.pos;
                self.expected = set.clone();
            }
            Ordering::Equal => {
                self.expected.union_with(set);
            }
            Ordering::Less => {}
        }
    }

    fn checkpoint(&self, children: &Children) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            nodes: self.tree.len(),
            children: children.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint, children: &mut Children) {
        self.pos = checkpoint.pos;
        self.tree.truncate(checkpoint.nodes);
        children.truncate(checkpoint.children);
    }

    fn error(&self, failure: Failure) -> RecognizeError {
        match failure {
            Failure::Fatal(err) => err,
            Failure::Mismatch => {
                let grammar = self.rec.grammar;
                let found = self.tokens.get(self.farthest).copied().unwrap_or(&self.eof);
                ParseError {
                    expected: self.expected.names(grammar),
                    found: grammar.token(found.kind).display().to_string(),
                    found_text: found.text.to_string(),
                    offset: found.span.start,
                    span: found.span,
                }
                .into()
            }
        }
    }

    fn rule(&mut self, rule: RuleId, min_prec: usize) -> Step<NodeId> {
        let rec = self.rec;
        let key = (rule, self.pos, min_prec);
        if self.trial > 0
            && let Some(&outcome) = self.memo.get(&key)
        {
            return match outcome {
                Some(end) => Ok(self.skip_to(rule, end)),
                None => Err(Failure::Mismatch),
            };
        }
        if self.depth >= rec.config.max_depth {
            return Err(Failure::Fatal(RecognizeError::DepthLimit {
                rule: rec.grammar.rule(rule).name.to_string(),
                limit: rec.config.max_depth,
                offset: self.current().span.start,
            }));
        }
        self.depth += 1;
        let since = self.probe.mark();
        let result = match &rec.precedence[rule.index()] {
            Some(table) => self.climb(rule, table, min_prec),
            None => self.plain_rule(rule),
        };
        self.probe.rule(rule, since);
        self.depth -= 1;
        if self.trial > 0 {
            match &result {
                Ok(_) => {
                    self.memo.insert(key, Some(self.pos));
                }
                Err(Failure::Mismatch) => {
                    self.memo.insert(key, None);
                }
                Err(Failure::Fatal(_)) => {}
            }
        }
        result
    }

    /// Stand-in node for a rule already matched up to `end` while exploring
    fn skip_to(&mut self, rule: RuleId, end: usize) -> NodeId {
        let offset = self.current().span.start;
        self.pos = end;
        self.high_water = self.high_water.max(end);
        self.tree.push_rule(rule, 0, None, Children::new(), offset)
    }

    fn plain_rule(&mut self, rule: RuleId) -> Step<NodeId> {
        let def = self.rec.grammar.rule(rule);
        let offset = self.current().span.start;
        let mut children = Children::new();
        let alternative = match def.decision {
            Some(decision) => {
                let candidates: SmallVec<[usize; 8]> = (0..def.alternatives.len()).collect();
                self.choose(decision, &candidates, &mut children, |engine, alt, children| {
                    engine.sequence(&def.alternatives[alt].elements, children)
                })?
            }
            None => {
                self.sequence(&def.alternatives[0].elements, &mut children)?;
                0
            }
        };
        let label = def.alternatives[alternative].label.clone();
        Ok(self.tree.push_rule(rule, alternative, label, children, offset))
    }

    /// Pick among `candidates` of `decision` and parse the chosen one
    fn choose<F>(&mut self, decision: DecisionId, candidates: &[usize], children: &mut Children, mut parse: F) -> Step<usize>
    where
        F: FnMut(&mut Self, usize, &mut Children) -> Step,
    {
        let rec = self.rec;
        let since = self.probe.mark();
        let predict = &rec.sets.decision(decision).predict;
        let la = self.la();
        let viable: SmallVec<[usize; 8]> = candidates
            .iter()
            .copied()
            .filter(|&i| predict[i].contains(la))
            .collect();

        if viable.is_empty() {
            let mut expected = TokenSet::new();
            for &i in candidates {
                expected.union_with(&predict[i]);
            }
            self.expect(&expected);
            self.probe.decision(decision, since, Resolution::SINGLE);
            return Err(Failure::Mismatch);
        }

        if viable.len() == 1 || !rec.config.speculation {
            self.probe.decision(decision, since, Resolution::SINGLE);
            parse(self, viable[0], children)?;
            return Ok(viable[0]);
        }

        trace!(decision = decision.0, viable = viable.len(), offset = self.current().span.start, "speculating");
        let start = self.pos;
        let offset = self.current().span.start;
        let outer_high = self.high_water;
        self.high_water = start;
        let checkpoint = self.checkpoint(children);
        let mut matched: SmallVec<[(usize, usize); 4]> = SmallVec::new();
        let mut fatal = None;
        self.trial += 1;
        for &alt in &viable {
            match parse(self, alt, children) {
                Ok(()) => matched.push((alt, self.pos - start)),
                Err(Failure::Mismatch) => {}
                Err(err) => fatal = Some(err),
            }
            self.restore(checkpoint, children);
            if fatal.is_some() {
                break;
            }
        }
        self.trial -= 1;
        let lookahead = self.high_water - start + 1;
        self.high_water = self.high_water.max(outer_high);
        self.probe.decision(
            decision,
            since,
            Resolution {
                speculated: true,
                lookahead,
            },
        );
        if let Some(err) = fatal {
            return Err(err);
        }

        // longest match; the earlier alternative on ties
        let Some((chosen, consumed)) = matched
            .iter()
            .copied()
            .reduce(|best, next| if next.1 > best.1 { next } else { best })
        else {
            return Err(Failure::Mismatch);
        };
        if self.trial > 0 {
            self.pos = start + consumed;
            return Ok(chosen);
        }
        let tied: SmallVec<[usize; 4]> = matched
            .iter()
            .filter(|m| m.1 == consumed)
            .map(|m| m.0)
            .collect();
        if tied.len() > 1 {
            self.probe.ambiguity(decision, offset, &tied, consumed);
        }
        parse(self, chosen, children)?;
        Ok(chosen)
    }

    fn sequence(&mut self, elements: &[Element], children: &mut Children) -> Step {
        for element in elements {
            self.element(element, children)?;
        }
        Ok(())
    }

    fn element(&mut self, element: &Element, children: &mut Children) -> Step {
        match element {
            Element::Token { token, label } => {
                if self.la() != *token {
                    self.expect(&TokenSet::with(*token));
                    return Err(Failure::Mismatch);
                }
                let matched = self.current().clone();
                self.advance();
                children.push(self.tree.push_token(matched, label.clone()));
                Ok(())
            }
            Element::Rule { rule, label } => {
                let node = self.rule(*rule, 0)?;
                self.tree.set_field(node, label.clone());
                children.push(node);
                Ok(())
            }
            Element::Block(block) => match block.decision {
                Some(decision) => {
                    let candidates: SmallVec<[usize; 8]> = (0..block.alternatives.len()).collect();
                    self.choose(decision, &candidates, children, |engine, alt, children| {
                        engine.sequence(&block.alternatives[alt].elements, children)
                    })
                    .map(|_| ())
                }
                None => match block.alternatives.first() {
                    Some(alt) => self.sequence(&alt.elements, children),
                    None => Ok(()),
                },
            },
            Element::Repeat {
                body,
                op,
                greedy,
                decision,
            } => {
                if *op == RepeatOp::OneOrMore {
                    self.element(body, children)?;
                }
                loop {
                    let start = self.pos;
                    if !self.iterate(*decision, *greedy, body, children)? {
                        return Ok(());
                    }
                    if *op == RepeatOp::Optional || self.pos == start {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Decide whether to run `body` once more; returns whether it ran
    fn iterate(&mut self, decision: DecisionId, greedy: bool, body: &Element, children: &mut Children) -> Step<bool> {
        let rec = self.rec;
        let since = self.probe.mark();
        let predict = &rec.sets.decision(decision).predict;
        let la = self.la();
        let enter = predict[0].contains(la);
        let exit = predict[1].contains(la);

        if !enter || (exit && !greedy) {
            self.expect(&predict[0]);
            self.probe.decision(decision, since, Resolution::SINGLE);
            return Ok(false);
        }
        if !exit || !rec.config.speculation {
            self.probe.decision(decision, since, Resolution::SINGLE);
            self.element(body, children)?;
            return Ok(true);
        }

        let start = self.pos;
        let outer_high = self.high_water;
        self.high_water = start;
        let checkpoint = self.checkpoint(children);
        self.trial += 1;
        let attempt = self.element(body, children);
        let end = self.pos;
        self.restore(checkpoint, children);
        self.trial -= 1;
        let lookahead = self.high_water - start + 1;
        self.high_water = self.high_water.max(outer_high);
        self.probe.decision(
            decision,
            since,
            Resolution {
                speculated: true,
                lookahead,
            },
        );
        match attempt {
            Ok(()) if self.trial > 0 => {
                self.pos = end;
                Ok(true)
            }
            Ok(()) => {
                self.element(body, children)?;
                Ok(true)
            }
            Err(Failure::Mismatch) => Ok(false),
            Err(fatal) => Err(fatal),
        }
    }

    fn climb(&mut self, rule: RuleId, table: &Precedence, min_prec: usize) -> Step<NodeId> {
        let def = self.rec.grammar.rule(rule);
        let levels = def.alternatives.len();
        let offset = self.current().span.start;
        let mut lhs = self.primary(rule, table)?;
        loop {
            let la = self.la();
            let mut continuation = TokenSet::new();
            let mut chosen = None;
            for (alt, tokens) in &table.operators {
                let prec = levels - alt;
                if prec < min_prec {
                    continue;
                }
                if chosen.is_none() && tokens.contains(la) {
                    chosen = Some((*alt, prec));
                }
                continuation.union_with(tokens);
            }
            let Some((alt, prec)) = chosen else {
                self.expect(&continuation);
                return Ok(lhs);
            };

            let alternative = &def.alternatives[alt];
            let op_label = match &alternative.elements[1] {
                Element::Token { label, .. } => label.clone(),
                _ => None,
            };
            let operator = self.current().clone();
            self.advance();

            let mut children = Children::new();
            self.tree.set_field(lhs, field(&alternative.elements[0]));
            children.push(lhs);
            children.push(self.tree.push_token(operator, op_label));
            let next = match alternative.assoc {
                Assoc::Left => prec + 1,
                Assoc::Right => prec,
            };
            let rhs = self.rule(rule, next)?;
            self.tree.set_field(rhs, field(&alternative.elements[2]));
            children.push(rhs);
            lhs = self
                .tree
                .push_rule(rule, alt, alternative.label.clone(), children, offset);
        }
    }

    fn primary(&mut self, rule: RuleId, table: &Precedence) -> Step<NodeId> {
        let def = self.rec.grammar.rule(rule);
        let levels = def.alternatives.len();
        let offset = self.current().span.start;
        let mut children = Children::new();
        let alternative = match def.decision {
            Some(decision) => self.choose(decision, &table.primaries, &mut children, |engine, alt, children| {
                engine.primary_alternative(rule, alt, levels - alt, children)
            })?,
            None => {
                let alt = table.primaries.first().copied().unwrap_or(0);
                self.primary_alternative(rule, alt, levels - alt, &mut children)?;
                alt
            }
        };
        let label = def.alternatives[alternative].label.clone();
        Ok(self.tree.push_rule(rule, alternative, label, children, offset))
    }

    /// A trailing self reference (`'-' e`) is parsed at the alternative's own precedence
    fn primary_alternative(&mut self, rule: RuleId, alt: usize, prec: usize, children: &mut Children) -> Step {
        let elements = &self.rec.grammar.rule(rule).alternatives[alt].elements;
        match elements.split_last() {
            Some((Element::Rule { rule: last, label }, init)) if *last == rule => {
                self.sequence(init, children)?;
                let node = self.rule(rule, prec)?;
                self.tree.set_field(node, label.clone());
                children.push(node);
                Ok(())
            }
            _ => self.sequence(elements, children),
        }
    }
}

fn field(element: &Element) -> Option<CompactString> {
    element.label().map(CompactString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_left_recursion, compute_first_follow};
    use crate::grammar::parse_grammar;
    use crate::lexer::tokenize;

    fn lisp(source: &str, input: &str) -> Result<String, RecognizeError> {
        let grammar = parse_grammar(source).unwrap();
        let sets = compute_first_follow(&grammar);
        let recursion = analyze_left_recursion(&grammar, &sets);
        let tokens = tokenize(&grammar, input).unwrap();
        Recognizer::new(&grammar, &sets, &recursion)
            .parse(&tokens)
            .map(|tree| tree.to_lisp(&grammar))
    }

    const CALC: &str = "
        e : e ('*' | '/') e
          | e ('+' | '-') e
          | <assoc=right> e '^' e
          | '-' e
          | '(' e ')'
          | N
          ;
        N : [0-9]+ ;
        WS : ' '+ -> skip ;
    ";

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(lisp(CALC, "1 - 2 - 3").unwrap(), "(e (e (e 1) - (e 2)) - (e 3))");
        assert_eq!(lisp(CALC, "2 ^ 3 ^ 4").unwrap(), "(e (e 2) ^ (e (e 3) ^ (e 4)))");
        assert_eq!(lisp(CALC, "1 + 2 * 3").unwrap(), "(e (e 1) + (e (e 2) * (e 3)))");
        assert_eq!(lisp(CALC, "(1 + 2) * 3").unwrap(), "(e (e ( (e (e 1) + (e 2)) )) * (e 3))");
    }

    #[test]
    fn test_prefix_operand_binds_at_its_own_level() {
        // `'-' e` sits below `^`, `*` and `+`, so its operand absorbs all of them
        assert_eq!(lisp(CALC, "- 1 * 2").unwrap(), "(e - (e (e 1) * (e 2)))");
    }

    #[test]
    fn test_speculation_resolves_shared_prefix() {
        let source = "s : ID '=' N ';' | ID ';' ; ID : [a-z]+ ; N : [0-9]+ ; WS : ' '+ -> skip ;";
        assert_eq!(lisp(source, "x = 1 ;").unwrap(), "(s x = 1 ;)");
        assert_eq!(lisp(source, "x ;").unwrap(), "(s x ;)");
    }

    #[test]
    fn test_loop_with_conflicting_exit_backtracks() {
        let source = "s : (A B)* A C ; A : 'a' ; B : 'b' ; C : 'c' ;";
        assert_eq!(lisp(source, "ababac").unwrap(), "(s a b a b a c)");
    }

    #[test]
    fn test_error_reports_farthest_offset() {
        let source = "s : ID '=' N ';' | ID ';' ; ID : [a-z]+ ; N : [0-9]+ ; WS : ' '+ -> skip ;";
        let err = lisp(source, "x = ;").unwrap_err();
        let err = err.as_parse_error().unwrap();
        assert_eq!(err.offset, 4);
        assert_eq!(err.expected, ["N"]);
        assert_eq!(err.found, "';'");
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        let err = lisp("s : A ; A : 'a' ;", "aa").unwrap_err();
        let err = err.as_parse_error().unwrap();
        assert_eq!(err.offset, 1);
        assert_eq!(err.expected, ["EOF"]);
    }

    #[test]
    fn test_unsupported_recursion_fails_before_parsing() {
        let err = lisp("a : b 'x' | 'y' ; b : a 'z' ; ", "y").unwrap_err();
        assert_eq!(
            err,
            RecognizeError::UnsupportedLeftRecursion {
                rule: "a".into(),
                kind: "indirect".into()
            }
        );
        // unreachable unsupported rules do not matter
        assert_eq!(lisp("s : 'y' ; a : a '!' | 'y' ;", "y").unwrap(), "(s y)");
    }

    #[test]
    fn test_depth_limit() {
        let grammar = parse_grammar("p : '(' p ')' | 'x' ;").unwrap();
        let sets = compute_first_follow(&grammar);
        let recursion = analyze_left_recursion(&grammar, &sets);
        let tokens = tokenize(&grammar, "((((x))))").unwrap();
        let recognizer =
            Recognizer::new(&grammar, &sets, &recursion).with_config(RecognizerConfig::default().with_max_depth(3));
        assert!(matches!(
            recognizer.parse(&tokens),
            Err(RecognizeError::DepthLimit { limit: 3, offset: 3, .. })
        ));
    }

    #[test]
    fn test_hidden_tokens_and_fields() {
        let source = "
            pair : key=ID ':' value=ID ;
            ID : [a-z]+ ;
            COMMENT : '#' ~[\\n]* -> channel(HIDDEN) ;
            WS : [ \\n]+ -> skip ;
        ";
        let grammar = parse_grammar(source).unwrap();
        let sets = compute_first_follow(&grammar);
        let recursion = analyze_left_recursion(&grammar, &sets);
        let tokens = tokenize(&grammar, "a # note\n : b").unwrap();
        let tree = Recognizer::new(&grammar, &sets, &recursion).parse(&tokens).unwrap();
        let root = tree.root();
        let value = tree.child_by_field(root, "value").unwrap();
        assert_eq!(tree.text(value), "b");
        assert_eq!(tree.to_lisp(&grammar), "(pair a : b)");
    }

    #[test]
    fn test_profiled_tree_matches() {
        let grammar = parse_grammar(CALC).unwrap();
        let sets = compute_first_follow(&grammar);
        let recursion = analyze_left_recursion(&grammar, &sets);
        let tokens = tokenize(&grammar, "1 + 2 * (3 - 4)").unwrap();
        let recognizer = Recognizer::new(&grammar, &sets, &recursion);
        let plain = recognizer.parse(&tokens).unwrap();
        let (profiled, profile) = recognizer.parse_profiled(&tokens, grammar.start_rule()).unwrap();
        assert_eq!(plain, profiled);
        assert!(profile.rules[0].invocations >= 5);
        assert_eq!(profile.speculations(), 0);
    }
}
