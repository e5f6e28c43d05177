//! Thompson NFA over every token of a grammar, simulated directly.

use crate::grammar::{Grammar, LexPattern, RepeatOp, TokenId, TokenSource};
use smallvec::SmallVec;
use std::ops::RangeInclusive;

type CharRange = RangeInclusive<char>;

const NO_OWNER: u32 = u32::MAX;

/// Accepting state information for maximal munch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Accept {
    token: TokenId,
    /// Lower wins on equal length
    priority: u32,
}

#[derive(Debug, Clone, Default)]
struct NfaState {
    transitions: SmallVec<[(CharRange, u32); 2]>,
    epsilon: SmallVec<[u32; 2]>,
    accepting: Option<Accept>,
    /// Token id of the rule this state was compiled from
    owner: u32,
}

/// One start state with an epsilon edge into every token's sub-automaton
#[derive(Debug, Clone)]
pub(crate) struct Nfa {
    states: Vec<NfaState>,
    start: u32,
    /// Indexed by token id: the rule stops at its first accepting position
    lazy: Vec<bool>,
}

impl Nfa {
    pub(crate) fn build(grammar: &Grammar) -> Self {
        let mut nfa = Self {
            states: vec![NfaState {
                owner: NO_OWNER,
                ..NfaState::default()
            }],
            start: 0,
            lazy: vec![false; grammar.tokens().len()],
        };
        for token in grammar.tokens() {
            let owner = token.id.0;
            match token.source {
                TokenSource::Implicit => {
                    if let Some(literal) = &token.literal {
                        let pattern = LexPattern::Literal(literal.clone());
                        nfa.add_token(grammar, std::slice::from_ref(&pattern), token.id);
                    }
                }
                TokenSource::Lexer(index) => {
                    let rule = &grammar.lexer_rules()[index];
                    nfa.lazy[owner as usize] = rule.alternatives.iter().any(|p| is_lazy(grammar, p));
                    nfa.add_token(grammar, &rule.alternatives, token.id);
                }
                TokenSource::Eof | TokenSource::Virtual => {}
            }
        }
        nfa
    }

    pub(crate) fn state_count(&self) -> usize {
        self.states.len()
    }

    fn add_state(&mut self, owner: u32) -> u32 {
        let id = u32::try_from(self.states.len()).unwrap_or(u32::MAX);
        self.states.push(NfaState {
            owner,
            ..NfaState::default()
        });
        id
    }

    fn epsilon(&mut self, from: u32, to: u32) {
        self.states[from as usize].epsilon.push(to);
    }

    fn add_token(&mut self, grammar: &Grammar, alternatives: &[LexPattern], token: TokenId) {
        let owner = token.0;
        let start = self.add_state(owner);
        let end = self.add_state(owner);
        self.epsilon(self.start, start);
        self.alternatives(grammar, alternatives, start, end, owner);
        self.states[end as usize].accepting = Some(Accept {
            token,
            priority: token.0,
        });
    }

    fn alternatives(&mut self, grammar: &Grammar, alternatives: &[LexPattern], start: u32, end: u32, owner: u32) {
        for pattern in alternatives {
            let branch_start = self.add_state(owner);
            let branch_end = self.add_state(owner);
            self.epsilon(start, branch_start);
            self.pattern(grammar, pattern, branch_start, branch_end, owner);
            self.epsilon(branch_end, end);
        }
    }

    /// Build the sub-automaton for `pattern` between `start` and `end`
    fn pattern(&mut self, grammar: &Grammar, pattern: &LexPattern, start: u32, end: u32, owner: u32) {
        match pattern {
            LexPattern::Literal(text) => {
                let mut current = start;
                let count = text.chars().count();
                for (i, c) in text.chars().enumerate() {
                    let next = if i + 1 == count { end } else { self.add_state(owner) };
                    self.states[current as usize].transitions.push((c..=c, next));
                    current = next;
                }
                if count == 0 {
                    self.epsilon(start, end);
                }
            }
            LexPattern::Set(set) => {
                for range in set.ranges() {
                    self.states[start as usize].transitions.push((range, end));
                }
            }
            LexPattern::Ref(index) => {
                // Fragments and referenced rules are inlined; the builder rejects cycles
                let rule = &grammar.lexer_rules()[*index];
                self.alternatives(grammar, &rule.alternatives, start, end, owner);
            }
            LexPattern::Seq(items) => {
                let mut current = start;
                for (i, item) in items.iter().enumerate() {
                    let next = if i + 1 == items.len() { end } else { self.add_state(owner) };
                    self.pattern(grammar, item, current, next, owner);
                    current = next;
                }
                if items.is_empty() {
                    self.epsilon(start, end);
                }
            }
            LexPattern::Alt(items) => self.alternatives(grammar, items, start, end, owner),
            LexPattern::Repeat { pattern, op, .. } => {
                let inner_start = self.add_state(owner);
                let inner_end = self.add_state(owner);
                self.pattern(grammar, pattern, inner_start, inner_end, owner);
                self.epsilon(start, inner_start);
                if op.min() == 0 {
                    self.epsilon(start, end);
                }
                if *op != RepeatOp::Optional {
                    self.epsilon(inner_end, inner_start);
                }
                self.epsilon(inner_end, end);
            }
        }
    }
}

fn is_lazy(grammar: &Grammar, pattern: &LexPattern) -> bool {
    match pattern {
        LexPattern::Ref(index) => grammar.lexer_rules()[*index]
            .alternatives
            .iter()
            .any(|p| is_lazy(grammar, p)),
        LexPattern::Seq(items) | LexPattern::Alt(items) => items.iter().any(|p| is_lazy(grammar, p)),
        LexPattern::Repeat { pattern, greedy, .. } => !greedy || is_lazy(grammar, pattern),
        LexPattern::Literal(_) | LexPattern::Set(_) => false,
    }
}

/// Reusable simulation buffers for one input
pub(crate) struct Matcher<'n> {
    nfa: &'n Nfa,
    current: Vec<u32>,
    next: Vec<u32>,
    stamps: Vec<u32>,
    generation: u32,
}

impl<'n> Matcher<'n> {
    pub(crate) fn new(nfa: &'n Nfa) -> Self {
        Self {
            nfa,
            current: Vec::new(),
            next: Vec::new(),
            stamps: vec![0; nfa.states.len()],
            generation: 0,
        }
    }

    /// Replace `current` with the epsilon closure of `next`
    fn close(&mut self) {
        let nfa = self.nfa;
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.stamps.fill(0);
            self.generation = 1;
        }
        let generation = self.generation;
        self.current.clear();
        while let Some(state) = self.next.pop() {
            let slot = &mut self.stamps[state as usize];
            if *slot == generation {
                continue;
            }
            *slot = generation;
            self.current.push(state);
            for &target in &nfa.states[state as usize].epsilon {
                if self.stamps[target as usize] != generation {
                    self.next.push(target);
                }
            }
        }
    }

    /// Longest non-empty match starting at `pos`: end offset and token kind
    pub(crate) fn longest_match(&mut self, input: &str, pos: usize) -> Option<(usize, TokenId)> {
        let nfa = self.nfa;
        self.next.clear();
        self.next.push(nfa.start);
        self.close();

        let mut best = None;
        for (offset, c) in input[pos..].char_indices() {
            self.next.clear();
            for &state in &self.current {
                for (range, target) in &nfa.states[state as usize].transitions {
                    if range.contains(&c) {
                        self.next.push(*target);
                    }
                }
            }
            self.close();
            if self.current.is_empty() {
                break;
            }

            let mut here: Option<Accept> = None;
            let mut finished: SmallVec<[u32; 4]> = SmallVec::new();
            for &state in &self.current {
                let state = &nfa.states[state as usize];
                if let Some(accept) = state.accepting {
                    if here.is_none_or(|h| accept.priority < h.priority) {
                        here = Some(accept);
                    }
                    if nfa.lazy[state.owner as usize] {
                        finished.push(state.owner);
                    }
                }
            }
            if let Some(accept) = here {
                best = Some((pos + offset + c.len_utf8(), accept.token));
            }
            if !finished.is_empty() {
                self.current
                    .retain(|&s| !finished.contains(&nfa.states[s as usize].owner));
            }
        }
        best
    }
}
