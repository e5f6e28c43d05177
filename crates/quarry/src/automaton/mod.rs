//! # Automaton
//!
//! Augmented transition network built from a [`Grammar`]'s parser rules.
//!
//! Each rule gets one start and one stop state. Alternatives are laid out
//! Thompson-style between them and joined with epsilon edges. A rule
//! reference becomes a [`Transition::Call`] that names the callee's start
//! state and the state to continue from once the callee reaches its stop
//! state. States where a [`Decision`](crate::grammar::Decision) is made are
//! tagged with its id.

mod render;

pub use render::{escape_dot, escape_mermaid, to_dot, to_mermaid};

use crate::grammar::{DecisionId, Element, Grammar, RepeatOp, RuleId, TokenId};
use smallvec::SmallVec;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u32);

impl StateId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    RuleStart,
    RuleStop,
    Basic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Consume one token of this kind
    Terminal { token: TokenId, target: StateId },
    /// Enter `rule` at `target`, resume at `follow` when it returns
    Call {
        rule: RuleId,
        target: StateId,
        follow: StateId,
    },
    Epsilon { target: StateId },
}

impl Transition {
    #[must_use]
    pub const fn target(&self) -> StateId {
        match self {
            Self::Terminal { target, .. } | Self::Call { target, .. } | Self::Epsilon { target } => *target,
        }
    }

    /// Text shown on rendered edges
    #[must_use]
    pub fn label(&self, grammar: &Grammar) -> String {
        match self {
            Self::Terminal { token, .. } => grammar.token(*token).display().to_string(),
            Self::Call { rule, .. } => grammar.rule(*rule).name.to_string(),
            Self::Epsilon { .. } => "ε".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AtnState {
    pub id: StateId,
    pub rule: RuleId,
    pub kind: StateKind,
    pub decision: Option<DecisionId>,
    pub transitions: SmallVec<[Transition; 2]>,
}

/// The network for all parser rules of one grammar
#[derive(Debug, Clone)]
pub struct Automaton {
    states: Vec<AtnState>,
    rule_start: Vec<StateId>,
    rule_stop: Vec<StateId>,
    decision_states: Vec<Option<StateId>>,
}

/// Build the network for every parser rule of `grammar`
#[must_use]
pub fn build_automaton(grammar: &Grammar) -> Automaton {
    Automaton::build(grammar)
}

impl Automaton {
    #[must_use]
    pub fn build(grammar: &Grammar) -> Self {
        let mut atn = Self {
            states: Vec::new(),
            rule_start: Vec::with_capacity(grammar.parser_rules().len()),
            rule_stop: Vec::with_capacity(grammar.parser_rules().len()),
            decision_states: vec![None; grammar.decisions().len()],
        };
        for rule in grammar.parser_rules() {
            let start = atn.add_state(rule.id, StateKind::RuleStart);
            let stop = atn.add_state(rule.id, StateKind::RuleStop);
            atn.rule_start.push(start);
            atn.rule_stop.push(stop);
        }
        for rule in grammar.parser_rules() {
            let start = atn.rule_start[rule.id.index()];
            let stop = atn.rule_stop[rule.id.index()];
            if let Some(decision) = rule.decision {
                atn.tag(start, decision);
            }
            for alt in &rule.alternatives {
                let entry = atn.add_state(rule.id, StateKind::Basic);
                atn.epsilon(start, entry);
                let last = atn.sequence(rule.id, &alt.elements, entry);
                atn.epsilon(last, stop);
            }
        }
        debug!(
            states = atn.states.len(),
            transitions = atn.transition_count(),
            "built automaton"
        );
        atn
    }

    fn add_state(&mut self, rule: RuleId, kind: StateKind) -> StateId {
        let id = StateId(u32::try_from(self.states.len()).unwrap_or(u32::MAX));
        self.states.push(AtnState {
            id,
            rule,
            kind,
            decision: None,
            transitions: SmallVec::new(),
        });
        id
    }

    fn tag(&mut self, state: StateId, decision: DecisionId) {
        self.states[state.index()].decision = Some(decision);
        self.decision_states[decision.index()] = Some(state);
    }

    fn push(&mut self, from: StateId, transition: Transition) {
        self.states[from.index()].transitions.push(transition);
    }

    fn epsilon(&mut self, from: StateId, to: StateId) {
        self.push(from, Transition::Epsilon { target: to });
    }

    fn sequence(&mut self, rule: RuleId, elements: &[Element], from: StateId) -> StateId {
        elements
            .iter()
            .fold(from, |current, element| self.element(rule, element, current))
    }

    /// Lay out `element` starting at `from`; returns the state after it
    fn element(&mut self, rule: RuleId, element: &Element, from: StateId) -> StateId {
        match element {
            Element::Token { token, .. } => {
                let to = self.add_state(rule, StateKind::Basic);
                self.push(from, Transition::Terminal {
                    token: *token,
                    target: to,
                });
                to
            }
            Element::Rule { rule: callee, .. } => {
                let to = self.add_state(rule, StateKind::Basic);
                let target = self.rule_start[callee.index()];
                self.push(from, Transition::Call {
                    rule: *callee,
                    target,
                    follow: to,
                });
                to
            }
            Element::Block(block) => {
                let split = match block.decision {
                    Some(decision) => {
                        let split = self.add_state(rule, StateKind::Basic);
                        self.tag(split, decision);
                        self.epsilon(from, split);
                        split
                    }
                    None => from,
                };
                let end = self.add_state(rule, StateKind::Basic);
                for alt in &block.alternatives {
                    let entry = self.add_state(rule, StateKind::Basic);
                    self.epsilon(split, entry);
                    let last = self.sequence(rule, &alt.elements, entry);
                    self.epsilon(last, end);
                }
                end
            }
            Element::Repeat {
                body,
                op,
                greedy,
                decision,
            } => match op {
                RepeatOp::Optional | RepeatOp::ZeroOrMore => {
                    let split = self.add_state(rule, StateKind::Basic);
                    self.tag(split, *decision);
                    self.epsilon(from, split);
                    let entry = self.add_state(rule, StateKind::Basic);
                    let exit = self.add_state(rule, StateKind::Basic);
                    self.branch(split, entry, exit, *greedy);
                    let body_end = self.element(rule, body, entry);
                    let back = if *op == RepeatOp::ZeroOrMore { split } else { exit };
                    self.epsilon(body_end, back);
                    exit
                }
                RepeatOp::OneOrMore => {
                    let entry = self.add_state(rule, StateKind::Basic);
                    self.epsilon(from, entry);
                    let body_end = self.element(rule, body, entry);
                    let split = self.add_state(rule, StateKind::Basic);
                    self.tag(split, *decision);
                    self.epsilon(body_end, split);
                    let exit = self.add_state(rule, StateKind::Basic);
                    self.branch(split, entry, exit, *greedy);
                    exit
                }
            },
        }
    }

    /// Enter-or-exit edges of a loop; greedy loops list the enter edge first
    fn branch(&mut self, split: StateId, enter: StateId, exit: StateId, greedy: bool) {
        if greedy {
            self.epsilon(split, enter);
            self.epsilon(split, exit);
        } else {
            self.epsilon(split, exit);
            self.epsilon(split, enter);
        }
    }

    #[must_use]
    pub fn states(&self) -> &[AtnState] {
        &self.states
    }

    #[must_use]
    pub fn state(&self, id: StateId) -> &AtnState {
        &self.states[id.index()]
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).sum()
    }

    #[must_use]
    pub fn rule_start(&self, rule: RuleId) -> StateId {
        self.rule_start[rule.index()]
    }

    #[must_use]
    pub fn rule_stop(&self, rule: RuleId) -> StateId {
        self.rule_stop[rule.index()]
    }

    /// State tagged with `decision`
    #[must_use]
    pub fn decision_state(&self, decision: DecisionId) -> Option<StateId> {
        self.decision_states.get(decision.index()).copied().flatten()
    }

    /// States belonging to `rule`, in creation order
    pub fn rule_states(&self, rule: RuleId) -> impl Iterator<Item = &AtnState> + '_ {
        self.states.iter().filter(move |s| s.rule == rule)
    }

    /// Every `(caller, callee)` pair, once per call transition
    pub fn calls(&self) -> impl Iterator<Item = (RuleId, RuleId)> + '_ {
        self.states.iter().flat_map(|state| {
            state.transitions.iter().filter_map(move |t| match t {
                Transition::Call { rule, .. } => Some((state.rule, *rule)),
                _ => None,
            })
        })
    }
}
