//! Left-recursion classification.
//!
//! A rule calls another rule *leftmost* when the call can happen before any
//! token is consumed, looking through nullable prefixes. A rule is `Direct`
//! when one of its own alternatives calls it leftmost, and `Indirect` when it
//! only reaches itself through other rules.

use super::call_graph::{adjacency, strongly_connected};
use super::first_follow::FirstFollow;
use crate::grammar::{Alternative, Element, Grammar, RepeatOp, RuleId, TokenId};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum RecursionKind {
    None,
    Direct,
    Indirect,
}

impl RecursionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Direct => "direct",
            Self::Indirect => "indirect",
        }
    }
}

impl fmt::Display for RecursionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecursion {
    pub rule: RuleId,
    pub kind: RecursionKind,
    /// Indices of alternatives that start the recursion
    pub alternatives: Vec<usize>,
    /// Whether precedence climbing can parse the rule
    pub eliminable: bool,
}

/// Left-recursion facts for every parser rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftRecursion {
    pub rules: Vec<RuleRecursion>,
    /// Cycles of the left-call graph, each sorted by rule id
    pub cycles: Vec<Vec<RuleId>>,
}

/// Classify every parser rule of `grammar`
#[must_use]
pub fn analyze_left_recursion(grammar: &Grammar, sets: &FirstFollow) -> LeftRecursion {
    LeftRecursion::compute(grammar, sets)
}

impl LeftRecursion {
    #[must_use]
    pub fn compute(grammar: &Grammar, sets: &FirstFollow) -> Self {
        let rules = grammar.parser_rules();
        // leftmost callees per rule, per alternative
        let left_calls: Vec<Vec<Vec<RuleId>>> = rules
            .iter()
            .map(|rule| {
                rule.alternatives
                    .iter()
                    .map(|alt| {
                        let mut out = Vec::new();
                        leftmost_sequence(sets, &alt.elements, &mut out);
                        out
                    })
                    .collect()
            })
            .collect();

        let graph = adjacency(
            rules.len(),
            left_calls.iter().enumerate().flat_map(|(caller, alts)| {
                alts.iter()
                    .flatten()
                    .map(move |callee| (caller, callee.index()))
            }),
        );
        let mut component_of = vec![0usize; rules.len()];
        let mut cycles = Vec::new();
        let components = strongly_connected(&graph);
        for (c, component) in components.iter().enumerate() {
            for &rule in component {
                component_of[rule] = c;
            }
            if component.len() > 1 || graph[component[0]].contains(&component[0]) {
                cycles.push(
                    component
                        .iter()
                        .map(|&r| RuleId(u32::try_from(r).unwrap_or(u32::MAX)))
                        .collect::<Vec<_>>(),
                );
            }
        }
        cycles.sort();

        let classified = rules
            .iter()
            .map(|rule| {
                let index = rule.id.index();
                let on_indirect_cycle = components[component_of[index]].len() > 1;
                let direct: Vec<usize> = left_calls[index]
                    .iter()
                    .enumerate()
                    .filter(|(_, callees)| callees.contains(&rule.id))
                    .map(|(i, _)| i)
                    .collect();
                if !direct.is_empty() {
                    let eliminable = !on_indirect_cycle
                        && direct.len() < rule.alternatives.len()
                        && direct
                            .iter()
                            .all(|&i| is_binary_operator(rule.id, &rule.alternatives[i]));
                    return RuleRecursion {
                        rule: rule.id,
                        kind: RecursionKind::Direct,
                        alternatives: direct,
                        eliminable,
                    };
                }
                if on_indirect_cycle {
                    let component = &components[component_of[index]];
                    let alternatives = left_calls[index]
                        .iter()
                        .enumerate()
                        .filter(|(_, callees)| callees.iter().any(|c| component.contains(&c.index())))
                        .map(|(i, _)| i)
                        .collect();
                    return RuleRecursion {
                        rule: rule.id,
                        kind: RecursionKind::Indirect,
                        alternatives,
                        eliminable: false,
                    };
                }
                RuleRecursion {
                    rule: rule.id,
                    kind: RecursionKind::None,
                    alternatives: Vec::new(),
                    eliminable: false,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            left_recursive = classified.iter().filter(|r| r.kind != RecursionKind::None).count(),
            cycles = cycles.len(),
            "classified left recursion"
        );
        Self {
            rules: classified,
            cycles,
        }
    }

    #[must_use]
    pub fn rule(&self, rule: RuleId) -> &RuleRecursion {
        &self.rules[rule.index()]
    }

    #[must_use]
    pub fn kind(&self, rule: RuleId) -> RecursionKind {
        self.rule(rule).kind
    }

    #[must_use]
    pub fn is_left_recursive(&self, rule: RuleId) -> bool {
        self.kind(rule) != RecursionKind::None
    }

    /// Left-recursive rules precedence climbing cannot handle
    pub fn unsupported(&self) -> impl Iterator<Item = &RuleRecursion> + '_ {
        self.rules
            .iter()
            .filter(|r| r.kind != RecursionKind::None && !r.eliminable)
    }
}

/// `rule op rule` where `op` is one token or a block of single tokens
pub(crate) fn is_binary_operator(rule: RuleId, alt: &Alternative) -> bool {
    match alt.elements.as_slice() {
        [Element::Rule { rule: lhs, .. }, op, Element::Rule { rule: rhs, .. }] => {
            *lhs == rule && *rhs == rule && operator_tokens(op).is_some()
        }
        _ => false,
    }
}

/// Tokens an operator element may match, if it is a single-token choice
pub(crate) fn operator_tokens(op: &Element) -> Option<Vec<TokenId>> {
    if let Some(token) = op.as_token() {
        return Some(vec![token]);
    }
    match op {
        Element::Block(block) => block
            .alternatives
            .iter()
            .map(|alt| match alt.elements.as_slice() {
                [only] => only.as_token(),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn leftmost_sequence(sets: &FirstFollow, elements: &[Element], out: &mut Vec<RuleId>) -> bool {
    for element in elements {
        if !leftmost_element(sets, element, out) {
            return false;
        }
    }
    true
}

/// Record leftmost calls of `element`; returns whether it can be skipped
fn leftmost_element(sets: &FirstFollow, element: &Element, out: &mut Vec<RuleId>) -> bool {
    match element {
        Element::Token { .. } => false,
        Element::Rule { rule, .. } => {
            if !out.contains(rule) {
                out.push(*rule);
            }
            sets.nullable(*rule)
        }
        Element::Block(block) => {
            let mut nullable = false;
            for alt in &block.alternatives {
                nullable |= leftmost_sequence(sets, &alt.elements, out);
            }
            nullable
        }
        Element::Repeat { body, op, .. } => {
            let body_nullable = leftmost_element(sets, body, out);
            *op != RepeatOp::OneOrMore || body_nullable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::compute_first_follow;
    use crate::grammar::parse_grammar;

    fn classify(source: &str) -> (Grammar, LeftRecursion) {
        let grammar = parse_grammar(source).unwrap();
        let sets = compute_first_follow(&grammar);
        let lr = analyze_left_recursion(&grammar, &sets);
        (grammar, lr)
    }

    #[test]
    fn test_direct_binary_is_eliminable() {
        let (grammar, lr) = classify("expr : expr '+' expr | NUMBER ; NUMBER : [0-9]+ ;");
        let expr = grammar.rule_by_name("expr").unwrap().id;
        let info = lr.rule(expr);
        assert_eq!(info.kind, RecursionKind::Direct);
        assert_eq!(info.alternatives, vec![0]);
        assert!(info.eliminable);
        assert_eq!(lr.cycles, vec![vec![expr]]);
    }

    #[test]
    fn test_operator_block_is_eliminable() {
        let (_, lr) = classify(
            "e : e ('*' | '/') e | e ('+' | '-') e | '(' e ')' | N ; N : [0-9]+ ;",
        );
        assert!(lr.rules[0].eliminable);
        assert_eq!(lr.rules[0].alternatives, vec![0, 1]);
    }

    #[test]
    fn test_postfix_is_not_eliminable() {
        let (_, lr) = classify("e : e '!' | N ; N : [0-9]+ ;");
        assert_eq!(lr.rules[0].kind, RecursionKind::Direct);
        assert!(!lr.rules[0].eliminable);
        assert_eq!(lr.unsupported().count(), 1);
    }

    #[test]
    fn test_indirect_and_none() {
        let (grammar, lr) = classify("a : b 'x' | 'y' ; b : a 'z' ; c : 'w' ;");
        assert_eq!(lr.kind(grammar.rule_by_name("a").unwrap().id), RecursionKind::Indirect);
        assert_eq!(lr.kind(grammar.rule_by_name("b").unwrap().id), RecursionKind::Indirect);
        assert_eq!(lr.kind(grammar.rule_by_name("c").unwrap().id), RecursionKind::None);
        assert_eq!(lr.rules[0].alternatives, vec![0]);
        assert_eq!(lr.cycles.len(), 1);
    }

    #[test]
    fn test_nullable_prefix_is_seen_through() {
        let (_, lr) = classify("a : opt a 'x' | 'y' ; opt : 'o'? ;");
        assert_eq!(lr.rules[0].kind, RecursionKind::Direct);
        assert!(!lr.rules[0].eliminable);
    }

    #[test]
    fn test_right_recursion_is_not_left() {
        let (_, lr) = classify("list : ID ',' list | ID ; ID : [a-z]+ ;");
        assert_eq!(lr.rules[0].kind, RecursionKind::None);
        assert!(lr.cycles.is_empty());
    }
}
