//! Conservative LL(1) ambiguity detection.
//!
//! Two outcomes of a decision conflict when their predict sets share a
//! token. This over-approximates true ambiguity: a grammar that needs more
//! than one token of lookahead is reported even if it is unambiguous.
//!
//! Rules that precedence climbing rewrites are checked in their rewritten
//! form: primary alternatives against each other, and operator alternatives
//! against each other.

use super::first_follow::FirstFollow;
use super::left_recursion::{LeftRecursion, operator_tokens};
use super::token_set::TokenSet;
use crate::grammar::{DecisionId, DecisionKind, Element, Grammar, RuleId};
use compact_str::CompactString;
use tracing::debug;

/// One pair of conflicting outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub decision: DecisionId,
    pub rule: RuleId,
    pub kind: DecisionKind,
    /// Outcome indices, lower first. For repetitions 0 is enter, 1 is exit.
    pub alternatives: (usize, usize),
    pub labels: (Option<CompactString>, Option<CompactString>),
    pub tokens: TokenSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ambiguities {
    pub conflicts: Vec<Conflict>,
}

/// Report every LL(1) conflict in `grammar`
#[must_use]
pub fn detect_ambiguity(grammar: &Grammar, sets: &FirstFollow, recursion: &LeftRecursion) -> Ambiguities {
    Ambiguities::compute(grammar, sets, recursion)
}

impl Ambiguities {
    #[must_use]
    pub fn compute(grammar: &Grammar, sets: &FirstFollow, recursion: &LeftRecursion) -> Self {
        let mut conflicts = Vec::new();
        for decision in grammar.decisions() {
            let rule = grammar.rule(decision.rule);
            let info = recursion.rule(rule.id);
            let labels: Vec<Option<CompactString>> = match decision.kind {
                DecisionKind::Rule => rule.alternatives.iter().map(|a| a.label.clone()).collect(),
                DecisionKind::Block => block_labels(grammar, decision.id),
                DecisionKind::Optional | DecisionKind::Star | DecisionKind::Plus => vec![None, None],
            };
            let predict = &sets.decision(decision.id).predict;

            if decision.kind == DecisionKind::Rule && info.eliminable {
                let (operators, primaries): (Vec<usize>, Vec<usize>) =
                    (0..rule.alternatives.len()).partition(|i| info.alternatives.contains(i));
                let operator_sets: Vec<TokenSet> = operators
                    .iter()
                    .map(|&i| {
                        operator_tokens(&rule.alternatives[i].elements[1])
                            .unwrap_or_default()
                            .into_iter()
                            .collect()
                    })
                    .collect();
                pairs(&primaries, |a, b| (predict[a].clone(), predict[b].clone()), &mut |i, j, tokens| {
                    conflicts.push(conflict(decision.id, rule.id, decision.kind, i, j, &labels, tokens));
                });
                let positions: Vec<usize> = (0..operators.len()).collect();
                pairs(
                    &positions,
                    |a, b| (operator_sets[a].clone(), operator_sets[b].clone()),
                    &mut |i, j, tokens| {
                        let (i, j) = (operators[i], operators[j]);
                        conflicts.push(conflict(decision.id, rule.id, decision.kind, i, j, &labels, tokens));
                    },
                );
                continue;
            }

            let all: Vec<usize> = (0..predict.len()).collect();
            pairs(&all, |a, b| (predict[a].clone(), predict[b].clone()), &mut |i, j, tokens| {
                conflicts.push(conflict(decision.id, rule.id, decision.kind, i, j, &labels, tokens));
            });
        }
        debug!(conflicts = conflicts.len(), "checked LL(1) decisions");
        Self { conflicts }
    }

    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Shared tokens of outcomes `i` and `j` of `decision`, in either order
    #[must_use]
    pub fn conflicts_between(&self, decision: DecisionId, i: usize, j: usize) -> Option<&TokenSet> {
        let key = (i.min(j), i.max(j));
        self.conflicts
            .iter()
            .find(|c| c.decision == decision && c.alternatives == key)
            .map(|c| &c.tokens)
    }

    pub fn for_rule(&self, rule: RuleId) -> impl Iterator<Item = &Conflict> + '_ {
        self.conflicts.iter().filter(move |c| c.rule == rule)
    }
}

fn conflict(
    decision: DecisionId,
    rule: RuleId,
    kind: DecisionKind,
    i: usize,
    j: usize,
    labels: &[Option<CompactString>],
    tokens: TokenSet,
) -> Conflict {
    let label = |n: usize| labels.get(n).cloned().flatten();
    Conflict {
        decision,
        rule,
        kind,
        alternatives: (i, j),
        labels: (label(i), label(j)),
        tokens,
    }
}

/// Call `found` for every unordered pair of `items` whose sets overlap
fn pairs(
    items: &[usize],
    sets: impl Fn(usize, usize) -> (TokenSet, TokenSet),
    found: &mut impl FnMut(usize, usize, TokenSet),
) {
    for (n, &a) in items.iter().enumerate() {
        for &b in &items[n + 1..] {
            let (left, right) = sets(a, b);
            let shared = left.intersection(&right);
            if !shared.is_empty() {
                found(a, b, shared);
            }
        }
    }
}

fn block_labels(grammar: &Grammar, decision: DecisionId) -> Vec<Option<CompactString>> {
    fn find<'a>(elements: &'a [Element], decision: DecisionId) -> Option<&'a crate::grammar::Block> {
        elements.iter().find_map(|element| match element {
            Element::Block(block) if block.decision == Some(decision) => Some(block),
            Element::Block(block) => block
                .alternatives
                .iter()
                .find_map(|alt| find(&alt.elements, decision)),
            Element::Repeat { body, .. } => find(std::slice::from_ref(&**body), decision),
            Element::Token { .. } | Element::Rule { .. } => None,
        })
    }
    let rule = grammar.rule(grammar.decision(decision).rule);
    rule.alternatives
        .iter()
        .find_map(|alt| find(&alt.elements, decision))
        .map(|block| block.alternatives.iter().map(|a| a.label.clone()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_left_recursion, compute_first_follow};
    use crate::grammar::parse_grammar;

    fn check(source: &str) -> (Grammar, Ambiguities) {
        let grammar = parse_grammar(source).unwrap();
        let sets = compute_first_follow(&grammar);
        let lr = analyze_left_recursion(&grammar, &sets);
        let report = detect_ambiguity(&grammar, &sets, &lr);
        (grammar, report)
    }

    #[test]
    fn test_shared_prefix_is_reported_symmetrically() {
        let (grammar, report) = check("s : A B # ab | A C # ac ; A : 'a' ; B : 'b' ; C : 'c' ;");
        assert!(report.is_ambiguous());
        let d = grammar.rule(RuleId(0)).decision.unwrap();
        assert_eq!(report.conflicts_between(d, 0, 1), report.conflicts_between(d, 1, 0));
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.tokens.names(&grammar), ["A"]);
        assert_eq!(conflict.labels.0.as_deref(), Some("ab"));
        assert_eq!(conflict.labels.1.as_deref(), Some("ac"));
    }

    #[test]
    fn test_disjoint_grammar_is_clean() {
        let (_, report) = check("s : A (B | C)* D ; A : 'a' ; B : 'b' ; C : 'c' ; D : 'd' ;");
        assert!(!report.is_ambiguous());
    }

    #[test]
    fn test_loop_exit_conflict() {
        let (grammar, report) = check("s : A* A ; A : 'a' ;");
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.kind, DecisionKind::Star);
        assert_eq!(conflict.alternatives, (0, 1));
        assert_eq!(conflict.tokens.names(&grammar), ["A"]);
    }

    #[test]
    fn test_precedence_rule_checked_in_rewritten_form() {
        let (_, report) = check(
            "e : e ('*' | '/') e | e ('+' | '-') e | '-' e | '(' e ')' | N ; N : [0-9]+ ;",
        );
        assert!(!report.is_ambiguous());

        let (_, report) = check("e : e '-' e | e '-' e | N ; N : [0-9]+ ;");
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].alternatives, (0, 1));
    }
}
