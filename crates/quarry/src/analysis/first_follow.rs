//! Nullable, FIRST and FOLLOW sets, and per-decision lookahead.
//!
//! All three are computed by fixed-point iteration over the parser rules.
//! FOLLOW is propagated right to left through each alternative: the set of
//! tokens that may appear after an element is carried as a trailer, so
//! nested blocks and loops see exactly the context they sit in. The same
//! walk records the predict set of every decision.

use super::token_set::TokenSet;
use crate::grammar::{DecisionId, Element, Grammar, RepeatOp, RuleId, TokenId};
use tracing::debug;

/// Lookahead of one decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionLookahead {
    pub decision: DecisionId,
    /// One set per outcome. Repetitions have two: enter, then exit.
    pub predict: Vec<TokenSet>,
    /// Tokens predicting more than one outcome
    pub conflict: TokenSet,
}

impl DecisionLookahead {
    fn new(decision: DecisionId, predict: Vec<TokenSet>) -> Self {
        let mut conflict = TokenSet::new();
        for (i, a) in predict.iter().enumerate() {
            for b in &predict[i + 1..] {
                conflict.union_with(&a.intersection(b));
            }
        }
        Self {
            decision,
            predict,
            conflict,
        }
    }

    /// Outcomes whose predict set contains `token`
    pub fn viable(&self, token: TokenId) -> impl Iterator<Item = usize> + '_ {
        self.predict
            .iter()
            .enumerate()
            .filter(move |(_, set)| set.contains(token))
            .map(|(i, _)| i)
    }

    #[must_use]
    pub fn has_conflict(&self) -> bool {
        !self.conflict.is_empty()
    }
}

/// Nullable flags, FIRST and FOLLOW sets for every parser rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstFollow {
    nullable: Vec<bool>,
    first: Vec<TokenSet>,
    follow: Vec<TokenSet>,
    lookahead: Vec<DecisionLookahead>,
    iterations: usize,
}

/// Compute FIRST/FOLLOW data for `grammar`
#[must_use]
pub fn compute_first_follow(grammar: &Grammar) -> FirstFollow {
    FirstFollow::compute(grammar)
}

impl FirstFollow {
    #[must_use]
    pub fn compute(grammar: &Grammar) -> Self {
        let rules = grammar.parser_rules();
        let mut iterations = 0;

        let mut nullable = vec![false; rules.len()];
        loop {
            iterations += 1;
            let mut changed = false;
            for rule in rules {
                if !nullable[rule.id.index()]
                    && rule
                        .alternatives
                        .iter()
                        .any(|alt| alt.elements.iter().all(|e| element_nullable(&nullable, e)))
                {
                    nullable[rule.id.index()] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut first = vec![TokenSet::new(); rules.len()];
        loop {
            iterations += 1;
            let mut changed = false;
            for rule in rules {
                let mut set = TokenSet::new();
                for alt in &rule.alternatives {
                    set.union_with(&sequence_first(&nullable, &first, &alt.elements).0);
                }
                changed |= first[rule.id.index()].union_with(&set);
            }
            if !changed {
                break;
            }
        }

        let mut follow = vec![TokenSet::new(); rules.len()];
        follow[grammar.start_rule().index()].insert(TokenId::EOF);
        let lookahead = loop {
            iterations += 1;
            let mut walk = Walk {
                nullable: &nullable,
                first: &first,
                follow_out: follow.clone(),
                lookahead: vec![None; grammar.decisions().len()],
            };
            for rule in rules {
                let context = &follow[rule.id.index()];
                let predict: Vec<TokenSet> = rule
                    .alternatives
                    .iter()
                    .map(|alt| walk.sequence(&alt.elements, context.clone()))
                    .collect();
                if let Some(decision) = rule.decision {
                    walk.record(decision, predict);
                }
            }
            let Walk {
                follow_out,
                lookahead,
                ..
            } = walk;
            if follow_out == follow {
                break lookahead;
            }
            follow = follow_out;
        };

        let lookahead = lookahead
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                entry.unwrap_or_else(|| {
                    DecisionLookahead::new(DecisionId(u32::try_from(i).unwrap_or(u32::MAX)), Vec::new())
                })
            })
            .collect();

        debug!(rules = rules.len(), iterations, "computed FIRST/FOLLOW");
        Self {
            nullable,
            first,
            follow,
            lookahead,
            iterations,
        }
    }

    #[must_use]
    pub fn nullable(&self, rule: RuleId) -> bool {
        self.nullable[rule.index()]
    }

    #[must_use]
    pub fn first(&self, rule: RuleId) -> &TokenSet {
        &self.first[rule.index()]
    }

    #[must_use]
    pub fn follow(&self, rule: RuleId) -> &TokenSet {
        &self.follow[rule.index()]
    }

    #[must_use]
    pub fn decision(&self, decision: DecisionId) -> &DecisionLookahead {
        &self.lookahead[decision.index()]
    }

    #[must_use]
    pub fn decisions(&self) -> &[DecisionLookahead] {
        &self.lookahead
    }

    /// Total fixed-point passes over the rules
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn element_nullable(&self, element: &Element) -> bool {
        element_nullable(&self.nullable, element)
    }

    #[must_use]
    pub fn element_first(&self, element: &Element) -> TokenSet {
        element_first(&self.nullable, &self.first, element)
    }

    /// FIRST of a sequence and whether the whole sequence is nullable
    #[must_use]
    pub fn sequence_first(&self, elements: &[Element]) -> (TokenSet, bool) {
        sequence_first(&self.nullable, &self.first, elements)
    }

    /// Whether any decision of `rule` has overlapping predict sets
    #[must_use]
    pub fn has_ll1_conflict(&self, grammar: &Grammar, rule: RuleId) -> bool {
        grammar
            .decisions()
            .iter()
            .filter(|d| d.rule == rule)
            .any(|d| self.decision(d.id).has_conflict())
    }
}

fn element_nullable(nullable: &[bool], element: &Element) -> bool {
    match element {
        Element::Token { .. } => false,
        Element::Rule { rule, .. } => nullable[rule.index()],
        Element::Block(block) => block
            .alternatives
            .iter()
            .any(|alt| alt.elements.iter().all(|e| element_nullable(nullable, e))),
        Element::Repeat { body, op, .. } => match op {
            RepeatOp::Optional | RepeatOp::ZeroOrMore => true,
            RepeatOp::OneOrMore => element_nullable(nullable, body),
        },
    }
}

fn element_first(nullable: &[bool], first: &[TokenSet], element: &Element) -> TokenSet {
    match element {
        Element::Token { token, .. } => TokenSet::with(*token),
        Element::Rule { rule, .. } => first[rule.index()].clone(),
        Element::Block(block) => {
            let mut set = TokenSet::new();
            for alt in &block.alternatives {
                set.union_with(&sequence_first(nullable, first, &alt.elements).0);
            }
            set
        }
        Element::Repeat { body, .. } => element_first(nullable, first, body),
    }
}

fn sequence_first(nullable: &[bool], first: &[TokenSet], elements: &[Element]) -> (TokenSet, bool) {
    let mut set = TokenSet::new();
    for element in elements {
        set.union_with(&element_first(nullable, first, element));
        if !element_nullable(nullable, element) {
            return (set, false);
        }
    }
    (set, true)
}

/// One right-to-left pass over every alternative
struct Walk<'a> {
    nullable: &'a [bool],
    first: &'a [TokenSet],
    follow_out: Vec<TokenSet>,
    lookahead: Vec<Option<DecisionLookahead>>,
}

impl Walk<'_> {
    fn record(&mut self, decision: DecisionId, predict: Vec<TokenSet>) {
        self.lookahead[decision.index()] = Some(DecisionLookahead::new(decision, predict));
    }

    /// Tokens that may start `elements` followed by `trailer`
    fn sequence(&mut self, elements: &[Element], trailer: TokenSet) -> TokenSet {
        elements
            .iter()
            .rev()
            .fold(trailer, |trailer, element| self.element(element, trailer))
    }

    fn element(&mut self, element: &Element, trailer: TokenSet) -> TokenSet {
        match element {
            Element::Token { token, .. } => TokenSet::with(*token),
            Element::Rule { rule, .. } => {
                self.follow_out[rule.index()].union_with(&trailer);
                if self.nullable[rule.index()] {
                    self.first[rule.index()].union(&trailer)
                } else {
                    self.first[rule.index()].clone()
                }
            }
            Element::Block(block) => {
                let predict: Vec<TokenSet> = block
                    .alternatives
                    .iter()
                    .map(|alt| self.sequence(&alt.elements, trailer.clone()))
                    .collect();
                let mut result = TokenSet::new();
                for set in &predict {
                    result.union_with(set);
                }
                if let Some(decision) = block.decision {
                    self.record(decision, predict);
                }
                result
            }
            Element::Repeat {
                body, op, decision, ..
            } => {
                let body_first = element_first(self.nullable, self.first, body);
                let inner = match op {
                    RepeatOp::Optional => trailer.clone(),
                    RepeatOp::ZeroOrMore | RepeatOp::OneOrMore => body_first.union(&trailer),
                };
                let enter = self.element(body, inner);
                let enter = if element_nullable(self.nullable, body) {
                    enter.union(&trailer)
                } else {
                    enter
                };
                self.record(*decision, vec![enter.clone(), trailer.clone()]);
                match op {
                    RepeatOp::Optional | RepeatOp::ZeroOrMore => enter.union(&trailer),
                    RepeatOp::OneOrMore => enter,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_grammar;

    fn names(grammar: &Grammar, set: &TokenSet) -> Vec<String> {
        set.names(grammar)
    }

    const EXPR: &str = "
        stat : ID '=' expr ';' | expr ';' ;
        expr : term (('+' | '-') term)* ;
        term : ID | NUM | '(' expr ')' ;
        opt : ID? ;
        ID : [a-z]+ ; NUM : [0-9]+ ;
    ";

    #[test]
    fn test_first_and_nullable() {
        let grammar = parse_grammar(EXPR).unwrap();
        let ff = compute_first_follow(&grammar);
        let expr = grammar.rule_by_name("expr").unwrap().id;
        assert_eq!(names(&grammar, ff.first(expr)), ["'('", "ID", "NUM"]);
        assert!(!ff.nullable(expr));
        assert!(ff.nullable(grammar.rule_by_name("opt").unwrap().id));
    }

    #[test]
    fn test_follow_sets() {
        let grammar = parse_grammar(EXPR).unwrap();
        let ff = compute_first_follow(&grammar);
        let stat = grammar.rule_by_name("stat").unwrap().id;
        let expr = grammar.rule_by_name("expr").unwrap().id;
        let term = grammar.rule_by_name("term").unwrap().id;
        assert_eq!(names(&grammar, ff.follow(stat)), ["EOF"]);
        assert_eq!(names(&grammar, ff.follow(expr)), ["')'", "';'"]);
        assert_eq!(names(&grammar, ff.follow(term)), ["')'", "'+'", "'-'", "';'"]);
    }

    #[test]
    fn test_decision_lookahead() {
        let grammar = parse_grammar(EXPR).unwrap();
        let ff = compute_first_follow(&grammar);
        let stat = grammar.rule_by_name("stat").unwrap();
        let d = ff.decision(stat.decision.unwrap());
        assert_eq!(names(&grammar, &d.conflict), ["ID"]);
        assert_eq!(d.viable(grammar.token_by_name("NUM").unwrap().id).collect::<Vec<_>>(), [1]);

        // the loop in `expr` exits on `)` or `;`
        let star = grammar
            .decisions()
            .iter()
            .find(|d| d.kind == crate::grammar::DecisionKind::Star)
            .unwrap();
        let loop_la = ff.decision(star.id);
        assert_eq!(names(&grammar, &loop_la.predict[0]), ["'+'", "'-'"]);
        assert_eq!(names(&grammar, &loop_la.predict[1]), ["')'", "';'"]);
        assert!(!loop_la.has_conflict());
        assert!(ff.has_ll1_conflict(&grammar, stat.id));
    }

    #[test]
    fn test_idempotent() {
        let grammar = parse_grammar(EXPR).unwrap();
        assert_eq!(compute_first_follow(&grammar), compute_first_follow(&grammar));
    }
}
