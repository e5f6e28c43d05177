//! Counters collected while recognizing a sample.
//!
//! The recognizer is generic over a [`Probe`]. Plain parsing uses `()`,
//! which compiles to nothing; profiled parsing uses a [`Profiler`].

use crate::grammar::{DecisionId, Element, Grammar, RuleId};
use std::time::{Duration, Instant};

/// How a decision was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resolution {
    /// Alternatives were tried with backtracking
    pub speculated: bool,
    /// Tokens examined before committing
    pub lookahead: usize,
}

impl Resolution {
    pub(crate) const SINGLE: Self = Self {
        speculated: false,
        lookahead: 1,
    };
}

pub(crate) trait Probe {
    type Mark: Copy;

    fn mark(&mut self) -> Self::Mark;
    fn rule(&mut self, rule: RuleId, since: Self::Mark);
    fn decision(&mut self, decision: DecisionId, since: Self::Mark, resolution: Resolution);
    /// Several alternatives matched the same `consumed` tokens; the first was kept
    fn ambiguity(&mut self, decision: DecisionId, offset: usize, alternatives: &[usize], consumed: usize);
}

impl Probe for () {
    type Mark = ();

    #[inline]
    fn mark(&mut self) {}

    #[inline]
    fn rule(&mut self, _: RuleId, (): ()) {}

    #[inline]
    fn decision(&mut self, _: DecisionId, (): (), _: Resolution) {}

    #[inline]
    fn ambiguity(&mut self, _: DecisionId, _: usize, _: &[usize], _: usize) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleProfile {
    pub rule: RuleId,
    pub invocations: u64,
    /// Inclusive time; recursive invocations are counted in their callers too
    pub time: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionProfile {
    pub decision: DecisionId,
    pub rule: RuleId,
    pub invocations: u64,
    /// Invocations that fell back to backtracking
    pub speculations: u64,
    pub max_lookahead: usize,
    /// Committed evaluations where several alternatives matched the same tokens
    pub ambiguities: u64,
    pub time: Duration,
}

/// A decision where several alternatives matched the same tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguityEvent {
    pub decision: DecisionId,
    pub rule: RuleId,
    /// Byte offset of the token the decision was made at
    pub offset: usize,
    /// Matching alternatives in grammar order; the first was kept
    pub alternatives: Vec<usize>,
    /// Tokens every one of them consumed
    pub consumed: usize,
}

/// Everything a [`Profiler`] recorded during one parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub rules: Vec<RuleProfile>,
    pub decisions: Vec<DecisionProfile>,
    pub ambiguities: Vec<AmbiguityEvent>,
    pub total_time: Duration,
    /// Tokens on the default channel, including `EOF`
    pub tokens: usize,
    pub nodes: usize,
}

/// Collects per-rule and per-decision counters
#[derive(Debug)]
pub struct Profiler {
    rules: Vec<RuleProfile>,
    decisions: Vec<DecisionProfile>,
    ambiguities: Vec<AmbiguityEvent>,
}

impl Profiler {
    #[must_use]
    pub fn new(grammar: &Grammar) -> Self {
        Self {
            rules: grammar
                .parser_rules()
                .iter()
                .map(|r| RuleProfile {
                    rule: r.id,
                    invocations: 0,
                    time: Duration::ZERO,
                })
                .collect(),
            decisions: grammar
                .decisions()
                .iter()
                .map(|d| DecisionProfile {
                    decision: d.id,
                    rule: d.rule,
                    invocations: 0,
                    speculations: 0,
                    max_lookahead: 0,
                    ambiguities: 0,
                    time: Duration::ZERO,
                })
                .collect(),
            ambiguities: Vec::new(),
        }
    }

    pub(crate) fn finish(self, total_time: Duration, tokens: usize, nodes: usize) -> Profile {
        Profile {
            rules: self.rules,
            decisions: self.decisions,
            ambiguities: self.ambiguities,
            total_time,
            tokens,
            nodes,
        }
    }
}

impl Probe for Profiler {
    type Mark = Instant;

    fn mark(&mut self) -> Instant {
        Instant::now()
    }

    fn rule(&mut self, rule: RuleId, since: Instant) {
        let entry = &mut self.rules[rule.index()];
        entry.invocations += 1;
        entry.time += since.elapsed();
    }

    fn decision(&mut self, decision: DecisionId, since: Instant, resolution: Resolution) {
        let entry = &mut self.decisions[decision.index()];
        entry.invocations += 1;
        entry.time += since.elapsed();
        entry.max_lookahead = entry.max_lookahead.max(resolution.lookahead);
        if resolution.speculated {
            entry.speculations += 1;
        }
    }

    fn ambiguity(&mut self, decision: DecisionId, offset: usize, alternatives: &[usize], consumed: usize) {
        let entry = &mut self.decisions[decision.index()];
        entry.ambiguities += 1;
        self.ambiguities.push(AmbiguityEvent {
            decision,
            rule: entry.rule,
            offset,
            alternatives: alternatives.to_vec(),
            consumed,
        });
    }
}

impl Profile {
    #[must_use]
    pub fn rule_invocations(&self) -> u64 {
        self.rules.iter().map(|r| r.invocations).sum()
    }

    #[must_use]
    pub fn decision_invocations(&self) -> u64 {
        self.decisions.iter().map(|d| d.invocations).sum()
    }

    #[must_use]
    pub fn speculations(&self) -> u64 {
        self.decisions.iter().map(|d| d.speculations).sum()
    }

    /// Committed decisions where several alternatives matched the same tokens
    #[must_use]
    pub fn ambiguity_count(&self) -> u64 {
        self.decisions.iter().map(|d| d.ambiguities).sum()
    }

    /// Rules ordered by invocation count, busiest first
    #[must_use]
    pub fn hottest_rules(&self, limit: usize) -> Vec<&RuleProfile> {
        let mut rules: Vec<&RuleProfile> = self.rules.iter().filter(|r| r.invocations > 0).collect();
        rules.sort_by(|a, b| b.invocations.cmp(&a.invocations).then(a.rule.cmp(&b.rule)));
        rules.truncate(limit);
        rules
    }

    /// Observations about the run
    #[must_use]
    pub fn insights(&self, grammar: &Grammar) -> Vec<String> {
        let mut out = vec![format!(
            "Parsed {} tokens into {} nodes in {:.3} ms",
            self.tokens,
            self.nodes,
            self.total_time.as_secs_f64() * 1000.0
        )];

        let decisions = self.decision_invocations();
        let speculations = self.speculations();
        if decisions == 0 {
            out.push("No decisions were evaluated".to_string());
        } else if speculations == 0 {
            out.push(format!(
                "All {decisions} decision evaluations were resolved with one token of lookahead"
            ));
        } else {
            out.push(format!(
                "{speculations} of {decisions} decision evaluations needed backtracking ({:.1}%)",
                speculations as f64 * 100.0 / decisions as f64
            ));
        }

        if !self.ambiguities.is_empty() {
            out.push(format!(
                "{} decision evaluations matched the same tokens with more than one alternative; the first was kept",
                self.ambiguities.len()
            ));
        }

        let total = self.rule_invocations();
        if let Some(hot) = self.hottest_rules(1).first() {
            out.push(format!(
                "Most invoked rule: `{}` ({} calls, {:.0}% of all rule calls)",
                grammar.rule(hot.rule).name,
                hot.invocations,
                hot.invocations as f64 * 100.0 / total.max(1) as f64
            ));
        }

        if let Some(deep) = self.decisions.iter().max_by_key(|d| d.max_lookahead) {
            if deep.max_lookahead > 1 {
                out.push(format!(
                    "Deepest lookahead: {} tokens at decision {} in rule `{}`",
                    deep.max_lookahead,
                    deep.decision.0,
                    grammar.rule(deep.rule).name
                ));
            }
        }

        let unused = self.rules.iter().filter(|r| r.invocations == 0).count();
        if unused > 0 {
            out.push(format!("{unused} rules were not exercised by this sample"));
        }
        out
    }

    /// Suggested grammar changes
    #[must_use]
    pub fn hints(&self, grammar: &Grammar) -> Vec<String> {
        let mut out = Vec::new();
        for d in self.decisions.iter().filter(|d| d.speculations > 0) {
            out.push(format!(
                "Left-factor rule `{}`: decision {} backtracked {} of {} times, looking up to {} tokens ahead",
                grammar.rule(d.rule).name,
                d.decision.0,
                d.speculations,
                d.invocations,
                d.max_lookahead
            ));
        }
        for r in self.rules.iter().filter(|r| r.invocations > 0) {
            let rule = grammar.rule(r.rule);
            if let [alt] = rule.alternatives.as_slice() {
                if let [Element::Rule { rule: callee, .. }] = alt.elements.as_slice() {
                    out.push(format!(
                        "Rule `{}` only forwards to `{}`; inlining it would save {} calls",
                        rule.name,
                        grammar.rule(*callee).name,
                        r.invocations
                    ));
                }
            }
        }
        if out.is_empty() {
            out.push("No changes suggested: every decision was resolved with a single token".to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_grammar;

    #[test]
    fn test_profiler_counts() {
        let grammar = parse_grammar("s : a | B ; a : A ; A : 'a' ; B : 'b' ;").unwrap();
        let mut profiler = Profiler::new(&grammar);
        let mark = profiler.mark();
        profiler.rule(RuleId(1), mark);
        profiler.rule(RuleId(0), mark);
        profiler.decision(
            DecisionId(0),
            mark,
            Resolution {
                speculated: true,
                lookahead: 3,
            },
        );
        let profile = profiler.finish(Duration::from_millis(1), 2, 3);
        assert_eq!(profile.rule_invocations(), 2);
        assert_eq!(profile.speculations(), 1);
        assert_eq!(profile.decisions[0].max_lookahead, 3);

        assert_eq!(profile.ambiguity_count(), 0);

        let hints = profile.hints(&grammar);
        assert!(hints[0].starts_with("Left-factor rule `s`"));
        assert!(profile.insights(&grammar).iter().any(|i| i.contains("Deepest lookahead: 3")));
    }

    #[test]
    fn test_ambiguity_events() {
        let grammar = parse_grammar("s : A B? | A ; A : 'a' ; B : 'b' ;").unwrap();
        let mut profiler = Profiler::new(&grammar);
        profiler.ambiguity(DecisionId(0), 4, &[0, 1], 1);
        let profile = profiler.finish(Duration::ZERO, 2, 2);
        assert_eq!(profile.ambiguity_count(), 1);
        assert_eq!(profile.decisions[0].ambiguities, 1);
        let event = &profile.ambiguities[0];
        assert_eq!(event.rule, RuleId(0));
        assert_eq!(event.offset, 4);
        assert_eq!(event.alternatives, [0, 1]);
        assert!(profile.insights(&grammar).iter().any(|i| i.contains("with more than one alternative")));
    }
}
