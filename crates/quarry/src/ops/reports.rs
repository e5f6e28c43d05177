//! Report types returned by the operations.
//!
//! Reports own plain strings and numbers so they can be cached, compared,
//! and serialized without borrowing the grammar they describe.

use crate::analysis::{Ambiguities, CallGraph, FirstFollow, LeftRecursion, RecursionKind};
use crate::automaton::{self, Automaton, StateKind, Transition};
use crate::codegen::GeneratedFile;
use crate::grammar::{DecisionKind, Element, Grammar, RuleId, TokenSource};
use crate::lexer::Token;
use crate::parser::{ParseTree, Profile};
use std::time::Duration;

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn rule_name(grammar: &Grammar, rule: RuleId) -> String {
    grammar.rule(rule).name.to_string()
}

/// One rule of a validated grammar
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct RuleSummary {
    pub name: String,
    /// `parser` or `lexer`
    pub kind: String,
    pub alternatives: usize,
    pub fragment: bool,
    /// The rule body rendered back in grammar syntax
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct ValidationReport {
    pub success: bool,
    pub grammar_name: String,
    pub start_rule: String,
    pub rule_count: usize,
    pub parser_rule_count: usize,
    pub lexer_rule_count: usize,
    pub token_count: usize,
    pub decision_count: usize,
    pub atn_state_count: usize,
    pub rules: Vec<RuleSummary>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub(crate) fn build(
        grammar: &Grammar,
        atn: &Automaton,
        sets: &FirstFollow,
        recursion: &LeftRecursion,
        graph: &CallGraph,
    ) -> Self {
        let mut rules: Vec<RuleSummary> = grammar
            .parser_rules()
            .iter()
            .map(|rule| RuleSummary {
                name: rule.name.to_string(),
                kind: "parser".to_string(),
                alternatives: rule.alternatives.len(),
                fragment: false,
                definition: rule
                    .alternatives
                    .iter()
                    .map(|alt| grammar.render_alternative(alt))
                    .collect::<Vec<_>>()
                    .join(" | "),
            })
            .collect();
        rules.extend(grammar.lexer_rules().iter().map(|rule| RuleSummary {
            name: rule.name.to_string(),
            kind: "lexer".to_string(),
            alternatives: rule.alternatives.len(),
            fragment: rule.fragment,
            definition: rule
                .alternatives
                .iter()
                .map(|p| grammar.render_pattern(p))
                .collect::<Vec<_>>()
                .join(" | "),
        }));

        Self {
            success: true,
            grammar_name: grammar.name().to_string(),
            start_rule: rule_name(grammar, grammar.start_rule()),
            rule_count: rules.len(),
            parser_rule_count: grammar.parser_rules().len(),
            lexer_rule_count: grammar.lexer_rules().len(),
            token_count: grammar.tokens().len(),
            decision_count: grammar.decisions().len(),
            atn_state_count: atn.state_count(),
            rules,
            warnings: warnings(grammar, sets, recursion, graph),
        }
    }
}

fn warnings(grammar: &Grammar, sets: &FirstFollow, recursion: &LeftRecursion, graph: &CallGraph) -> Vec<String> {
    let start = rule_name(grammar, graph.entry);
    let mut out: Vec<String> = graph
        .unreachable
        .iter()
        .map(|&rule| {
            format!(
                "Rule `{}` is unreachable from start rule `{start}`",
                grammar.rule(rule).name
            )
        })
        .collect();

    for info in recursion.unsupported() {
        out.push(format!(
            "Rule `{}` is {} left-recursive and cannot be parsed or compiled",
            grammar.rule(info.rule).name,
            info.kind
        ));
    }

    for decision in grammar.decisions() {
        let lookahead = sets.decision(decision.id);
        if lookahead.has_conflict() && !recursion.rule(decision.rule).eliminable {
            out.push(format!(
                "Decision {} ({}) in rule `{}` needs more than one token of lookahead on {}",
                decision.id.0,
                decision.kind.as_str(),
                grammar.rule(decision.rule).name,
                lookahead.conflict.names(grammar).join(", ")
            ));
        }
    }

    let mut used = vec![false; grammar.tokens().len()];
    for rule in grammar.parser_rules() {
        for alt in &rule.alternatives {
            mark_tokens(&alt.elements, &mut used);
        }
    }
    for token in grammar.tokens() {
        if matches!(token.source, TokenSource::Lexer(_))
            && !token.skip
            && token.channel == 0
            && token.emit_as == token.id
            && !used[token.id.index()]
        {
            out.push(format!("Token `{}` is never used by a parser rule", token.name));
        }
    }
    out
}

fn mark_tokens(elements: &[Element], used: &mut [bool]) {
    for element in elements {
        match element {
            Element::Token { token, .. } => used[token.index()] = true,
            Element::Rule { .. } => {}
            Element::Block(block) => {
                for alt in &block.alternatives {
                    mark_tokens(&alt.elements, used);
                }
            }
            Element::Repeat { body, .. } => mark_tokens(std::slice::from_ref(body.as_ref()), used),
        }
    }
}

/// One token of a sample
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct TokenInfo {
    pub kind: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub channel: String,
}

impl TokenInfo {
    pub(crate) fn new(grammar: &Grammar, token: &Token) -> Self {
        Self {
            kind: grammar.token(token.kind).display().to_string(),
            text: token.text.to_string(),
            start: token.span.start,
            end: token.span.end,
            channel: grammar.channel_name(token.channel).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct ParseReport {
    pub success: bool,
    pub grammar_name: String,
    pub start_rule: String,
    /// LISP rendering of the tree
    pub parse_tree: String,
    pub node_count: usize,
    pub depth: usize,
    pub token_count: usize,
    /// Present when the token listing was requested
    #[cfg_attr(feature = "serialize", serde(skip_serializing_if = "Option::is_none"))]
    pub tokens: Option<Vec<TokenInfo>>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub tree: ParseTree,
}

/// One pair of conflicting outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct AmbiguityInfo {
    pub rule_name: String,
    pub decision_number: u32,
    pub decision_kind: String,
    /// Outcome indices, lower first
    pub alternatives: (usize, usize),
    pub labels: (Option<String>, Option<String>),
    /// Display names of the shared lookahead tokens
    pub tokens: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct AmbiguityReport {
    pub grammar_name: String,
    pub has_ambiguities: bool,
    pub decisions_checked: usize,
    pub ambiguities: Vec<AmbiguityInfo>,
    /// Whether a sample was parsed to look for ambiguity at runtime
    pub sample_checked: bool,
    /// Some decision matched the same sample tokens with more than one alternative
    pub ambiguity_detected: bool,
    pub ambiguity_details: Vec<String>,
    pub sample_ambiguities: Vec<SampleAmbiguity>,
}

/// A decision where several outcomes matched the same sample tokens
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct SampleAmbiguity {
    pub rule_name: String,
    pub decision_number: u32,
    pub offset: usize,
    /// Matching outcome indices in grammar order; the first was kept
    pub alternatives: Vec<usize>,
    pub tokens_consumed: usize,
}

impl AmbiguityReport {
    pub(crate) fn build(grammar: &Grammar, found: &Ambiguities) -> Self {
        let ambiguities: Vec<AmbiguityInfo> = found
            .conflicts
            .iter()
            .map(|c| {
                let rule = &grammar.rule(c.rule).name;
                let tokens = c.tokens.names(grammar);
                let (a, b) = c.alternatives;
                let description = match c.kind {
                    DecisionKind::Rule | DecisionKind::Block => format!(
                        "Alternatives {} and {} of {} decision {} in rule `{rule}` can both start with {}",
                        a + 1,
                        b + 1,
                        c.kind.as_str(),
                        c.decision.0,
                        tokens.join(", ")
                    ),
                    DecisionKind::Optional | DecisionKind::Star | DecisionKind::Plus => format!(
                        "The `{}` in rule `{rule}` (decision {}) cannot choose between entering and skipping on {}",
                        c.kind.as_str(),
                        c.decision.0,
                        tokens.join(", ")
                    ),
                };
                AmbiguityInfo {
                    rule_name: rule.to_string(),
                    decision_number: c.decision.0,
                    decision_kind: c.kind.as_str().to_string(),
                    alternatives: c.alternatives,
                    labels: (
                        c.labels.0.as_ref().map(ToString::to_string),
                        c.labels.1.as_ref().map(ToString::to_string),
                    ),
                    tokens,
                    description,
                }
            })
            .collect();
        Self {
            grammar_name: grammar.name().to_string(),
            has_ambiguities: !ambiguities.is_empty(),
            decisions_checked: grammar.decisions().len(),
            ambiguities,
            sample_checked: false,
            ambiguity_detected: false,
            ambiguity_details: Vec::new(),
            sample_ambiguities: Vec::new(),
        }
    }

    /// Add what a profiled parse of a sample observed
    pub(crate) fn record_sample(&mut self, grammar: &Grammar, profile: &Profile) {
        self.sample_checked = true;
        self.sample_ambiguities = profile
            .ambiguities
            .iter()
            .map(|event| SampleAmbiguity {
                rule_name: rule_name(grammar, event.rule),
                decision_number: event.decision.0,
                offset: event.offset,
                alternatives: event.alternatives.clone(),
                tokens_consumed: event.consumed,
            })
            .collect();
        self.ambiguity_details = self
            .sample_ambiguities
            .iter()
            .map(|a| {
                let outcomes: Vec<String> = a.alternatives.iter().map(|alt| (alt + 1).to_string()).collect();
                format!(
                    "Decision {} in rule `{}` at offset {}: alternatives {} all match the next {} tokens; kept {}",
                    a.decision_number,
                    a.rule_name,
                    a.offset,
                    outcomes.join(", "),
                    a.tokens_consumed,
                    outcomes.first().map_or("none", String::as_str)
                )
            })
            .collect();
        self.ambiguity_detected = !self.sample_ambiguities.is_empty();
    }

    /// Tokens shared by outcomes `i` and `j` of `decision`, in either order
    #[must_use]
    pub fn conflicts_between(&self, decision: u32, i: usize, j: usize) -> Option<&[String]> {
        let pair = (i.min(j), i.max(j));
        self.ambiguities
            .iter()
            .find(|a| a.decision_number == decision && a.alternatives == pair)
            .map(|a| a.tokens.as_slice())
    }

    /// Conflicts reported for the rule called `name`
    pub fn for_rule<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AmbiguityInfo> + 'a {
        self.ambiguities.iter().filter(move |a| a.rule_name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct RuleRecursionInfo {
    pub rule_name: String,
    pub left_recursion_type: RecursionKind,
    pub alternatives: Vec<usize>,
    pub eliminable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct LeftRecursionReport {
    pub grammar_name: String,
    pub has_left_recursion: bool,
    pub has_direct_left_recursion: bool,
    pub has_indirect_left_recursion: bool,
    pub left_recursive_rules: Vec<String>,
    /// Rules that neither the recognizer nor the Rust backend can run
    pub unsupported_rules: Vec<String>,
    pub rules: Vec<RuleRecursionInfo>,
    pub cycles: Vec<Vec<String>>,
}

impl LeftRecursionReport {
    pub(crate) fn build(grammar: &Grammar, recursion: &LeftRecursion) -> Self {
        let rules: Vec<RuleRecursionInfo> = recursion
            .rules
            .iter()
            .map(|r| RuleRecursionInfo {
                rule_name: rule_name(grammar, r.rule),
                left_recursion_type: r.kind,
                alternatives: r.alternatives.clone(),
                eliminable: r.eliminable,
            })
            .collect();
        let has = |kind| rules.iter().any(|r| r.left_recursion_type == kind);
        Self {
            grammar_name: grammar.name().to_string(),
            has_left_recursion: rules.iter().any(|r| r.left_recursion_type != RecursionKind::None),
            has_direct_left_recursion: has(RecursionKind::Direct),
            has_indirect_left_recursion: has(RecursionKind::Indirect),
            left_recursive_rules: rules
                .iter()
                .filter(|r| r.left_recursion_type != RecursionKind::None)
                .map(|r| r.rule_name.clone())
                .collect(),
            unsupported_rules: recursion
                .unsupported()
                .map(|r| rule_name(grammar, r.rule))
                .collect(),
            cycles: recursion
                .cycles
                .iter()
                .map(|cycle| cycle.iter().map(|&r| rule_name(grammar, r)).collect())
                .collect(),
            rules,
        }
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&RuleRecursionInfo> {
        self.rules.iter().find(|r| r.rule_name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct RuleSets {
    pub rule_name: String,
    pub first_set: Vec<String>,
    pub follow_set: Vec<String>,
    pub nullable: bool,
    pub alternatives: usize,
    pub has_conflict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct DecisionInfo {
    pub decision_number: u32,
    pub rule_name: String,
    pub kind: String,
    pub alternatives: usize,
    pub ambiguous_lookahead: bool,
    pub conflict_tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct FirstFollowReport {
    pub grammar_name: String,
    pub total_parser_rules: usize,
    pub nullable_rule_count: usize,
    pub rules_with_conflicts: usize,
    /// Fixed-point passes until the sets stopped changing
    pub iterations: usize,
    pub rules: Vec<RuleSets>,
    pub decisions: Vec<DecisionInfo>,
}

impl FirstFollowReport {
    pub(crate) fn build(grammar: &Grammar, sets: &FirstFollow) -> Self {
        let rules: Vec<RuleSets> = grammar
            .parser_rules()
            .iter()
            .map(|rule| RuleSets {
                rule_name: rule.name.to_string(),
                first_set: sets.first(rule.id).names(grammar),
                follow_set: sets.follow(rule.id).names(grammar),
                nullable: sets.nullable(rule.id),
                alternatives: rule.alternatives.len(),
                has_conflict: sets.has_ll1_conflict(grammar, rule.id),
            })
            .collect();
        let decisions = grammar
            .decisions()
            .iter()
            .map(|d| {
                let lookahead = sets.decision(d.id);
                DecisionInfo {
                    decision_number: d.id.0,
                    rule_name: rule_name(grammar, d.rule),
                    kind: d.kind.as_str().to_string(),
                    alternatives: d.alternatives,
                    ambiguous_lookahead: lookahead.has_conflict(),
                    conflict_tokens: lookahead.conflict.names(grammar),
                }
            })
            .collect();
        Self {
            grammar_name: grammar.name().to_string(),
            total_parser_rules: rules.len(),
            nullable_rule_count: rules.iter().filter(|r| r.nullable).count(),
            rules_with_conflicts: rules.iter().filter(|r| r.has_conflict).count(),
            iterations: sets.iterations(),
            rules,
            decisions,
        }
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&RuleSets> {
        self.rules.iter().find(|r| r.rule_name == name)
    }
}

/// Which renderings a [`CallGraphReport`] carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum GraphFormat {
    Dot,
    Mermaid,
    #[default]
    Both,
}

impl GraphFormat {
    const fn dot(self) -> bool {
        matches!(self, Self::Dot | Self::Both)
    }

    const fn mermaid(self) -> bool {
        matches!(self, Self::Mermaid | Self::Both)
    }
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dot" | "graphviz" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            "both" | "all" => Ok(Self::Both),
            other => Err(format!("unknown graph format `{other}` (expected dot, mermaid or both)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct CallGraphReport {
    pub grammar_name: String,
    pub entry: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes: Vec<String>,
    pub edges: Vec<CallEdge>,
    pub cycles: Vec<Vec<String>>,
    pub unreachable: Vec<String>,
    #[cfg_attr(feature = "serialize", serde(skip_serializing_if = "Option::is_none"))]
    pub dot: Option<String>,
    #[cfg_attr(feature = "serialize", serde(skip_serializing_if = "Option::is_none"))]
    pub mermaid: Option<String>,
}

impl CallGraphReport {
    pub(crate) fn build(grammar: &Grammar, graph: &CallGraph, recursion: &LeftRecursion, format: GraphFormat) -> Self {
        let names = |rules: &[RuleId]| -> Vec<String> { rules.iter().map(|&r| rule_name(grammar, r)).collect() };
        Self {
            grammar_name: grammar.name().to_string(),
            entry: rule_name(grammar, graph.entry),
            node_count: graph.nodes.len(),
            edge_count: graph.edges.len(),
            nodes: names(&graph.nodes),
            edges: graph
                .edges
                .iter()
                .map(|&(caller, callee)| CallEdge {
                    caller: rule_name(grammar, caller),
                    callee: rule_name(grammar, callee),
                })
                .collect(),
            cycles: graph.cycles.iter().map(|c| names(c)).collect(),
            unreachable: names(&graph.unreachable),
            dot: format.dot().then(|| graph.to_dot(grammar, Some(recursion))),
            mermaid: format.mermaid().then(|| graph.to_mermaid(grammar, Some(recursion))),
        }
    }

    /// Copy carrying only the renderings `format` asks for
    #[must_use]
    pub fn restricted_to(&self, format: GraphFormat) -> Self {
        Self {
            dot: self.dot.clone().filter(|_| format.dot()),
            mermaid: self.mermaid.clone().filter(|_| format.mermaid()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct AtnStateInfo {
    pub id: u32,
    /// `start`, `stop` or `basic`
    pub kind: String,
    #[cfg_attr(feature = "serialize", serde(skip_serializing_if = "Option::is_none"))]
    pub decision: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct AtnTransitionInfo {
    pub from: u32,
    pub to: u32,
    /// `terminal`, `call` or `epsilon`
    pub kind: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct AtnReport {
    pub grammar_name: String,
    pub rule_name: String,
    pub state_count: usize,
    pub transition_count: usize,
    /// Size of the whole network, all rules included
    pub total_state_count: usize,
    pub total_transition_count: usize,
    pub states: Vec<AtnStateInfo>,
    pub transitions: Vec<AtnTransitionInfo>,
    pub dot: String,
    pub mermaid: String,
}

impl AtnReport {
    pub(crate) fn build(grammar: &Grammar, atn: &Automaton, rule: RuleId) -> Self {
        let mut states = Vec::new();
        let mut transitions = Vec::new();
        for state in atn.rule_states(rule) {
            states.push(AtnStateInfo {
                id: state.id.0,
                kind: match state.kind {
                    StateKind::RuleStart => "start",
                    StateKind::RuleStop => "stop",
                    StateKind::Basic => "basic",
                }
                .to_string(),
                decision: state.decision.map(|d| d.0),
            });
            for transition in &state.transitions {
                // a call resumes in this rule; the callee's states are drawn elsewhere
                let (kind, to) = match transition {
                    Transition::Terminal { target, .. } => ("terminal", *target),
                    Transition::Call { follow, .. } => ("call", *follow),
                    Transition::Epsilon { target } => ("epsilon", *target),
                };
                transitions.push(AtnTransitionInfo {
                    from: state.id.0,
                    to: to.0,
                    kind: kind.to_string(),
                    label: transition.label(grammar),
                });
            }
        }
        Self {
            grammar_name: grammar.name().to_string(),
            rule_name: rule_name(grammar, rule),
            state_count: states.len(),
            transition_count: transitions.len(),
            total_state_count: atn.state_count(),
            total_transition_count: atn.transition_count(),
            states,
            transitions,
            dot: automaton::to_dot(grammar, atn, rule),
            mermaid: automaton::to_mermaid(grammar, atn, rule),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct CompileReport {
    pub grammar_name: String,
    /// Canonical target name, even when an alias was requested
    pub target: String,
    /// Whether the target emits a runnable parser or tables only
    pub full_parser: bool,
    pub file_count: usize,
    pub total_bytes: usize,
    pub files: Vec<GeneratedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct RuleTiming {
    pub rule_name: String,
    pub invocations: u64,
    pub time_nanos: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct DecisionTiming {
    pub decision_number: u32,
    pub rule_name: String,
    pub invocations: u64,
    /// Evaluations resolved by backtracking
    #[cfg_attr(feature = "serialize", serde(rename = "llFallback"))]
    pub speculations: u64,
    pub max_lookahead: usize,
    /// Evaluations where several alternatives tied for the longest match
    pub ambiguity_count: u64,
    pub time_nanos: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct ProfileReport {
    pub grammar_name: String,
    pub start_rule: String,
    pub parse_tree: String,
    pub total_time_nanos: u64,
    pub token_count: usize,
    pub node_count: usize,
    pub rule_invocations: u64,
    pub decision_invocations: u64,
    pub speculations: u64,
    pub ambiguity_count: u64,
    /// Rules that ran at least once, busiest first
    pub rules: Vec<RuleTiming>,
    /// Decisions that were evaluated at least once
    pub decisions: Vec<DecisionTiming>,
    pub insights: Vec<String>,
    pub optimization_hints: Vec<String>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub tree: ParseTree,
}

impl ProfileReport {
    pub(crate) fn build(grammar: &Grammar, start: RuleId, tree: ParseTree, profile: &Profile) -> Self {
        let rules = profile
            .hottest_rules(usize::MAX)
            .into_iter()
            .map(|r| RuleTiming {
                rule_name: rule_name(grammar, r.rule),
                invocations: r.invocations,
                time_nanos: nanos(r.time),
            })
            .collect();
        let decisions = profile
            .decisions
            .iter()
            .filter(|d| d.invocations > 0)
            .map(|d| DecisionTiming {
                decision_number: d.decision.0,
                rule_name: rule_name(grammar, d.rule),
                invocations: d.invocations,
                speculations: d.speculations,
                max_lookahead: d.max_lookahead,
                ambiguity_count: d.ambiguities,
                time_nanos: nanos(d.time),
            })
            .collect();
        Self {
            grammar_name: grammar.name().to_string(),
            start_rule: rule_name(grammar, start),
            parse_tree: tree.to_lisp(grammar),
            total_time_nanos: nanos(profile.total_time),
            token_count: profile.tokens,
            node_count: profile.nodes,
            rule_invocations: profile.rule_invocations(),
            decision_invocations: profile.decision_invocations(),
            speculations: profile.speculations(),
            ambiguity_count: profile.ambiguity_count(),
            rules,
            decisions,
            insights: profile.insights(grammar),
            optimization_hints: profile.hints(grammar),
            tree,
        }
    }
}
