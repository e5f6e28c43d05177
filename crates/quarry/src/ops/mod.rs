//! # Operations
//!
//! The engine's public surface: each operation takes grammar source text,
//! runs the relevant stages, and returns an owned report.
//!
//! | Operation | Report |
//! |---|---|
//! | [`validate_grammar`] | [`ValidationReport`] |
//! | [`parse_sample`] | [`ParseReport`] |
//! | [`detect_ambiguity`], [`detect_ambiguity_in_sample`] | [`AmbiguityReport`] |
//! | [`analyze_left_recursion`] | [`LeftRecursionReport`] |
//! | [`analyze_first_follow`] | [`FirstFollowReport`] |
//! | [`analyze_call_graph`] | [`CallGraphReport`] |
//! | [`visualize_atn`] | [`AtnReport`] |
//! | [`compile_grammar_multi_target`] | [`CompileReport`] |
//! | [`profile_grammar`] | [`ProfileReport`] |
//!
//! The free functions start from scratch on every call. A [`Session`] runs
//! the same operations but memoizes the four analysis reports by grammar
//! content, and holds the recognizer settings, codegen options and backend
//! registry to use.
//!
//! ```rust
//! use quarry::ops::{ParseOptions, analyze_left_recursion, parse_sample};
//! use quarry::analysis::RecursionKind;
//!
//! let grammar = "grammar Calc; e : e '*' e | e '+' e | N ; N : [0-9]+ ; WS : ' '+ -> skip ;";
//!
//! let report = analyze_left_recursion(grammar).unwrap();
//! assert_eq!(report.rule("e").unwrap().left_recursion_type, RecursionKind::Direct);
//!
//! let parsed = parse_sample(grammar, "1 + 2 * 3", &ParseOptions::default()).unwrap();
//! assert_eq!(parsed.parse_tree, "(e (e 1) + (e (e 2) * (e 3)))");
//! ```

mod reports;
mod session;

pub use reports::{
    AmbiguityInfo, AmbiguityReport, AtnReport, AtnStateInfo, AtnTransitionInfo, CallEdge,
    CallGraphReport, CompileReport, DecisionInfo, DecisionTiming, FirstFollowReport, GraphFormat,
    LeftRecursionReport, ParseReport, ProfileReport, RuleRecursionInfo, RuleSets, RuleSummary,
    RuleTiming, SampleAmbiguity, TokenInfo, ValidationReport,
};
pub use session::{AnalysisSuite, Session, SessionConfig};

use crate::analysis::{Ambiguities, CallGraph, FirstFollow, LeftRecursion};
use crate::automaton::Automaton;
use crate::codegen::{BackendRegistry, CodegenOptions, emit_with};
use crate::error::diagnostics::did_you_mean;
use crate::error::{Error, Result};
use crate::grammar::{Grammar, RuleId, parse_grammar};
use crate::lexer::tokenize;
use crate::parser::{ParseTree, Profile, Recognizer, RecognizerConfig};
use tracing::{debug, instrument};

/// Per-call options of [`parse_sample`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase", default))]
pub struct ParseOptions {
    /// Parser rule to start from instead of the grammar's start rule
    pub start_rule: Option<String>,
    /// Include the token listing in the report
    pub show_tokens: bool,
}

impl ParseOptions {
    #[must_use]
    pub fn with_start_rule(mut self, name: impl Into<String>) -> Self {
        self.start_rule = Some(name.into());
        self
    }

    #[must_use]
    pub const fn with_tokens(mut self, show_tokens: bool) -> Self {
        self.show_tokens = show_tokens;
        self
    }
}

/// Check a grammar and summarize it
///
/// Warnings cover unreachable rules, left recursion that cannot be run,
/// decisions that need more than one token of lookahead, and lexer tokens
/// no parser rule uses.
///
/// # Errors
///
/// [`Error::Grammar`] if the grammar is rejected.
#[instrument(level = "debug", skip_all)]
pub fn validate_grammar(source: &str) -> Result<ValidationReport> {
    let grammar = parse_grammar(source)?;
    Ok(validation_report(&grammar))
}

/// Tokenize and parse `sample`
///
/// # Errors
///
/// [`Error::Grammar`], [`Error::Lex`], [`Error::Recognize`], or
/// [`Error::UnknownRule`] for an unknown start rule.
#[instrument(level = "debug", skip_all, fields(bytes = sample.len()))]
pub fn parse_sample(source: &str, sample: &str, options: &ParseOptions) -> Result<ParseReport> {
    let grammar = parse_grammar(source)?;
    parse_report(&grammar, sample, options, &RecognizerConfig::default())
}

/// Report every LL(1) conflict
///
/// # Errors
///
/// [`Error::Grammar`] if the grammar is rejected.
#[instrument(level = "debug", skip_all)]
pub fn detect_ambiguity(source: &str) -> Result<AmbiguityReport> {
    let grammar = parse_grammar(source)?;
    Ok(ambiguity_report(&grammar))
}

/// [`detect_ambiguity`], plus the decisions where several alternatives
/// matched the same tokens while parsing `sample` from `start_rule` (the
/// grammar's start rule when `None`)
///
/// # Errors
///
/// As [`parse_sample`].
#[instrument(level = "debug", skip_all, fields(bytes = sample.len()))]
pub fn detect_ambiguity_in_sample(source: &str, sample: &str, start_rule: Option<&str>) -> Result<AmbiguityReport> {
    let grammar = parse_grammar(source)?;
    let mut report = ambiguity_report(&grammar);
    record_sample_ambiguity(&mut report, &grammar, sample, start_rule, &RecognizerConfig::default())?;
    Ok(report)
}

/// Classify every parser rule's left recursion
///
/// # Errors
///
/// [`Error::Grammar`] if the grammar is rejected.
#[instrument(level = "debug", skip_all)]
pub fn analyze_left_recursion(source: &str) -> Result<LeftRecursionReport> {
    let grammar = parse_grammar(source)?;
    Ok(left_recursion_report(&grammar))
}

/// Nullable flags, FIRST and FOLLOW sets, and decision lookahead
///
/// # Errors
///
/// [`Error::Grammar`] if the grammar is rejected.
#[instrument(level = "debug", skip_all)]
pub fn analyze_first_follow(source: &str) -> Result<FirstFollowReport> {
    let grammar = parse_grammar(source)?;
    Ok(first_follow_report(&grammar))
}

/// Rule dependency graph, rendered as `format` asks
///
/// # Errors
///
/// [`Error::Grammar`] if the grammar is rejected.
#[instrument(level = "debug", skip_all)]
pub fn analyze_call_graph(source: &str, format: GraphFormat) -> Result<CallGraphReport> {
    let grammar = parse_grammar(source)?;
    Ok(call_graph_report(&grammar, format))
}

/// States and transitions of one rule's automaton; the start rule when
/// `rule` is `None`
///
/// # Errors
///
/// [`Error::Grammar`], or [`Error::UnknownRule`] with a suggestion.
#[instrument(level = "debug", skip_all)]
pub fn visualize_atn(source: &str, rule: Option<&str>) -> Result<AtnReport> {
    let grammar = parse_grammar(source)?;
    atn_report(&grammar, rule)
}

/// Generate parser source for `target` with the built-in backends
///
/// # Errors
///
/// [`Error::Grammar`], or [`Error::Codegen`] for unknown targets and
/// grammars the backend cannot express.
#[instrument(level = "debug", skip_all, fields(backend = %target))]
pub fn compile_grammar_multi_target(source: &str, target: &str, options: &CodegenOptions) -> Result<CompileReport> {
    let grammar = parse_grammar(source)?;
    compile_report(&BackendRegistry::default(), &grammar, target, options)
}

/// Parse `sample` from `start_rule` (the grammar's start rule when `None`)
/// with counters attached
///
/// # Errors
///
/// As [`parse_sample`].
#[instrument(level = "debug", skip_all, fields(bytes = sample.len()))]
pub fn profile_grammar(source: &str, sample: &str, start_rule: Option<&str>) -> Result<ProfileReport> {
    let grammar = parse_grammar(source)?;
    profile_report(&grammar, sample, start_rule, &RecognizerConfig::default())
}

/// The parser rule called `name`, or an error suggesting a close match
pub(crate) fn resolve_rule(grammar: &Grammar, name: &str) -> Result<RuleId> {
    grammar.rule_by_name(name).map(|r| r.id).ok_or_else(|| Error::UnknownRule {
        name: name.to_string(),
        suggestion: did_you_mean(name, grammar.parser_rules().iter().map(|r| r.name.as_str())),
    })
}

pub(crate) fn validation_report(grammar: &Grammar) -> ValidationReport {
    let atn = Automaton::build(grammar);
    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    let graph = CallGraph::build(grammar, &atn);
    let report = ValidationReport::build(grammar, &atn, &sets, &recursion, &graph);
    debug!(
        grammar = grammar.name(),
        rules = report.rule_count,
        warnings = report.warnings.len(),
        "validated grammar"
    );
    report
}

pub(crate) fn parse_report(
    grammar: &Grammar,
    sample: &str,
    options: &ParseOptions,
    config: &RecognizerConfig,
) -> Result<ParseReport> {
    let start = match &options.start_rule {
        Some(name) => resolve_rule(grammar, name)?,
        None => grammar.start_rule(),
    };
    let tokens = tokenize(grammar, sample)?;
    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    let tree = Recognizer::new(grammar, &sets, &recursion)
        .with_config(config.clone())
        .parse_rule(&tokens, start)?;
    Ok(ParseReport {
        success: true,
        grammar_name: grammar.name().to_string(),
        start_rule: grammar.rule(start).name.to_string(),
        parse_tree: tree.to_lisp(grammar),
        node_count: tree.len(),
        depth: tree.depth(),
        token_count: tokens.len(),
        tokens: options
            .show_tokens
            .then(|| tokens.iter().map(|t| TokenInfo::new(grammar, t)).collect()),
        tree,
    })
}

pub(crate) fn ambiguity_report(grammar: &Grammar) -> AmbiguityReport {
    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    AmbiguityReport::build(grammar, &Ambiguities::compute(grammar, &sets, &recursion))
}

pub(crate) fn left_recursion_report(grammar: &Grammar) -> LeftRecursionReport {
    let sets = FirstFollow::compute(grammar);
    LeftRecursionReport::build(grammar, &LeftRecursion::compute(grammar, &sets))
}

pub(crate) fn first_follow_report(grammar: &Grammar) -> FirstFollowReport {
    FirstFollowReport::build(grammar, &FirstFollow::compute(grammar))
}

pub(crate) fn call_graph_report(grammar: &Grammar, format: GraphFormat) -> CallGraphReport {
    let atn = Automaton::build(grammar);
    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    CallGraphReport::build(grammar, &CallGraph::build(grammar, &atn), &recursion, format)
}

pub(crate) fn atn_report(grammar: &Grammar, rule: Option<&str>) -> Result<AtnReport> {
    let rule = match rule {
        Some(name) => resolve_rule(grammar, name)?,
        None => grammar.start_rule(),
    };
    Ok(AtnReport::build(grammar, &Automaton::build(grammar), rule))
}

pub(crate) fn compile_report(
    registry: &BackendRegistry,
    grammar: &Grammar,
    target: &str,
    options: &CodegenOptions,
) -> Result<CompileReport> {
    let full_parser = registry.get(target)?.capabilities().full_parser;
    let atn = Automaton::build(grammar);
    let source = emit_with(registry, grammar, &atn, target, options)?;
    Ok(CompileReport {
        grammar_name: source.grammar.clone(),
        full_parser,
        file_count: source.files.len(),
        total_bytes: source.total_bytes(),
        target: source.target,
        files: source.files,
    })
}

fn profiled(
    grammar: &Grammar,
    sample: &str,
    start_rule: Option<&str>,
    config: &RecognizerConfig,
) -> Result<(RuleId, ParseTree, Profile)> {
    let start = match start_rule {
        Some(name) => resolve_rule(grammar, name)?,
        None => grammar.start_rule(),
    };
    let tokens = tokenize(grammar, sample)?;
    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    let (tree, profile) = Recognizer::new(grammar, &sets, &recursion)
        .with_config(config.clone())
        .parse_profiled(&tokens, start)?;
    Ok((start, tree, profile))
}

pub(crate) fn profile_report(
    grammar: &Grammar,
    sample: &str,
    start_rule: Option<&str>,
    config: &RecognizerConfig,
) -> Result<ProfileReport> {
    let (start, tree, profile) = profiled(grammar, sample, start_rule, config)?;
    Ok(ProfileReport::build(grammar, start, tree, &profile))
}

pub(crate) fn record_sample_ambiguity(
    report: &mut AmbiguityReport,
    grammar: &Grammar,
    sample: &str,
    start_rule: Option<&str>,
    config: &RecognizerConfig,
) -> Result<()> {
    let (_, _, profile) = profiled(grammar, sample, start_rule, config)?;
    report.record_sample(grammar, &profile);
    debug!(
        grammar = grammar.name(),
        ambiguous = report.sample_ambiguities.len(),
        "checked sample for ambiguity"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RecursionKind;

    const ROUTES: &str = r"
        grammar Routes;
        file   : route* EOF ;
        route  : 'route' METHOD PATH '->' handler ';' ;
        handler: ID ('.' ID)* ;
        METHOD : 'GET' | 'POST' | 'PUT' | 'DELETE' ;
        PATH   : '/' [a-zA-Z0-9_/]* ;
        ID     : [a-zA-Z_] [a-zA-Z0-9_]* ;
        WS     : [ \t\r\n]+ -> skip ;
    ";

    #[test]
    fn test_validate_counts_and_warnings() {
        let report = validate_grammar(
            "grammar G; s : A ; orphan : B ; A : 'a' ; B : 'b' ; C : 'c' ; WS : ' ' -> skip ;",
        )
        .unwrap();
        assert!(report.success);
        assert_eq!(report.grammar_name, "G");
        assert_eq!(report.start_rule, "s");
        assert_eq!(report.parser_rule_count, 2);
        assert_eq!(report.lexer_rule_count, 4);
        assert_eq!(report.rule_count, 6);
        assert!(report.warnings.iter().any(|w| w.contains("`orphan` is unreachable")));
        assert!(report.warnings.iter().any(|w| w.contains("Token `C` is never used")));
        assert!(!report.warnings.iter().any(|w| w.contains("`WS`")));
    }

    #[test]
    fn test_validate_rejects_bad_grammar() {
        let err = validate_grammar("grammar G; s : missing ;").unwrap_err();
        assert_eq!(err.kind(), "GrammarError");
    }

    #[test]
    fn test_parse_sample_with_tokens() {
        let options = ParseOptions::default().with_tokens(true);
        let report = parse_sample(ROUTES, "route GET /users -> Users.list;", &options).unwrap();
        assert_eq!(report.start_rule, "file");
        let tokens = report.tokens.unwrap();
        assert_eq!(tokens[0].kind, "'route'");
        assert_eq!(tokens[1].kind, "METHOD");
        assert_eq!(tokens[1].text, "GET");
        assert_eq!(tokens.last().unwrap().kind, "EOF");
        assert_eq!(report.token_count, tokens.len());
    }

    #[test]
    fn test_parse_sample_start_rule_override() {
        let options = ParseOptions::default().with_start_rule("handler");
        let report = parse_sample(ROUTES, "Users.list", &options).unwrap();
        assert_eq!(report.parse_tree, "(handler Users . list)");
        assert!(report.tokens.is_none());

        let err = parse_sample(ROUTES, "x", &ParseOptions::default().with_start_rule("handlr")).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownRule {
                name: "handlr".into(),
                suggestion: Some("handler".into()),
            }
        );
    }

    #[test]
    fn test_parse_error_points_at_route_keyword() {
        let err = parse_sample(ROUTES, "GET /users;", &ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "ParseError");
        let Error::Recognize(inner) = err else {
            panic!("expected a recognize error");
        };
        let parse = inner.as_parse_error().unwrap();
        assert_eq!(parse.offset, 0);
        assert!(parse.expects("'route'"));
    }

    #[test]
    fn test_ambiguity_report_is_symmetric() {
        let report = detect_ambiguity("grammar G; s : A B | A C ; A : 'a' ; B : 'b' ; C : 'c' ;").unwrap();
        assert!(report.has_ambiguities);
        let info = &report.ambiguities[0];
        assert_eq!(info.rule_name, "s");
        assert_eq!(info.alternatives, (0, 1));
        assert_eq!(info.tokens, vec!["A".to_string()]);
        assert!(info.description.contains("Alternatives 1 and 2"));
        assert_eq!(
            report.conflicts_between(info.decision_number, 0, 1),
            report.conflicts_between(info.decision_number, 1, 0)
        );
        assert_eq!(report.for_rule("s").count(), 1);
    }

    #[test]
    fn test_left_recursion_report_flags() {
        let report = analyze_left_recursion(
            "grammar G; s : e | a ; e : e '+' e | N ; a : b 'x' | 'y' ; b : a 'z' ; N : [0-9]+ ;",
        )
        .unwrap();
        assert!(report.has_left_recursion);
        assert!(report.has_direct_left_recursion);
        assert!(report.has_indirect_left_recursion);
        let e = report.rule("e").unwrap();
        assert_eq!(e.left_recursion_type, RecursionKind::Direct);
        assert!(e.eliminable);
        assert_eq!(report.rule("s").unwrap().left_recursion_type, RecursionKind::None);
        assert_eq!(report.unsupported_rules, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(report.cycles, vec![vec!["e".to_string()], vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn test_first_follow_report() {
        let report = analyze_first_follow("grammar G; s : a B ; a : A? ; A : 'a' ; B : 'b' ;").unwrap();
        assert_eq!(report.total_parser_rules, 2);
        assert_eq!(report.nullable_rule_count, 1);
        let a = report.rule("a").unwrap();
        assert_eq!(a.first_set, vec!["A".to_string()]);
        assert_eq!(a.follow_set, vec!["B".to_string()]);
        assert_eq!(report.rule("s").unwrap().follow_set, vec!["EOF".to_string()]);
        assert_eq!(report.decisions.len(), 1);
        assert_eq!(report.decisions[0].kind, "optional");
    }

    #[test]
    fn test_call_graph_formats() {
        let source = "grammar G; s : a ; a : s 'x' | 'y' ; z : 'q' ;";
        let dot = analyze_call_graph(source, GraphFormat::Dot).unwrap();
        assert!(dot.dot.as_deref().unwrap().starts_with("digraph"));
        assert!(dot.mermaid.is_none());
        assert_eq!(dot.unreachable, vec!["z".to_string()]);
        assert_eq!(dot.cycles, vec![vec!["s".to_string(), "a".to_string()]]);
        assert_eq!(dot.edge_count, 2);

        let mermaid = analyze_call_graph(source, GraphFormat::Mermaid).unwrap();
        assert!(mermaid.dot.is_none());
        assert!(mermaid.mermaid.is_some());
        assert_eq!("graphviz".parse::<GraphFormat>(), Ok(GraphFormat::Dot));
    }

    #[test]
    fn test_visualize_atn() {
        let report = visualize_atn(ROUTES, Some("handler")).unwrap();
        assert_eq!(report.rule_name, "handler");
        assert_eq!(report.state_count, report.states.len());
        assert!(report.states.iter().any(|s| s.kind == "start"));
        assert!(report.states.iter().any(|s| s.decision.is_some()));
        assert!(report.transitions.iter().any(|t| t.label == "ID"));
        assert!(report.total_state_count > report.state_count);
        assert!(report.dot.contains("digraph"));

        assert_eq!(visualize_atn(ROUTES, None).unwrap().rule_name, "file");
        assert_eq!(visualize_atn(ROUTES, Some("nope")).unwrap_err().kind(), "UnknownRuleError");
    }

    #[test]
    fn test_compile_stub_and_unknown_target() {
        let report = compile_grammar_multi_target(ROUTES, "ts", &CodegenOptions::default()).unwrap();
        assert_eq!(report.target, "typescript");
        assert!(!report.full_parser);
        assert_eq!(report.file_count, 1);
        assert_eq!(report.files[0].path, "routes_tables.ts");

        let err = compile_grammar_multi_target(ROUTES, "cobol", &CodegenOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedTargetError");
    }

    #[test]
    fn test_profile_matches_plain_parse() {
        let sample = "route GET /a -> A.b; route POST /c -> C.d;";
        let profiled = profile_grammar(ROUTES, sample, None).unwrap();
        let plain = parse_sample(ROUTES, sample, &ParseOptions::default()).unwrap();
        assert_eq!(profiled.tree, plain.tree);
        assert_eq!(profiled.parse_tree, plain.parse_tree);
        // ties go to the earlier rule
        assert_eq!(profiled.rules[0].rule_name, "route");
        assert_eq!(profiled.rules[0].invocations, 2);
        assert!(profiled.rule_invocations >= 5);
        assert!(!profiled.insights.is_empty());
        assert!(!profiled.optimization_hints.is_empty());
    }

    #[test]
    fn test_profile_from_another_rule() {
        let profiled = profile_grammar(ROUTES, "Users.list", Some("handler")).unwrap();
        assert_eq!(profiled.start_rule, "handler");
        assert_eq!(profiled.parse_tree, "(handler Users . list)");
        assert_eq!(profiled.rules.len(), 1);
        assert_eq!(profiled.ambiguity_count, 0);

        let err = profile_grammar(ROUTES, "x", Some("handlr")).unwrap_err();
        assert_eq!(err.kind(), "UnknownRuleError");
    }

    #[test]
    fn test_sample_ambiguity_reports_matching_alternatives() {
        let source = "grammar G; s : x EOF ; x : A B? | A ; A : 'a' ; B : 'b' ;";
        let fixed = detect_ambiguity(source).unwrap();
        assert!(fixed.has_ambiguities);
        assert!(!fixed.sample_checked);
        assert!(!fixed.ambiguity_detected);

        let report = detect_ambiguity_in_sample(source, "a", None).unwrap();
        assert!(report.sample_checked);
        assert!(report.ambiguity_detected);
        assert_eq!(report.ambiguities, fixed.ambiguities);
        let found = &report.sample_ambiguities[0];
        assert_eq!(found.rule_name, "x");
        assert_eq!(found.alternatives, [0, 1]);
        assert_eq!(found.tokens_consumed, 1);
        assert!(report.ambiguity_details[0].contains("rule `x` at offset 0"));

        // the second alternative stops short of `b`
        let clear = detect_ambiguity_in_sample(source, "ab", None).unwrap();
        assert!(clear.sample_checked);
        assert!(!clear.ambiguity_detected);
        assert!(clear.ambiguity_details.is_empty());
    }
}
