//! Plain-text rendering of operation reports

use quarry::{Grammar, RecursionKind};
use quarry::ops::{
    AmbiguityReport, AtnReport, CallGraphReport, CompileReport, FirstFollowReport, GraphFormat,
    LeftRecursionReport, ParseReport, ProfileReport, ValidationReport,
};
use std::fmt::Write;

#[must_use]
pub fn validation(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "grammar {} is valid", report.grammar_name);
    let _ = writeln!(out, "  start rule:   {}", report.start_rule);
    let _ = writeln!(
        out,
        "  rules:        {} ({} parser, {} lexer)",
        report.rule_count, report.parser_rule_count, report.lexer_rule_count
    );
    let _ = writeln!(out, "  tokens:       {}", report.token_count);
    let _ = writeln!(out, "  decisions:    {}", report.decision_count);
    let _ = writeln!(out, "  atn states:   {}", report.atn_state_count);
    out.push('\n');
    let width = report.rules.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for rule in &report.rules {
        let marker = if rule.fragment { " (fragment)" } else { "" };
        let _ = writeln!(out, "  {:width$} : {}{marker}", rule.name, rule.definition);
    }
    if !report.warnings.is_empty() {
        out.push('\n');
        for warning in &report.warnings {
            let _ = writeln!(out, "warning: {warning}");
        }
    }
    out
}

/// `outline` switches from the LISP form to an indented tree
#[must_use]
pub fn parse(report: &ParseReport, outline: Option<&Grammar>) -> String {
    let mut out = String::new();
    match outline {
        Some(grammar) => out.push_str(&report.tree.to_outline(grammar)),
        None => {
            out.push_str(&report.parse_tree);
            out.push('\n');
        }
    }
    let _ = writeln!(
        out,
        "\n{} nodes, depth {}, {} tokens from `{}`",
        report.node_count, report.depth, report.token_count, report.start_rule
    );
    if let Some(tokens) = &report.tokens {
        out.push('\n');
        for token in tokens {
            let _ = writeln!(
                out,
                "  {:>5}..{:<5} {:<16} {:?}{}",
                token.start,
                token.end,
                token.kind,
                token.text,
                if token.channel == "DEFAULT_TOKEN_CHANNEL" {
                    String::new()
                } else {
                    format!(" [{}]", token.channel)
                }
            );
        }
    }
    out
}

#[must_use]
pub fn ambiguity(report: &AmbiguityReport) -> String {
    let mut out = String::new();
    if report.has_ambiguities {
        conflicts(report, &mut out);
    } else {
        let _ = writeln!(
            out,
            "no LL(1) conflicts in {} ({} decisions checked)",
            report.grammar_name, report.decisions_checked
        );
    }
    if report.sample_checked {
        if report.ambiguity_detected {
            let _ = writeln!(out, "\nsample matched {} decisions more than one way", report.sample_ambiguities.len());
            for detail in &report.ambiguity_details {
                let _ = writeln!(out, "  {detail}");
            }
        } else {
            out.push_str("\nno ambiguity in the sample\n");
        }
    }
    out
}

fn conflicts(report: &AmbiguityReport, out: &mut String) {
    let _ = writeln!(
        out,
        "{} conflicts in {} ({} decisions checked)",
        report.ambiguities.len(),
        report.grammar_name,
        report.decisions_checked
    );
    for info in &report.ambiguities {
        let _ = writeln!(
            out,
            "  decision {} in `{}`: {} [{}]",
            info.decision_number,
            info.rule_name,
            info.description,
            info.tokens.join(" ")
        );
    }
}

#[must_use]
pub fn left_recursion(report: &LeftRecursionReport) -> String {
    let mut out = String::new();
    if !report.has_left_recursion {
        let _ = writeln!(out, "no left recursion in {}", report.grammar_name);
        return out;
    }
    for rule in report.rules.iter().filter(|r| r.left_recursion_type != RecursionKind::None) {
        let alternatives: Vec<String> = rule.alternatives.iter().map(|a| (a + 1).to_string()).collect();
        let _ = writeln!(
            out,
            "  {:<16} {:<9} alternatives [{}]{}",
            rule.rule_name,
            rule.left_recursion_type,
            alternatives.join(", "),
            if rule.eliminable { "  eliminable" } else { "" }
        );
    }
    for cycle in &report.cycles {
        let _ = writeln!(out, "  cycle: {}", cycle.join(" -> "));
    }
    if !report.unsupported_rules.is_empty() {
        let _ = writeln!(out, "unsupported: {}", report.unsupported_rules.join(", "));
    }
    out
}

/// `only` restricts the listing to one rule
#[must_use]
pub fn first_follow(report: &FirstFollowReport, only: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {} parser rules, {} nullable, {} with conflicts, fixed point after {} iterations",
        report.grammar_name,
        report.total_parser_rules,
        report.nullable_rule_count,
        report.rules_with_conflicts,
        report.iterations
    );
    for rule in report.rules.iter().filter(|r| only.is_none_or(|name| r.rule_name == name)) {
        let _ = writeln!(
            out,
            "\n{}{}{}",
            rule.rule_name,
            if rule.nullable { " (nullable)" } else { "" },
            if rule.has_conflict { " (conflict)" } else { "" }
        );
        let _ = writeln!(out, "  FIRST  {{{}}}", rule.first_set.join(", "));
        let _ = writeln!(out, "  FOLLOW {{{}}}", rule.follow_set.join(", "));
    }
    let conflicted: Vec<_> = report
        .decisions
        .iter()
        .filter(|d| d.ambiguous_lookahead && only.is_none_or(|name| d.rule_name == name))
        .collect();
    if !conflicted.is_empty() {
        out.push('\n');
        for decision in conflicted {
            let _ = writeln!(
                out,
                "decision {} ({} in `{}`) shares lookahead {{{}}}",
                decision.decision_number,
                decision.kind,
                decision.rule_name,
                decision.conflict_tokens.join(", ")
            );
        }
    }
    out
}

#[must_use]
pub fn call_graph(report: &CallGraphReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "// {}: {} rules, {} calls, entry `{}`",
        report.grammar_name, report.node_count, report.edge_count, report.entry
    );
    for cycle in &report.cycles {
        let _ = writeln!(out, "// cycle: {}", cycle.join(" -> "));
    }
    if !report.unreachable.is_empty() {
        let _ = writeln!(out, "// unreachable: {}", report.unreachable.join(", "));
    }
    for rendering in [&report.dot, &report.mermaid].into_iter().flatten() {
        out.push('\n');
        out.push_str(rendering);
    }
    out
}

#[must_use]
pub fn atn(report: &AtnReport, format: GraphFormat) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "// rule `{}`: {} states, {} transitions (grammar total {} / {})",
        report.rule_name,
        report.state_count,
        report.transition_count,
        report.total_state_count,
        report.total_transition_count
    );
    if matches!(format, GraphFormat::Dot | GraphFormat::Both) {
        out.push_str(&report.dot);
    }
    if matches!(format, GraphFormat::Mermaid | GraphFormat::Both) {
        out.push('\n');
        out.push_str(&report.mermaid);
    }
    out
}

#[must_use]
pub fn compile(report: &CompileReport) -> String {
    let mut out = String::new();
    for file in &report.files {
        let _ = writeln!(out, "// ==== {} ====", file.path);
        out.push_str(&file.contents);
        if !file.contents.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// One line per file written to disk
#[must_use]
pub fn compile_summary(report: &CompileReport, dir: &std::path::Path) -> String {
    let mut out = String::new();
    for file in &report.files {
        let _ = writeln!(out, "wrote {} ({} bytes)", dir.join(&file.path).display(), file.contents.len());
    }
    let kind = if report.full_parser { "parser" } else { "tables" };
    let _ = writeln!(
        out,
        "{} {kind} for {}: {} files, {} bytes",
        report.target, report.grammar_name, report.file_count, report.total_bytes
    );
    out
}

#[must_use]
pub fn profile(report: &ProfileReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "parsed {} tokens into {} nodes in {:.3} ms",
        report.token_count,
        report.node_count,
        report.total_time_nanos as f64 / 1e6
    );
    let _ = writeln!(
        out,
        "{} rule invocations, {} decisions, {} speculations, {} ambiguities",
        report.rule_invocations, report.decision_invocations, report.speculations, report.ambiguity_count
    );
    out.push_str("\nrules\n");
    for rule in report.rules.iter().take(10) {
        let _ = writeln!(
            out,
            "  {:<20} {:>8} calls {:>10.1} us",
            rule.rule_name,
            rule.invocations,
            rule.time_nanos as f64 / 1e3
        );
    }
    let speculated: Vec<_> = report.decisions.iter().filter(|d| d.speculations > 0).collect();
    if !speculated.is_empty() {
        out.push_str("\nspeculating decisions\n");
        for decision in speculated {
            let _ = writeln!(
                out,
                "  {:>4} in {:<16} {:>6} of {} visits, lookahead up to {}",
                decision.decision_number,
                decision.rule_name,
                decision.speculations,
                decision.invocations,
                decision.max_lookahead
            );
        }
    }
    for insight in &report.insights {
        let _ = writeln!(out, "insight: {insight}");
    }
    for hint in &report.optimization_hints {
        let _ = writeln!(out, "hint: {hint}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry::ops::{self, ParseOptions};

    const KV: &str = "grammar Kv; file : pair* EOF ; pair : KEY '=' KEY ';' ; KEY : [a-z]+ ; WS : ' '+ -> skip ;";

    #[test]
    fn test_validation_lists_rules() {
        let text = validation(&ops::validate_grammar(KV).unwrap());
        assert!(text.starts_with("grammar Kv is valid\n"));
        assert!(text.contains("pair : KEY '=' KEY ';'"));
        assert!(!text.contains("warning:"));
    }

    #[test]
    fn test_parse_with_tokens() {
        let report = ops::parse_sample(KV, "a = b;", &ParseOptions::default().with_tokens(true)).unwrap();
        let text = parse(&report, None);
        assert!(text.starts_with("(file (pair a = b ;) <EOF>)\n"));
        assert!(text.contains("\"=\""));
    }

    #[test]
    fn test_left_recursion_without_recursion() {
        let text = left_recursion(&ops::analyze_left_recursion(KV).unwrap());
        assert_eq!(text, "no left recursion in Kv\n");
    }

    #[test]
    fn test_first_follow_filter() {
        let text = first_follow(&ops::analyze_first_follow(KV).unwrap(), Some("pair"));
        assert!(text.contains("\npair\n  FIRST  {KEY}\n"));
        assert!(!text.contains("\nfile"));
    }

    #[test]
    fn test_ambiguity_with_sample_section() {
        let source = "grammar Opt; s : x EOF ; x : A B? | A ; A : 'a' ; B : 'b' ;";
        let text = ambiguity(&ops::detect_ambiguity_in_sample(source, "a", None).unwrap());
        assert!(text.starts_with("1 conflicts in Opt"));
        assert!(text.contains("\nsample matched 1 decisions more than one way\n"));
        assert!(text.contains("rule `x` at offset 0"));

        let text = ambiguity(&ops::detect_ambiguity(KV).unwrap());
        assert!(text.starts_with("no LL(1) conflicts in Kv"));
        assert!(!text.contains("sample"));
    }

    #[test]
    fn test_compile_prints_every_file() {
        let report = ops::compile_grammar_multi_target(KV, "python", &quarry::CodegenOptions::default()).unwrap();
        let text = compile(&report);
        assert_eq!(text.matches("// ==== ").count(), report.file_count);
    }
}
