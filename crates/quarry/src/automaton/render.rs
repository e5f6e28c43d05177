//! Graphviz and Mermaid text for one rule's part of the network.

use super::{Automaton, AtnState, StateKind, Transition};
use crate::grammar::{Grammar, RuleId};
use std::fmt::Write;

/// Escape text for a double-quoted DOT attribute
#[must_use]
pub fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escape text for a quoted Mermaid label
#[must_use]
pub fn escape_mermaid(text: &str) -> String {
    text.replace('"', "#quot;")
}

fn state_label(grammar: &Grammar, state: &AtnState) -> String {
    let base = match state.kind {
        StateKind::RuleStart => format!("{} start", grammar.rule(state.rule).name),
        StateKind::RuleStop => format!("{} stop", grammar.rule(state.rule).name),
        StateKind::Basic => state.id.0.to_string(),
    };
    match state.decision {
        Some(decision) => format!("{base} d{}", decision.0),
        None => base,
    }
}

/// Render `rule`'s states and transitions as a Graphviz digraph
#[must_use]
pub fn to_dot(grammar: &Grammar, atn: &Automaton, rule: RuleId) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", escape_dot(&grammar.rule(rule).name));
    out.push_str("  rankdir=LR;\n  node [shape=circle];\n");
    for state in atn.rule_states(rule) {
        let shape = match state.kind {
            StateKind::RuleStop => "doublecircle",
            StateKind::RuleStart => "box",
            StateKind::Basic if state.decision.is_some() => "diamond",
            StateKind::Basic => "circle",
        };
        let _ = writeln!(
            out,
            "  s{} [label=\"{}\", shape={shape}];",
            state.id.0,
            escape_dot(&state_label(grammar, state))
        );
    }
    for state in atn.rule_states(rule) {
        for transition in &state.transitions {
            let label = escape_dot(&transition.label(grammar));
            match transition {
                Transition::Call { follow, .. } => {
                    let _ = writeln!(
                        out,
                        "  s{} -> s{} [label=\"{label}\", style=bold];",
                        state.id.0, follow.0
                    );
                }
                Transition::Terminal { target, .. } => {
                    let _ = writeln!(out, "  s{} -> s{} [label=\"{label}\"];", state.id.0, target.0);
                }
                Transition::Epsilon { target } => {
                    let _ = writeln!(
                        out,
                        "  s{} -> s{} [label=\"{label}\", style=dashed];",
                        state.id.0, target.0
                    );
                }
            }
        }
    }
    out.push_str("}\n");
    out
}

/// Render `rule`'s states and transitions as a Mermaid flowchart
///
/// Call edges point at the return state and are labelled with the callee,
/// so the chart stays within one rule.
#[must_use]
pub fn to_mermaid(grammar: &Grammar, atn: &Automaton, rule: RuleId) -> String {
    let mut out = String::from("flowchart LR\n");
    for state in atn.rule_states(rule) {
        let label = escape_mermaid(&state_label(grammar, state));
        let _ = match state.kind {
            StateKind::RuleStart => writeln!(out, "  s{}[\"{label}\"]", state.id.0),
            StateKind::RuleStop => writeln!(out, "  s{}((\"{label}\"))", state.id.0),
            StateKind::Basic if state.decision.is_some() => writeln!(out, "  s{}{{\"{label}\"}}", state.id.0),
            StateKind::Basic => writeln!(out, "  s{}((\"{label}\"))", state.id.0),
        };
    }
    for state in atn.rule_states(rule) {
        for transition in &state.transitions {
            let label = escape_mermaid(&transition.label(grammar));
            let (arrow, target) = match transition {
                Transition::Call { follow, .. } => ("==>", *follow),
                Transition::Terminal { target, .. } => ("-->", *target),
                Transition::Epsilon { target } => ("-.->", *target),
            };
            let _ = writeln!(out, "  s{} {arrow}|\"{label}\"| s{}", state.id.0, target.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::build_automaton;
    use crate::grammar::parse_grammar;

    #[test]
    fn test_dot_output() {
        let grammar = parse_grammar("s : '\"' b ; b : 'x' ;").unwrap();
        let atn = build_automaton(&grammar);
        let dot = to_dot(&grammar, &atn, RuleId(0));
        assert!(dot.starts_with("digraph \"s\" {"));
        assert!(dot.contains("label=\"'\\\"'\""));
        assert!(dot.contains("label=\"b\", style=bold"));
        assert!(dot.contains("shape=doublecircle"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_mermaid_output() {
        let grammar = parse_grammar("s : A (A | B) ; A : 'a' ; B : 'b' ;").unwrap();
        let atn = build_automaton(&grammar);
        let chart = to_mermaid(&grammar, &atn, RuleId(0));
        assert!(chart.starts_with("flowchart LR\n"));
        assert!(chart.contains("|\"A\"|"));
        assert!(chart.contains("d0"));
        assert!(chart.contains("-.->|\"ε\"|"));
    }
}
