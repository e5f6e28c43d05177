//! Rule dependency graph derived from the automaton's call transitions.

use super::left_recursion::LeftRecursion;
use crate::automaton::{Automaton, escape_dot, escape_mermaid};
use crate::grammar::{Grammar, RuleId};
use std::fmt::Write;

/// Caller to callee edges between parser rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGraph {
    /// Every parser rule, in declaration order
    pub nodes: Vec<RuleId>,
    /// Distinct `(caller, callee)` pairs, sorted
    pub edges: Vec<(RuleId, RuleId)>,
    /// Strongly connected components with more than one rule or a self loop
    pub cycles: Vec<Vec<RuleId>>,
    /// Rules no path from the start rule reaches
    pub unreachable: Vec<RuleId>,
    pub entry: RuleId,
}

/// Build the call graph of `grammar` from `atn`
#[must_use]
pub fn analyze_call_graph(grammar: &Grammar, atn: &Automaton) -> CallGraph {
    CallGraph::build(grammar, atn)
}

impl CallGraph {
    #[must_use]
    pub fn build(grammar: &Grammar, atn: &Automaton) -> Self {
        let count = grammar.parser_rules().len();
        let mut edges: Vec<(RuleId, RuleId)> = atn.calls().collect();
        edges.sort_unstable();
        edges.dedup();

        let adjacency = adjacency(count, edges.iter().map(|(a, b)| (a.index(), b.index())));
        let cycles = strongly_connected(&adjacency)
            .into_iter()
            .filter(|scc| scc.len() > 1 || adjacency[scc[0]].contains(&scc[0]))
            .map(|scc| scc.into_iter().map(to_rule).collect())
            .collect();

        let entry = grammar.start_rule();
        let mut reached = vec![false; count];
        let mut stack = vec![entry.index()];
        reached[entry.index()] = true;
        while let Some(node) = stack.pop() {
            for &next in &adjacency[node] {
                if !reached[next] {
                    reached[next] = true;
                    stack.push(next);
                }
            }
        }
        let unreachable = (0..count).filter(|&i| !reached[i]).map(to_rule).collect();

        Self {
            nodes: grammar.parser_rules().iter().map(|r| r.id).collect(),
            edges,
            cycles,
            unreachable,
            entry,
        }
    }

    /// Rules called directly by `rule`
    pub fn callees(&self, rule: RuleId) -> impl Iterator<Item = RuleId> + '_ {
        self.edges
            .iter()
            .filter(move |(caller, _)| *caller == rule)
            .map(|(_, callee)| *callee)
    }

    #[must_use]
    pub fn is_unreachable(&self, rule: RuleId) -> bool {
        self.unreachable.contains(&rule)
    }

    /// Graphviz rendering; left-recursive rules red, unreachable rules gray
    #[must_use]
    pub fn to_dot(&self, grammar: &Grammar, recursion: Option<&LeftRecursion>) -> String {
        let mut out = format!("digraph \"{}\" {{\n  node [shape=box];\n", escape_dot(grammar.name()));
        for &rule in &self.nodes {
            let name = escape_dot(&grammar.rule(rule).name);
            let style = if recursion.is_some_and(|lr| lr.is_left_recursive(rule)) {
                ", color=red, fontcolor=red"
            } else if self.is_unreachable(rule) {
                ", color=gray, fontcolor=gray"
            } else if rule == self.entry {
                ", style=bold"
            } else {
                ""
            };
            let _ = writeln!(out, "  r{} [label=\"{name}\"{style}];", rule.0);
        }
        for (caller, callee) in &self.edges {
            let _ = writeln!(out, "  r{} -> r{};", caller.0, callee.0);
        }
        out.push_str("}\n");
        out
    }

    /// Mermaid rendering with the same highlighting as [`Self::to_dot`]
    #[must_use]
    pub fn to_mermaid(&self, grammar: &Grammar, recursion: Option<&LeftRecursion>) -> String {
        let mut out = String::from("graph TD\n");
        for &rule in &self.nodes {
            let _ = writeln!(
                out,
                "  r{}[\"{}\"]",
                rule.0,
                escape_mermaid(&grammar.rule(rule).name)
            );
        }
        for (caller, callee) in &self.edges {
            let _ = writeln!(out, "  r{} --> r{}", caller.0, callee.0);
        }
        out.push_str("  classDef leftrec stroke:#d33,color:#d33\n");
        out.push_str("  classDef unreachable stroke:#999,color:#999\n");
        for &rule in &self.nodes {
            if recursion.is_some_and(|lr| lr.is_left_recursive(rule)) {
                let _ = writeln!(out, "  class r{} leftrec", rule.0);
            } else if self.is_unreachable(rule) {
                let _ = writeln!(out, "  class r{} unreachable", rule.0);
            }
        }
        out
    }
}

fn to_rule(index: usize) -> RuleId {
    RuleId(u32::try_from(index).unwrap_or(u32::MAX))
}

pub(crate) fn adjacency(count: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); count];
    for (from, to) in edges {
        if !adjacency[from].contains(&to) {
            adjacency[from].push(to);
        }
    }
    adjacency
}

/// Tarjan's strongly connected components
///
/// Each component is sorted; components come out in reverse topological
/// order of the condensed graph.
pub(crate) fn strongly_connected(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct Tarjan<'a> {
        adjacency: &'a [Vec<usize>],
        index: Vec<Option<usize>>,
        low: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next: usize,
        out: Vec<Vec<usize>>,
    }

    impl Tarjan<'_> {
        fn visit(&mut self, v: usize) {
            self.index[v] = Some(self.next);
            self.low[v] = self.next;
            self.next += 1;
            self.stack.push(v);
            self.on_stack[v] = true;
            let adjacency = self.adjacency;
            for &w in &adjacency[v] {
                match self.index[w] {
                    None => {
                        self.visit(w);
                        self.low[v] = self.low[v].min(self.low[w]);
                    }
                    Some(index) if self.on_stack[w] => self.low[v] = self.low[v].min(index),
                    Some(_) => {}
                }
            }
            if Some(self.low[v]) == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                self.out.push(component);
            }
        }
    }

    let n = adjacency.len();
    let mut tarjan = Tarjan {
        adjacency,
        index: vec![None; n],
        low: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next: 0,
        out: Vec::new(),
    };
    for v in 0..n {
        if tarjan.index[v].is_none() {
            tarjan.visit(v);
        }
    }
    tarjan.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::build_automaton;
    use crate::grammar::parse_grammar;

    #[test]
    fn test_tarjan_components() {
        let adjacency = adjacency(5, [(0, 1), (1, 2), (2, 0), (3, 3), (3, 4)]);
        let mut sccs = strongly_connected(&adjacency);
        sccs.sort();
        assert_eq!(sccs, vec![vec![0, 1, 2], vec![3], vec![4]]);
    }

    #[test]
    fn test_cycles_and_unreachable() {
        let grammar = parse_grammar(
            "prog : stat+ ; stat : expr ';' ; expr : '(' expr ')' | ID ; orphan : ID ; ID : [a-z]+ ;",
        )
        .unwrap();
        let atn = build_automaton(&grammar);
        let graph = analyze_call_graph(&grammar, &atn);
        let expr = grammar.rule_by_name("expr").unwrap().id;
        let orphan = grammar.rule_by_name("orphan").unwrap().id;
        assert_eq!(graph.cycles, vec![vec![expr]]);
        assert_eq!(graph.unreachable, vec![orphan]);
        assert_eq!(graph.callees(RuleId(0)).collect::<Vec<_>>(), vec![RuleId(1)]);
        let dot = graph.to_dot(&grammar, None);
        assert!(dot.contains("label=\"orphan\", color=gray"));
        assert!(graph.to_mermaid(&grammar, None).contains("class r3 unreachable"));
    }
}
