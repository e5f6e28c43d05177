#![no_main]
use libfuzzer_sys::fuzz_target;
use quarry::analysis::{Ambiguities, CallGraph, FirstFollow, LeftRecursion};
use quarry::automaton::build_automaton;
use quarry::grammar::parse_grammar;

// Grammar text in, either a GrammarError or a grammar every analysis accepts
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(grammar) = parse_grammar(source) else {
        return;
    };

    let sets = FirstFollow::compute(&grammar);
    assert_eq!(sets, FirstFollow::compute(&grammar));
    let recursion = LeftRecursion::compute(&grammar, &sets);
    let ambiguities = Ambiguities::compute(&grammar, &sets, &recursion);
    for decision in grammar.decisions() {
        for i in 0..decision.alternatives {
            for j in 0..i {
                assert_eq!(
                    ambiguities.conflicts_between(decision.id, i, j),
                    ambiguities.conflicts_between(decision.id, j, i)
                );
            }
        }
    }

    let atn = build_automaton(&grammar);
    let graph = CallGraph::build(&grammar, &atn);
    let _ = graph.to_dot(&grammar, Some(&recursion));
    let _ = quarry::codegen::emit(&grammar, &atn, "python", &Default::default());
});
