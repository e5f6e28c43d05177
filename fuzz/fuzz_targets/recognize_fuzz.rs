#![no_main]
use libfuzzer_sys::fuzz_target;
use quarry::analysis::{FirstFollow, LeftRecursion};
use quarry::grammar::{Grammar, parse_grammar};
use quarry::lexer::Lexer;
use quarry::parser::{Recognizer, RecognizerConfig};
use std::sync::OnceLock;

const JSON: &str = r#"
grammar Json;
json   : value EOF ;
value  : obj | arr | STRING | NUMBER | 'true' | 'false' | 'null' ;
obj    : '{' pair (',' pair)* '}' | '{' '}' ;
pair   : STRING ':' value ;
arr    : '[' value (',' value)* ']' | '[' ']' ;
STRING : '"' (ESC | ~["\\])* '"' ;
fragment ESC : '\\' ["\\/bfnrt] ;
NUMBER : '-'? INT ('.' [0-9]+)? ;
fragment INT : '0' | [1-9] [0-9]* ;
WS     : [ \t\n\r]+ -> skip ;
"#;

fn grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| parse_grammar(JSON).unwrap())
}

// Arbitrary text through the lexer and a speculating recognizer with a low depth bound
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let grammar = grammar();
    let Ok(tokens) = Lexer::new(grammar).tokenize(input) else {
        return;
    };
    assert!(tokens.last().is_some_and(|t| t.is_eof()));

    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    let recognizer = Recognizer::new(grammar, &sets, &recursion)
        .with_config(RecognizerConfig::default().with_max_depth(64));
    let start = grammar.start_rule();
    let plain = recognizer.parse(&tokens);
    let profiled = recognizer.parse_profiled(&tokens, start).map(|(tree, _)| tree);
    assert_eq!(plain, profiled);
    if let Ok(tree) = plain {
        assert_eq!(tree.text(tree.root()), tokens.iter().filter(|t| !t.is_eof() && !t.is_hidden()).map(|t| t.text.as_str()).collect::<String>());
    }
});
