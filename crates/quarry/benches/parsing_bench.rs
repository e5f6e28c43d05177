//! Lexing and recognition throughput

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use quarry::analysis::{FirstFollow, LeftRecursion};
use quarry::grammar::parse_grammar;
use quarry::lexer::Lexer;
use quarry::parser::{Recognizer, RecognizerConfig};
use std::fmt::Write;
use std::hint::black_box;

const ARITH: &str = r"
grammar Arith;
prog : expr EOF ;
expr : expr ('*' | '/') expr
     | expr ('+' | '-') expr
     | '(' expr ')'
     | NUMBER
     ;
NUMBER : [0-9]+ ;
WS     : [ \t\r\n]+ -> skip ;
";

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

fn arithmetic_input(terms: usize) -> String {
    let mut input = String::from("1");
    for i in 0..terms {
        let op = ["+", "*", "-", "/"][i % 4];
        if i % 7 == 0 {
            let _ = write!(input, " {op} ({i} + {})", i + 1);
        } else {
            let _ = write!(input, " {op} {}", i + 1);
        }
    }
    input
}

fn json_input(entries: usize) -> String {
    let mut input = String::from("{");
    for i in 0..entries {
        if i > 0 {
            input.push_str(", ");
        }
        let _ = write!(
            input,
            r#""key{i}": {{"id": {i}, "tags": ["a", "b"], "ok": true, "score": {i}.5, "next": {{}}}}"#
        );
    }
    input.push('}');
    input
}

fn bench_lexing(c: &mut Criterion) {
    let grammar = parse_grammar(JSON).unwrap();
    let lexer = Lexer::new(&grammar);
    let mut group = c.benchmark_group("lexing");
    for entries in [10, 100, 1000] {
        let input = json_input(entries);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("json", entries), &input, |b, input| {
            b.iter(|| black_box(lexer.tokenize(input).unwrap()));
        });
    }
    group.finish();
}

fn bench_precedence_climbing(c: &mut Criterion) {
    let grammar = parse_grammar(ARITH).unwrap();
    let sets = FirstFollow::compute(&grammar);
    let recursion = LeftRecursion::compute(&grammar, &sets);
    let recognizer = Recognizer::new(&grammar, &sets, &recursion);
    let lexer = Lexer::new(&grammar);

    let mut group = c.benchmark_group("arithmetic");
    for terms in [10, 100, 1000] {
        let tokens = lexer.tokenize(&arithmetic_input(terms)).unwrap();
        group.throughput(Throughput::Elements(tokens.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", terms), &tokens, |b, tokens| {
            b.iter(|| black_box(recognizer.parse(tokens).unwrap()));
        });
    }
    group.finish();
}

fn bench_speculation(c: &mut Criterion) {
    let grammar = parse_grammar(JSON).unwrap();
    let sets = FirstFollow::compute(&grammar);
    let recursion = LeftRecursion::compute(&grammar, &sets);
    let tokens = Lexer::new(&grammar).tokenize(&json_input(200)).unwrap();
    let start = grammar.start_rule();

    let speculating = Recognizer::new(&grammar, &sets, &recursion);
    c.bench_function("json_parse_speculating", |b| {
        b.iter(|| black_box(speculating.parse(&tokens).unwrap()));
    });

    c.bench_function("json_parse_profiled", |b| {
        b.iter(|| black_box(speculating.parse_profiled(&tokens, start).unwrap()));
    });

    let first_match = Recognizer::new(&grammar, &sets, &recursion)
        .with_config(RecognizerConfig::default().with_speculation(false));
    let flat = Lexer::new(&grammar).tokenize("[1, 2, 3, 4, 5, 6, 7, 8]").unwrap();
    c.bench_function("json_parse_first_match", |b| {
        b.iter(|| black_box(first_match.parse(&flat).unwrap()));
    });
}

criterion_group!(benches, bench_lexing, bench_precedence_climbing, bench_speculation);
criterion_main!(benches);
