//! End-to-end scenarios: grammar text in, trees, reports and errors out

use quarry::analysis::{Ambiguities, FirstFollow, LeftRecursion, RecursionKind};
use quarry::codegen::{BackendRegistry, CodegenOptions};
use quarry::error::RecognizeError;
use quarry::grammar::{Grammar, TokenId, parse_grammar};
use quarry::lexer::tokenize;
use quarry::ops::{ParseOptions, compile_grammar_multi_target, parse_sample};
use quarry::parser::{NodeId, ParseTree, parse, parse_profiled};

const CALC: &str = r"
grammar Calc;
prog : expr EOF ;
expr : <assoc=right> expr '^' expr   # pow
     | expr ('*' | '/') expr         # mul
     | expr ('+' | '-') expr         # add
     | '(' expr ')'                  # parens
     | NUMBER                        # num
     ;
NUMBER : [0-9]+ ;
WS     : [ \t\r\n]+ -> skip ;
";

const ROUTES: &str = r"
grammar Routes;
file    : route* EOF ;
route   : 'route' method=METHOD path=PATH '->' handler ';' ;
handler : ID ('.' ID)* ;
METHOD  : 'GET' | 'POST' | 'PUT' | 'DELETE' | 'PATCH' ;
PATH    : '/' [a-zA-Z0-9_/]* ;
ID      : [a-zA-Z_] [a-zA-Z0-9_]* ;
WS      : [ \t\r\n]+ -> skip ;
LINE_COMMENT : '//' ~[\r\n]* -> channel(HIDDEN) ;
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

fn eval(tree: &ParseTree, id: NodeId) -> i64 {
    let node = tree.node(id);
    let children = node.children();
    match node.label() {
        Some("num") => tree.text(id).parse().unwrap(),
        Some("parens") => eval(tree, children[1]),
        Some(_) => {
            let lhs = eval(tree, children[0]);
            let rhs = eval(tree, children[2]);
            match tree.node(children[1]).token().unwrap().text.as_str() {
                "^" => lhs.pow(u32::try_from(rhs).unwrap()),
                "*" => lhs * rhs,
                "/" => lhs / rhs,
                "+" => lhs + rhs,
                "-" => lhs - rhs,
                op => panic!("unexpected operator {op}"),
            }
        }
        // prog
        None => eval(tree, children[0]),
    }
}

fn calc(input: &str) -> (Grammar, ParseTree) {
    let grammar = parse_grammar(CALC).unwrap();
    let tokens = tokenize(&grammar, input).unwrap();
    let tree = parse(&grammar, &tokens).unwrap();
    (grammar, tree)
}

#[test]
fn test_arithmetic_precedence() {
    let (grammar, tree) = calc("2 + 3 * 4");
    assert_eq!(eval(&tree, tree.root()), 14);

    let expr = tree.children(tree.root())[0];
    assert_eq!(tree.node(expr).label(), Some("add"));
    let rhs = tree.children(expr)[2];
    assert_eq!(tree.node(rhs).label(), Some("mul"));
    assert_eq!(
        tree.to_lisp(&grammar),
        "(prog (expr (expr 2) + (expr (expr 3) * (expr 4))) <EOF>)"
    );
}

#[test]
fn test_arithmetic_parentheses_and_associativity() {
    for (input, expected) in [
        ("(10 + 5) * 2", 30),
        ("10 - 4 - 3", 3),
        ("8 / 2 / 2", 2),
        ("2 ^ 3 ^ 2", 512),
        ("1 + 2 ^ 2 * 3", 13),
        ("((7))", 7),
    ] {
        let (_, tree) = calc(input);
        assert_eq!(eval(&tree, tree.root()), expected, "{input}");
    }
}

#[test]
fn test_route_dsl() {
    let grammar = parse_grammar(ROUTES).unwrap();
    let tokens = tokenize(&grammar, "// users\nroute GET /users -> Users.list;").unwrap();
    assert_eq!(tokens[0].channel, 1);
    let tree = parse(&grammar, &tokens).unwrap();

    let route_rule = grammar.rule_by_name("route").unwrap().id;
    let routes: Vec<NodeId> = tree.find_rule(tree.root(), route_rule).collect();
    assert_eq!(routes.len(), 1);
    let route = routes[0];
    let method = tree.child_by_field(route, "method").unwrap();
    let path = tree.child_by_field(route, "path").unwrap();
    assert_eq!(tree.text(method), "GET");
    assert_eq!(tree.text(path), "/users");

    let handler_rule = grammar.rule_by_name("handler").unwrap().id;
    let handler = tree.find_rule(route, handler_rule).next().unwrap();
    assert_eq!(tree.text(handler), "Users.list");
}

#[test]
fn test_route_error_expects_route_keyword() {
    let grammar = parse_grammar(ROUTES).unwrap();
    let tokens = tokenize(&grammar, "GET /users;").unwrap();
    let Err(RecognizeError::Parse(err)) = parse(&grammar, &tokens) else {
        panic!("expected a parse error");
    };
    assert_eq!(err.offset, 0);
    assert!(err.expects("'route'"), "{:?}", err.expected);
    assert_eq!(err.found, "METHOD");
    assert_eq!(err.found_text, "GET");
}

#[test]
fn test_keyword_declared_first_wins() {
    let keyword_first = parse_grammar(
        "grammar Sql; query : SELECT IDENTIFIER FROM IDENTIFIER ; \
         SELECT : 'SELECT' ; FROM : 'FROM' ; IDENTIFIER : [a-zA-Z_]+ ; WS : ' '+ -> skip ;",
    )
    .unwrap();
    let names = |grammar: &Grammar, input: &str| -> Vec<String> {
        tokenize(grammar, input)
            .unwrap()
            .iter()
            .map(|t| grammar.token(t.kind).name.to_string())
            .collect()
    };
    assert_eq!(
        names(&keyword_first, "SELECT name FROM users"),
        ["SELECT", "IDENTIFIER", "FROM", "IDENTIFIER", "EOF"]
    );
    // longest match still beats declaration order
    assert_eq!(names(&keyword_first, "SELECTED"), ["IDENTIFIER", "EOF"]);

    let identifier_first = parse_grammar(
        "grammar Sql; query : IDENTIFIER+ ; IDENTIFIER : [a-zA-Z_]+ ; SELECT : 'SELECT' ; WS : ' '+ -> skip ;",
    )
    .unwrap();
    assert_eq!(names(&identifier_first, "SELECT"), ["IDENTIFIER", "EOF"]);
}

#[test]
fn test_json_object_with_array() {
    let grammar = parse_grammar(JSON).unwrap();
    let tokens = tokenize(&grammar, r#"{"a": [1, 2, 3]}"#).unwrap();
    let tree = parse(&grammar, &tokens).unwrap();

    let rule = |name: &str| grammar.rule_by_name(name).unwrap().id;
    assert_eq!(tree.find_rule(tree.root(), rule("obj")).count(), 1);
    let pairs: Vec<NodeId> = tree.find_rule(tree.root(), rule("pair")).collect();
    assert_eq!(pairs.len(), 1);
    assert_eq!(tree.tokens(pairs[0]).next().unwrap().text, "\"a\"");

    let arr = tree.find_rule(pairs[0], rule("arr")).next().unwrap();
    let number = grammar.token_by_name("NUMBER").unwrap().id;
    let numbers: Vec<&str> = tree
        .tokens(arr)
        .filter(|t| t.kind == number)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(numbers, ["1", "2", "3"]);
}

#[test]
fn test_json_empty_containers_use_backtracking() {
    let grammar = parse_grammar(JSON).unwrap();
    for input in ["{}", "[]", r#"{"k": {}, "l": [true, null, -1.5]}"#] {
        let tokens = tokenize(&grammar, input).unwrap();
        assert!(parse(&grammar, &tokens).is_ok(), "{input}");
    }
}

#[test]
fn test_first_follow_is_idempotent() {
    for source in [CALC, ROUTES, JSON] {
        let grammar = parse_grammar(source).unwrap();
        assert_eq!(FirstFollow::compute(&grammar), FirstFollow::compute(&grammar));
    }
}

#[test]
fn test_follow_of_start_rule_contains_eof() {
    let grammar = parse_grammar("s : a 'x' ; a : 'y' ;").unwrap();
    let sets = FirstFollow::compute(&grammar);
    assert!(sets.follow(grammar.start_rule()).contains(TokenId::EOF));
}

#[test]
fn test_ambiguity_is_symmetric() {
    let grammar = parse_grammar(JSON).unwrap();
    let sets = FirstFollow::compute(&grammar);
    let recursion = LeftRecursion::compute(&grammar, &sets);
    let found = Ambiguities::compute(&grammar, &sets, &recursion);
    assert!(found.is_ambiguous());
    for decision in grammar.decisions() {
        for i in 0..decision.alternatives {
            for j in 0..decision.alternatives {
                assert_eq!(
                    found.conflicts_between(decision.id, i, j),
                    found.conflicts_between(decision.id, j, i)
                );
            }
        }
    }
}

#[test]
fn test_left_recursion_classification() {
    let grammar = parse_grammar("grammar G; expr : expr '+' expr | NUMBER ; stat : expr ';' ; NUMBER : [0-9]+ ;").unwrap();
    let sets = FirstFollow::compute(&grammar);
    let recursion = LeftRecursion::compute(&grammar, &sets);

    let expr = recursion.rule(grammar.rule_by_name("expr").unwrap().id);
    assert_eq!(expr.kind, RecursionKind::Direct);
    assert!(expr.eliminable);
    assert_eq!(expr.alternatives, vec![0]);
    assert_eq!(recursion.kind(grammar.rule_by_name("stat").unwrap().id), RecursionKind::None);
}

#[test]
fn test_indirect_left_recursion_fails_fast() {
    let grammar = parse_grammar("grammar G; a : b 'x' | 'y' ; b : a 'z' ;").unwrap();
    // the input is never looked at
    let tokens = tokenize(&grammar, "").unwrap();
    match parse(&grammar, &tokens) {
        Err(RecognizeError::UnsupportedLeftRecursion { rule, kind }) => {
            assert_eq!(rule, "a");
            assert_eq!(kind, "indirect");
        }
        other => panic!("expected UnsupportedLeftRecursion, got {other:?}"),
    }
}

#[test]
fn test_profiling_does_not_change_tree() {
    let grammar = parse_grammar(JSON).unwrap();
    let tokens = tokenize(&grammar, r#"{"a": [1, {"b": {}}], "c": "d"}"#).unwrap();
    let plain = parse(&grammar, &tokens).unwrap();
    let (profiled, profile) = parse_profiled(&grammar, &tokens).unwrap();
    assert_eq!(plain, profiled);
    assert_eq!(profile.nodes, plain.len());
    assert!(profile.speculations() > 0);
}

#[test]
fn test_every_target_compiles_valid_grammars() {
    let registry = BackendRegistry::default();
    for source in [CALC, ROUTES, JSON] {
        for target in registry.targets() {
            let report = compile_grammar_multi_target(source, target, &CodegenOptions::default())
                .unwrap_or_else(|err| panic!("{target}: {err}"));
            assert_eq!(report.target, target);
            assert!(report.file_count >= 1);
        }
    }
}

#[test]
fn test_parse_sample_reports_lisp_tree() {
    let report = parse_sample(ROUTES, "route POST /a -> A.b;", &ParseOptions::default()).unwrap();
    assert_eq!(report.parse_tree, "(file (route route POST /a -> (handler A . b) ;) <EOF>)");
}

const STATEMENTS: &str = r"
grammar Expression;
prog : stat+ ;
stat : expr SEMI                              # exprStat
     | ID '=' expr SEMI                       # assignStat
     | 'if' '(' expr ')' stat                 # ifStat
     | 'if' '(' expr ')' stat 'else' stat     # ifElseStat
     | '{' stat* '}'                          # blockStat
     ;
expr : expr ('*' | '/') expr                  # mulDiv
     | expr ('+' | '-') expr                  # addSub
     | expr ('==' | '!=' | '<' | '>') expr    # compare
     | '(' expr ')'                           # parens
     | ID                                     # id
     | INT                                    # int
     | '-' expr                               # negate
     ;
ID   : [a-zA-Z_] [a-zA-Z_0-9]* ;
INT  : [0-9]+ ;
SEMI : ';' ;
WS   : [ \t\r\n]+ -> skip ;
";

#[test]
fn test_else_branch_after_shorter_alternative() {
    let report = parse_sample(STATEMENTS, "if (x) y = 1; else y = 2;", &ParseOptions::default()).unwrap();
    assert_eq!(
        report.parse_tree,
        "(prog (stat if ( (expr x) ) (stat y = (expr 1) ;) else (stat y = (expr 2) ;)))"
    );
    let stat = report.tree.children(report.tree.root())[0];
    assert_eq!(report.tree.node(stat).label(), Some("ifElseStat"));

    let report = parse_sample(STATEMENTS, "if (x) y = 1; y = 2;", &ParseOptions::default()).unwrap();
    let stat = report.tree.children(report.tree.root())[0];
    assert_eq!(report.tree.node(stat).label(), Some("ifStat"));
}

#[test]
fn test_dangling_else_binds_to_nearest_if() {
    let report = parse_sample(STATEMENTS, "if (a) if (b) x; else y;", &ParseOptions::default()).unwrap();
    let tree = &report.tree;
    let outer = tree.children(tree.root())[0];
    assert_eq!(tree.node(outer).label(), Some("ifStat"));
    let inner = *tree.children(outer).last().unwrap();
    assert_eq!(tree.node(inner).label(), Some("ifElseStat"));
}

#[test]
fn test_demo_program_parses() {
    let sample = "x = 1 + 2 * 3;\ny = (x + 1) * 2;\nif (x > 0) {\n    y = y + 1;\n}\n";
    let report = parse_sample(STATEMENTS, sample, &ParseOptions::default()).unwrap();
    assert_eq!(report.tree.children(report.tree.root()).len(), 3);
}

#[test]
fn test_block_alternative_that_extends_another() {
    let source = "s : (A | A B) C ; A : 'a' ; B : 'b' ; C : 'c' ;";
    let report = parse_sample(source, "abc", &ParseOptions::default()).unwrap();
    assert_eq!(report.parse_tree, "(s a b c)");
    let report = parse_sample(source, "ac", &ParseOptions::default()).unwrap();
    assert_eq!(report.parse_tree, "(s a c)");
}

/// Deep recursion needs more stack than a test thread gets in debug builds
fn on_large_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(256 << 20)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

const LIST: &str = "list : ID list | ID ; ID : [a-z]+ ; WS : ' '+ -> skip ;";

#[test]
fn test_long_right_recursive_list_fits_default_depth() {
    on_large_stack(|| {
        let input = vec!["a"; 300].join(" ");
        let report = parse_sample(LIST, &input, &ParseOptions::default()).unwrap();
        assert_eq!(report.depth, 301);
    });
}

#[test]
fn test_nested_json_fits_default_depth() {
    on_large_stack(|| {
        let input = format!("{}{}", "[".repeat(200), "]".repeat(200));
        parse_sample(JSON, &input, &ParseOptions::default()).unwrap();
    });
}

#[test]
fn test_depth_limit_boundary() {
    use quarry::parser::{RecognizerConfig, parse_with};

    let grammar = parse_grammar(LIST).unwrap();
    let config = RecognizerConfig::default().with_max_depth(40);
    let under = tokenize(&grammar, &vec!["a"; 39].join(" ")).unwrap();
    assert!(parse_with(&grammar, &under, &config).is_ok());

    let over = tokenize(&grammar, &vec!["a"; 41].join(" ")).unwrap();
    assert!(matches!(
        parse_with(&grammar, &over, &config),
        Err(RecognizeError::DepthLimit { ref rule, limit: 40, .. }) if rule == "list"
    ));
}
