//! Memoization and sharing behavior of `Session`

use quarry::analysis::CacheStats;
use quarry::ops::{self, GraphFormat, ParseOptions, Session, SessionConfig};
use std::sync::Arc;

const ARITH: &str = "grammar Arith; e : e '*' e | e '+' e | NUMBER ; NUMBER : [0-9]+ ; WS : ' '+ -> skip ;";
const KEYS: &str = "grammar Keys; kv : KEY '=' KEY ; KEY : [a-z]+ ;";

#[test]
fn test_repeated_analysis_hits_cache() {
    let session = Session::default();
    let first = session.analyze_first_follow(ARITH).unwrap();
    let second = session.analyze_first_follow(ARITH).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        session.cache_stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            evictions: 0,
            entries: 1,
        }
    );
}

#[test]
fn test_cached_reports_equal_fresh_reports() {
    let session = Session::default();
    for _ in 0..2 {
        assert_eq!(*session.analyze_first_follow(ARITH).unwrap(), ops::analyze_first_follow(ARITH).unwrap());
        assert_eq!(*session.analyze_left_recursion(ARITH).unwrap(), ops::analyze_left_recursion(ARITH).unwrap());
        assert_eq!(*session.detect_ambiguity(ARITH).unwrap(), ops::detect_ambiguity(ARITH).unwrap());
        assert_eq!(
            *session.analyze_call_graph(ARITH, GraphFormat::Dot).unwrap(),
            ops::analyze_call_graph(ARITH, GraphFormat::Dot).unwrap()
        );
    }
    let stats = session.cache_stats();
    assert_eq!((stats.hits, stats.misses), (4, 4));
}

#[test]
fn test_grammars_do_not_share_entries() {
    let session = Session::default();
    let arith = session.analyze_left_recursion(ARITH).unwrap();
    let keys = session.analyze_left_recursion(KEYS).unwrap();
    assert!(arith.has_left_recursion);
    assert!(!keys.has_left_recursion);
    assert_eq!(session.cache_stats().entries, 2);
}

#[test]
fn test_rejected_grammars_are_not_cached() {
    let session = Session::default();
    let err = session.analyze_first_follow("grammar Bad; s : missing ;").unwrap_err();
    assert_eq!(err.kind(), "GrammarError");
    assert_eq!(session.cache_stats(), CacheStats::default());
}

#[test]
fn test_operations_without_analyses_bypass_cache() {
    let session = Session::default();
    session.validate_grammar(ARITH).unwrap();
    session.parse_sample(ARITH, "1 + 2", &ParseOptions::default()).unwrap();
    session.visualize_atn(ARITH, None).unwrap();
    session.profile_grammar(ARITH, "1 * 2 + 3", None).unwrap();
    assert_eq!(session.cache_stats().entries, 0);
}

#[test]
fn test_clear_cache_forces_recompute() {
    let session = Session::new(SessionConfig::default().with_cache_capacity(8));
    let before = session.detect_ambiguity(KEYS).unwrap();
    session.clear_cache();
    let after = session.detect_ambiguity(KEYS).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before, after);
    assert_eq!(session.cache_stats().entries, 1);
}

#[test]
fn test_session_is_shared_between_threads() {
    let session = Session::default();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let suite = session.analyze_all(ARITH).unwrap();
                assert_eq!(suite.first_follow.grammar_name, "Arith");
                assert!(suite.left_recursion.has_direct_left_recursion);
            });
        }
    });
    let stats = session.cache_stats();
    assert_eq!(stats.entries, 4);
    assert_eq!(stats.hits + stats.misses, 16);
}
