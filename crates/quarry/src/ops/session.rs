use super::reports::{
    AmbiguityReport, AtnReport, CallGraphReport, CompileReport, FirstFollowReport, GraphFormat,
    LeftRecursionReport, ParseReport, ProfileReport, ValidationReport,
};
use super::{
    ParseOptions, ambiguity_report, atn_report, call_graph_report, compile_report,
    first_follow_report, left_recursion_report, parse_report, profile_report,
    record_sample_ambiguity, validation_report,
};
use crate::analysis::{AnalysisCache, AnalysisKind, CacheKey, CacheStats};
use crate::codegen::{Backend, BackendRegistry, CodegenOptions};
use crate::error::Result;
use crate::grammar::{Grammar, parse_grammar};
use crate::parser::RecognizerConfig;
use std::sync::Arc;
use tracing::{debug, trace};

/// Settings of a [`Session`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase", default))]
pub struct SessionConfig {
    /// Most analysis reports kept at once
    pub cache_capacity: usize,
    pub recognizer: RecognizerConfig,
    pub codegen: CodegenOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 64,
            recognizer: RecognizerConfig::default(),
            codegen: CodegenOptions::default(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_recognizer(mut self, recognizer: RecognizerConfig) -> Self {
        self.recognizer = recognizer;
        self
    }

    #[must_use]
    pub fn with_codegen(mut self, codegen: CodegenOptions) -> Self {
        self.codegen = codegen;
        self
    }
}

#[derive(Debug, Clone)]
enum Cached {
    FirstFollow(Arc<FirstFollowReport>),
    LeftRecursion(Arc<LeftRecursionReport>),
    Ambiguity(Arc<AmbiguityReport>),
    /// Always carries both renderings
    CallGraph(Arc<CallGraphReport>),
}

/// The four analysis reports of one grammar
#[derive(Debug, Clone)]
pub struct AnalysisSuite {
    pub first_follow: Arc<FirstFollowReport>,
    pub left_recursion: Arc<LeftRecursionReport>,
    pub ambiguity: Arc<AmbiguityReport>,
    pub call_graph: Arc<CallGraphReport>,
}

/// Runs operations with shared settings and memoized analyses
///
/// Analysis reports are keyed by the grammar's content hash, so texts that
/// differ only in whitespace or comments share entries. A `Session` is
/// `Sync` and can serve several threads.
///
/// ```rust
/// use quarry::ops::Session;
///
/// let session = Session::default();
/// let a = session.analyze_first_follow("s : 'a' s | 'b' ;").unwrap();
/// let b = session.analyze_first_follow("s : 'a' s\n  | 'b' ;  // same grammar").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(session.cache_stats().hits, 1);
/// ```
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    registry: BackendRegistry,
    cache: AnalysisCache<Cached>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            cache: AnalysisCache::new(config.cache_capacity),
            registry: BackendRegistry::default(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Make `backend` available to [`Session::compile_grammar_multi_target`]
    pub fn register_backend(&mut self, backend: impl Backend + 'static) {
        self.registry.register(backend);
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// See [`super::validate_grammar`]
    ///
    /// # Errors
    ///
    /// As [`super::validate_grammar`].
    pub fn validate_grammar(&self, source: &str) -> Result<ValidationReport> {
        Ok(validation_report(&parse_grammar(source)?))
    }

    /// See [`super::parse_sample`]; parses with the session's recognizer settings
    ///
    /// # Errors
    ///
    /// As [`super::parse_sample`].
    pub fn parse_sample(&self, source: &str, sample: &str, options: &ParseOptions) -> Result<ParseReport> {
        parse_report(&parse_grammar(source)?, sample, options, &self.config.recognizer)
    }

    /// See [`super::detect_ambiguity`]
    ///
    /// # Errors
    ///
    /// As [`super::detect_ambiguity`].
    pub fn detect_ambiguity(&self, source: &str) -> Result<Arc<AmbiguityReport>> {
        Ok(self.ambiguity_of(&parse_grammar(source)?))
    }

    /// See [`super::detect_ambiguity_in_sample`]; the static part comes from
    /// the cache, the sample is parsed with the session's recognizer settings
    ///
    /// # Errors
    ///
    /// As [`super::detect_ambiguity_in_sample`].
    pub fn detect_ambiguity_in_sample(
        &self,
        source: &str,
        sample: &str,
        start_rule: Option<&str>,
    ) -> Result<AmbiguityReport> {
        let grammar = parse_grammar(source)?;
        let mut report = AmbiguityReport::clone(&self.ambiguity_of(&grammar));
        record_sample_ambiguity(&mut report, &grammar, sample, start_rule, &self.config.recognizer)?;
        Ok(report)
    }

    /// See [`super::analyze_left_recursion`]
    ///
    /// # Errors
    ///
    /// As [`super::analyze_left_recursion`].
    pub fn analyze_left_recursion(&self, source: &str) -> Result<Arc<LeftRecursionReport>> {
        Ok(self.left_recursion_of(&parse_grammar(source)?))
    }

    /// See [`super::analyze_first_follow`]
    ///
    /// # Errors
    ///
    /// As [`super::analyze_first_follow`].
    pub fn analyze_first_follow(&self, source: &str) -> Result<Arc<FirstFollowReport>> {
        Ok(self.first_follow_of(&parse_grammar(source)?))
    }

    /// See [`super::analyze_call_graph`]
    ///
    /// # Errors
    ///
    /// As [`super::analyze_call_graph`].
    pub fn analyze_call_graph(&self, source: &str, format: GraphFormat) -> Result<Arc<CallGraphReport>> {
        let full = self.call_graph_of(&parse_grammar(source)?);
        Ok(match format {
            GraphFormat::Both => full,
            _ => Arc::new(full.restricted_to(format)),
        })
    }

    /// See [`super::visualize_atn`]
    ///
    /// # Errors
    ///
    /// As [`super::visualize_atn`].
    pub fn visualize_atn(&self, source: &str, rule: Option<&str>) -> Result<AtnReport> {
        atn_report(&parse_grammar(source)?, rule)
    }

    /// See [`super::compile_grammar_multi_target`]; uses the session's
    /// registry and codegen options
    ///
    /// # Errors
    ///
    /// As [`super::compile_grammar_multi_target`].
    pub fn compile_grammar_multi_target(&self, source: &str, target: &str) -> Result<CompileReport> {
        compile_report(&self.registry, &parse_grammar(source)?, target, &self.config.codegen)
    }

    /// See [`super::profile_grammar`]
    ///
    /// # Errors
    ///
    /// As [`super::profile_grammar`].
    pub fn profile_grammar(&self, source: &str, sample: &str, start_rule: Option<&str>) -> Result<ProfileReport> {
        profile_report(&parse_grammar(source)?, sample, start_rule, &self.config.recognizer)
    }

    /// All four analysis reports; computed concurrently with the `parallel` feature
    ///
    /// # Errors
    ///
    /// [`crate::Error::Grammar`] if the grammar is rejected.
    pub fn analyze_all(&self, source: &str) -> Result<AnalysisSuite> {
        let grammar = parse_grammar(source)?;

        #[cfg(feature = "parallel")]
        let ((first_follow, left_recursion), (ambiguity, call_graph)) = rayon::join(
            || rayon::join(|| self.first_follow_of(&grammar), || self.left_recursion_of(&grammar)),
            || rayon::join(|| self.ambiguity_of(&grammar), || self.call_graph_of(&grammar)),
        );

        #[cfg(not(feature = "parallel"))]
        let (first_follow, left_recursion, ambiguity, call_graph) = (
            self.first_follow_of(&grammar),
            self.left_recursion_of(&grammar),
            self.ambiguity_of(&grammar),
            self.call_graph_of(&grammar),
        );

        debug!(grammar = grammar.name(), stats = ?self.cache.stats(), "analyzed grammar");
        Ok(AnalysisSuite {
            first_follow,
            left_recursion,
            ambiguity,
            call_graph,
        })
    }

    fn first_follow_of(&self, grammar: &Grammar) -> Arc<FirstFollowReport> {
        self.memoized(
            grammar,
            AnalysisKind::FirstFollow,
            || first_follow_report(grammar),
            Cached::FirstFollow,
            |c| match c {
                Cached::FirstFollow(r) => Some(r),
                _ => None,
            },
        )
    }

    fn left_recursion_of(&self, grammar: &Grammar) -> Arc<LeftRecursionReport> {
        self.memoized(
            grammar,
            AnalysisKind::LeftRecursion,
            || left_recursion_report(grammar),
            Cached::LeftRecursion,
            |c| match c {
                Cached::LeftRecursion(r) => Some(r),
                _ => None,
            },
        )
    }

    fn ambiguity_of(&self, grammar: &Grammar) -> Arc<AmbiguityReport> {
        self.memoized(
            grammar,
            AnalysisKind::Ambiguity,
            || ambiguity_report(grammar),
            Cached::Ambiguity,
            |c| match c {
                Cached::Ambiguity(r) => Some(r),
                _ => None,
            },
        )
    }

    fn call_graph_of(&self, grammar: &Grammar) -> Arc<CallGraphReport> {
        self.memoized(
            grammar,
            AnalysisKind::CallGraph,
            || call_graph_report(grammar, GraphFormat::Both),
            Cached::CallGraph,
            |c| match c {
                Cached::CallGraph(r) => Some(r),
                _ => None,
            },
        )
    }

    fn memoized<R>(
        &self,
        grammar: &Grammar,
        kind: AnalysisKind,
        compute: impl FnOnce() -> R,
        wrap: fn(Arc<R>) -> Cached,
        unwrap: fn(Cached) -> Option<Arc<R>>,
    ) -> Arc<R> {
        let key = CacheKey::new(grammar.content_hash(), kind);
        if let Some(found) = self.cache.get(&key).and_then(unwrap) {
            trace!(%kind, grammar = grammar.name(), "reusing cached report");
            return found;
        }
        let report = Arc::new(compute());
        self.cache.insert(key, wrap(Arc::clone(&report)));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{BackendCapabilities, GeneratedFile, ParserIr};
    use crate::error::CodegenError;

    const EXPR: &str = "grammar Expr; e : e '*' e | e '+' e | '(' e ')' | N ; N : [0-9]+ ; WS : ' '+ -> skip ;";

    struct Listing;

    impl Backend for Listing {
        fn name(&self) -> &'static str {
            "listing"
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                name: "listing",
                language: "text",
                full_parser: false,
                supports_listener: false,
                supports_visitor: false,
                supports_left_recursion: true,
            }
        }

        fn generate(&self, ir: &ParserIr, _: &CodegenOptions) -> Result<Vec<GeneratedFile>, CodegenError> {
            Ok(vec![GeneratedFile {
                path: "rules.txt".into(),
                contents: ir.rules.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join("\n"),
            }])
        }
    }

    #[test]
    fn test_cached_reports_equal_fresh_ones() {
        let session = Session::default();
        let first = session.detect_ambiguity(EXPR).unwrap();
        let second = session.detect_ambiguity(EXPR).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, super::super::detect_ambiguity(EXPR).unwrap());

        let stats = session.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_sample_ambiguity_leaves_cached_report_alone() {
        let source = "grammar Opt; s : x EOF ; x : A B? | A ; A : 'a' ; B : 'b' ;";
        let session = Session::default();
        let with_sample = session.detect_ambiguity_in_sample(source, "a", None).unwrap();
        assert!(with_sample.ambiguity_detected);
        let cached = session.detect_ambiguity(source).unwrap();
        assert!(!cached.sample_checked);
        assert_eq!(cached.ambiguities, with_sample.ambiguities);
        assert_eq!(session.cache_stats().hits, 1);
    }

    #[test]
    fn test_analyze_all_fills_every_kind() {
        let session = Session::default();
        let suite = session.analyze_all(EXPR).unwrap();
        assert_eq!(suite.first_follow.total_parser_rules, 1);
        assert!(suite.left_recursion.has_direct_left_recursion);
        assert!(!suite.ambiguity.has_ambiguities);
        assert!(suite.call_graph.dot.is_some() && suite.call_graph.mermaid.is_some());
        assert_eq!(session.cache_stats().entries, 4);

        session.analyze_all(EXPR).unwrap();
        assert_eq!(session.cache_stats().hits, 4);
    }

    #[test]
    fn test_call_graph_format_is_applied_after_cache() {
        let session = Session::default();
        let dot = session.analyze_call_graph(EXPR, GraphFormat::Dot).unwrap();
        let mermaid = session.analyze_call_graph(EXPR, GraphFormat::Mermaid).unwrap();
        assert!(dot.mermaid.is_none());
        assert!(mermaid.dot.is_none());
        assert_eq!(session.cache_stats().hits, 1);
    }

    #[test]
    fn test_clear_and_capacity() {
        let session = Session::new(SessionConfig::default().with_cache_capacity(1));
        session.analyze_first_follow(EXPR).unwrap();
        session.analyze_left_recursion(EXPR).unwrap();
        let stats = session.cache_stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.evictions, 1);
        session.clear_cache();
        assert_eq!(session.cache_stats().entries, 0);
    }

    #[test]
    fn test_session_settings_flow_through() {
        let config = SessionConfig::default()
            .with_recognizer(RecognizerConfig::default().with_require_eof(false))
            .with_codegen(CodegenOptions {
                module_name: Some("arith".into()),
                ..CodegenOptions::default()
            });
        let mut session = Session::new(config);

        let report = session.parse_sample(EXPR, "1 + 2 )", &ParseOptions::default()).unwrap();
        assert_eq!(report.parse_tree, "(e (e 1) + (e 2))");

        let compiled = session.compile_grammar_multi_target(EXPR, "python").unwrap();
        assert_eq!(compiled.files[0].path, "arith_tables.py");

        session.register_backend(Listing);
        let listing = session.compile_grammar_multi_target(EXPR, "listing").unwrap();
        assert_eq!(listing.files[0].contents, "e");
    }
}
