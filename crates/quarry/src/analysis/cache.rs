//! # Analysis Cache
//!
//! Content-addressed memoization of analysis results.
//!
//! Entries are keyed by a grammar's [`content_hash`](crate::grammar::Grammar::content_hash)
//! and the kind of analysis, so two texts that differ only in layout share
//! entries. The cache is an LRU behind a mutex. The lock is not held while a
//! result is computed: two threads missing the same key both compute it and
//! the last one to finish wins, which is harmless because analyses are pure.

use lru::LruCache;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnalysisKind {
    FirstFollow,
    LeftRecursion,
    Ambiguity,
    CallGraph,
}

impl AnalysisKind {
    pub const ALL: [Self; 4] = [
        Self::FirstFollow,
        Self::LeftRecursion,
        Self::Ambiguity,
        Self::CallGraph,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstFollow => "first-follow",
            Self::LeftRecursion => "left-recursion",
            Self::Ambiguity => "ambiguity",
            Self::CallGraph => "call-graph",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub grammar_hash: u64,
    pub kind: AnalysisKind,
}

impl CacheKey {
    #[must_use]
    pub const fn new(grammar_hash: u64, kind: AnalysisKind) -> Self {
        Self { grammar_hash, kind }
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    /// Current number of entries
    pub entries: usize,
}

impl CacheStats {
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<V> {
    entries: LruCache<CacheKey, V>,
    stats: CacheStats,
}

/// LRU cache of analysis results, safe to share between threads
pub struct AnalysisCache<V> {
    inner: Mutex<Inner<V>>,
}

impl<V> fmt::Debug for AnalysisCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisCache")
            .field("stats", &self.lock().stats)
            .finish_non_exhaustive()
    }
}

impl<V> Default for AnalysisCache<V> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<V> AnalysisCache<V> {
    /// Create a cache holding at most `capacity` results (0 means the default)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_capacity(NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY))
    }

    fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // entries stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        let mut inner = self.lock();
        if !inner.entries.contains(&key) && inner.entries.len() >= inner.entries.cap().get() {
            inner.stats.evictions += 1;
        }
        inner.entries.put(key, value);
        inner.stats.entries = inner.entries.len();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.stats.entries = 0;
    }
}

impl<V: Clone> AnalysisCache<V> {
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut inner = self.lock();
        let found = inner.entries.get(key).cloned();
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        found
    }

    /// Cached value for `key`, computing and storing it on a miss
    pub fn get_or_compute(&self, key: CacheKey, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            trace!(kind = %key.kind, hash = key.grammar_hash, "analysis cache hit");
            return value;
        }
        trace!(kind = %key.kind, hash = key.grammar_hash, "analysis cache miss");
        let value = compute();
        self.insert(key, value.clone());
        value
    }
}
