use super::{CodegenOptions, GeneratedFile, ParserIr, StubBackend, StubLanguage};
use crate::error::CodegenError;
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a backend produces
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct BackendCapabilities {
    pub name: &'static str,
    pub language: &'static str,
    /// Emits a runnable lexer and parser, not only tables
    pub full_parser: bool,
    pub supports_listener: bool,
    pub supports_visitor: bool,
    pub supports_left_recursion: bool,
}

/// A code generation target
pub trait Backend: Send + Sync {
    /// Canonical target name, lowercase
    fn name(&self) -> &'static str;

    /// Other names accepted for the target
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn capabilities(&self) -> BackendCapabilities;

    /// Render `ir` into files
    ///
    /// # Errors
    ///
    /// Returns an error if the grammar uses something the target cannot
    /// express or if the produced source does not validate.
    fn generate(&self, ir: &ParserIr, options: &CodegenOptions) -> Result<Vec<GeneratedFile>, CodegenError>;
}

/// Lookup table from target names and aliases to backends
#[derive(Clone)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn Backend>>,
    index: HashMap<CompactString, usize, RandomState>,
}

impl BackendRegistry {
    /// A registry without any backend
    #[must_use]
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
            index: HashMap::with_hasher(RandomState::new()),
        }
    }

    /// The built-in backends: `rust` (with the `codegen-rust` feature) and
    /// the table-only targets
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        #[cfg(feature = "codegen-rust")]
        registry.register(super::RustBackend);
        for language in StubLanguage::ALL {
            registry.register(StubBackend::new(language));
        }
        registry
    }

    /// Add `backend`; a later registration replaces earlier ones with the same names
    pub fn register(&mut self, backend: impl Backend + 'static) {
        let slot = self.backends.len();
        for name in std::iter::once(backend.name()).chain(backend.aliases().iter().copied()) {
            self.index.insert(CompactString::from(name.to_ascii_lowercase()), slot);
        }
        self.backends.push(Arc::new(backend));
    }

    /// Backend for `target`, case-insensitive
    ///
    /// # Errors
    ///
    /// [`CodegenError::UnsupportedTarget`] listing the registered targets.
    pub fn get(&self, target: &str) -> Result<&dyn Backend, CodegenError> {
        self.index
            .get(target.trim().to_ascii_lowercase().as_str())
            .map(|&slot| self.backends[slot].as_ref())
            .ok_or_else(|| CodegenError::UnsupportedTarget {
                target: target.to_string(),
                supported: self.targets().into_iter().map(ToString::to_string).collect(),
            })
    }

    #[must_use]
    pub fn supports(&self, target: &str) -> bool {
        self.get(target).is_ok()
    }

    /// Canonical names of reachable backends, sorted
    #[must_use]
    pub fn targets(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .backends
            .iter()
            .enumerate()
            .filter(|(slot, b)| self.index.get(b.name()) == Some(slot))
            .map(|(_, b)| b.name())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("targets", &self.targets())
            .finish()
    }
}
