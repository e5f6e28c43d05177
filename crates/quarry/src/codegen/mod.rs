//! # Code generation
//!
//! Turns an analyzed grammar into parser source for a target language.
//!
//! Every backend consumes the same [`ParserIr`]; the [`BackendRegistry`]
//! maps target names (and aliases such as `rs`, `py`, `ts`) to backends.
//! The Rust backend produces a complete lexer and recursive-descent parser
//! and checks its own output with `syn`. The other targets currently emit
//! the token and rule tables only.
//!
//! ```rust
//! use quarry::automaton::build_automaton;
//! use quarry::codegen::{CodegenOptions, emit};
//! use quarry::grammar::parse_grammar;
//!
//! let grammar = parse_grammar("grammar Calc; e : e '+' e | N ; N : [0-9]+ ;").unwrap();
//! let atn = build_automaton(&grammar);
//! let source = emit(&grammar, &atn, "python", &CodegenOptions::default()).unwrap();
//! assert_eq!(source.files[0].path, "calc_tables.py");
//!
//! let err = emit(&grammar, &atn, "cobol", &CodegenOptions::default()).unwrap_err();
//! assert!(err.to_string().starts_with("Unsupported target `cobol`"));
//! ```

pub mod ir;
mod registry;
#[cfg(feature = "codegen-rust")]
mod rust;
mod stub;

pub use ir::ParserIr;
pub use registry::{Backend, BackendCapabilities, BackendRegistry};
#[cfg(feature = "codegen-rust")]
pub use rust::RustBackend;
pub use stub::{StubBackend, StubLanguage};

use crate::analysis::{FirstFollow, LeftRecursion};
use crate::automaton::Automaton;
use crate::error::CodegenError;
use crate::grammar::Grammar;

/// Options shared by all backends
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase", default))]
pub struct CodegenOptions {
    pub generate_listener: bool,
    pub generate_visitor: bool,
    /// Module or namespace name; derived from the grammar name when unset
    pub module_name: Option<String>,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            generate_listener: true,
            generate_visitor: false,
            module_name: None,
        }
    }
}

impl CodegenOptions {
    /// Module name to use for `grammar`
    #[must_use]
    pub fn module_for(&self, grammar: &str) -> String {
        self.module_name
            .clone()
            .unwrap_or_else(|| to_snake_case(grammar))
    }
}

/// One output file, path relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct GeneratedFile {
    pub path: String,
    pub contents: String,
}

/// Output of a backend for one grammar
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct GeneratedSource {
    /// Canonical target name
    pub target: String,
    pub grammar: String,
    pub files: Vec<GeneratedFile>,
}

impl GeneratedSource {
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.contents.len()).sum()
    }
}

/// Generate parser source for `target` with the default backends
///
/// # Errors
///
/// [`CodegenError::UnsupportedTarget`] for unknown targets; the backend's
/// own errors otherwise.
pub fn emit(
    grammar: &Grammar,
    atn: &Automaton,
    target: &str,
    options: &CodegenOptions,
) -> Result<GeneratedSource, CodegenError> {
    emit_with(&BackendRegistry::default(), grammar, atn, target, options)
}

/// [`emit`] with a caller-provided registry
///
/// # Errors
///
/// See [`emit`].
pub fn emit_with(
    registry: &BackendRegistry,
    grammar: &Grammar,
    atn: &Automaton,
    target: &str,
    options: &CodegenOptions,
) -> Result<GeneratedSource, CodegenError> {
    let backend = registry.get(target)?;
    let sets = FirstFollow::compute(grammar);
    let recursion = LeftRecursion::compute(grammar, &sets);
    let ir = ParserIr::build(grammar, atn, &sets, &recursion);
    let files = backend.generate(&ir, options)?;
    tracing::debug!(
        target_name = backend.name(),
        grammar = grammar.name(),
        files = files.len(),
        "generated parser source"
    );
    Ok(GeneratedSource {
        target: backend.name().to_string(),
        grammar: grammar.name().to_string(),
        files,
    })
}

/// `MyGrammar` -> `my_grammar`
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            out.push('_');
            prev_lower = false;
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "grammar_");
    }
    out
}

/// `my_grammar` -> `MyGrammar`
#[must_use]
pub fn to_pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if c == '_' || c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Double-quoted string literal valid in every supported target language
pub(crate) fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_snake_case("JsonGrammar"), "json_grammar");
        assert_eq!(to_snake_case("SQL"), "sql");
        assert_eq!(to_snake_case("Calc2"), "calc2");
        assert_eq!(to_snake_case("9x"), "grammar_9x");
        assert_eq!(to_pascal_case("route_dsl"), "RouteDsl");
        assert_eq!(to_pascal_case("Json"), "Json");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("a\"b\\\n"), "\"a\\\"b\\\\\\n\"");
    }
}
