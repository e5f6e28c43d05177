//! # Testing Utilities
//!
//! Helpers for testing grammars and the engine itself.
//!
//! ## Property-Based Testing
//!
//! [`SentenceGenerator`] derives random sentences from a grammar given a
//! seed, so a `proptest` strategy over `u64` seeds becomes a strategy over
//! sample inputs:
//!
//! ```rust,ignore
//! proptest! {
//!     #[test]
//!     fn generated_sentences_parse(seed in any::<u64>()) {
//!         let sentence = generator.generate(seed);
//!         prop_assert!(parse_sample(GRAMMAR, &sentence, &ParseOptions::default()).is_ok());
//!     }
//! }
//! ```

pub mod generators;

pub use generators::{GeneratorConfig, SentenceGenerator};
