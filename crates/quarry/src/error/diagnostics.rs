//! # Diagnostic Utilities
//!
//! Helpers for explaining errors without pulling in a renderer:
//! "did you mean" suggestions and `file:line:col` snippets.

use crate::text::{LineIndex, Span};
use std::fmt::Write;

/// Suggest the candidate most similar to `actual`
///
/// Returns `None` when nothing reaches a similarity of 0.6.
///
/// ```rust
/// use quarry::error::diagnostics::did_you_mean;
///
/// let rules = ["expr", "stat", "prog"];
/// assert_eq!(did_you_mean("exprr", rules), Some("expr".to_string()));
/// assert_eq!(did_you_mean("zzz", rules), None);
/// ```
pub fn did_you_mean<'a, I>(actual: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let actual_lower = actual.to_lowercase();
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let similarity = string_similarity(&actual_lower, &candidate.to_lowercase());
        if similarity < 0.6 {
            continue;
        }
        match best {
            Some((_, best_sim)) if similarity <= best_sim => {}
            _ => best = Some((candidate, similarity)),
        }
    }
    best.map(|(s, _)| s.to_string())
}

/// Render `message` with a `line:col` prefix and the offending source line
///
/// ```text
/// grammar.g4:3:9: Undefined rule `exprr` referenced from `stat`
///   stat : exprr ';' ;
///          ^^^^^
/// ```
#[must_use]
pub fn render_with_location(
    message: &str,
    source: &str,
    span: Span,
    filename: Option<&str>,
) -> String {
    let index = LineIndex::new(source);
    let pos = index.line_col(span.start);
    let mut out = String::new();
    if let Some(name) = filename {
        let _ = write!(out, "{name}:");
    }
    let _ = write!(out, "{pos}: {message}");
    if let Some(line) = index.line_text(pos.line) {
        let column = pos.column as usize;
        let width = source
            .get(span.start..span.end)
            .map_or(1, |text| text.chars().take_while(|c| *c != '\n').count())
            .max(1);
        let _ = write!(out, "\n  {line}\n  {}{}", " ".repeat(column), "^".repeat(width));
    }
    out
}

/// Similarity in `[0, 1]` based on Levenshtein distance
fn string_similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }
    let distance = levenshtein_distance(s1, s2);
    let max_len = s1.chars().count().max(s2.chars().count());
    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let b: Vec<char> = s2.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in s1.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_did_you_mean_prefers_closest() {
        let candidates = ["statement", "state", "expr"];
        assert_eq!(
            did_you_mean("stat", candidates),
            Some("state".to_string())
        );
    }

    #[test]
    fn test_render_with_location() {
        let source = "grammar G;\nstat : exprr ';' ;\n";
        let start = source.find("exprr").unwrap();
        let rendered = render_with_location(
            "Undefined rule `exprr`",
            source,
            Span::new(start, start + 5),
            Some("g.g4"),
        );
        assert!(rendered.starts_with("g.g4:2:8: Undefined rule `exprr`"));
        assert!(rendered.ends_with("       ^^^^^"));
    }
}
