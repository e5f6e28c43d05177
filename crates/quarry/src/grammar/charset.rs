//! Character sets for lexer patterns (`[a-z]`, `~["]`, `'a'..'z'`, `.`).

use std::fmt;
use std::ops::RangeInclusive;

const MAX_CHAR: char = char::MAX;

/// A set of chars stored as sorted, non-overlapping, non-adjacent ranges
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CharSet {
    ranges: Vec<(char, char)>,
}

impl CharSet {
    /// Build a set from arbitrary (possibly overlapping) ranges
    #[must_use]
    pub fn new(ranges: impl IntoIterator<Item = (char, char)>) -> Self {
        let mut set = Self {
            ranges: ranges
                .into_iter()
                .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
                .collect(),
        };
        set.normalize();
        set
    }

    #[must_use]
    pub fn single(c: char) -> Self {
        Self {
            ranges: vec![(c, c)],
        }
    }

    /// Every Unicode scalar value (`.` in a lexer rule)
    #[must_use]
    pub fn any() -> Self {
        Self {
            ranges: vec![('\0', MAX_CHAR)],
        }
    }

    #[must_use]
    pub fn digits() -> Self {
        Self::new([('0', '9')])
    }

    #[must_use]
    pub fn whitespace() -> Self {
        Self::new([(' ', ' '), ('\t', '\t'), ('\r', '\r'), ('\n', '\n')])
    }

    #[must_use]
    pub fn contains(&self, c: char) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if c < lo {
                    std::cmp::Ordering::Greater
                } else if c > hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> impl Iterator<Item = RangeInclusive<char>> + '_ {
        self.ranges.iter().map(|&(lo, hi)| lo..=hi)
    }

    /// Lowest member, used when a sample string is needed
    #[must_use]
    pub fn first(&self) -> Option<char> {
        self.ranges.first().map(|&(lo, _)| lo)
    }

    /// A printable member, preferring ASCII letters and digits
    #[must_use]
    pub fn representative(&self) -> Option<char> {
        ['a', 'A', '0', 'x', '_', ' ']
            .into_iter()
            .find(|c| self.contains(*c))
            .or_else(|| {
                self.ranges().find_map(|r| {
                    let start = (*r.start()).max('!');
                    (start <= *r.end()).then_some(start)
                })
            })
            .or_else(|| self.first())
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.ranges.iter().chain(&other.ranges).copied())
    }

    /// Complement relative to all Unicode scalar values
    #[must_use]
    pub fn complement(&self) -> Self {
        let mut ranges = Vec::new();
        let mut next = Some('\0');
        for &(lo, hi) in &self.ranges {
            if let Some(start) = next
                && start < lo
                && let Some(end) = prev_char(lo)
            {
                ranges.push((start, end));
            }
            next = next_char(hi);
        }
        if let Some(start) = next {
            ranges.push((start, MAX_CHAR));
        }
        Self { ranges }
    }

    fn normalize(&mut self) {
        self.ranges.sort_unstable();
        let mut merged: Vec<(char, char)> = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            if let Some(last) = merged.last_mut()
                && next_char(last.1).is_none_or(|n| lo <= n)
            {
                last.1 = last.1.max(hi);
                continue;
            }
            merged.push((lo, hi));
        }
        self.ranges = merged;
    }
}

/// Next scalar value, skipping the surrogate gap
fn next_char(c: char) -> Option<char> {
    match c {
        MAX_CHAR => None,
        '\u{D7FF}' => Some('\u{E000}'),
        _ => char::from_u32(c as u32 + 1),
    }
}

fn prev_char(c: char) -> Option<char> {
    match c {
        '\0' => None,
        '\u{E000}' => Some('\u{D7FF}'),
        _ => char::from_u32(c as u32 - 1),
    }
}

/// Escape a char for grammar or regex text
pub(crate) fn escape_char(c: char, out: &mut String) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\\' => out.push_str("\\\\"),
        ']' => out.push_str("\\]"),
        '-' => out.push_str("\\-"),
        '[' => out.push_str("\\["),
        '^' => out.push_str("\\^"),
        c if c.is_control() || (c as u32) > 0xFFFF => {
            out.push_str(&format!("\\u{{{:X}}}", c as u32));
        }
        c => out.push(c),
    }
}

/// Quote a literal the way grammar text writes it: `'->'`, `'\''`
///
/// Only the quote, the backslash and control characters are escaped.
pub(crate) fn quote_literal(lit: &str) -> String {
    let mut out = String::with_capacity(lit.len() + 2);
    out.push('\'');
    for c in lit.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:X}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

impl fmt::Display for CharSet {
    /// Renders in `[a-z_]` form, or `.` for the full set
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges == [('\0', MAX_CHAR)] {
            return f.write_str(".");
        }
        let mut out = String::from("[");
        for &(lo, hi) in &self.ranges {
            escape_char(lo, &mut out);
            if hi != lo {
                out.push('-');
                escape_char(hi, &mut out);
            }
        }
        out.push(']');
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_merges_adjacent() {
        let set = CharSet::new([('d', 'f'), ('a', 'c'), ('x', 'x')]);
        assert_eq!(set.ranges().count(), 2);
        assert!(set.contains('e'));
        assert!(!set.contains('g'));
        assert_eq!(set.to_string(), "[a-fx]");
    }

    #[test]
    fn test_complement_round_trip() {
        let quote = CharSet::single('"');
        let not_quote = quote.complement();
        assert!(!not_quote.contains('"'));
        assert!(not_quote.contains('a'));
        assert!(not_quote.contains('\0'));
        assert!(not_quote.contains(char::MAX));
        assert_eq!(not_quote.complement(), quote);
    }

    #[test]
    fn test_any_and_representative() {
        assert_eq!(CharSet::any().to_string(), ".");
        assert_eq!(CharSet::digits().representative(), Some('0'));
        assert_eq!(CharSet::new([('b', 'z')]).representative(), Some('x'));
        assert!(CharSet::any().complement().is_empty());
    }

    #[test]
    fn test_quote_literal_keeps_set_metacharacters() {
        assert_eq!(quote_literal("->"), "'->'");
        assert_eq!(quote_literal("^"), "'^'");
        assert_eq!(quote_literal("[]"), "'[]'");
        assert_eq!(quote_literal("it's"), "'it\\'s'");
        assert_eq!(quote_literal("\\\n"), "'\\\\\\n'");
    }
}
