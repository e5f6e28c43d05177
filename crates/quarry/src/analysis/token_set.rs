use crate::grammar::{Grammar, TokenId};
use smallvec::SmallVec;
use std::fmt;

/// A set of token kinds stored as a bitset
///
/// Trailing zero words are never kept, so equal sets compare equal.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct TokenSet {
    words: SmallVec<[u64; 2]>,
}

impl TokenSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(token: TokenId) -> Self {
        let mut set = Self::new();
        set.insert(token);
        set
    }

    /// Add `token`; returns whether it was newly inserted
    pub fn insert(&mut self, token: TokenId) -> bool {
        let (word, bit) = position(token);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let before = self.words[word];
        self.words[word] |= bit;
        before != self.words[word]
    }

    pub fn remove(&mut self, token: TokenId) {
        let (word, bit) = position(token);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !bit;
        }
        self.trim();
    }

    #[must_use]
    pub fn contains(&self, token: TokenId) -> bool {
        let (word, bit) = position(token);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// Add every member of `other`; returns whether `self` grew
    pub fn union_with(&mut self, other: &Self) -> bool {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = Self {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
        };
        out.trim();
        out
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Members in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..64u32)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| TokenId(u32::try_from(i).unwrap_or(u32::MAX) * 64 + bit))
        })
    }

    /// Display names of the members, sorted alphabetically
    #[must_use]
    pub fn names(&self, grammar: &Grammar) -> Vec<String> {
        let mut names: Vec<String> = self
            .iter()
            .map(|t| grammar.token(t).display().to_string())
            .collect();
        names.sort();
        names
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

fn position(token: TokenId) -> (usize, u64) {
    (token.index() / 64, 1u64 << (token.0 % 64))
}

impl FromIterator<TokenId> for TokenSet {
    fn from_iter<I: IntoIterator<Item = TokenId>>(iter: I) -> Self {
        let mut set = Self::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|t| t.0)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains_and_iter() {
        let mut set = TokenSet::new();
        assert!(set.insert(TokenId(3)));
        assert!(!set.insert(TokenId(3)));
        assert!(set.insert(TokenId(70)));
        assert!(set.contains(TokenId(70)));
        assert!(!set.contains(TokenId(4)));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![TokenId(3), TokenId(70)]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_equality_ignores_trailing_words() {
        let mut wide = TokenSet::with(TokenId(1));
        wide.insert(TokenId(100));
        wide.remove(TokenId(100));
        assert_eq!(wide, TokenSet::with(TokenId(1)));
    }

    #[test]
    fn test_union_and_intersection() {
        let a: TokenSet = [TokenId(1), TokenId(2)].into_iter().collect();
        let b: TokenSet = [TokenId(2), TokenId(90)].into_iter().collect();
        assert!(a.intersects(&b));
        assert_eq!(a.intersection(&b), TokenSet::with(TokenId(2)));
        let mut c = a.clone();
        assert!(c.union_with(&b));
        assert!(!c.union_with(&b));
        assert_eq!(c.len(), 3);
        assert!(a.intersection(&TokenSet::with(TokenId(90))).is_empty());
    }
}
