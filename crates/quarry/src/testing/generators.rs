//! # Sentence Generators
//!
//! Random sample text derived from a grammar, for property tests and fuzzing.
//!
//! ```rust
//! use quarry::grammar::parse_grammar;
//! use quarry::testing::{GeneratorConfig, SentenceGenerator};
//!
//! let grammar = parse_grammar("list : '[' N (',' N)* ']' ; N : [0-9]+ ; WS : ' '+ -> skip ;").unwrap();
//! let generator = SentenceGenerator::new(&grammar, GeneratorConfig::default());
//! let sentence = generator.generate(7);
//! assert!(sentence.starts_with('[') && sentence.ends_with(']'));
//! ```

use crate::grammar::{Element, Grammar, LexPattern, RepeatOp, RuleId, TokenId, TokenSource};

/// Configuration for sentence generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Rule nesting after which the shortest alternatives are taken
    pub max_depth: usize,
    /// Maximum number of repetitions for `*` and `+`
    pub max_repetitions: usize,
    /// Probability of taking optional elements (0.0 to 1.0)
    pub optional_probability: f64,
    /// Text placed between tokens; must be skipped by the grammar's lexer
    pub separator: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_repetitions: 3,
            optional_probability: 0.5,
            separator: " ".to_string(),
        }
    }
}

/// Produces random sentences of a grammar's language
///
/// Lexemes are drawn from each token's lexer patterns. A grammar whose
/// tokens overlap (an identifier rule that also matches a keyword) can
/// yield text that lexes differently than it was generated.
#[derive(Debug)]
pub struct SentenceGenerator<'g> {
    grammar: &'g Grammar,
    config: GeneratorConfig,
    /// Fewest nested rule expansions needed to finish each rule
    height: Vec<usize>,
}

impl<'g> SentenceGenerator<'g> {
    #[must_use]
    pub fn new(grammar: &'g Grammar, config: GeneratorConfig) -> Self {
        Self {
            height: rule_heights(grammar),
            grammar,
            config,
        }
    }

    /// A sentence derived from the start rule, determined by `seed`
    #[must_use]
    pub fn generate(&self, seed: u64) -> String {
        self.generate_from(self.grammar.start_rule(), seed)
    }

    /// A sentence derived from `rule`, determined by `seed`
    #[must_use]
    pub fn generate_from(&self, rule: RuleId, seed: u64) -> String {
        let mut rng = SimpleRng::with_seed(seed.rotate_left(32) ^ 0x9e37_79b9_7f4a_7c15);
        self.tokens_from(rule, seed)
            .iter()
            .map(|&token| self.lexeme(token, &mut rng))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(&self.config.separator)
    }

    /// The token kinds of a sentence derived from `rule`
    #[must_use]
    pub fn tokens_from(&self, rule: RuleId, seed: u64) -> Vec<TokenId> {
        let mut out = Vec::new();
        let mut rng = SimpleRng::with_seed(seed);
        self.expand_rule(rule, 0, &mut out, &mut rng);
        out
    }

    fn expand_rule(&self, rule: RuleId, depth: usize, out: &mut Vec<TokenId>, rng: &mut SimpleRng) {
        let alternatives = &self.grammar.rule(rule).alternatives;
        let index = if depth >= self.config.max_depth {
            self.shortest(alternatives.iter().map(|a| a.elements.as_slice()))
        } else {
            rng.below(alternatives.len())
        };
        for element in &alternatives[index].elements {
            self.expand(element, depth + 1, out, rng);
        }
    }

    fn expand(&self, element: &Element, depth: usize, out: &mut Vec<TokenId>, rng: &mut SimpleRng) {
        match element {
            Element::Token { token, .. } => {
                if *token != TokenId::EOF {
                    out.push(*token);
                }
            }
            Element::Rule { rule, .. } => self.expand_rule(*rule, depth, out, rng),
            Element::Block(block) => {
                let index = if depth >= self.config.max_depth {
                    self.shortest(block.alternatives.iter().map(|a| a.elements.as_slice()))
                } else {
                    rng.below(block.alternatives.len())
                };
                for element in &block.alternatives[index].elements {
                    self.expand(element, depth, out, rng);
                }
            }
            Element::Repeat { body, op, .. } => {
                let reps = if depth >= self.config.max_depth {
                    op.min()
                } else {
                    match op {
                        RepeatOp::Optional => usize::from(rng.next_f64() < self.config.optional_probability),
                        RepeatOp::ZeroOrMore => rng.below(self.config.max_repetitions + 1),
                        RepeatOp::OneOrMore => 1 + rng.below(self.config.max_repetitions),
                    }
                };
                for _ in 0..reps {
                    self.expand(body, depth, out, rng);
                }
            }
        }
    }

    fn shortest<'a>(&self, alternatives: impl Iterator<Item = &'a [Element]>) -> usize {
        alternatives
            .enumerate()
            .min_by_key(|(_, elements)| sequence_height(&self.height, elements))
            .map_or(0, |(i, _)| i)
    }

    /// Text for one token
    fn lexeme(&self, token: TokenId, rng: &mut SimpleRng) -> String {
        let def = self.grammar.token(token);
        match def.source {
            TokenSource::Implicit => def.literal.as_deref().unwrap_or_default().to_string(),
            TokenSource::Lexer(index) => {
                let mut out = String::new();
                let rule = &self.grammar.lexer_rules()[index];
                if !rule.alternatives.is_empty() {
                    let alt = &rule.alternatives[rng.below(rule.alternatives.len())];
                    self.write_pattern(alt, rng, &mut out);
                }
                out
            }
            TokenSource::Eof | TokenSource::Virtual => String::new(),
        }
    }

    fn write_pattern(&self, pattern: &LexPattern, rng: &mut SimpleRng, out: &mut String) {
        match pattern {
            LexPattern::Literal(text) => out.push_str(text),
            LexPattern::Set(set) => {
                let ranges: Vec<_> = set.ranges().collect();
                let picked = (!ranges.is_empty())
                    .then(|| {
                        let range = &ranges[rng.below(ranges.len())];
                        let (start, end) = (u32::from(*range.start()), u32::from(*range.end()));
                        // stay near the start of wide ranges to keep text printable
                        let span = (end - start).min(25);
                        char::from_u32(start + u32::try_from(rng.below(span as usize + 1)).unwrap_or(0))
                    })
                    .flatten()
                    .filter(|c| !c.is_control() || set.representative() == Some(*c));
                if let Some(c) = picked.or_else(|| set.representative()) {
                    out.push(c);
                }
            }
            LexPattern::Ref(index) => {
                let rule = &self.grammar.lexer_rules()[*index];
                if !rule.alternatives.is_empty() {
                    let alt = &rule.alternatives[rng.below(rule.alternatives.len())];
                    self.write_pattern(alt, rng, out);
                }
            }
            LexPattern::Seq(items) => {
                for item in items {
                    self.write_pattern(item, rng, out);
                }
            }
            LexPattern::Alt(items) => {
                if !items.is_empty() {
                    self.write_pattern(&items[rng.below(items.len())], rng, out);
                }
            }
            LexPattern::Repeat { pattern, op, greedy } => {
                // a lazy loop stops as early as it can, so its body must stay out of the text
                let reps = match (op, greedy) {
                    (_, false) => op.min(),
                    (RepeatOp::Optional, true) => rng.below(2),
                    (RepeatOp::ZeroOrMore, true) => rng.below(self.config.max_repetitions + 1),
                    (RepeatOp::OneOrMore, true) => 1 + rng.below(self.config.max_repetitions),
                };
                for _ in 0..reps {
                    self.write_pattern(pattern, rng, out);
                }
            }
        }
    }
}

/// Fixed point of the fewest rule expansions each rule needs to finish
fn rule_heights(grammar: &Grammar) -> Vec<usize> {
    let rules = grammar.parser_rules();
    let mut height = vec![usize::MAX; rules.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for rule in rules {
            let best = rule
                .alternatives
                .iter()
                .map(|alt| sequence_height(&height, &alt.elements))
                .min()
                .unwrap_or(usize::MAX)
                .saturating_add(1);
            if best < height[rule.id.index()] {
                height[rule.id.index()] = best;
                changed = true;
            }
        }
    }
    height
}

fn sequence_height(height: &[usize], elements: &[Element]) -> usize {
    elements
        .iter()
        .map(|e| element_height(height, e))
        .max()
        .unwrap_or(0)
}

fn element_height(height: &[usize], element: &Element) -> usize {
    match element {
        Element::Token { .. } => 0,
        Element::Rule { rule, .. } => height[rule.index()],
        Element::Block(block) => block
            .alternatives
            .iter()
            .map(|alt| sequence_height(height, &alt.elements))
            .min()
            .unwrap_or(0),
        Element::Repeat { body, op, .. } => match op {
            RepeatOp::OneOrMore => element_height(height, body),
            RepeatOp::Optional | RepeatOp::ZeroOrMore => 0,
        },
    }
}

/// Simple RNG for deterministic generation
#[derive(Debug, Clone)]
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn with_seed(seed: u64) -> Self {
        // xorshift never leaves the all-zero state
        Self {
            state: if seed == 0 { 0x853c_49e6_748f_ea9b } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Uniform-ish index in `0..bound`; 0 when `bound` is 0
    fn below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % bound as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_grammar;

    #[test]
    fn test_rng_determinism() {
        let mut a = SimpleRng::with_seed(12345);
        let mut b = SimpleRng::with_seed(12345);
        assert_eq!(a.next_u64(), b.next_u64());
        assert_eq!(a.next_u64(), b.next_u64());
        assert_ne!(SimpleRng::with_seed(0).next_u64(), 0);
    }

    #[test]
    fn test_same_seed_same_sentence() {
        let grammar = parse_grammar("s : ('a' | 'b')* 'c' ; WS : ' ' -> skip ;").unwrap();
        let generator = SentenceGenerator::new(&grammar, GeneratorConfig::default());
        assert_eq!(generator.generate(99), generator.generate(99));
        assert!(generator.generate(3).ends_with('c'));
    }

    #[test]
    fn test_depth_limit_terminates_recursion() {
        let grammar = parse_grammar("e : '(' e ')' | 'x' ;").unwrap();
        let config = GeneratorConfig {
            max_depth: 3,
            separator: String::new(),
            ..GeneratorConfig::default()
        };
        let generator = SentenceGenerator::new(&grammar, config);
        for seed in 1..50 {
            let sentence = generator.generate(seed);
            assert!(sentence.len() <= 7, "{sentence}");
            assert!(sentence.contains('x'));
        }
    }

    #[test]
    fn test_heights() {
        let grammar = parse_grammar("a : b | 'x' b ; b : c ; c : 'y' ;").unwrap();
        assert_eq!(rule_heights(&grammar), vec![3, 2, 1]);
    }

    #[test]
    fn test_lexemes_follow_patterns() {
        let grammar = parse_grammar("s : ID N ; ID : [a-z] [a-z0-9]* ; N : DIGIT+ ; fragment DIGIT : [0-9] ;").unwrap();
        let generator = SentenceGenerator::new(&grammar, GeneratorConfig::default());
        for seed in 1..20 {
            let sentence = generator.generate(seed);
            let (id, n) = sentence.split_once(' ').unwrap();
            assert!(id.starts_with(|c: char| c.is_ascii_lowercase()));
            assert!(!n.is_empty() && n.chars().all(|c| c.is_ascii_digit()), "{sentence}");
        }
    }
}
