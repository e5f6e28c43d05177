//! Target-agnostic description of a generated parser.
//!
//! Backends never look at the [`Grammar`] directly; everything they need
//! (token table, rules with their lookahead, precedence tables, driver
//! settings) is resolved here once.

use crate::analysis::left_recursion::operator_tokens;
use crate::analysis::{FirstFollow, LeftRecursion, RecursionKind, TokenSet};
use crate::automaton::Automaton;
use crate::grammar::{Assoc, CharSet, Element, Grammar, LexPattern, RepeatOp, RuleId, TokenSource};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct TokenEntry {
    pub id: u32,
    /// Identifier form (`ID`, `T__0`, `EOF`)
    pub name: String,
    /// Name shown to users (`ID`, `'+'`, `EOF`)
    pub display: String,
    pub literal: Option<String>,
    /// Regular expression matching the token; `None` for `EOF` and virtual tokens
    pub pattern: Option<String>,
    pub skip: bool,
    pub channel: u16,
    pub channel_name: String,
    /// Kind actually emitted (differs under `-> type(X)`)
    pub emit_as: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub enum RepeatKind {
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase", tag = "kind"))]
pub enum ElementIr {
    Token {
        token: u32,
        label: Option<String>,
    },
    Rule {
        rule: u32,
        label: Option<String>,
        /// Minimum precedence for a trailing self reference of a primary
        precedence: Option<u32>,
    },
    Block {
        choices: Vec<ChoiceIr>,
    },
    Repeat {
        body: Box<ElementIr>,
        repeat: RepeatKind,
        greedy: bool,
        /// Tokens that start another iteration
        enter: Vec<u32>,
    },
}

/// One alternative with the tokens that predict it
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct ChoiceIr {
    /// Alternative index in the source rule or block
    pub index: usize,
    pub label: Option<String>,
    pub predict: Vec<u32>,
    pub elements: Vec<ElementIr>,
    /// Grammar text of the alternative, for comments in generated code
    pub text: String,
}

/// A binary operator alternative of a precedence-climbing rule
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct OperatorIr {
    pub alternative: usize,
    pub label: Option<String>,
    pub tokens: Vec<u32>,
    /// Higher binds tighter
    pub precedence: u32,
    pub right_assoc: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct RuleIr {
    pub id: u32,
    pub name: String,
    pub nullable: bool,
    pub first: Vec<u32>,
    pub follow: Vec<u32>,
    /// Alternatives chosen by lookahead; only the primaries of a precedence rule
    pub choices: Vec<ChoiceIr>,
    /// Empty unless the rule is parsed by precedence climbing
    pub operators: Vec<OperatorIr>,
    pub left_recursion: String,
}

impl RuleIr {
    #[must_use]
    pub fn uses_precedence(&self) -> bool {
        !self.operators.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct DriverIr {
    pub grammar: String,
    pub start_rule: String,
    pub start_rule_id: u32,
    pub eof: u32,
    pub lookahead: usize,
    pub skipped: Vec<u32>,
    pub atn_states: usize,
    pub atn_transitions: usize,
    pub decisions: usize,
}

/// Everything a backend needs to render a parser
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
pub struct ParserIr {
    pub tokens: Vec<TokenEntry>,
    pub rules: Vec<RuleIr>,
    pub driver: DriverIr,
    /// Rules whose left recursion precedence climbing cannot handle
    pub unsupported: Vec<String>,
}

impl ParserIr {
    #[must_use]
    pub fn build(grammar: &Grammar, atn: &Automaton, sets: &FirstFollow, recursion: &LeftRecursion) -> Self {
        let tokens = grammar
            .tokens()
            .iter()
            .map(|t| TokenEntry {
                id: t.id.0,
                name: t.name.to_string(),
                display: t.display().to_string(),
                literal: t.literal.as_ref().map(ToString::to_string),
                pattern: match t.source {
                    TokenSource::Eof | TokenSource::Virtual => None,
                    TokenSource::Implicit => t.literal.as_deref().map(|lit| {
                        let mut out = String::new();
                        escape_regex_literal(lit, &mut out);
                        out
                    }),
                    TokenSource::Lexer(index) => Some(lexer_rule_regex(grammar, index)),
                },
                skip: t.skip,
                channel: t.channel,
                channel_name: grammar.channel_name(t.channel).to_string(),
                emit_as: t.emit_as.0,
            })
            .collect();

        let builder = RuleBuilder {
            grammar,
            sets,
        };
        let rules = grammar
            .parser_rules()
            .iter()
            .map(|rule| builder.rule(rule.id, recursion))
            .collect();

        let start = grammar.start_rule();
        Self {
            tokens,
            rules,
            driver: DriverIr {
                grammar: grammar.name().to_string(),
                start_rule: grammar.rule(start).name.to_string(),
                start_rule_id: start.0,
                eof: 0,
                lookahead: 1,
                skipped: grammar.tokens().iter().filter(|t| t.skip).map(|t| t.id.0).collect(),
                atn_states: atn.state_count(),
                atn_transitions: atn.transition_count(),
                decisions: grammar.decisions().len(),
            },
            unsupported: recursion
                .unsupported()
                .map(|r| grammar.rule(r.rule).name.to_string())
                .collect(),
        }
    }

    #[must_use]
    pub fn rule(&self, id: u32) -> &RuleIr {
        &self.rules[id as usize]
    }

    #[must_use]
    pub fn token(&self, id: u32) -> &TokenEntry {
        &self.tokens[id as usize]
    }

    /// Tokens the lexer can produce, in priority order
    pub fn lexed_tokens(&self) -> impl Iterator<Item = &TokenEntry> + '_ {
        self.tokens.iter().filter(|t| t.pattern.is_some())
    }
}

struct RuleBuilder<'a> {
    grammar: &'a Grammar,
    sets: &'a FirstFollow,
}

impl RuleBuilder<'_> {
    fn rule(&self, id: RuleId, recursion: &LeftRecursion) -> RuleIr {
        let rule = self.grammar.rule(id);
        let info = recursion.rule(id);
        let levels = rule.alternatives.len();
        let predict = |index: usize| match rule.decision {
            Some(decision) => ids(&self.sets.decision(decision).predict[index]),
            None => ids(&self.sets.sequence_first(&rule.alternatives[index].elements).0),
        };
        let precedence = |index: usize| u32::try_from(levels - index).unwrap_or(u32::MAX);

        let climbing = info.kind == RecursionKind::Direct && info.eliminable;
        let (choices, operators) = if climbing {
            let choices = (0..levels)
                .filter(|i| !info.alternatives.contains(i))
                .map(|i| {
                    let alt = &rule.alternatives[i];
                    let mut elements: Vec<ElementIr> = alt.elements.iter().map(|e| self.element(e)).collect();
                    if let (Some(Element::Rule { rule: last, .. }), Some(ElementIr::Rule { precedence: p, .. })) =
                        (alt.elements.last(), elements.last_mut())
                    {
                        if *last == id {
                            *p = Some(precedence(i));
                        }
                    }
                    ChoiceIr {
                        index: i,
                        label: alt.label.as_ref().map(ToString::to_string),
                        predict: predict(i),
                        elements,
                        text: self.grammar.render_alternative(alt),
                    }
                })
                .collect();
            let operators = info
                .alternatives
                .iter()
                .map(|&i| {
                    let alt = &rule.alternatives[i];
                    OperatorIr {
                        alternative: i,
                        label: alt.label.as_ref().map(ToString::to_string),
                        tokens: operator_tokens(&alt.elements[1])
                            .unwrap_or_default()
                            .into_iter()
                            .map(|t| t.0)
                            .collect(),
                        precedence: precedence(i),
                        right_assoc: alt.assoc == Assoc::Right,
                        text: self.grammar.render_alternative(alt),
                    }
                })
                .collect();
            (choices, operators)
        } else {
            let choices = rule
                .alternatives
                .iter()
                .enumerate()
                .map(|(i, alt)| ChoiceIr {
                    index: i,
                    label: alt.label.as_ref().map(ToString::to_string),
                    predict: predict(i),
                    elements: alt.elements.iter().map(|e| self.element(e)).collect(),
                    text: self.grammar.render_alternative(alt),
                })
                .collect();
            (choices, Vec::new())
        };

        RuleIr {
            id: id.0,
            name: rule.name.to_string(),
            nullable: self.sets.nullable(id),
            first: ids(self.sets.first(id)),
            follow: ids(self.sets.follow(id)),
            choices,
            operators,
            left_recursion: info.kind.to_string(),
        }
    }

    fn element(&self, element: &Element) -> ElementIr {
        match element {
            Element::Token { token, label } => ElementIr::Token {
                token: token.0,
                label: label.as_ref().map(ToString::to_string),
            },
            Element::Rule { rule, label } => ElementIr::Rule {
                rule: rule.0,
                label: label.as_ref().map(ToString::to_string),
                precedence: None,
            },
            Element::Block(block) => ElementIr::Block {
                choices: block
                    .alternatives
                    .iter()
                    .enumerate()
                    .map(|(i, alt)| ChoiceIr {
                        index: i,
                        label: alt.label.as_ref().map(ToString::to_string),
                        predict: match block.decision {
                            Some(decision) => ids(&self.sets.decision(decision).predict[i]),
                            None => ids(&self.sets.sequence_first(&alt.elements).0),
                        },
                        elements: alt.elements.iter().map(|e| self.element(e)).collect(),
                        text: self.grammar.render_alternative(alt),
                    })
                    .collect(),
            },
            Element::Repeat {
                body,
                op,
                greedy,
                decision,
            } => ElementIr::Repeat {
                body: Box::new(self.element(body)),
                repeat: match op {
                    RepeatOp::Optional => RepeatKind::Optional,
                    RepeatOp::ZeroOrMore => RepeatKind::ZeroOrMore,
                    RepeatOp::OneOrMore => RepeatKind::OneOrMore,
                },
                greedy: *greedy,
                enter: ids(&self.sets.decision(*decision).predict[0]),
            },
        }
    }
}

fn ids(set: &TokenSet) -> Vec<u32> {
    set.iter().map(|t| t.0).collect()
}

/// Regular expression for one lexer rule, fragments inlined
#[must_use]
pub fn lexer_rule_regex(grammar: &Grammar, index: usize) -> String {
    let mut out = String::new();
    let alternatives = &grammar.lexer_rules()[index].alternatives;
    for (i, alt) in alternatives.iter().enumerate() {
        if i > 0 {
            out.push('|');
        }
        pattern_regex(grammar, alt, &mut out);
    }
    out
}

fn pattern_regex(grammar: &Grammar, pattern: &LexPattern, out: &mut String) {
    match pattern {
        LexPattern::Literal(lit) => escape_regex_literal(lit, out),
        LexPattern::Set(set) => {
            if *set == CharSet::any() {
                out.push_str("(?s:.)");
                return;
            }
            if set.is_empty() {
                out.push_str("[^\\s\\S]");
                return;
            }
            out.push('[');
            for range in set.ranges() {
                escape_class_char(*range.start(), out);
                if range.start() != range.end() {
                    out.push('-');
                    escape_class_char(*range.end(), out);
                }
            }
            out.push(']');
        }
        LexPattern::Ref(index) => {
            out.push_str("(?:");
            out.push_str(&lexer_rule_regex(grammar, *index));
            out.push(')');
        }
        LexPattern::Seq(items) => {
            for item in items {
                pattern_regex(grammar, item, out);
            }
        }
        LexPattern::Alt(items) => {
            out.push_str("(?:");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('|');
                }
                pattern_regex(grammar, item, out);
            }
            out.push(')');
        }
        LexPattern::Repeat { pattern, op, greedy } => {
            out.push_str("(?:");
            pattern_regex(grammar, pattern, out);
            out.push(')');
            out.push(op.suffix());
            if !greedy {
                out.push('?');
            }
        }
    }
}

fn escape_regex_literal(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '#' | '&' | '-'
            | '~' => {
                out.push('\\');
                out.push(c);
            }
            c => escape_plain(c, out),
        }
    }
}

fn escape_class_char(c: char, out: &mut String) {
    match c {
        '\\' | ']' | '[' | '^' | '-' | '&' | '~' => {
            out.push('\\');
            out.push(c);
        }
        c => escape_plain(c, out),
    }
}

fn escape_plain(c: char, out: &mut String) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c.is_control() || c == ' ' || c as u32 > 0x7E => {
            let _ = write!(out, "\\x{{{:X}}}", c as u32);
        }
        c => out.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_left_recursion, compute_first_follow};
    use crate::automaton::build_automaton;
    use crate::grammar::parse_grammar;

    fn ir(source: &str) -> ParserIr {
        let grammar = parse_grammar(source).unwrap();
        let atn = build_automaton(&grammar);
        let sets = compute_first_follow(&grammar);
        let recursion = analyze_left_recursion(&grammar, &sets);
        ParserIr::build(&grammar, &atn, &sets, &recursion)
    }

    #[test]
    fn test_token_patterns() {
        let ir = ir("s : 'a+' ID ; ID : [a-z] [a-z0-9]* ; fragment D : [0-9] ; N : D+ ; C : '/*' .*? '*/' -> skip ;");
        let patterns: Vec<_> = ir.lexed_tokens().map(|t| t.pattern.clone().unwrap()).collect();
        assert_eq!(
            patterns,
            ["a\\+", "[a-z](?:[0-9a-z])*", "(?:(?:[0-9]))+", "/\\*(?:(?s:.))*?\\*/"]
        );
        assert_eq!(ir.driver.skipped, vec![ir.tokens.last().unwrap().id]);
    }

    #[test]
    fn test_precedence_tables() {
        let ir = ir("e : e ('*' | '/') e | <assoc=right> e '^' e | '-' e | N ; N : [0-9]+ ;");
        let rule = ir.rule(0);
        assert!(rule.uses_precedence());
        assert_eq!(rule.operators.len(), 2);
        assert_eq!(rule.operators[0].precedence, 4);
        assert_eq!(rule.operators[0].tokens.len(), 2);
        assert!(rule.operators[1].right_assoc);
        assert_eq!(rule.choices.iter().map(|c| c.index).collect::<Vec<_>>(), [2, 3]);
        assert!(matches!(
            rule.choices[0].elements.last(),
            Some(ElementIr::Rule { precedence: Some(2), .. })
        ));
        assert_eq!(rule.left_recursion, "direct");
    }
}
