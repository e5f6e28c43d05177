//! Arena-backed parse trees.
//!
//! Nodes live in one `Vec` and refer to their children by [`NodeId`].
//! Children are always allocated before their parent, so discarding a
//! failed speculative parse is a truncation of the arena.

use crate::grammar::{Grammar, RuleId};
use crate::lexer::Token;
use crate::text::Span;
use compact_str::CompactString;
use smallvec::SmallVec;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A rule invocation and the alternative that matched
    Rule {
        rule: RuleId,
        alternative: usize,
        label: Option<CompactString>,
    },
    /// A matched token
    Token(Token),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Element label (`name=` / `name+=`) the node was matched under
    pub field: Option<CompactString>,
    pub span: Span,
    children: SmallVec<[NodeId; 4]>,
}

impl Node {
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn rule(&self) -> Option<RuleId> {
        match &self.kind {
            NodeKind::Rule { rule, .. } => Some(*rule),
            NodeKind::Token(_) => None,
        }
    }

    /// Index of the matched alternative, for rule nodes
    #[must_use]
    pub fn alternative(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::Rule { alternative, .. } => Some(*alternative),
            NodeKind::Token(_) => None,
        }
    }

    /// Alternative label (`# name`), for rule nodes
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Rule { label, .. } => label.as_deref(),
            NodeKind::Token(_) => None,
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        match &self.kind {
            NodeKind::Token(token) => Some(token),
            NodeKind::Rule { .. } => None,
        }
    }

    #[must_use]
    pub fn is_token(&self) -> bool {
        matches!(self.kind, NodeKind::Token(_))
    }
}

/// A concrete parse tree
///
/// The default tree is empty; its root id points at no node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl ParseTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    pub(crate) fn push_token(&mut self, token: Token, field: Option<CompactString>) -> NodeId {
        self.alloc(Node {
            span: token.span,
            kind: NodeKind::Token(token),
            field,
            children: SmallVec::new(),
        })
    }

    /// Add a rule node; `offset` is used as its span when it has no children
    pub(crate) fn push_rule(
        &mut self,
        rule: RuleId,
        alternative: usize,
        label: Option<CompactString>,
        children: SmallVec<[NodeId; 4]>,
        offset: usize,
    ) -> NodeId {
        let span = children
            .iter()
            .map(|c| self.nodes[c.index()].span)
            .reduce(Span::cover)
            .unwrap_or(Span::at(offset));
        self.alloc(Node {
            kind: NodeKind::Rule {
                rule,
                alternative,
                label,
            },
            field: None,
            span,
            children,
        })
    }

    pub(crate) fn set_field(&mut self, id: NodeId, field: Option<CompactString>) {
        if field.is_some() {
            self.nodes[id.index()].field = field;
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub(crate) fn finish(mut self, root: NodeId) -> Self {
        self.root = root;
        self
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// First child matched under the element label `field`
    #[must_use]
    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.node(*c).field.as_deref() == Some(field))
    }

    /// All nodes below `id` (inclusive), in pre-order
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![id];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.children(next).iter().rev().copied());
            Some(next)
        })
    }

    /// Rule nodes for `rule` below `id` (inclusive), in pre-order
    pub fn find_rule(&self, id: NodeId, rule: RuleId) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(id)
            .filter(move |n| self.node(*n).rule() == Some(rule))
    }

    /// Tokens covered by `id`, in input order
    pub fn tokens(&self, id: NodeId) -> impl Iterator<Item = &Token> + '_ {
        self.descendants(id).filter_map(move |n| self.node(n).token())
    }

    /// Concatenated text of the tokens under `id`, without `EOF`
    #[must_use]
    pub fn text(&self, id: NodeId) -> String {
        self.tokens(id)
            .filter(|t| !t.is_eof())
            .map(|t| t.text.as_str())
            .collect()
    }

    /// Height of the tree; a lone leaf has depth 1
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(self.root, 1)];
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(self.children(id).iter().map(|c| (*c, depth + 1)));
        }
        deepest
    }

    /// LISP-style rendering: `(prog (expr 2 + 3) <EOF>)`
    #[must_use]
    pub fn to_lisp(&self, grammar: &Grammar) -> String {
        let mut out = String::new();
        if !self.nodes.is_empty() {
            self.write_lisp(grammar, self.root, &mut out);
        }
        out
    }

    fn write_lisp(&self, grammar: &Grammar, id: NodeId, out: &mut String) {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Token(token) => out.push_str(&token.text),
            NodeKind::Rule { rule, .. } => {
                let name = &grammar.rule(*rule).name;
                if node.children.is_empty() {
                    out.push_str(name);
                    return;
                }
                out.push('(');
                out.push_str(name);
                for child in &node.children {
                    out.push(' ');
                    self.write_lisp(grammar, *child, out);
                }
                out.push(')');
            }
        }
    }

    /// Indented outline, one node per line
    ///
    /// ```text
    /// expr #add
    ///   expr #num
    ///     NUMBER "2"
    ///   '+' "+"
    /// ```
    #[must_use]
    pub fn to_outline(&self, grammar: &Grammar) -> String {
        let mut out = String::new();
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, indent)) = stack.pop() {
            let node = self.node(id);
            let _ = write!(out, "{:width$}", "", width = indent * 2);
            if let Some(field) = &node.field {
                let _ = write!(out, "{field}=");
            }
            match &node.kind {
                NodeKind::Token(token) => {
                    let _ = write!(out, "{} {:?}", grammar.token(token.kind).display(), token.text.as_str());
                }
                NodeKind::Rule { rule, label, .. } => {
                    out.push_str(&grammar.rule(*rule).name);
                    if let Some(label) = label {
                        let _ = write!(out, " #{label}");
                    }
                }
            }
            out.push('\n');
            stack.extend(node.children.iter().rev().map(|c| (*c, indent + 1)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{TokenId, parse_grammar};

    fn token(kind: u32, text: &str, start: usize) -> Token {
        Token {
            kind: TokenId(kind),
            text: text.into(),
            span: Span::new(start, start + text.len()),
            channel: 0,
        }
    }

    #[test]
    fn test_manual_tree_rendering() {
        let grammar = parse_grammar("s : A B ; A : 'a' ; B : 'b' ;").unwrap();
        let mut tree = ParseTree::new();
        let a = tree.push_token(token(1, "a", 0), Some("first".into()));
        let b = tree.push_token(token(2, "b", 2), None);
        let root = tree.push_rule(RuleId(0), 0, None, SmallVec::from_slice(&[a, b]), 0);
        let tree = tree.finish(root);

        assert_eq!(tree.to_lisp(&grammar), "(s a b)");
        assert_eq!(tree.node(root).span, Span::new(0, 3));
        assert_eq!(tree.child_by_field(root, "first"), Some(a));
        assert_eq!(tree.text(root), "ab");
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.to_outline(&grammar), "s\n  first=A \"a\"\n  B \"b\"\n");
    }

    #[test]
    fn test_default_tree_is_empty() {
        let grammar = parse_grammar("s : A ; A : 'a' ;").unwrap();
        let tree = ParseTree::default();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), NodeId::default());
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.to_lisp(&grammar), "");
        assert_eq!(tree, ParseTree::new());
    }

    #[test]
    fn test_truncate_discards_speculative_nodes() {
        let mut tree = ParseTree::new();
        tree.push_token(token(1, "a", 0), None);
        let mark = tree.len();
        tree.push_token(token(2, "b", 1), None);
        tree.truncate(mark);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_empty_rule_node_uses_offset() {
        let grammar = parse_grammar("s : A? ; A : 'a' ;").unwrap();
        let mut tree = ParseTree::new();
        let root = tree.push_rule(RuleId(0), 0, None, SmallVec::new(), 7);
        let tree = tree.finish(root);
        assert_eq!(tree.node(root).span, Span::at(7));
        assert_eq!(tree.to_lisp(&grammar), "s");
    }
}
