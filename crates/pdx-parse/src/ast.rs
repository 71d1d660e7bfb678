//! Arena AST.
//!
//! Nodes live in one `Vec` in pre-order; children and parents refer to each
//! other by [`NodeId`]. For every node, its range contains the ranges of its
//! children, and sibling ranges are ordered and non-overlapping.

use pdx_tokenizer::{Operator, Position, Range, Span};

use crate::diagnostic::{Diagnostic, ParseError};

/// Index of a node in its [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// `key = { ... }` (or anonymous `{ ... }`) containing assignments.
    Block,
    /// `key = value`
    Assignment,
    /// `key = { a b c }`: braces holding only bare values or anonymous blocks.
    List,
    /// A bare value inside braces.
    Value,
    /// `# ...`
    Comment,
}

/// How a scalar was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bare,
    Number,
    Quoted,
}

/// A key or value with its location. `text` is unquoted and unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub text: String,
    pub kind: ScalarKind,
    pub span: Span,
    pub range: Range,
}

impl Scalar {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Numeric value of bare scalars that look like numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            ScalarKind::Quoted => None,
            _ => self.text.parse().ok(),
        }
    }

    /// `yes`/`no` booleans.
    pub fn as_bool(&self) -> Option<bool> {
        match self.text.as_str() {
            "yes" => Some(true),
            "no" => Some(false),
            _ => None,
        }
    }
}

/// One node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    pub kind: NodeKind,
    /// Left-hand side; `None` for anonymous blocks, values and comments.
    pub key: Option<Scalar>,
    pub operator: Option<Operator>,
    /// Right-hand side of an assignment, the item of a `Value`, the text of a
    /// `Comment` (without `#`). `None` for containers and for assignments
    /// whose value is missing.
    pub value: Option<Scalar>,
    /// Value tag of a container, e.g. `rgb` in `color = rgb { 1 2 3 }`.
    pub tag: Option<Scalar>,
    pub range: Range,
    pub span: Span,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// The opening brace was never closed; the parser closed it at end of input.
    pub unclosed: bool,
}

impl AstNode {
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_ref().map(Scalar::as_str)
    }

    pub fn value_str(&self) -> Option<&str> {
        self.value.as_ref().map(Scalar::as_str)
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Block | NodeKind::List)
    }

    pub fn is_comment(&self) -> bool {
        self.kind == NodeKind::Comment
    }
}

/// A parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ast {
    pub(crate) nodes: Vec<AstNode>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) errors: Vec<ParseError>,
}

impl Ast {
    /// Top-level nodes in source order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&AstNode> {
        self.nodes.get(id.index())
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &AstNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Recovery markers produced while parsing.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Parse errors as diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(ParseError::to_diagnostic).collect()
    }

    /// Children of `parent`, or the roots when `parent` is `None`.
    pub fn children_of(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => &self.node(id).children,
            None => &self.roots,
        }
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &AstNode)> {
        self.node(id)
            .children
            .iter()
            .map(move |&c| (c, self.node(c)))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Parent chain from the direct parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// First child of `parent` (or root) with the given key.
    pub fn child_by_key(&self, parent: Option<NodeId>, key: &str) -> Option<NodeId> {
        self.children_by_key(parent, key).next()
    }

    /// All children of `parent` (or roots) with the given key, in order.
    pub fn children_by_key<'a>(
        &'a self,
        parent: Option<NodeId>,
        key: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children_of(parent)
            .iter()
            .copied()
            .filter(move |&c| self.node(c).key_str() == Some(key))
    }

    /// Keys from the root down to `id` (anonymous levels are skipped).
    pub fn path(&self, id: NodeId) -> Vec<&str> {
        let mut path: Vec<&str> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|n| self.node(n).key_str())
            .collect();
        path.reverse();
        path
    }

    /// Innermost node whose range contains `pos`.
    ///
    /// Descends by binary search over each level's ordered siblings, so the
    /// cost is O(depth · log width).
    pub fn node_at(&self, pos: Position) -> Option<NodeId> {
        let mut found = None;
        let mut level: &[NodeId] = &self.roots;
        loop {
            let idx = level.partition_point(|&c| self.node(c).range.start <= pos);
            if idx == 0 {
                return found;
            }
            let candidate = level[idx - 1];
            let node = self.node(candidate);
            if !node.range.contains(pos) {
                return found;
            }
            found = Some(candidate);
            level = &node.children;
        }
    }

    /// Like [`Ast::node_at`] but returns the node itself.
    pub fn node_ref_at(&self, pos: Position) -> Option<&AstNode> {
        self.node_at(pos).map(|id| self.node(id))
    }
}
