//! Recursive-descent parser with error recovery.

use pdx_tokenizer::{Range, Span, Token, TokenKind, Tokenizer};
use tracing::{debug, trace};

use crate::ast::{Ast, AstNode, NodeId, NodeKind, Scalar, ScalarKind};
use crate::diagnostic::{ParseError, ParseErrorKind};

/// Deepest brace nesting the parser descends into. Deeper blocks are kept as
/// empty nodes and reported with [`ParseErrorKind::NestingTooDeep`].
pub const MAX_DEPTH: usize = 256;

/// Parse a document. Never fails: malformed input yields a partial tree and
/// recovery markers in [`Ast::errors`].
pub fn parse(source: &str) -> Ast {
    let ast = Parser::new(source).parse();
    debug!(
        nodes = ast.len(),
        errors = ast.errors().len(),
        "parsed document"
    );
    ast
}

struct Parser<'src> {
    /// Non-trivia tokens; always ends with `Eof`.
    tokens: Vec<Token<'src>>,
    pos: usize,
    ast: Ast,
}

/// How a brace-delimited body ended.
enum BodyEnd {
    /// Closed by the `}` with this range and span.
    Closed(Range, Span),
    /// Ran into end of input.
    Eof(Range, Span),
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        let mut tokenizer = Tokenizer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = tokenizer.next_token();
            let kind = token.kind;
            if !kind.is_trivia() {
                tokens.push(token);
            }
            if kind == TokenKind::Eof {
                break;
            }
        }
        Self {
            tokens,
            pos: 0,
            ast: Ast::default(),
        }
    }

    fn parse(mut self) -> Ast {
        self.parse_body(None, 0);
        self.ast
    }

    fn peek(&self) -> &Token<'src> {
        // `tokens` ends with Eof and `pos` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_nth(&self, n: usize) -> &Token<'src> {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token<'src> {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn error(&mut self, kind: ParseErrorKind, span: Span, range: Range) {
        trace!(?kind, ?range, "parse error");
        self.ast.errors.push(ParseError::new(kind, span, range));
    }

    fn push_node(&mut self, parent: Option<NodeId>, mut node: AstNode) -> NodeId {
        node.parent = parent;
        let id = NodeId(self.ast.nodes.len() as u32);
        self.ast.nodes.push(node);
        match parent {
            Some(p) => self.ast.nodes[p.index()].children.push(id),
            None => self.ast.roots.push(id),
        }
        id
    }

    /// Parse entries until `}` (when inside braces) or end of input.
    fn parse_body(&mut self, parent: Option<NodeId>, depth: usize) -> BodyEnd {
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Eof => return BodyEnd::Eof(token.range, token.span),
                TokenKind::RBrace => {
                    self.advance();
                    if parent.is_some() {
                        return BodyEnd::Closed(token.range, token.span);
                    }
                    self.error(ParseErrorKind::UnmatchedCloseBrace, token.span, token.range);
                }
                TokenKind::Comment => {
                    self.advance();
                    let text = token.text.trim_start_matches('#').trim();
                    let comment = Scalar {
                        text: text.to_string(),
                        kind: ScalarKind::Bare,
                        span: token.span,
                        range: token.range,
                    };
                    self.push_node(parent, leaf(NodeKind::Comment, comment, &token));
                }
                TokenKind::LBrace => {
                    self.parse_container(parent, depth, None, None, None);
                }
                TokenKind::Op(_) | TokenKind::Error => {
                    self.advance();
                    self.error(
                        ParseErrorKind::UnexpectedToken(token.text.to_string()),
                        token.span,
                        token.range,
                    );
                }
                kind if kind.is_scalar() => {
                    if matches!(self.peek_nth(1).kind, TokenKind::Op(_)) {
                        self.parse_entry(parent, depth);
                    } else {
                        let value = self.scalar();
                        self.push_node(parent, leaf(NodeKind::Value, value, &token));
                    }
                }
                _ => {
                    self.advance();
                    self.error(
                        ParseErrorKind::UnexpectedToken(token.text.to_string()),
                        token.span,
                        token.range,
                    );
                }
            }
        }
    }

    /// `key op value`, `key op { ... }` or `key op tag { ... }`.
    fn parse_entry(&mut self, parent: Option<NodeId>, depth: usize) {
        let key_token = self.peek().clone();
        let key = self.scalar();
        let op_token = self.advance();
        let TokenKind::Op(operator) = op_token.kind else {
            return;
        };

        let next = self.peek().clone();
        match next.kind {
            TokenKind::LBrace => {
                self.parse_container(parent, depth, Some(key), Some(operator), None);
            }
            kind if kind.is_scalar() => {
                let after = self.peek_nth(1);
                let is_tag = kind == TokenKind::Identifier
                    && after.kind == TokenKind::LBrace
                    && after.range.start.line == next.range.end.line;
                let value = self.scalar();
                if is_tag {
                    self.parse_container(parent, depth, Some(key), Some(operator), Some(value));
                } else {
                    let node = AstNode {
                        kind: NodeKind::Assignment,
                        range: Range::new(key_token.start(), value.range.end),
                        span: key.span.extend(value.span),
                        key: Some(key),
                        operator: Some(operator),
                        value: Some(value),
                        tag: None,
                        children: Vec::new(),
                        parent,
                        unclosed: false,
                    };
                    self.push_node(parent, node);
                }
            }
            _ => {
                // `}`, end of input, another operator or a comment: the value is
                // missing. The offending token is left for the enclosing body.
                self.error(ParseErrorKind::MissingValue, op_token.span, op_token.range);
                let node = AstNode {
                    kind: NodeKind::Assignment,
                    range: Range::new(key_token.start(), op_token.end()),
                    span: key.span.extend(op_token.span),
                    key: Some(key),
                    operator: Some(operator),
                    value: None,
                    tag: None,
                    children: Vec::new(),
                    parent,
                    unclosed: false,
                };
                self.push_node(parent, node);
            }
        }
    }

    /// Parse a `{ ... }` body; the current token is the opening brace.
    fn parse_container(
        &mut self,
        parent: Option<NodeId>,
        depth: usize,
        key: Option<Scalar>,
        operator: Option<crate::Operator>,
        tag: Option<Scalar>,
    ) {
        let brace = self.advance();
        let (start, start_span) = match &key {
            Some(k) => (k.range.start, k.span),
            None => (brace.start(), brace.span),
        };
        let id = self.push_node(
            parent,
            AstNode {
                kind: NodeKind::Block,
                key,
                operator,
                value: None,
                tag,
                range: Range::new(start, brace.end()),
                span: start_span.extend(brace.span),
                children: Vec::new(),
                parent,
                unclosed: false,
            },
        );

        let end = if depth >= MAX_DEPTH {
            self.error(ParseErrorKind::NestingTooDeep, brace.span, brace.range);
            self.skip_balanced()
        } else {
            self.parse_body(Some(id), depth + 1)
        };

        let (end_range, end_span, unclosed) = match end {
            BodyEnd::Closed(range, span) => (range, span, false),
            BodyEnd::Eof(range, span) => {
                self.error(ParseErrorKind::UnclosedBlock, brace.span, brace.range);
                (range, span, true)
            }
        };

        let kind = container_kind(&self.ast, id);
        let node = &mut self.ast.nodes[id.index()];
        node.kind = kind;
        node.range.end = end_range.end;
        node.span = node.span.extend(end_span);
        node.unclosed = unclosed;
    }

    /// Skip to the `}` matching an already consumed `{`.
    fn skip_balanced(&mut self) -> BodyEnd {
        let mut level = 1usize;
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Eof => return BodyEnd::Eof(token.range, token.span),
                TokenKind::LBrace => level += 1,
                TokenKind::RBrace => {
                    level -= 1;
                    if level == 0 {
                        return BodyEnd::Closed(token.range, token.span);
                    }
                }
                _ => {}
            }
        }
    }

    /// Consume a scalar token.
    fn scalar(&mut self) -> Scalar {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Number => ScalarKind::Number,
            TokenKind::String | TokenKind::UnterminatedString => ScalarKind::Quoted,
            _ => ScalarKind::Bare,
        };
        let text = match token.kind {
            TokenKind::String => unescape(strip_quotes(token.text, true)),
            TokenKind::UnterminatedString => {
                self.error(ParseErrorKind::UnterminatedString, token.span, token.range);
                unescape(strip_quotes(token.text, false))
            }
            _ => token.text.to_string(),
        };
        Scalar {
            text,
            kind,
            span: token.span,
            range: token.range,
        }
    }
}

fn leaf(kind: NodeKind, value: Scalar, token: &Token<'_>) -> AstNode {
    AstNode {
        kind,
        key: None,
        operator: None,
        value: Some(value),
        tag: None,
        range: token.range,
        span: token.span,
        children: Vec::new(),
        parent: None,
        unclosed: false,
    }
}

/// Any keyed child makes a block; only values or anonymous blocks make a list.
fn container_kind(ast: &Ast, id: NodeId) -> NodeKind {
    let mut entries = ast
        .node(id)
        .children
        .iter()
        .map(|&c| ast.node(c))
        .filter(|n| !n.is_comment())
        .peekable();
    if entries.peek().is_none() || entries.any(|n| n.key.is_some()) {
        NodeKind::Block
    } else {
        NodeKind::List
    }
}

fn strip_quotes(text: &str, closed: bool) -> &str {
    let text = text.strip_prefix('"').unwrap_or(text);
    if closed {
        text.strip_suffix('"').unwrap_or(text)
    } else {
        text
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests;
