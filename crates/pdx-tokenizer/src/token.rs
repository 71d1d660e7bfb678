//! Token types for the script lexer.

use crate::{Position, Range, Span};

/// Comparison and assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Assign,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `?=` (assign if the target exists)
    Conditional,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Assign => "=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::Conditional => "?=",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Structural tokens
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// Any of the comparison/assignment operators.
    Op(Operator),

    // Scalar tokens
    /// Bare word: `has_trait`, `scope:actor`, `@my_var`, `$PARAM$`, `1444.11.11`
    Identifier,
    /// Numeric literal: `42`, `-0.5`
    Number,
    /// Quoted string: `"hello \"world\""`
    String,
    /// Quoted string missing its closing quote before end of line.
    UnterminatedString,

    // Trivia
    /// `# ...` up to (not including) the newline.
    Comment,
    /// Horizontal whitespace, carriage returns and a leading BOM.
    Whitespace,
    /// `\n` or `\r\n`
    Newline,

    // Special tokens
    /// End of file
    Eof,
    /// Unrecognized input
    Error,
}

impl TokenKind {
    /// Whether this token is trivia the parser skips outright.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Newline)
    }

    /// Whether this token can act as a key or scalar value.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::UnterminatedString
        )
    }
}

/// A token with its kind, location and source text slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    /// The kind of token.
    pub kind: TokenKind,
    /// The byte span in the source text.
    pub span: Span,
    /// Line/column range of the token.
    pub range: Range,
    /// The source text of this token.
    pub text: &'src str,
}

impl<'src> Token<'src> {
    /// Create a new token.
    pub fn new(kind: TokenKind, span: Span, range: Range, text: &'src str) -> Self {
        Self {
            kind,
            span,
            range,
            text,
        }
    }

    #[inline]
    pub fn start(&self) -> Position {
        self.range.start
    }

    #[inline]
    pub fn end(&self) -> Position {
        self.range.end
    }
}
