//! Parsing for Paradox-style script.
//!
//! [`parse`] turns source text into an [`Ast`]: an arena of positioned nodes
//! with parent links stored as indices. Parsing is total: malformed input
//! produces a best-effort tree plus [`ParseError`]s, never a panic.

mod ast;
mod diagnostic;
mod parser;

pub use ast::{Ast, AstNode, NodeId, NodeKind, Scalar, ScalarKind};
pub use diagnostic::{Diagnostic, DiagnosticSource, ParseError, ParseErrorKind, Severity};
pub use parser::{MAX_DEPTH, parse};
pub use pdx_tokenizer::{Operator, Position, Range, Span};
