//! A tokenizer for Paradox-style script (`key = value`, `key = { ... }`, `# comment`).

mod span;
pub use span::{Position, Range, Span};

mod token;
pub use token::{Operator, Token, TokenKind};

mod tokenizer;
pub use tokenizer::Tokenizer;
