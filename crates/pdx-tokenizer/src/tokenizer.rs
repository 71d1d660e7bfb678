//! Tokenizer for Paradox-style script.

use crate::{Operator, Position, Range, Span, Token, TokenKind};
use tracing::trace;

/// A tokenizer that produces tokens from script source text.
#[derive(Clone)]
pub struct Tokenizer<'src> {
    /// The source text being tokenized.
    source: &'src str,
    /// The remaining source text (suffix of `source`).
    remaining: &'src str,
    /// Current byte position in `source`.
    pos: u32,
    /// Current line/column.
    cursor: Position,
}

impl<'src> Tokenizer<'src> {
    /// Create a new tokenizer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            remaining: source,
            pos: 0,
            cursor: Position::default(),
        }
    }

    /// Get the current byte position.
    #[inline]
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Get the current line/column.
    #[inline]
    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// Check if we're at the end of input.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Peek at the next character without consuming it.
    #[inline]
    fn peek(&self) -> Option<char> {
        self.remaining.chars().next()
    }

    /// Peek at the nth character (0-indexed) without consuming.
    #[inline]
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.remaining.chars().nth(n)
    }

    /// Advance by one character and return it.
    #[inline]
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8() as u32;
        self.remaining = &self.remaining[c.len_utf8()..];
        if c == '\n' {
            self.cursor.line += 1;
            self.cursor.column = 0;
        } else {
            self.cursor.column += 1;
        }
        Some(c)
    }

    /// Create a token from the given start to the current position.
    fn token(&self, kind: TokenKind, start: u32, start_pos: Position) -> Token<'src> {
        let span = Span::new(start, self.pos);
        let text = &self.source[start as usize..self.pos as usize];
        trace!("Token {:?} at {:?}: {:?}", kind, span, text);
        Token::new(kind, span, Range::new(start_pos, self.cursor), text)
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token<'src> {
        let start = self.pos;
        let start_pos = self.cursor;

        let Some(c) = self.peek() else {
            return self.token(TokenKind::Eof, start, start_pos);
        };

        match c {
            '{' => {
                self.advance();
                self.token(TokenKind::LBrace, start, start_pos)
            }
            '}' => {
                self.advance();
                self.token(TokenKind::RBrace, start, start_pos)
            }
            '#' => self.tokenize_comment(),
            '"' => self.tokenize_quoted(),

            '=' | '<' | '>' | '!' | '?' => self.tokenize_operator(),

            '\n' => {
                self.advance();
                self.token(TokenKind::Newline, start, start_pos)
            }
            '\r' if self.peek_nth(1) == Some('\n') => {
                self.advance();
                self.advance();
                self.token(TokenKind::Newline, start, start_pos)
            }
            ' ' | '\t' | '\r' | '\u{feff}' => self.tokenize_whitespace(),

            _ if is_word_char(c) => self.tokenize_word(),

            _ => {
                self.advance();
                self.token(TokenKind::Error, start, start_pos)
            }
        }
    }

    /// Tokenize horizontal whitespace (spaces, tabs, lone CRs, BOM).
    fn tokenize_whitespace(&mut self) -> Token<'src> {
        let start = self.pos;
        let start_pos = self.cursor;
        while let Some(c) = self.peek() {
            let lone_cr = c == '\r' && self.peek_nth(1) != Some('\n');
            if c == ' ' || c == '\t' || c == '\u{feff}' || lone_cr {
                self.advance();
            } else {
                break;
            }
        }
        self.token(TokenKind::Whitespace, start, start_pos)
    }

    /// Tokenize a comment: `# ...` up to end of line.
    fn tokenize_comment(&mut self) -> Token<'src> {
        let start = self.pos;
        let start_pos = self.cursor;
        while let Some(c) = self.peek() {
            if c == '\n' || (c == '\r' && self.peek_nth(1) == Some('\n')) {
                break;
            }
            self.advance();
        }
        self.token(TokenKind::Comment, start, start_pos)
    }

    /// Tokenize a quoted string. Escapes are kept verbatim in the lexeme;
    /// an unterminated string stops at the end of the line.
    fn tokenize_quoted(&mut self) -> Token<'src> {
        let start = self.pos;
        let start_pos = self.cursor;
        self.advance(); // opening quote

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return self.token(TokenKind::UnterminatedString, start, start_pos);
                }
                Some('\r') if self.peek_nth(1) == Some('\n') => {
                    return self.token(TokenKind::UnterminatedString, start, start_pos);
                }
                Some('"') => {
                    self.advance();
                    return self.token(TokenKind::String, start, start_pos);
                }
                Some('\\') => {
                    self.advance();
                    if matches!(self.peek(), Some(c) if c != '\n') {
                        self.advance();
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Tokenize an operator with maximal munch.
    fn tokenize_operator(&mut self) -> Token<'src> {
        let start = self.pos;
        let start_pos = self.cursor;
        let first = self.advance();
        let followed_by_eq = self.peek() == Some('=');

        let op = match (first, followed_by_eq) {
            (Some('='), true) => Some(Operator::Equal),
            (Some('='), false) => Some(Operator::Assign),
            (Some('<'), true) => Some(Operator::LessEqual),
            (Some('<'), false) => Some(Operator::Less),
            (Some('>'), true) => Some(Operator::GreaterEqual),
            (Some('>'), false) => Some(Operator::Greater),
            (Some('!'), true) => Some(Operator::NotEqual),
            (Some('?'), true) => Some(Operator::Conditional),
            _ => None,
        };

        match op {
            Some(op) => {
                if followed_by_eq {
                    self.advance();
                }
                self.token(TokenKind::Op(op), start, start_pos)
            }
            // lone `!` or `?`
            None => self.token(TokenKind::Error, start, start_pos),
        }
    }

    /// Tokenize a bare word, classifying it as a number when it is one.
    fn tokenize_word(&mut self) -> Token<'src> {
        let start = self.pos;
        let start_pos = self.cursor;
        while let Some(c) = self.peek() {
            if is_word_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start as usize..self.pos as usize];
        let kind = if is_number(text) {
            TokenKind::Number
        } else {
            TokenKind::Identifier
        };
        self.token(kind, start, start_pos)
    }
}

impl<'src> Iterator for Tokenizer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

/// Characters allowed in bare words, including the domain punctuation used by
/// scopes (`scope:x`, `root.owner`), variables (`@x`), parameters (`$X$`),
/// negative numbers and dates.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
        || matches!(
            c,
            '_' | ':' | '.' | '$' | '@' | '-' | '+' | '\'' | '|' | '%' | '/' | '[' | ']' | '^'
        )
}

/// `-?digits(.digits)?`; dates like `1444.11.11` stay identifiers.
fn is_number(text: &str) -> bool {
    let unsigned = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    let mut parts = unsigned.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match frac_part {
        None => all_digits(int_part),
        Some(frac) => all_digits(int_part) && all_digits(frac),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<(TokenKind, &str)> {
        Tokenizer::new(source)
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_structural_tokens() {
        pdx_testhelpers::init_tracing();
        assert_eq!(tokenize("{"), vec![(TokenKind::LBrace, "{")]);
        assert_eq!(tokenize("}"), vec![(TokenKind::RBrace, "}")]);
        assert_eq!(
            tokenize("="),
            vec![(TokenKind::Op(Operator::Assign), "=")]
        );
    }

    #[test]
    fn test_operators_maximal_munch() {
        assert_eq!(
            tokenize("== != <= >= ?= < >"),
            vec![
                (TokenKind::Op(Operator::Equal), "=="),
                (TokenKind::Op(Operator::NotEqual), "!="),
                (TokenKind::Op(Operator::LessEqual), "<="),
                (TokenKind::Op(Operator::GreaterEqual), ">="),
                (TokenKind::Op(Operator::Conditional), "?="),
                (TokenKind::Op(Operator::Less), "<"),
                (TokenKind::Op(Operator::Greater), ">"),
            ]
        );
        // No whitespace between key, operator and value
        assert_eq!(
            tokenize("age>=16"),
            vec![
                (TokenKind::Identifier, "age"),
                (TokenKind::Op(Operator::GreaterEqual), ">="),
                (TokenKind::Number, "16"),
            ]
        );
    }

    #[test]
    fn test_lone_bang_is_error() {
        assert_eq!(tokenize("!"), vec![(TokenKind::Error, "!")]);
        assert_eq!(tokenize("?"), vec![(TokenKind::Error, "?")]);
    }

    #[test]
    fn test_identifiers_with_domain_punctuation() {
        for word in [
            "scope:actor",
            "root.primary_title",
            "@base_value",
            "$PARAM$",
            "has_trait",
            "1444.11.11",
            "culture|group",
            "-abc",
        ] {
            assert_eq!(tokenize(word), vec![(TokenKind::Identifier, word)], "{word}");
        }
    }

    #[test]
    fn test_numbers() {
        for word in ["0", "42", "-7", "3.25", "-0.5", "+1"] {
            assert_eq!(tokenize(word), vec![(TokenKind::Number, word)], "{word}");
        }
        assert_eq!(tokenize("1."), vec![(TokenKind::Identifier, "1.")]);
    }

    #[test]
    fn test_quoted_string_with_escapes() {
        assert_eq!(
            tokenize(r#"name = "say \"hi\"""#),
            vec![
                (TokenKind::Identifier, "name"),
                (TokenKind::Op(Operator::Assign), "="),
                (TokenKind::String, r#""say \"hi\"""#),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let tokens = tokenize("a = \"oops\nb = 1");
        assert_eq!(tokens[2], (TokenKind::UnterminatedString, "\"oops"));
        assert_eq!(tokens[3], (TokenKind::Newline, "\n"));
        assert_eq!(tokens[4], (TokenKind::Identifier, "b"));
    }

    #[test]
    fn test_comments_are_tokens() {
        assert_eq!(
            tokenize("a = 1 # trailing\n# whole line"),
            vec![
                (TokenKind::Identifier, "a"),
                (TokenKind::Op(Operator::Assign), "="),
                (TokenKind::Number, "1"),
                (TokenKind::Comment, "# trailing"),
                (TokenKind::Newline, "\n"),
                (TokenKind::Comment, "# whole line"),
            ]
        );
    }

    #[test]
    fn test_crlf_and_bom() {
        let tokens: Vec<_> = Tokenizer::new("\u{feff}a\r\nb").collect();
        assert_eq!(tokens[0].kind, TokenKind::Whitespace);
        assert_eq!(tokens[1].text, "a");
        assert_eq!(tokens[2].kind, TokenKind::Newline);
        assert_eq!(tokens[2].text, "\r\n");
        assert_eq!(tokens[3].start(), Position::new(1, 0));
    }

    #[test]
    fn test_positions_count_chars() {
        let tokens: Vec<_> = Tokenizer::new("é = { x }")
            .filter(|t| !t.kind.is_trivia())
            .collect();
        assert_eq!(tokens[0].range.end, Position::new(0, 1));
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[3].start(), Position::new(0, 6));
        assert_eq!(tokens[4].end(), Position::new(0, 9));
    }

    #[test]
    fn test_unknown_character() {
        assert_eq!(
            tokenize("a ; b"),
            vec![
                (TokenKind::Identifier, "a"),
                (TokenKind::Error, ";"),
                (TokenKind::Identifier, "b"),
            ]
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Tokens tile the input exactly, whatever it contains.
            #[test]
            fn tokens_cover_input(input in "\\PC{0,64}") {
                let mut offset = 0u32;
                for token in Tokenizer::new(&input) {
                    prop_assert_eq!(token.span.start, offset);
                    prop_assert!(token.span.end > token.span.start);
                    offset = token.span.end;
                }
                prop_assert_eq!(offset as usize, input.len());
            }
        }
    }
}
