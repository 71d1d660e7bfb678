//! Source locations: byte spans and line/column positions.

/// Half-open byte range `[start, end)` into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[inline]
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Zero-width span at `offset`, used for insertion points such as a
    /// missing value.
    #[inline]
    pub fn empty(offset: u32) -> Self {
        Self::new(offset, offset)
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both.
    #[inline]
    pub fn extend(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// The text this span covers. Panics if the span is out of bounds or
    /// splits a character.
    #[inline]
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start as usize..self.end as usize]
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start as usize..span.end as usize
    }
}

/// A zero-based line/column position. Columns count Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A line/column range; `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Whether `pos` falls inside this range. The end position counts as
    /// inside so that a cursor placed right after a token still hits it.
    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// Whether `other` lies entirely within this range.
    #[inline]
    pub fn encloses(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest range covering both.
    #[inline]
    pub fn cover(&self, other: Range) -> Range {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_contains_is_end_inclusive() {
        let r = Range::new(Position::new(0, 2), Position::new(0, 5));
        assert!(r.contains(Position::new(0, 2)));
        assert!(r.contains(Position::new(0, 5)));
        assert!(!r.contains(Position::new(0, 6)));
        assert!(!r.contains(Position::new(1, 0)));
    }

    #[test]
    fn test_position_ordering_is_line_major() {
        assert!(Position::new(0, 90) < Position::new(1, 0));
        assert!(Position::new(2, 1) > Position::new(2, 0));
    }

    #[test]
    fn test_span_extend() {
        let a = Span::new(3, 5);
        let b = Span::new(1, 4);
        assert_eq!(a.extend(b), Span::new(1, 5));
        assert_eq!(Span::empty(7).len(), 0);
    }
}
