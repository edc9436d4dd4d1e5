//! Positions in Makrell source.
//!
//! Every token, node and compiled expression carries a [`Span`] so that
//! diagnostics and runtime errors can point back at the text they came from.

use std::fmt;

/// A byte range of source text with its start and end positions.
///
/// Lines and columns count from 1. `end_line`/`end_column` name the
/// position just past the last character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// First byte.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
    /// Line of the first character.
    pub line: u32,
    /// Column of the first character.
    pub column: u32,
    /// Line just past the last character.
    pub end_line: u32,
    /// Column just past the last character.
    pub end_column: u32,
}

impl Span {
    /// A span from byte `start` to `end`, with `(line, column)` pairs for
    /// both ends.
    #[must_use]
    pub const fn new(
        start: usize,
        end: usize,
        (line, column): (u32, u32),
        (end_line, end_column): (u32, u32),
    ) -> Self {
        Self {
            start,
            end,
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// The empty span at line 1, column 1. Used for synthesized nodes.
    #[must_use]
    pub const fn at_start() -> Self {
        Self::new(0, 0, (1, 1), (1, 1))
    }

    /// Joins `self` with a later span `last`.
    #[must_use]
    pub const fn to(self, last: Self) -> Self {
        Self::new(
            self.start,
            last.end,
            (self.line, self.column),
            (last.end_line, last.end_column),
        )
    }

    /// Byte length; zero for inverted spans.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The covered slice of `source`, or `""` when the span does not fit it.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or_default()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_spans_sit_at_one_one() {
        let origin = Span::at_start();
        assert!(origin.is_empty());
        assert_eq!(origin.to_string(), "1:1");
        assert_eq!((origin.end_line, origin.end_column), (1, 1));
    }

    #[test]
    fn joining_keeps_the_first_start_and_the_last_end() {
        let head = Span::new(0, 4, (1, 1), (1, 5));
        let tail = Span::new(9, 12, (2, 4), (2, 7));
        assert_eq!(head.to(tail), Span::new(0, 12, (1, 1), (2, 7)));
    }

    #[test]
    fn text_slices_the_source() {
        let source = "{f [x] x}";
        let params = Span::new(3, 6, (1, 4), (1, 7));
        assert_eq!(params.len(), 3);
        assert_eq!(params.text(source), "[x]");
        assert_eq!(Span::new(4, 40, (1, 5), (1, 41)).text("abc"), "");
    }

    #[test]
    fn inverted_spans_are_empty() {
        let span = Span::new(5, 2, (1, 6), (1, 3));
        assert_eq!(span.len(), 0);
        assert!(span.is_empty());
    }

    #[test]
    fn display_shows_the_start() {
        assert_eq!(Span::new(3, 4, (2, 7), (2, 8)).to_string(), "2:7");
    }
}
