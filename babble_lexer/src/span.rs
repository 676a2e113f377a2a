//! Source location mapping.
//!
//! Lexemes carry flat byte offsets; diagnostics want line/column pairs.
//! [`SourceMap`] converts between the two.

use serde::{Deserialize, Serialize};

/// A byte range in the source with resolved line/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset start (0-indexed)
    pub start: usize,
    /// Byte offset end (exclusive)
    pub end: usize,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column (1-indexed, in bytes)
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Tracks line start offsets for byte-offset to line/column conversion.
#[derive(Debug, Clone)]
pub struct SourceMap {
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Line and column (both 1-indexed) for a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        (line + 1, offset - line_start + 1)
    }

    /// Build a [`Span`] for a byte range.
    pub fn span(&self, start: usize, end: usize) -> Span {
        let (line, column) = self.line_col(start);
        Span::new(start, end, line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_mapping() {
        let map = SourceMap::new("hello\nworld\n");
        assert_eq!(map.line_col(0), (1, 1));
        assert_eq!(map.line_col(5), (1, 6));
        assert_eq!(map.line_col(6), (2, 1));
        assert_eq!(map.line_col(11), (2, 6));
    }

    #[test]
    fn span_for_range() {
        let map = SourceMap::new("ab\ncd");
        let span = map.span(3, 5);
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 1);
        assert_eq!(span.len(), 2);
    }
}
