//! Source spans and line/column positions.

use std::fmt;

/// A byte offset into a source file.
pub type TextPos = u32;

/// A half-open byte range `[start, start + length)` in one source file.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct TextSpan {
    pub start: TextPos,
    pub length: TextPos,
}

impl TextSpan {
    #[inline]
    pub fn new(start: TextPos, length: TextPos) -> Self {
        Self { start, length }
    }

    #[inline]
    pub fn from_bounds(start: TextPos, end: TextPos) -> Self {
        debug_assert!(end >= start);
        Self { start, length: end - start }
    }

    /// A zero-length span, used for synthesized nodes.
    #[inline]
    pub fn empty(pos: TextPos) -> Self {
        Self { start: pos, length: 0 }
    }

    #[inline]
    pub fn end(&self) -> TextPos {
        self.start + self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The smallest span covering both spans.
    pub fn cover(&self, other: TextSpan) -> TextSpan {
        TextSpan::from_bounds(self.start.min(other.start), self.end().max(other.end()))
    }
}

impl fmt::Debug for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}

/// A 1-based line and column, as printed in diagnostics.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
    pub offset: TextPos,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets to line/column positions.
#[derive(Clone, Debug, Default)]
pub struct LineIndex {
    line_starts: Vec<TextPos>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as TextPos + 1);
            }
        }
        Self { line_starts }
    }

    pub fn position(&self, offset: TextPos) -> SourcePosition {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        SourcePosition {
            line: line as u32 + 1,
            column: offset - self.line_starts[line] + 1,
            offset,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_cover() {
        let a = TextSpan::new(4, 2);
        let b = TextSpan::new(10, 5);
        assert_eq!(a.cover(b), TextSpan::from_bounds(4, 15));
        assert!(TextSpan::empty(3).is_empty());
    }

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("let a = 1;\nlet b = 2;\n");
        assert_eq!(index.position(0), SourcePosition { line: 1, column: 1, offset: 0 });
        let p = index.position(15);
        assert_eq!((p.line, p.column), (2, 5));
        assert_eq!(index.line_count(), 3);
    }
}
