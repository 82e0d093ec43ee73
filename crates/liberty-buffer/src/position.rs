//! Line/column positions inside a document.
//!
//! Columns are counted in Unicode scalar values (`char`s), which is what the
//! rope indexes by. Language servers speak UTF-16 code units instead; the
//! conversion lives on [`crate::TextBuffer`] because it needs the line text.

use serde::{Deserialize, Serialize};

/// A position in the text buffer (line and column).
///
/// Both line and column are 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed, in characters not bytes)
    pub column: usize,
}

impl Position {
    /// Creates a new position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position at the start of the document.
    pub const ZERO: Position = Position { line: 0, column: 0 };

    /// Returns true if this position is before another.
    pub fn is_before(&self, other: &Position) -> bool {
        self.line < other.line || (self.line == other.line && self.column < other.column)
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.column.cmp(&other.column))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-indexed for user-facing output
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        let a = Position::new(1, 4);
        let b = Position::new(2, 0);
        assert!(a.is_before(&b));
        assert!(a < b);
        assert_eq!(a.max(b), b);
    }

    #[test]
    fn test_display_is_one_indexed() {
        assert_eq!(Position::ZERO.to_string(), "1:1");
        assert_eq!(Position::new(9, 2).to_string(), "10:3");
    }
}
