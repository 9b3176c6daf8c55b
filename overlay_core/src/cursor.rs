//! Document positions.

use serde::Serialize;
use std::fmt;

/// Represents a position in the buffer as (line, column).
/// Both are 0-indexed; the column counts characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Returns true if this position lies in the half-open range `[start, end)`.
    pub fn in_range(&self, start: Position, end: Position) -> bool {
        start <= *self && *self < end
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_line_major() {
        assert!(Position::new(0, 10) < Position::new(1, 0));
        assert!(Position::new(2, 3) < Position::new(2, 4));
    }

    #[test]
    fn test_in_range_is_half_open() {
        let start = Position::new(1, 2);
        let end = Position::new(1, 5);
        assert!(Position::new(1, 2).in_range(start, end));
        assert!(Position::new(1, 4).in_range(start, end));
        assert!(!Position::new(1, 5).in_range(start, end));
        assert!(!Position::new(0, 3).in_range(start, end));
    }

    #[test]
    fn test_empty_range_contains_nothing() {
        let p = Position::new(3, 3);
        assert!(!p.in_range(p, p));
    }
}
