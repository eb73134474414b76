//! Source location tracking

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location with line and column information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in bytes from the line start)
    pub column: usize,
    /// Byte offset from start (0-based)
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
}

impl SourceLocation {
    pub const fn new(line: usize, column: usize, offset: usize, length: usize) -> Self {
        Self {
            line,
            column,
            offset,
            length,
        }
    }

    /// Build a location from precomputed line start offsets
    ///
    /// `line_offsets[i]` is the byte offset where line `i + 2` begins, matching
    /// how parsed expressions record their line breaks.
    pub fn from_line_offsets(line_offsets: &[usize], offset: usize) -> Self {
        let index = line_offsets.partition_point(|&start| start <= offset);
        let line_start = if index == 0 {
            0
        } else {
            line_offsets[index - 1]
        };
        Self {
            line: index + 1,
            column: offset - line_start + 1,
            offset,
            length: 0,
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::new(1, 1, 0, 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_location_from_line_offsets() {
        // "a &&\n  b.c": second line begins at byte 5
        let offsets = [5];
        let loc = SourceLocation::from_line_offsets(&offsets, 7);
        assert_eq!((loc.line, loc.column), (2, 3));
        let loc = SourceLocation::from_line_offsets(&offsets, 2);
        assert_eq!((loc.line, loc.column), (1, 3));
    }
}
