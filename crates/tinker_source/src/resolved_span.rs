//! Human-readable resolved source locations with line/column coordinates.

use std::fmt;

/// A span resolved to editor coordinates.
///
/// All line and column values are 1-indexed. Produced by
/// [`SourceDb::resolve_span`](crate::SourceDb::resolve_span), which adds one
/// to the zero-based internal positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSpan {
    /// Display name of the source unit.
    pub file: String,
    /// The starting line number (1-indexed).
    pub start_line: u32,
    /// The starting column number (1-indexed).
    pub start_col: u32,
    /// The ending line number (1-indexed).
    pub end_line: u32,
    /// The ending column number (1-indexed).
    pub end_col: u32,
}

impl fmt::Display for ResolvedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({},{})", self.file, self.start_line, self.start_col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let rs = ResolvedSpan {
            file: "widget/src/main.tks".to_string(),
            start_line: 10,
            start_col: 5,
            end_line: 10,
            end_col: 15,
        };
        assert_eq!(format!("{rs}"), "widget/src/main.tks (10,5)");
    }
}
