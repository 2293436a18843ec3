//! Source unit representation with line-start indexing for fast position lookup.

use crate::file_id::FileId;
use tinker_common::ContentHash;

/// A zero-based position inside a source unit.
///
/// Internal positions are zero-based; [`ResolvedSpan`](crate::ResolvedSpan)
/// converts them to the one-based coordinates editors show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinePosition {
    /// Zero-based line index.
    pub line: u32,
    /// Zero-based byte column within the line.
    pub column: u32,
}

/// A source unit loaded into the compilation session.
///
/// Stores the text under its display name along with precomputed line-start
/// offsets for position lookup.
pub struct SourceFile {
    /// The unique identifier for this file within the [`SourceDb`](crate::SourceDb).
    pub id: FileId,
    /// Display name of the unit, as given by whoever loaded it.
    pub name: String,
    /// The full text content of the file.
    pub content: String,
    /// Byte offsets of each line start (the first entry is always 0).
    line_starts: Vec<u32>,
    /// Hash of the file content.
    pub content_hash: ContentHash,
}

impl SourceFile {
    /// Creates a new `SourceFile` with precomputed line starts and content hash.
    pub fn new(id: FileId, name: String, content: String) -> Self {
        let line_starts = compute_line_starts(&content);
        let content_hash = ContentHash::from_bytes(content.as_bytes());
        Self {
            id,
            name,
            content,
            line_starts,
            content_hash,
        }
    }

    /// Converts a byte offset into a zero-based [`LinePosition`].
    pub fn line_col(&self, byte_offset: u32) -> LinePosition {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        LinePosition {
            line: line_idx as u32,
            column: byte_offset - self.line_starts[line_idx],
        }
    }

    /// Returns the text of the zero-based line `line`, without its terminator.
    pub fn line_text(&self, line: u32) -> &str {
        let Some(&start) = self.line_starts.get(line as usize) else {
            return "";
        };
        let end = self
            .line_starts
            .get(line as usize + 1)
            .map(|&next| next as usize)
            .unwrap_or(self.content.len());
        self.content[start as usize..end].trim_end_matches(['\n', '\r'])
    }

    /// Returns a substring of the file content between byte offsets.
    pub fn snippet(&self, start: u32, end: u32) -> &str {
        &self.content[start as usize..end as usize]
    }
}

/// Computes the byte offsets of each line start in the given content.
fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}
