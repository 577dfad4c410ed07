use serde::{Deserialize, Serialize};

/// A contiguous line range of one file, identified by `(chunk_index, content_hash)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChunk {
    /// Position of the chunk within its file (0-based)
    pub chunk_index: usize,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// The actual code content
    pub content: String,

    /// Hash of the content and the chunking parameters
    pub content_hash: String,
}

impl CodeChunk {
    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Check if chunk contains a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Chunk key used for diffing a file's old and new chunk sets
    #[must_use]
    pub fn key(&self) -> (usize, &str) {
        (self.chunk_index, self.content_hash.as_str())
    }
}

/// Rough token estimate (~4 characters per token)
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_helpers() {
        let chunk = CodeChunk {
            chunk_index: 0,
            start_line: 10,
            end_line: 19,
            content: String::new(),
            content_hash: "h".to_string(),
        };
        assert_eq!(chunk.line_count(), 10);
        assert!(chunk.contains_line(10));
        assert!(chunk.contains_line(19));
        assert!(!chunk.contains_line(20));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
    }
}
