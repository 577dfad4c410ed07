use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::types::CodeChunk;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static DECLARATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:function|class|const|let|var|def|fn|struct|enum|trait|impl|interface|type|func|module|mod)\b",
    )
    .expect("declaration regex")
});

/// Whether a line opens a top-level-looking declaration
#[must_use]
pub fn is_declaration_line(line: &str) -> bool {
    DECLARATION_RE.is_match(line)
}

/// Main chunker interface
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split file content into overlapping line windows.
    ///
    /// Empty content yields no chunks. The same input and parameters always
    /// produce the same chunks.
    #[must_use]
    pub fn chunk(&self, content: &str) -> Vec<CodeChunk> {
        let lines: Vec<&str> = content.lines().collect();
        let n = lines.len();
        if n == 0 {
            return Vec::new();
        }

        let target = self.config.target_lines;
        let overlap = self.config.overlap_lines;

        if n <= target {
            return vec![self.make_chunk(0, &lines, 0, n)];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let raw_end = start + target;
            if raw_end >= n {
                chunks.push(self.make_chunk(chunks.len(), &lines, start, n));
                break;
            }

            let cut = self.find_cut(&lines, start, raw_end);
            chunks.push(self.make_chunk(chunks.len(), &lines, start, cut));
            start = cut - overlap;
        }

        log::trace!("chunked {} lines into {} chunks", n, chunks.len());
        chunks
    }

    /// Pick the exclusive end index for a chunk starting at `start`.
    ///
    /// Cuts after the nearest blank line, else before the nearest declaration
    /// line, else at `raw_end`. The result always leaves the next chunk start
    /// (`cut - overlap`) strictly after `start` and at least one line remaining.
    fn find_cut(&self, lines: &[&str], start: usize, raw_end: usize) -> usize {
        let window = self.config.boundary_window;
        let lo = (start + self.config.overlap_lines + 1).max(raw_end.saturating_sub(window));
        let hi = (lines.len() - 1).min(raw_end + window);

        let in_range = |cut: usize| cut >= lo && cut <= hi;

        // Candidates ordered by distance from raw_end, earlier cut first on ties.
        let candidates = || {
            (0..=window).flat_map(move |d| {
                let before = raw_end.checked_sub(d);
                let after = if d == 0 { None } else { Some(raw_end + d) };
                before.into_iter().chain(after)
            })
        };

        if let Some(cut) = candidates()
            .filter(|&c| in_range(c))
            .find(|&c| lines[c - 1].trim().is_empty())
        {
            return cut;
        }

        if let Some(cut) = candidates()
            .filter(|&c| in_range(c))
            .find(|&c| is_declaration_line(lines[c]))
        {
            return cut;
        }

        raw_end.clamp(lo, hi.max(lo))
    }

    fn make_chunk(&self, index: usize, lines: &[&str], start: usize, end: usize) -> CodeChunk {
        let content = lines[start..end].join("\n");
        let content_hash = self.hash_content(&content);
        CodeChunk {
            chunk_index: index,
            start_line: start + 1,
            end_line: end,
            content,
            content_hash,
        }
    }

    /// Hash of the chunk content together with the chunking parameters
    #[must_use]
    pub fn hash_content(&self, content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.config.fingerprint().as_bytes());
        hasher.update(b"\n");
        hasher.update(content.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}
