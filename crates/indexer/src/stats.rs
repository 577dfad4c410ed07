use scout_store::ChunkDiff;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the file set of an index run was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    Full,
    Diff,
}

/// Statistics about one index run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Revision the index now reflects
    pub commit: String,

    pub mode: IndexMode,

    /// Files read, chunked and extracted
    pub files_indexed: usize,

    /// Files whose rows were removed
    pub files_deleted: usize,

    /// Chunk reconciliation totals
    pub chunks: ChunkDiff,

    pub import_edges: usize,

    pub max_import_depth: Option<u32>,

    /// Whether git history was walked in this run
    pub git_analyzed: bool,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Files per language
    pub languages: BTreeMap<String, usize>,

    /// Per-file problems that did not stop the run
    pub errors: Vec<String>,
}

impl IndexStats {
    pub fn new(commit: impl Into<String>, mode: IndexMode) -> Self {
        Self {
            commit: commit.into(),
            mode,
            files_indexed: 0,
            files_deleted: 0,
            chunks: ChunkDiff::default(),
            import_edges: 0,
            max_import_depth: None,
            git_analyzed: false,
            time_ms: 0,
            languages: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_file(&mut self, language: &str, chunks: ChunkDiff) {
        self.files_indexed += 1;
        self.chunks.merge(chunks);
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_deleted(&mut self, chunks_removed: usize) {
        self.files_deleted += 1;
        self.chunks.deleted += chunks_removed;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}

/// Result of [`crate::IndexEngine::run_index`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IndexOutcome {
    /// The index already reflects the current revision
    Skipped { commit: String },
    Indexed(IndexStats),
}

impl IndexOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn commit(&self) -> &str {
        match self {
            Self::Skipped { commit } => commit,
            Self::Indexed(stats) => &stats.commit,
        }
    }
}
