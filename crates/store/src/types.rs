use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a repository's index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Pending,
    Indexing,
    Ready,
}

impl IndexStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "indexing" => Self::Indexing,
            "ready" => Self::Ready,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub id: String,
    pub name: String,
    pub root_path: String,
    pub last_indexed_commit: Option<String>,
    pub index_status: IndexStatus,
    pub last_git_analysis_commit: Option<String>,
    pub max_import_depth: Option<u32>,
    /// Serialized vocab clusters (JSON)
    pub vocab_clusters: Option<String>,
    /// Commit the vocab clusters were built against
    pub vocab_clusters_commit: Option<String>,
}

/// A persisted chunk row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: i64,
    pub path: String,
    pub chunk_index: usize,
    pub content_hash: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub language: String,
    pub embedding: Option<Vec<f32>>,
}

/// Outcome of reconciling one file's chunk set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDiff {
    pub inserted: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl ChunkDiff {
    pub fn merge(&mut self, other: ChunkDiff) {
        self.inserted += other.inserted;
        self.unchanged += other.unchanged;
        self.deleted += other.deleted;
    }
}

/// Extracted structural facts about one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    pub path: String,
    pub language: String,
    pub exports: Vec<String>,
    /// Raw import specifiers as written in the source
    pub imports: Vec<String>,
    pub docstring: String,
    pub sections: Vec<String>,
    pub internals: Vec<String>,
    pub purpose: Option<String>,
    /// Content hash the purpose was generated from
    pub purpose_hash: Option<String>,
    /// Hash of the full file content at extraction time
    pub content_hash: String,
}

/// Git activity for a single path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatRecord {
    pub path: String,
    pub commit_count: u32,
    pub recent_commit_count: u32,
    /// Unix seconds of the newest commit touching the path
    pub last_modified: Option<i64>,
}

/// Undirected co-change pair with `path_a < path_b`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CochangeRecord {
    pub path_a: String,
    pub path_b: String,
    pub count: u32,
}

impl CochangeRecord {
    /// The other side of the pair, if `path` is part of it
    pub fn partner_of(&self, path: &str) -> Option<&str> {
        if self.path_a == path {
            Some(&self.path_b)
        } else if self.path_b == path {
            Some(&self.path_a)
        } else {
            None
        }
    }
}

/// Order a pair so that the first path sorts before the second
pub fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Result of one incremental git walk, applied atomically
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitHistoryDelta {
    /// Commit the walk ended at
    pub head: String,
    /// path -> (new commits touching it, newest commit time)
    pub file_commits: std::collections::HashMap<String, (u32, i64)>,
    /// Ordered pair -> co-occurrence increment
    pub cochanges: std::collections::HashMap<(String, String), u32>,
    /// Replacement recent-window counts; every other path drops to zero
    pub recent_counts: std::collections::HashMap<String, u32>,
    /// The walk restarted from scratch (history rewritten); stored commit
    /// counts and co-changes are replaced instead of accumulated
    pub replace: bool,
}

/// Semantically similar identifier terms and the files that contain them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabCluster {
    pub terms: Vec<String>,
    pub files: Vec<String>,
}

impl RepoRecord {
    /// Decode the stored vocab clusters; malformed JSON reads as none
    pub fn decoded_vocab_clusters(&self) -> Vec<VocabCluster> {
        self.vocab_clusters
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default()
    }

    /// Whether the index was built from a git commit rather than a filesystem watermark
    pub fn is_git_indexed(&self) -> bool {
        self.last_indexed_commit
            .as_deref()
            .is_some_and(|c| !c.starts_with("fs:"))
    }
}
