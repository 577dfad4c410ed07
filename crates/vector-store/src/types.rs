use serde::{Deserialize, Serialize};

/// One chunk matched by vector similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub chunk_id: i64,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}
