use serde::{Deserialize, Serialize};

/// A file ranked by the keyword scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFile {
    pub path: String,
    pub score: f64,
    /// Exact query terms the file matched (stems count toward their source)
    pub matched_terms: Vec<String>,
}

/// How a file entered the context selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOrigin {
    Keyword,
    Semantic,
    Cochange,
    Cluster,
}

/// A file selected for the context pack.
///
/// Promoted files carry no score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFile {
    pub path: String,
    pub score: Option<f64>,
    pub origin: FileOrigin,
}

impl ContextFile {
    pub fn promoted(path: impl Into<String>, origin: FileOrigin) -> Self {
        Self {
            path: path.into(),
            score: None,
            origin,
        }
    }
}

impl From<ScoredFile> for ContextFile {
    fn from(file: ScoredFile) -> Self {
        Self {
            path: file.path,
            score: Some(file.score),
            origin: FileOrigin::Keyword,
        }
    }
}
