//! Wire types for the two consumer operations, `context` and `search`.
//!
//! Everything here is plain serde data; transports (CLI, HTTP) only move
//! these shapes around.

use serde::{Deserialize, Serialize};

/// Literal pack returned when context generation fails for any reason
pub const FALLBACK_CONTEXT_PACK: &str = "Context generation failed";

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContextRequest {
    pub repo_id: String,
    pub goal: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContextStats {
    pub files_in_context: usize,
    pub index_fresh: bool,
    pub duration_ms: u64,
    pub cached: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContextResponse {
    pub context_pack: String,
    pub stats: ContextStats,
}

impl ContextResponse {
    /// Minimal well-formed response for a failed request
    pub fn fallback(duration_ms: u64) -> Self {
        Self {
            context_pack: FALLBACK_CONTEXT_PACK.to_string(),
            stats: ContextStats {
                files_in_context: 0,
                index_fresh: false,
                duration_ms,
                cached: false,
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.context_pack == FALLBACK_CONTEXT_PACK
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Grep,
    Semantic,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grep => "grep",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }

    /// Whether this mode needs stored embeddings
    pub fn needs_embeddings(self) -> bool {
        !matches!(self, Self::Grep)
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grep" => Ok(Self::Grep),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown search mode '{other}'")),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub repo_id: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SearchMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub code_only: bool,
}

impl SearchRequest {
    pub fn effective_limit(&self) -> usize {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_SEARCH_LIMIT)
    }
}

/// One chunk-level hit
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RankedResult {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    pub score: f32,
    /// Matching line (grep) or the chunk's first lines (semantic)
    pub snippet: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    pub search_mode_used: SearchMode,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_request_defaults() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"repo_id":"r","query":"auth"}"#).unwrap();
        assert_eq!(req.mode, None);
        assert!(!req.code_only);
        assert_eq!(req.effective_limit(), DEFAULT_SEARCH_LIMIT);

        let req: SearchRequest = serde_json::from_str(
            r#"{"repo_id":"r","query":"auth","mode":"hybrid","limit":3,"code_only":true}"#,
        )
        .unwrap();
        assert_eq!(req.mode, Some(SearchMode::Hybrid));
        assert_eq!(req.effective_limit(), 3);
    }

    #[test]
    fn fallback_response_shape() {
        let resp = ContextResponse::fallback(7);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["context_pack"], "Context generation failed");
        assert_eq!(json["stats"]["index_fresh"], false);
        assert_eq!(json["stats"]["duration_ms"], 7);
        assert!(resp.is_fallback());
    }

    #[test]
    fn search_mode_parses_case_insensitively() {
        assert_eq!("Semantic".parse::<SearchMode>(), Ok(SearchMode::Semantic));
        assert!("fuzzy".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::Hybrid.to_string(), "hybrid");
    }
}
