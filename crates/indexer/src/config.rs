use crate::error::{IndexerError, Result};
use scout_code_chunker::ChunkerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one index pass and its background enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,

    /// Files larger than this are not indexed
    pub max_file_bytes: u64,

    /// Chunks per embedding call
    pub embed_batch_size: usize,

    /// Embedding calls per backfill invocation
    pub embed_max_batches: usize,

    /// Commits walked when no previous analysis exists
    pub git_history_limit: usize,

    /// Commits touching more files than this are ignored for co-change
    pub max_files_per_commit: usize,

    /// Window for the "recent activity" commit count
    pub recent_window_days: u64,

    /// Purpose descriptions generated per enrichment pass
    pub max_purposes_per_pass: usize,

    pub vocab: VocabConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            max_file_bytes: 2 * 1024 * 1024,
            embed_batch_size: 32,
            embed_max_batches: 50,
            git_history_limit: 1000,
            max_files_per_commit: 50,
            recent_window_days: 90,
            max_purposes_per_pass: 50,
            vocab: VocabConfig::default(),
        }
    }
}

impl IndexerConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunker
            .validate()
            .map_err(IndexerError::InvalidConfig)?;
        if self.embed_batch_size == 0 {
            return Err(IndexerError::InvalidConfig(
                "embed_batch_size must be > 0".to_string(),
            ));
        }
        if self.max_files_per_commit < 2 {
            return Err(IndexerError::InvalidConfig(
                "max_files_per_commit must be >= 2".to_string(),
            ));
        }
        self.vocab.validate()
    }
}

/// Vocabulary cluster construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabConfig {
    /// Most frequent terms considered
    pub max_terms: usize,

    /// Minimum cosine similarity for two terms to share a cluster
    pub similarity_threshold: f32,

    pub max_cluster_terms: usize,

    pub max_cluster_files: usize,
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            max_terms: 400,
            similarity_threshold: 0.8,
            max_cluster_terms: 8,
            max_cluster_files: 20,
        }
    }
}

impl VocabConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(IndexerError::InvalidConfig(format!(
                "vocab.similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_cluster_terms < 2 {
            return Err(IndexerError::InvalidConfig(
                "vocab.max_cluster_terms must be >= 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// File watcher settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period per path before a change is processed
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(IndexerConfig::default().validate().is_ok());
        assert_eq!(WatcherConfig::default().debounce(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_bad_values() {
        let config = IndexerConfig {
            embed_batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = IndexerConfig::default();
        config.vocab.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
