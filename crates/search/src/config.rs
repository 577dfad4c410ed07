use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};

/// File ranking knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Glob patterns (matched against lowercase repo-relative paths) for
    /// lockfiles, vendored code and generated assets
    pub noise_patterns: Vec<String>,

    /// Multiplier applied to noise paths
    pub noise_factor: f64,

    pub min_file_cap: usize,
    pub max_file_cap: usize,

    /// Import depth assumed when the index has not computed one
    pub default_import_depth: u32,

    /// Files kept per sibling group
    pub siblings_per_group: usize,

    /// Recent commits counted toward the activity boost
    pub recent_commit_cap: u32,
    pub recent_commit_weight: f64,

    pub cluster_member_boost: f64,

    /// Import in-degree from which a file counts as a hub
    pub hub_min_indegree: usize,

    /// Export count above which scores are dampened
    pub export_dampen_threshold: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            noise_patterns: default_noise_patterns(),
            noise_factor: 0.3,
            min_file_cap: 8,
            max_file_cap: 15,
            default_import_depth: 3,
            siblings_per_group: 2,
            recent_commit_cap: 5,
            recent_commit_weight: 0.5,
            cluster_member_boost: 1.3,
            hub_min_indegree: 3,
            export_dampen_threshold: 5,
        }
    }
}

fn default_noise_patterns() -> Vec<String> {
    [
        "**/vendor/**",
        "**/third_party/**",
        "**/node_modules/**",
        "**/dist/**",
        "**/build/**",
        "**/generated/**",
        "**/__generated__/**",
        "**/__snapshots__/**",
        "**/*.min.js",
        "**/*.min.css",
        "**/*.map",
        "**/*.lock",
        "**/package-lock.json",
        "**/pnpm-lock.yaml",
        "**/*.generated.*",
        "**/*.pb.go",
        "**/*_pb2.py",
        "**/*.d.ts",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_file_cap == 0 || self.min_file_cap > self.max_file_cap {
            return Err(SearchError::InvalidConfig(format!(
                "file cap range {}..={} is empty",
                self.min_file_cap, self.max_file_cap
            )));
        }
        if !(0.0..=1.0).contains(&self.noise_factor) {
            return Err(SearchError::InvalidConfig(
                "noise_factor must be within [0, 1]".to_string(),
            ));
        }
        if self.siblings_per_group == 0 {
            return Err(SearchError::InvalidConfig(
                "siblings_per_group must be > 0".to_string(),
            ));
        }
        if self.export_dampen_threshold == 0 {
            return Err(SearchError::InvalidConfig(
                "export_dampen_threshold must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Result cap for a repository whose longest import chain is `depth`
    pub fn file_cap(&self, depth: Option<u32>) -> usize {
        let depth = depth.unwrap_or(self.default_import_depth) as usize;
        (depth * 2 + 4).clamp(self.min_file_cap, self.max_file_cap)
    }
}

/// Structural enrichment and snippet bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Top files that get reverse-dependency chains
    pub chain_roots: usize,
    pub chains_per_root: usize,

    /// Co-change partners listed per file
    pub partners_per_file: usize,

    /// Files promoted by pairwise co-change
    pub pairwise_promotions: usize,

    /// Minimum co-change count joining two files into a cluster
    pub cluster_min_count: u32,

    /// Semantic hits merged into the keyword ranking
    pub semantic_merge_limit: usize,

    /// Files that get a snippet
    pub snippet_files: usize,

    /// Lines kept on each side of a snippet's anchor line
    pub snippet_radius: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            chain_roots: 3,
            chains_per_root: 5,
            partners_per_file: 3,
            pairwise_promotions: 3,
            cluster_min_count: 5,
            semantic_merge_limit: 5,
            snippet_files: 5,
            snippet_radius: 10,
        }
    }
}

/// Context pack rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Estimated tokens (chars / 4) the pack should fit in
    pub token_budget: usize,

    /// Scored files below this fraction of the top score are dropped
    pub min_score_ratio: f64,

    /// Unscored files survive only within this many leading positions
    pub unscored_keep_positions: usize,

    /// Files kept by the last stripping step
    pub stripped_file_limit: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            token_budget: 350,
            min_score_ratio: 0.15,
            unscored_keep_positions: 5,
            stripped_file_limit: 3,
        }
    }
}

impl FormatterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.token_budget == 0 {
            return Err(SearchError::InvalidConfig(
                "token_budget must be > 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.min_score_ratio) {
            return Err(SearchError::InvalidConfig(
                "min_score_ratio must be within [0, 1)".to_string(),
            ));
        }
        if self.stripped_file_limit == 0 {
            return Err(SearchError::InvalidConfig(
                "stripped_file_limit must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_cap_follows_import_depth() {
        let config = ScoringConfig::default();
        assert_eq!(config.file_cap(Some(0)), 8);
        assert_eq!(config.file_cap(Some(3)), 10);
        assert_eq!(config.file_cap(None), 10);
        assert_eq!(config.file_cap(Some(5)), 14);
        assert_eq!(config.file_cap(Some(40)), 15);
    }

    #[test]
    fn defaults_validate() {
        ScoringConfig::default().validate().unwrap();
        FormatterConfig::default().validate().unwrap();
        let bad = ScoringConfig {
            min_file_cap: 20,
            ..ScoringConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
