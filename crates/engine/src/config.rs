use crate::error::{EngineError, Result};
use scout_indexer::{IndexerConfig, WatcherConfig};
use scout_search::{EnrichmentConfig, FormatterConfig, ScoringConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Context response cache bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 120,
            capacity: 20,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Events waiting for the sink; further events are dropped
    pub pending_limit: usize,

    /// JSON-lines file receiving events; events are logged when unset
    pub jsonl_path: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            pending_limit: 10,
            jsonl_path: None,
        }
    }
}

/// Every knob of the engine, loadable from one TOML file.
///
/// Missing tables and keys fall back to their defaults:
///
/// ```toml
/// [cache]
/// ttl_secs = 60
///
/// [formatter]
/// token_budget = 500
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub indexer: IndexerConfig,
    pub watcher: WatcherConfig,
    pub scoring: ScoringConfig,
    pub enrichment: EnrichmentConfig,
    pub formatter: FormatterConfig,
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.indexer.validate()?;
        self.scoring.validate()?;
        self.formatter.validate()?;
        if self.cache.capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "cache.capacity must be > 0".to_string(),
            ));
        }
        if self.telemetry.pending_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "telemetry.pending_limit must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_the_default_config() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            "[cache]\nttl_secs = 5\n\n[formatter]\ntoken_budget = 500\n\n[watcher]\ndebounce_ms = 50\n",
        )
        .unwrap();
        assert_eq!(config.cache.ttl(), Duration::from_secs(5));
        assert_eq!(config.cache.capacity, 20);
        assert_eq!(config.formatter.token_budget, 500);
        assert_eq!(config.formatter.min_score_ratio, 0.15);
        assert_eq!(config.watcher.debounce_ms, 50);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("[cache]\ncapacity = 0\n"),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(EngineConfig::from_toml_str("[formatter]\ntoken_budget = 0\n").is_err());
        assert!(matches!(
            EngineConfig::from_toml_str("[cache\n"),
            Err(EngineError::ConfigParse(_))
        ));
    }
}
