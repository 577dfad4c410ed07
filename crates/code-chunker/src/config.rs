use serde::{Deserialize, Serialize};

/// Configuration for line-window chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Target chunk size in lines. Files at or below this size become a single chunk.
    pub target_lines: usize,

    /// Lines shared between consecutive chunks
    pub overlap_lines: usize,

    /// How far (in lines, either direction) to look for a clean cut point
    pub boundary_window: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_lines: 150,
            overlap_lines: 10,
            boundary_window: 15,
        }
    }
}

impl ChunkerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.target_lines == 0 {
            return Err("target_lines must be > 0".to_string());
        }

        if self.overlap_lines >= self.target_lines {
            return Err(format!(
                "overlap_lines ({}) must be smaller than target_lines ({})",
                self.overlap_lines, self.target_lines
            ));
        }

        if self.boundary_window >= self.target_lines {
            return Err(format!(
                "boundary_window ({}) must be smaller than target_lines ({})",
                self.boundary_window, self.target_lines
            ));
        }

        Ok(())
    }

    /// Stable fingerprint of the parameters, mixed into every chunk hash
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!(
            "lines={};overlap={};window={}",
            self.target_lines, self.overlap_lines, self.boundary_window
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ChunkerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ChunkerConfig {
            target_lines: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.target_lines = 20;
        config.overlap_lines = 20;
        assert!(config.validate().is_err());

        config.overlap_lines = 5;
        config.boundary_window = 25;
        assert!(config.validate().is_err());

        config.boundary_window = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fingerprint_tracks_every_parameter() {
        let base = ChunkerConfig::default();
        let a = ChunkerConfig {
            target_lines: 120,
            ..base
        };
        let b = ChunkerConfig {
            overlap_lines: 5,
            ..base
        };
        let c = ChunkerConfig {
            boundary_window: 10,
            ..base
        };
        assert_ne!(base.fingerprint(), a.fingerprint());
        assert_ne!(base.fingerprint(), b.fingerprint());
        assert_ne!(base.fingerprint(), c.fingerprint());
    }
}
