use crate::error::{Result, SearchError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Recognizes lockfiles, vendored code and generated assets
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    globs: GlobSet,
}

impl NoiseFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.trim().to_ascii_lowercase();
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| SearchError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|e| SearchError::InvalidPattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;
        Ok(Self { globs })
    }

    /// A filter that matches nothing
    pub fn empty() -> Self {
        Self {
            globs: GlobSet::empty(),
        }
    }

    pub fn is_noise(&self, path: &str) -> bool {
        let lower = path.replace('\\', "/").to_ascii_lowercase();
        self.globs.is_match(lower.trim_start_matches("./"))
    }
}
