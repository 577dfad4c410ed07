use crate::embeddings::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Generates a one-line description of what a file is for
#[async_trait]
pub trait PurposeGenerator: Send + Sync {
    async fn describe(&self, path: &str, content: &str) -> Result<String>;
}

/// Optional external capabilities injected at construction.
///
/// A missing capability turns the features that need it into no-ops.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub embedder: Option<Arc<dyn Embedder>>,
    pub purpose: Option<Arc<dyn PurposeGenerator>>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_purpose(mut self, purpose: Arc<dyn PurposeGenerator>) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn has_embeddings(&self) -> bool {
        self.embedder.is_some()
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("embedder", &self.embedder.as_ref().map(|e| e.model_id().to_string()))
            .field("purpose", &self.purpose.is_some())
            .finish()
    }
}
