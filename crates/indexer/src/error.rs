use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] scout_code_chunker::ChunkerError),

    #[error("Store error: {0}")]
    StoreError(#[from] scout_store::StoreError),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] scout_vector_store::VectorStoreError),

    #[error("Graph error: {0}")]
    GraphError(#[from] scout_graph::GraphError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Repository id unknown to the store
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StoreError(e) if e.is_not_found())
    }
}
