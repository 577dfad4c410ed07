use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Indexer error: {0}")]
    Indexer(#[from] scout_indexer::IndexerError),

    #[error("Store error: {0}")]
    Store(#[from] scout_store::StoreError),

    #[error("Search error: {0}")]
    Search(#[from] scout_search::SearchError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] scout_vector_store::VectorStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Repository id unknown to the store
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Indexer(e) => e.is_not_found(),
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}
