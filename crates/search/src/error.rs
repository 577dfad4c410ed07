use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Store error: {0}")]
    Store(#[from] scout_store::StoreError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] scout_vector_store::VectorStoreError),

    #[error("Invalid noise pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid search config: {0}")]
    InvalidConfig(String),

    #[error("Empty query")]
    EmptyQuery,
}
