use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("File not in graph: {0}")]
    NodeNotFound(String),

    #[error("Cycle remained after condensation at {0}")]
    Cycle(String),
}
