//! # Scout Vector Store
//!
//! Embedding capabilities and brute-force similarity search.
//!
//! Embeddings live in the chunk table as blobs; this crate only defines the
//! capability traits, a deterministic stub embedder and the cosine scan over
//! stored chunks. There is no ANN index: every embedded chunk of a repository
//! is scored per query.
//!
//! ```text
//! query ──> Embedder::embed_texts(is_query = true)
//!              │
//!              └─> rank_chunks(query_vec, embedded chunks) ──> VectorHit[]
//! ```

mod capabilities;
mod embeddings;
mod error;
mod similarity;
mod types;

pub use capabilities::{Capabilities, PurposeGenerator};
pub use embeddings::{validate_batch, Embedder, StubEmbedder};
pub use error::{Result, VectorStoreError};
pub use similarity::{best_per_file, cosine_similarity, rank_chunks};
pub use types::VectorHit;
