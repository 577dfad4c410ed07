//! # Scout Code Chunker
//!
//! Splits source files into overlapping line windows for indexing.
//!
//! Boundaries snap to blank lines or declaration lines near the target size so
//! chunks tend to hold whole functions. Every chunk carries a content hash that
//! also covers the chunking parameters, so a parameter change re-indexes.
//!
//! ```text
//! Source file
//!     │
//!     ├──> window of target_lines
//!     │     └─> search ±boundary_window: blank line, else declaration, else raw cut
//!     │
//!     └──> next window starts overlap_lines before the cut
//! ```
//!
//! ## Example
//!
//! ```rust
//! use scout_code_chunker::{Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
//! let chunks = chunker.chunk("fn main() {\n    println!(\"hi\");\n}\n");
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].end_line, 3);
//! ```

mod chunker;
mod config;
mod error;
mod language;
mod tokens;
mod types;

pub use chunker::{is_declaration_line, Chunker};
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use tokens::split_identifier;
pub use types::{estimate_tokens, CodeChunk};
