//! # Scout Indexer
//!
//! Diff-aware repository indexing.
//!
//! ## Pipeline
//!
//! ```text
//! Repository
//!     │
//!     ├──> Discovery (git ls-files / git diff, fs walk without git)
//!     │      └─> added / modified / deleted files
//!     │
//!     ├──> Chunker ──> chunk rows (reused by (index, hash))
//!     ├──> Metadata extractor ──> exports, imports, docstring, sections
//!     ├──> Import resolver ──> import edges + max depth
//!     ├──> Git analyzer ──> commit counts, co-change pairs
//!     │
//!     └──> background enrichment: embeddings, purposes, vocab clusters
//! ```
//!
//! Runs for one repository serialize on a lock owned by the [`Coordinator`];
//! a second run at an unchanged revision is skipped.
//!
//! ## Example
//!
//! ```no_run
//! use scout_indexer::{IndexEngine, IndexerConfig, WatcherConfig};
//! use scout_store::Store;
//! use scout_vector_store::Capabilities;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(Store::open("/tmp/scout/index.db")?);
//!     let engine = IndexEngine::new(
//!         store,
//!         Capabilities::none(),
//!         IndexerConfig::default(),
//!         WatcherConfig::default(),
//!     )?;
//!     let repo = engine.register("/path/to/project".as_ref(), None)?;
//!     let outcome = engine.run_index(&repo.id, false).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

mod backfill;
mod config;
mod coordinator;
mod discovery;
mod error;
mod git;
mod imports;
mod indexer;
mod metadata;
mod scanner;
mod stats;
mod vocab;
mod watcher;

pub use backfill::{embeddable_languages, file_content_hash, BackfillReport};
pub use config::{IndexerConfig, VocabConfig, WatcherConfig};
pub use coordinator::Coordinator;
pub use discovery::{DiscoveredFile, Discovery, FileStatus, FS_REVISION_PREFIX};
pub use error::{IndexerError, Result};
pub use git::{git_head, GitAnalyzer};
pub use imports::ImportResolver;
pub use indexer::{EnrichmentReport, IndexEngine};
pub use metadata::{extract_metadata, extractor_for, ExtractedMetadata, SourceExtractor};
pub use scanner::FileScanner;
pub use stats::{IndexMode, IndexOutcome, IndexStats};
pub use vocab::{build_vocab_clusters, collect_terms};
pub use watcher::{FileChange, WatchHandle, WatchStatus, WatchUpdate};
