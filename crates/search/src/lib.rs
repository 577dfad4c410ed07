//! # Scout Search
//!
//! Goal interpretation and context-pack assembly, plus chunk-level search.
//!
//! ```text
//! goal ──> QueryClassifier ──> QueryExpander ──> FileRanker (capped Ranking)
//!                                                   │
//!            co-change promotion / semantic merge <─┘
//!                          │
//!                          ├─> enrich (imports, chains, partners)
//!                          ├─> resolve_snippets
//!                          └─> ContextFormatter (confidence tier + token budget)
//! ```
//!
//! [`CodeSearch`] answers the separate `search` operation with grep,
//! semantic or hybrid (weighted RRF) ranking over stored chunks.

mod code_search;
mod config;
mod enrich;
mod error;
mod format;
mod fusion;
mod interpreter;
mod noise;
mod query_classifier;
mod related_tests;
mod scoring;
mod snippets;
mod terms;
mod types;

pub use code_search::{grep_search, semantic_search, CodeSearch};
pub use config::{EnrichmentConfig, FormatterConfig, ScoringConfig};
pub use enrich::{
    enrich, merge_semantic_hits, promote_cochange_clusters, promote_cochange_partners,
    CochangePartner, Enrichment,
};
pub use error::{Result, SearchError};
pub use format::{
    classify_confidence, filter_weak_files, Confidence, ContextFormatter, ContextPack, PackInput,
    StripStep,
};
pub use fusion::{FusionWeights, RrfFusion};
pub use interpreter::{Interpretation, QueryInterpreter};
pub use noise::NoiseFilter;
pub use query_classifier::{parse_stack_frames, ParsedQuery, QueryClassifier, QueryKind, StackFrame};
pub use related_tests::{find_related_tests, is_test_path};
pub use scoring::{sibling_key, FileRanker, RankInput, Ranking};
pub use snippets::{find_declaration_line, resolve_snippets, slice_around, Snippet, SnippetAnchor};
pub use terms::{is_stopword, stem, tokenize, QueryExpander, QueryTerms, StemTerm};
pub use types::{ContextFile, FileOrigin, ScoredFile};
