//! # Scout Engine
//!
//! The serving layer: answers `context` and `search` requests for
//! registered repositories on top of the indexer and the search pipeline.
//!
//! ```text
//! ContextRequest ──> ResponseCache (repo, commit, embeddings, goal)
//!                        │ miss
//!                        ├─> IndexEngine::run_index (freshness)
//!                        ├─> semantic hits (optional embedder)
//!                        ├─> QueryInterpreter ─> co-change promotion ─> semantic merge
//!                        ├─> enrich / snippets / related tests
//!                        └─> ContextFormatter ──> ContextResponse
//!                                                    │
//!                                         TelemetryWriter (bounded, drop-on-full)
//! ```
//!
//! [`ContextEngine::context`] never fails; errors turn into the fallback
//! pack. The eval harness replays a gold dataset and reports hit@k,
//! recall@k, MRR and latency.

mod cache;
mod config;
mod error;
mod eval;
mod orchestrator;
mod telemetry;

pub use cache::{CacheKey, ResponseCache};
pub use config::{CacheConfig, EngineConfig, TelemetryConfig};
pub use error::{EngineError, Result};
pub use eval::{
    run_eval, score_case, CaseMetrics, CaseResult, EvalCase, EvalDataset, EvalReport, EvalSummary,
    EVAL_SCHEMA_VERSION,
};
pub use orchestrator::{BuiltContext, ContextEngine};
pub use telemetry::{
    JsonlSink, LogSink, MemorySink, Operation, TelemetryEvent, TelemetrySink, TelemetryWriter,
};
