use crate::orchestrator::ContextEngine;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

pub const EVAL_SCHEMA_VERSION: u32 = 1;

/// Gold queries with the files a good pack must contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalDataset {
    pub schema_version: u32,
    #[serde(default)]
    pub name: Option<String>,
    pub cases: Vec<EvalCase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub id: String,
    pub query: String,
    #[serde(default)]
    pub expected_paths: Vec<String>,
}

impl EvalDataset {
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != EVAL_SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported eval dataset schema_version {} (expected {EVAL_SCHEMA_VERSION})",
                self.schema_version
            );
        }
        if self.cases.is_empty() {
            anyhow::bail!("Eval dataset must contain at least one case");
        }
        let mut ids = HashSet::new();
        for case in &self.cases {
            if case.id.trim().is_empty() {
                anyhow::bail!("Eval dataset case id must not be empty");
            }
            if !ids.insert(case.id.as_str()) {
                anyhow::bail!("Eval dataset case id '{}' is duplicated", case.id);
            }
            if case.query.trim().is_empty() {
                anyhow::bail!("Eval dataset case '{}' query must not be empty", case.id);
            }
            if case.expected_paths.iter().all(|path| path.trim().is_empty()) {
                anyhow::bail!(
                    "Eval dataset case '{}' expected_paths must not be empty",
                    case.id
                );
            }
        }
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read eval dataset {}", path.display()))?;
        let dataset: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Eval dataset {} is not valid JSON", path.display()))?;
        dataset.validate()?;
        Ok(dataset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaseMetrics {
    /// At least one expected path within the first k
    pub hit: bool,
    pub recall: f64,
    pub reciprocal_rank: f64,
    /// 1-based rank of the first expected path
    pub first_rank: Option<usize>,
}

/// Score `returned` (best first) against `expected` at cutoff `k`
pub fn score_case(expected: &[String], returned: &[String], k: usize) -> CaseMetrics {
    let expected: HashSet<&str> = expected
        .iter()
        .map(|path| path.trim())
        .filter(|path| !path.is_empty())
        .collect();
    let mut found: HashSet<&str> = HashSet::new();
    let mut first_rank = None;
    for (idx, path) in returned.iter().take(k).enumerate() {
        if expected.contains(path.as_str()) {
            found.insert(path.as_str());
            first_rank.get_or_insert(idx + 1);
        }
    }
    let recall = if expected.is_empty() {
        0.0
    } else {
        found.len() as f64 / expected.len() as f64
    };
    CaseMetrics {
        hit: first_rank.is_some(),
        recall,
        reciprocal_rank: first_rank.map_or(0.0, |rank| 1.0 / rank as f64),
        first_rank,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub query: String,
    pub metrics: CaseMetrics,
    pub latency_ms: u64,
    pub returned: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub cases: usize,
    pub hit_at_k: f64,
    pub recall_at_k: f64,
    pub mrr: f64,
    pub mean_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub dataset: Option<String>,
    pub k: usize,
    pub summary: EvalSummary,
    pub cases: Vec<CaseResult>,
}

/// Run every case against `repo_id` and score the packed file lists
pub async fn run_eval(
    engine: &ContextEngine,
    repo_id: &str,
    dataset: &EvalDataset,
    k: usize,
) -> EvalReport {
    let k = k.max(1);
    let mut cases = Vec::with_capacity(dataset.cases.len());
    for case in &dataset.cases {
        let started = Instant::now();
        let built = engine.build_context(repo_id, &case.query).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (returned, error) = match built {
            Ok(built) => (built.pack.files, None),
            Err(e) => {
                log::warn!("Eval case '{}' failed: {e}", case.id);
                (Vec::new(), Some(e.to_string()))
            }
        };
        let metrics = score_case(&case.expected_paths, &returned, k);
        log::debug!(
            "Eval case '{}': hit={} recall={:.2} rr={:.2} in {latency_ms}ms",
            case.id,
            metrics.hit,
            metrics.recall,
            metrics.reciprocal_rank
        );
        cases.push(CaseResult {
            id: case.id.clone(),
            query: case.query.clone(),
            metrics,
            latency_ms,
            returned,
            error,
        });
    }

    EvalReport {
        dataset: dataset.name.clone(),
        k,
        summary: summarize(&cases),
        cases,
    }
}

fn summarize(cases: &[CaseResult]) -> EvalSummary {
    let hits: Vec<f64> = cases
        .iter()
        .map(|c| if c.metrics.hit { 1.0 } else { 0.0 })
        .collect();
    let recalls: Vec<f64> = cases.iter().map(|c| c.metrics.recall).collect();
    let rrs: Vec<f64> = cases.iter().map(|c| c.metrics.reciprocal_rank).collect();
    let mut latencies: Vec<u64> = cases.iter().map(|c| c.latency_ms).collect();
    EvalSummary {
        cases: cases.len(),
        hit_at_k: mean_f64(&hits),
        recall_at_k: mean_f64(&recalls),
        mrr: mean_f64(&rrs),
        mean_latency_ms: mean_u64(&latencies),
        p50_latency_ms: percentile_u64(&mut latencies, 0.50),
        p95_latency_ms: percentile_u64(&mut latencies, 0.95),
    }
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_u64(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: u64 = values.iter().sum();
    sum as f64 / values.len() as f64
}

fn percentile_u64(values: &mut [u64], pct: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let n = values.len();
    let rank = ((pct.clamp(0.0, 1.0) * n as f64).ceil() as usize)
        .saturating_sub(1)
        .min(n - 1);
    values[rank]
}
