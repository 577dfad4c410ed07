use crate::error::{Result, SearchError};
use crate::fusion::{FusionWeights, RrfFusion};
use crate::query_classifier::QueryClassifier;
use crate::terms::tokenize;
use scout_code_chunker::Language;
use scout_protocol::{RankedResult, SearchMode, SearchRequest, SearchResponse};
use scout_store::StoredChunk;
use scout_vector_store::{rank_chunks, validate_batch, Embedder};
use std::collections::HashMap;

/// Weight of one whole-query occurrence relative to one token occurrence
const PHRASE_WEIGHT: f32 = 10.0;
/// Per-token occurrences counted toward a chunk's grep score
const TOKEN_OCCURRENCE_CAP: usize = 5;
/// Candidates pulled from each ranking before fusion, as a multiple of the limit
const FUSION_DEPTH: usize = 3;
const MAX_SNIPPET_CHARS: usize = 200;

fn keep_chunk(chunk: &StoredChunk, code_only: bool) -> bool {
    !code_only || Language::from_name(&chunk.language).is_code()
}

/// Case-insensitive literal search over chunk content.
///
/// A chunk scores `PHRASE_WEIGHT` per occurrence of the whole query plus
/// one per occurrence of each query token (capped). Chunks matching
/// nothing are skipped.
pub fn grep_search(
    query: &str,
    chunks: &[StoredChunk],
    limit: usize,
    code_only: bool,
) -> Result<Vec<RankedResult>> {
    let phrase = query.trim().to_lowercase();
    if phrase.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let mut needles = tokenize(query);
    needles.retain(|t| *t != phrase);

    let mut results: Vec<RankedResult> = chunks
        .iter()
        .filter(|chunk| keep_chunk(chunk, code_only))
        .filter_map(|chunk| {
            let haystack = chunk.content.to_lowercase();
            let phrase_hits = haystack.matches(phrase.as_str()).count();
            let token_hits: usize = needles
                .iter()
                .map(|needle| haystack.matches(needle.as_str()).count().min(TOKEN_OCCURRENCE_CAP))
                .sum();
            if phrase_hits == 0 && token_hits == 0 {
                return None;
            }
            let score = phrase_hits as f32 * PHRASE_WEIGHT + token_hits as f32;
            Some(to_result(chunk, score, matching_line(chunk, &phrase, &needles)))
        })
        .collect();

    sort_results(&mut results);
    results.truncate(limit);
    Ok(results)
}

/// Cosine ranking of embedded chunks against the embedded query.
///
/// Chunks without an embedding never match.
pub async fn semantic_search(
    embedder: &dyn Embedder,
    query: &str,
    chunks: &[StoredChunk],
    limit: usize,
    code_only: bool,
) -> Result<Vec<RankedResult>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let texts = vec![query.to_string()];
    let vectors = embedder.embed_texts(&texts, true).await?;
    validate_batch(embedder, &texts, &vectors)?;
    let Some(query_vector) = vectors.first() else {
        return Ok(Vec::new());
    };

    let by_id: HashMap<i64, &StoredChunk> = chunks.iter().map(|c| (c.id, c)).collect();
    let phrase = query.to_lowercase();
    let needles = tokenize(query);
    let results = rank_chunks(query_vector, chunks, chunks.len())
        .into_iter()
        .filter_map(|hit| by_id.get(&hit.chunk_id).map(|chunk| (hit.score, *chunk)))
        .filter(|(_, chunk)| keep_chunk(chunk, code_only))
        .take(limit)
        .map(|(score, chunk)| to_result(chunk, score, matching_line(chunk, &phrase, &needles)))
        .collect();
    Ok(results)
}

/// Chunk search front end used by the `search` operation
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeSearch {
    fusion: RrfFusion,
}

impl CodeSearch {
    pub fn new(fusion: RrfFusion) -> Self {
        Self { fusion }
    }

    /// Run `request` over `chunks`.
    ///
    /// Semantic and hybrid modes fall back to grep when there is no
    /// embedder, no embedded chunk, or the embedder fails.
    pub async fn search(
        &self,
        embedder: Option<&dyn Embedder>,
        chunks: &[StoredChunk],
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        let requested = request.mode.unwrap_or_default();
        let limit = request.effective_limit();
        if request.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let embedder = match embedder {
            Some(embedder) if chunks.iter().any(|c| c.embedding.is_some()) => Some(embedder),
            _ => None,
        };
        let embedder = match (requested.needs_embeddings(), embedder) {
            (true, Some(embedder)) => embedder,
            (true, None) => {
                log::info!("No embeddings for {requested} search; using grep");
                return self.grep(request, chunks, limit);
            }
            (false, _) => return self.grep(request, chunks, limit),
        };

        let depth = if requested == SearchMode::Hybrid { limit * FUSION_DEPTH } else { limit };
        let semantic = match semantic_search(embedder, &request.query, chunks, depth, request.code_only).await {
            Ok(results) => results,
            Err(err) => {
                log::warn!("Semantic search failed, using grep: {err}");
                return self.grep(request, chunks, limit);
            }
        };

        if requested == SearchMode::Semantic {
            return Ok(SearchResponse {
                results: semantic,
                search_mode_used: SearchMode::Semantic,
            });
        }

        let grep = grep_search(&request.query, chunks, depth, request.code_only)?;
        Ok(SearchResponse {
            results: self.fuse(&request.query, semantic, grep, limit),
            search_mode_used: SearchMode::Hybrid,
        })
    }

    fn grep(&self, request: &SearchRequest, chunks: &[StoredChunk], limit: usize) -> Result<SearchResponse> {
        Ok(SearchResponse {
            results: grep_search(&request.query, chunks, limit, request.code_only)?,
            search_mode_used: SearchMode::Grep,
        })
    }

    fn fuse(
        &self,
        query: &str,
        semantic: Vec<RankedResult>,
        grep: Vec<RankedResult>,
        limit: usize,
    ) -> Vec<RankedResult> {
        let kind = QueryClassifier::classify(query);
        let weights = FusionWeights::for_kind(kind);
        log::debug!(
            "Hybrid weights for {kind:?} query: semantic={:.1}, grep={:.1}",
            weights.semantic,
            weights.grep
        );

        let key = |r: &RankedResult| (r.path.clone(), r.start_line);
        let mut ids: HashMap<(String, usize), i64> = HashMap::new();
        let mut pool: HashMap<i64, RankedResult> = HashMap::new();
        let mut rank_ids = |results: Vec<RankedResult>| -> Vec<i64> {
            results
                .into_iter()
                .map(|result| {
                    let next = ids.len() as i64;
                    let id = *ids.entry(key(&result)).or_insert(next);
                    // grep runs second so its literal-match snippet wins
                    pool.insert(id, result);
                    id
                })
                .collect()
        };
        let semantic_ids = rank_ids(semantic);
        let grep_ids = rank_ids(grep);

        self.fusion
            .fuse(&semantic_ids, &grep_ids, weights)
            .into_iter()
            .take(limit)
            .filter_map(|(id, score)| {
                pool.remove(&id).map(|mut result| {
                    result.score = score;
                    result
                })
            })
            .collect()
    }
}

fn to_result(chunk: &StoredChunk, score: f32, snippet: String) -> RankedResult {
    RankedResult {
        path: chunk.path.clone(),
        start_line: chunk.start_line,
        end_line: chunk.end_line,
        language: chunk.language.clone(),
        score,
        snippet,
    }
}

/// First line containing the query, else a query token, else the first
/// non-blank line
fn matching_line(chunk: &StoredChunk, phrase: &str, needles: &[String]) -> String {
    let lines: Vec<&str> = chunk.content.lines().collect();
    let find = |needle: &str| {
        lines
            .iter()
            .find(|line| line.to_lowercase().contains(needle))
            .copied()
    };
    let line = find(phrase)
        .or_else(|| needles.iter().find_map(|n| find(n.as_str())))
        .or_else(|| lines.iter().find(|l| !l.trim().is_empty()).copied())
        .unwrap_or("");
    line.trim().chars().take(MAX_SNIPPET_CHARS).collect()
}

fn sort_results(results: &mut [RankedResult]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
}
