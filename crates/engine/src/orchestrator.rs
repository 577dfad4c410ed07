use crate::cache::{CacheKey, ResponseCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::telemetry::{Operation, TelemetryEvent, TelemetryWriter};
use scout_graph::ImportGraph;
use scout_indexer::{IndexEngine, IndexOutcome};
use scout_protocol::{
    ContextRequest, ContextResponse, ContextStats, SearchRequest, SearchResponse,
};
use scout_search::{
    enrich, find_related_tests, merge_semantic_hits, promote_cochange_clusters,
    promote_cochange_partners, resolve_snippets, CodeSearch, ContextFile, ContextFormatter,
    ContextPack, EnrichmentConfig, PackInput, QueryInterpreter, RankInput, SearchError,
};
use scout_store::{FileMetadataRecord, RepoRecord, Store};
use scout_vector_store::{best_per_file, rank_chunks, validate_batch, Capabilities, VectorHit};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// An uncached pack and the index state it was built from
#[derive(Debug, Clone)]
pub struct BuiltContext {
    pub pack: ContextPack,
    pub commit: String,
    pub embeddings: bool,
}

/// Serves `context` and `search` for registered repositories
pub struct ContextEngine {
    indexer: Arc<IndexEngine>,
    interpreter: QueryInterpreter,
    formatter: ContextFormatter,
    code_search: CodeSearch,
    enrichment: EnrichmentConfig,
    cache: ResponseCache,
    telemetry: Option<TelemetryWriter>,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl ContextEngine {
    pub fn new(store: Arc<Store>, capabilities: Capabilities, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let indexer = IndexEngine::new(store, capabilities, config.indexer, config.watcher)?;
        Ok(Self {
            indexer: Arc::new(indexer),
            interpreter: QueryInterpreter::new(config.scoring)?,
            formatter: ContextFormatter::new(config.formatter),
            code_search: CodeSearch::default(),
            enrichment: config.enrichment,
            cache: ResponseCache::new(config.cache),
            telemetry: None,
        })
    }

    pub fn with_telemetry(mut self, writer: TelemetryWriter) -> Self {
        self.telemetry = Some(writer);
        self
    }

    pub fn indexer(&self) -> &Arc<IndexEngine> {
        &self.indexer
    }

    pub fn store(&self) -> &Arc<Store> {
        self.indexer.store()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn register(&self, root: &Path, name: Option<&str>) -> Result<RepoRecord> {
        Ok(self.indexer.register(root, name)?)
    }

    pub fn list_repos(&self) -> Result<Vec<RepoRecord>> {
        Ok(self.store().list_repos()?)
    }

    /// Remove a repository with all derived rows and cached packs
    pub fn remove(&self, repo_id: &str) -> Result<bool> {
        let removed = self.indexer.remove(repo_id)?;
        self.cache.clear();
        Ok(removed)
    }

    /// Bring the index up to date; a fresh run schedules background enrichment
    pub async fn refresh(&self, repo_id: &str) -> Result<IndexOutcome> {
        let outcome = self.indexer.run_index(repo_id, false).await?;
        if let IndexOutcome::Indexed(stats) = &outcome {
            log::info!(
                "Indexed {repo_id} at {} ({:?}): {} files, {} deleted in {}ms",
                stats.commit,
                stats.mode,
                stats.files_indexed,
                stats.files_deleted,
                stats.time_ms
            );
            let capabilities = self.indexer.capabilities();
            if capabilities.embedder.is_some() || capabilities.purpose.is_some() {
                self.indexer.spawn_enrichment(repo_id);
            }
        }
        Ok(outcome)
    }

    /// Answer a `context` request. Never fails: any error yields the
    /// fallback response.
    pub async fn context(&self, request: &ContextRequest) -> ContextResponse {
        let started = Instant::now();
        let mut event = TelemetryEvent::new(Operation::Context, &request.repo_id);
        let response = match self.try_context(request, started).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Context for {} failed: {e}", request.repo_id);
                event.fallback = true;
                ContextResponse::fallback(elapsed_ms(started))
            }
        };
        event.duration_ms = response.stats.duration_ms;
        event.result_count = response.stats.files_in_context;
        event.cache_hit = response.stats.cached;
        self.emit(event);
        response
    }

    async fn try_context(&self, request: &ContextRequest, started: Instant) -> Result<ContextResponse> {
        let goal = request.goal.trim();
        if goal.is_empty() {
            return Err(SearchError::EmptyQuery.into());
        }
        let outcome = self.refresh(&request.repo_id).await?;
        let embeddings = self.embeddings_available(&request.repo_id)?;
        let key = CacheKey {
            repo_id: request.repo_id.clone(),
            commit: outcome.commit().to_string(),
            embeddings,
            goal: goal.to_string(),
        };
        if let Some(mut cached) = self.cache.get(&key) {
            log::debug!("Context cache hit for {}", request.repo_id);
            cached.stats.cached = true;
            cached.stats.duration_ms = elapsed_ms(started);
            return Ok(cached);
        }

        let pack = self.assemble(&request.repo_id, goal, embeddings).await?;
        let response = ContextResponse {
            context_pack: pack.text,
            stats: ContextStats {
                files_in_context: pack.files.len(),
                index_fresh: true,
                duration_ms: elapsed_ms(started),
                cached: false,
            },
        };
        self.cache.insert(key, response.clone());
        Ok(response)
    }

    /// Refresh the index and build a pack without touching the cache
    pub async fn build_context(&self, repo_id: &str, goal: &str) -> Result<BuiltContext> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(SearchError::EmptyQuery.into());
        }
        let outcome = self.refresh(repo_id).await?;
        let embeddings = self.embeddings_available(repo_id)?;
        let pack = self.assemble(repo_id, goal, embeddings).await?;
        Ok(BuiltContext {
            pack,
            commit: outcome.commit().to_string(),
            embeddings,
        })
    }

    fn embeddings_available(&self, repo_id: &str) -> Result<bool> {
        Ok(self.indexer.capabilities().has_embeddings()
            && self.store().embedded_chunk_count(repo_id)? > 0)
    }

    async fn assemble(&self, repo_id: &str, goal: &str, embeddings: bool) -> Result<ContextPack> {
        let store = self.store();
        let repo = store.require_repo(repo_id)?;
        let metadata = store.list_file_metadata(repo_id)?;
        let stats = store.list_file_stats(repo_id)?;
        let clusters = repo.decoded_vocab_clusters();
        let edges = store.list_imports(repo_id)?;
        let graph = ImportGraph::from_edges(edges.iter().map(|(from, to)| (from.as_str(), to.as_str())));
        let indegree = graph.indegree_map();

        let hits = if embeddings {
            self.semantic_hits(repo_id, goal).await
        } else {
            Vec::new()
        };

        let interpretation = self.interpreter.interpret(
            goal,
            &RankInput {
                files: &metadata,
                stats: &stats,
                clusters: &clusters,
                indegree: Some(&indegree),
                max_import_depth: repo.max_import_depth,
            },
        );
        let cap = interpretation.ranking.file_cap;
        let mut files: Vec<ContextFile> = interpretation
            .ranking
            .files
            .iter()
            .cloned()
            .map(ContextFile::from)
            .collect();

        let cochanges = store.list_cochanges(repo_id, 1)?;
        let noise = self.interpreter.noise();
        let pairwise =
            promote_cochange_partners(&mut files, &cochanges, noise, self.enrichment.pairwise_promotions);
        let candidates: Vec<String> = interpretation
            .ranking
            .overflow
            .iter()
            .map(|f| f.path.clone())
            .collect();
        let clustered = promote_cochange_clusters(
            &mut files,
            &candidates,
            &cochanges,
            noise,
            self.enrichment.cluster_min_count,
            cap,
        );
        let merged = merge_semantic_hits(&mut files, &hits, self.enrichment.semantic_merge_limit, cap);
        log::debug!(
            "Selection for {repo_id}: {} files ({pairwise} co-change, {clustered} cluster, {merged} semantic)",
            files.len()
        );

        let enrichment = enrich(&files, &graph, &cochanges, &self.enrichment);
        let all_paths: Vec<String> = metadata.iter().map(|m| m.path.clone()).collect();
        let metadata: HashMap<String, FileMetadataRecord> =
            metadata.into_iter().map(|m| (m.path.clone(), m)).collect();

        let mut chunks = HashMap::new();
        for file in files.iter().take(self.enrichment.snippet_files) {
            chunks.insert(file.path.clone(), store.chunks_for_path(repo_id, &file.path)?);
        }
        let snippets = resolve_snippets(&interpretation.query, &files, &metadata, &chunks, &self.enrichment);
        let tests: HashMap<String, Vec<String>> = files
            .iter()
            .map(|f| (f.path.clone(), find_related_tests(&f.path, &all_paths)))
            .filter(|(_, tests)| !tests.is_empty())
            .collect();

        Ok(self.formatter.format(&PackInput {
            goal,
            files: &files,
            metadata: &metadata,
            enrichment: &enrichment,
            snippets: &snippets,
            tests: &tests,
        }))
    }

    /// Best chunk per file for the embedded goal; failures degrade to none
    async fn semantic_hits(&self, repo_id: &str, goal: &str) -> Vec<VectorHit> {
        match self.try_semantic_hits(repo_id, goal).await {
            Ok(hits) => hits,
            Err(e) => {
                log::warn!("Semantic lookup for {repo_id} failed, continuing without it: {e}");
                Vec::new()
            }
        }
    }

    async fn try_semantic_hits(&self, repo_id: &str, goal: &str) -> Result<Vec<VectorHit>> {
        let Some(embedder) = self.indexer.capabilities().embedder.clone() else {
            return Ok(Vec::new());
        };
        let texts = vec![goal.to_string()];
        let vectors = embedder.embed_texts(&texts, true).await?;
        validate_batch(embedder.as_ref(), &texts, &vectors)?;
        let Some(query) = vectors.first() else {
            return Ok(Vec::new());
        };
        let chunks = self.store().embedded_chunks(repo_id)?;
        let noise = self.interpreter.noise();
        let mut hits = best_per_file(rank_chunks(query, &chunks, chunks.len()));
        hits.retain(|hit| !noise.is_noise(&hit.path));
        Ok(hits)
    }

    /// Answer a `search` request over the repository's chunks
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let result = self.try_search(request).await;
        let mut event = TelemetryEvent::new(Operation::Search, &request.repo_id);
        event.duration_ms = elapsed_ms(started);
        match &result {
            Ok(response) => event.result_count = response.results.len(),
            Err(e) => {
                log::warn!("Search for {} failed: {e}", request.repo_id);
                event.fallback = true;
            }
        }
        self.emit(event);
        result
    }

    async fn try_search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if request.query.trim().is_empty() {
            return Err(EngineError::Search(SearchError::EmptyQuery));
        }
        self.refresh(&request.repo_id).await?;
        let chunks = self.store().chunks_for_repo(&request.repo_id)?;
        let embedder = self.indexer.capabilities().embedder.clone();
        Ok(self
            .code_search
            .search(embedder.as_deref(), &chunks, request)
            .await?)
    }

    fn emit(&self, event: TelemetryEvent) {
        if let Some(writer) = &self.telemetry {
            writer.submit(event);
        }
    }

    /// Stop watchers and deliver queued telemetry
    pub async fn shutdown(self) {
        self.indexer.coordinator().shutdown();
        if let Some(writer) = self.telemetry {
            writer.flush().await;
        }
    }
}
