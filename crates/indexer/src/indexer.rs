use crate::backfill::{ensure_embedded, file_content_hash, refresh_purposes, BackfillReport};
use crate::config::{IndexerConfig, WatcherConfig};
use crate::coordinator::Coordinator;
use crate::discovery::{DiscoveredFile, Discovery, FileStatus, FS_REVISION_PREFIX};
use crate::error::{IndexerError, Result};
use crate::git::GitAnalyzer;
use crate::imports::ImportResolver;
use crate::metadata::extract_metadata;
use crate::stats::{IndexMode, IndexOutcome, IndexStats};
use crate::vocab::build_vocab_clusters;
use crate::watcher::{start_watcher, WatchContext, WatchStatus, WatchUpdate};
use scout_code_chunker::{Chunker, Language};
use scout_graph::ImportGraph;
use scout_store::{FileMetadataRecord, IndexStatus, RepoRecord, Store};
use scout_vector_store::Capabilities;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Background work done after an index run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub backfill: BackfillReport,
    pub purposes_written: usize,
    /// Clusters stored, when the vocabulary was rebuilt
    pub vocab_clusters: Option<usize>,
}

/// Indexes registered repositories into the shared store
pub struct IndexEngine {
    store: Arc<Store>,
    capabilities: Capabilities,
    coordinator: Arc<Coordinator>,
    config: IndexerConfig,
    watcher_config: WatcherConfig,
    chunker: Chunker,
}

impl IndexEngine {
    pub fn new(
        store: Arc<Store>,
        capabilities: Capabilities,
        config: IndexerConfig,
        watcher_config: WatcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunker)?;
        Ok(Self {
            store,
            capabilities,
            coordinator: Arc::new(Coordinator::new()),
            config,
            watcher_config,
            chunker,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Register (or look up) the repository rooted at `root`
    pub fn register(&self, root: &Path, name: Option<&str>) -> Result<RepoRecord> {
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(root.display().to_string()));
        }
        Ok(self.store.register_repo(root, name)?)
    }

    /// Remove a repository and everything indexed for it
    pub fn remove(&self, repo_id: &str) -> Result<bool> {
        self.coordinator.stop_watcher(repo_id);
        Ok(self.store.remove_repo(repo_id)?)
    }

    /// Bring the index of `repo_id` up to the current revision.
    ///
    /// Runs for the same repository serialize. Without `force`, a repository
    /// already indexed at the current revision is skipped. A failure leaves
    /// the status at `indexing` so the next call retries.
    pub async fn run_index(&self, repo_id: &str, force: bool) -> Result<IndexOutcome> {
        let lock = self.coordinator.repo_lock(repo_id);
        let _guard = lock.lock().await;

        // Re-read under the lock: a run that just finished moved the marker
        let repo = self.store.require_repo(repo_id)?;
        let root = PathBuf::from(&repo.root_path);
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(repo.root_path.clone()));
        }

        let discovery = Discovery::new(&root, self.config.max_file_bytes);
        let head = discovery.current_revision().await?;
        if !force && repo.last_indexed_commit.as_deref() == Some(head.as_str()) {
            log::debug!("Index of {repo_id} already at {head}; skipping");
            return Ok(IndexOutcome::Skipped { commit: head });
        }

        let started = Instant::now();
        self.store.set_index_status(repo_id, IndexStatus::Indexing)?;

        let is_git = !head.starts_with(FS_REVISION_PREFIX);
        let previous = repo
            .last_indexed_commit
            .as_deref()
            .filter(|c| is_git && !force && !c.starts_with(FS_REVISION_PREFIX));

        let (mode, files) = match previous {
            Some(from) => match discovery.diff_scan(from, &head).await {
                Ok(files) => (IndexMode::Diff, files),
                Err(e) => {
                    log::warn!("Diff scan from {from} failed for {repo_id}: {e}; running a full scan");
                    (IndexMode::Full, discovery.full_scan().await?)
                }
            },
            None => (IndexMode::Full, discovery.full_scan().await?),
        };
        log::info!(
            "Indexing {} ({:?} scan, {} files) at {}",
            repo.name,
            mode,
            files.len(),
            head
        );

        let mut stats = IndexStats::new(head.clone(), mode);
        if mode == IndexMode::Full {
            self.remove_vanished(repo_id, &files, &mut stats)?;
        }
        for file in &files {
            self.index_file(repo_id, &root, file, &mut stats).await?;
        }

        self.rebuild_import_graph(repo_id, &mut stats)?;

        if is_git {
            let analyzer = GitAnalyzer::new(
                self.config.git_history_limit,
                self.config.max_files_per_commit,
                self.config.recent_window_days,
            );
            match analyzer
                .analyze(&root, repo.last_git_analysis_commit.as_deref(), &head)
                .await
            {
                Ok(delta) => {
                    self.store.apply_git_history(repo_id, &delta)?;
                    stats.git_analyzed = true;
                }
                Err(e) => {
                    log::warn!("Git analysis failed for {repo_id}: {e}");
                    stats.add_error(format!("git analysis: {e}"));
                }
            }
        }

        self.store.mark_indexed(repo_id, &head)?;
        stats.time_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Indexed {}: {} files, +{} ={} -{} chunks, {} import edges in {}ms",
            repo.name,
            stats.files_indexed,
            stats.chunks.inserted,
            stats.chunks.unchanged,
            stats.chunks.deleted,
            stats.import_edges,
            stats.time_ms
        );
        Ok(IndexOutcome::Indexed(stats))
    }

    fn remove_vanished(
        &self,
        repo_id: &str,
        files: &[DiscoveredFile],
        stats: &mut IndexStats,
    ) -> Result<()> {
        let present: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
        let mut known: HashSet<String> = self.store.chunked_paths(repo_id)?.into_iter().collect();
        known.extend(
            self.store
                .list_file_metadata(repo_id)?
                .into_iter()
                .map(|m| m.path),
        );
        for path in known {
            if !present.contains(path.as_str()) {
                let removed = self.store.delete_file_chunks(repo_id, &path)?;
                self.store.delete_file_metadata(repo_id, &path)?;
                stats.add_deleted(removed);
            }
        }
        Ok(())
    }

    async fn index_file(
        &self,
        repo_id: &str,
        root: &Path,
        file: &DiscoveredFile,
        stats: &mut IndexStats,
    ) -> Result<()> {
        if file.status == FileStatus::Deleted {
            let removed = self.store.delete_file_chunks(repo_id, &file.path)?;
            self.store.delete_file_metadata(repo_id, &file.path)?;
            stats.add_deleted(removed);
            return Ok(());
        }

        let content = match tokio::fs::read_to_string(root.join(&file.path)).await {
            Ok(content) => content,
            Err(e) => {
                log::debug!("Skipping unreadable {}: {e}", file.path);
                stats.add_error(format!("{}: {e}", file.path));
                return Ok(());
            }
        };

        let language = file.language.as_str();
        let chunks = self.chunker.chunk(&content);
        let diff = self
            .store
            .apply_file_chunks(repo_id, &file.path, language, &chunks)?;

        let extracted = extract_metadata(file.language, &content);
        self.store.upsert_file_metadata(
            repo_id,
            &FileMetadataRecord {
                path: file.path.clone(),
                language: language.to_string(),
                exports: extracted.exports,
                imports: extracted.imports,
                docstring: extracted.docstring,
                sections: extracted.sections,
                internals: extracted.internals,
                purpose: None,
                purpose_hash: None,
                content_hash: file_content_hash(&content),
            },
        )?;
        stats.add_file(language, diff);
        Ok(())
    }

    fn rebuild_import_graph(&self, repo_id: &str, stats: &mut IndexStats) -> Result<()> {
        let metadata = self.store.list_file_metadata(repo_id)?;
        let resolver = ImportResolver::new(metadata.iter().map(|m| m.path.clone()));
        let edges = resolver.resolve_edges(metadata.iter().map(|m| {
            (
                m.path.as_str(),
                Language::from_name(&m.language),
                m.imports.as_slice(),
            )
        }));
        stats.import_edges = self.store.replace_imports(repo_id, &edges)?;

        let graph = ImportGraph::from_edges(edges.iter().map(|(s, t)| (s.as_str(), t.as_str())));
        match graph.max_depth() {
            Ok(depth) => {
                self.store.set_max_import_depth(repo_id, depth)?;
                stats.max_import_depth = Some(depth);
            }
            Err(e) => log::warn!("Import depth unavailable for {repo_id}: {e}"),
        }
        Ok(())
    }

    /// Fill missing embeddings for `repo_id`
    pub async fn ensure_embedded(&self, repo_id: &str) -> Result<BackfillReport> {
        ensure_embedded(
            &self.store,
            &self.capabilities,
            repo_id,
            self.config.embed_batch_size,
            self.config.embed_max_batches,
        )
        .await
    }

    /// Embedding backfill, stale purposes and, when the indexed revision
    /// moved and an embedder exists, the vocabulary clusters
    pub async fn enrich(&self, repo_id: &str) -> Result<EnrichmentReport> {
        let repo = self.store.require_repo(repo_id)?;
        let backfill = self.ensure_embedded(repo_id).await?;
        let purposes_written = refresh_purposes(
            &self.store,
            &self.capabilities,
            repo_id,
            Path::new(&repo.root_path),
            self.config.max_purposes_per_pass,
        )
        .await?;
        let vocab_clusters = self.refresh_vocab(&repo).await?;
        Ok(EnrichmentReport {
            backfill,
            purposes_written,
            vocab_clusters,
        })
    }

    async fn refresh_vocab(&self, repo: &RepoRecord) -> Result<Option<usize>> {
        let Some(embedder) = self.capabilities.embedder.as_ref() else {
            return Ok(None);
        };
        let Some(commit) = repo.last_indexed_commit.as_deref() else {
            return Ok(None);
        };
        if repo.vocab_clusters_commit.as_deref() == Some(commit) {
            return Ok(None);
        }

        let metadata = self.store.list_file_metadata(&repo.id)?;
        let clusters = build_vocab_clusters(
            embedder.as_ref(),
            &metadata,
            &self.config.vocab,
            self.config.embed_batch_size,
        )
        .await?;
        let json = serde_json::to_string(&clusters)?;
        self.store.set_vocab_clusters(&repo.id, &json, commit)?;
        Ok(Some(clusters.len()))
    }

    /// Run [`IndexEngine::enrich`] in the background; failures are logged
    pub fn spawn_enrichment(self: &Arc<Self>, repo_id: &str) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let repo_id = repo_id.to_string();
        tokio::spawn(async move {
            match engine.enrich(&repo_id).await {
                Ok(report) => log::debug!("Enrichment for {repo_id}: {report:?}"),
                Err(e) => log::warn!("Enrichment for {repo_id} failed: {e}"),
            }
        })
    }

    /// Start the file watcher of `repo_id`
    pub fn watch(&self, repo_id: &str) -> Result<WatchStatus> {
        let repo = self.store.require_repo(repo_id)?;
        let started = self.coordinator.insert_watcher_with(repo_id, || {
            start_watcher(WatchContext {
                repo_id: repo.id.clone(),
                root: PathBuf::from(&repo.root_path),
                store: Arc::clone(&self.store),
                chunker: Chunker::new(self.config.chunker)?,
                max_file_bytes: self.config.max_file_bytes,
                config: self.watcher_config,
                coordinator: Arc::clone(&self.coordinator),
            })
        })?;
        Ok(if started {
            WatchStatus::Started
        } else {
            WatchStatus::AlreadyWatching
        })
    }

    pub fn unwatch(&self, repo_id: &str) -> bool {
        self.coordinator.stop_watcher(repo_id)
    }

    pub fn watch_updates(&self, repo_id: &str) -> Option<broadcast::Receiver<WatchUpdate>> {
        self.coordinator.subscribe_watcher(repo_id)
    }
}

impl Drop for IndexEngine {
    fn drop(&mut self) {
        self.coordinator.shutdown();
    }
}
