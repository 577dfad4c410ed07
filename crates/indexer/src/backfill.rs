use crate::error::Result;
use scout_code_chunker::Language;
use scout_store::Store;
use scout_vector_store::{validate_batch, Capabilities};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Outcome of one backfill invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub embedded_count: usize,
    pub batches: usize,
    /// A batch failed and the remaining batches were skipped
    pub aborted: bool,
    /// The batch ceiling was reached with work left over
    pub exhausted_budget: bool,
}

/// Names of every language whose chunks get embeddings
pub fn embeddable_languages() -> Vec<&'static str> {
    [
        Language::Rust,
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Go,
        Language::Java,
        Language::Kotlin,
        Language::C,
        Language::Cpp,
        Language::CSharp,
        Language::Ruby,
        Language::Swift,
        Language::Php,
        Language::Scala,
        Language::Shell,
        Language::Sql,
        Language::Html,
        Language::Css,
        Language::Markdown,
    ]
    .into_iter()
    .filter(|l| l.is_embeddable())
    .map(Language::as_str)
    .collect()
}

/// Fill missing chunk embeddings in bounded batches.
///
/// Without an embedder this is a zero-work success. A failing batch is logged
/// and ends the pass; embeddings written so far are kept, so the next call
/// resumes where this one stopped.
pub async fn ensure_embedded(
    store: &Store,
    capabilities: &Capabilities,
    repo_id: &str,
    batch_size: usize,
    max_batches: usize,
) -> Result<BackfillReport> {
    let mut report = BackfillReport::default();
    let Some(embedder) = capabilities.embedder.as_ref() else {
        return Ok(report);
    };

    let languages = embeddable_languages();
    let mut attempted: HashSet<i64> = HashSet::new();

    loop {
        if report.batches >= max_batches {
            let remaining = store.chunks_pending_embedding(repo_id, &languages, &attempted, 1)?;
            report.exhausted_budget = !remaining.is_empty();
            break;
        }
        let batch = store.chunks_pending_embedding(repo_id, &languages, &attempted, batch_size)?;
        if batch.is_empty() {
            break;
        }
        attempted.extend(batch.iter().map(|c| c.id));

        let texts: Vec<String> = batch
            .iter()
            .map(|c| format!("{}\n{}", c.path, c.content))
            .collect();
        report.batches += 1;

        let vectors = match embedder.embed_texts(&texts, false).await {
            Ok(vectors) => vectors,
            Err(e) => {
                log::warn!("Embedding batch failed for {repo_id}: {e}; stopping backfill");
                report.aborted = true;
                break;
            }
        };
        if let Err(e) = validate_batch(embedder.as_ref(), &texts, &vectors) {
            log::warn!("Embedder returned an invalid batch for {repo_id}: {e}; stopping backfill");
            report.aborted = true;
            break;
        }

        let rows: Vec<(i64, Vec<f32>)> = batch.iter().map(|c| c.id).zip(vectors).collect();
        report.embedded_count += store.set_chunk_embeddings(&rows)?;
    }

    log::info!(
        "Embedding backfill for {repo_id}: {} chunks in {} batches{}",
        report.embedded_count,
        report.batches,
        if report.aborted { " (aborted)" } else { "" }
    );
    Ok(report)
}

/// Regenerate file purposes whose source content changed.
///
/// Returns the number of purposes written. Failures are logged per file.
pub async fn refresh_purposes(
    store: &Store,
    capabilities: &Capabilities,
    repo_id: &str,
    root: &Path,
    limit: usize,
) -> Result<usize> {
    let Some(generator) = capabilities.purpose.as_ref() else {
        return Ok(0);
    };

    let stale: Vec<_> = store
        .list_file_metadata(repo_id)?
        .into_iter()
        .filter(|m| m.purpose_hash.as_deref() != Some(m.content_hash.as_str()))
        .filter(|m| Language::from_name(&m.language).is_code())
        .take(limit)
        .collect();

    let mut written = 0;
    for record in stale {
        let content = match tokio::fs::read_to_string(root.join(&record.path)).await {
            Ok(content) => content,
            Err(e) => {
                log::debug!("Skipping purpose for {}: {e}", record.path);
                continue;
            }
        };
        match generator.describe(&record.path, &content).await {
            Ok(purpose) => {
                store.set_file_purpose(repo_id, &record.path, purpose.trim(), &record.content_hash)?;
                written += 1;
            }
            Err(e) => log::warn!("Purpose generation failed for {}: {e}", record.path),
        }
    }
    Ok(written)
}

/// Hex sha256 of a whole file, the key purposes are generated against
pub fn file_content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_code_chunker::{Chunker, ChunkerConfig};
    use scout_vector_store::{Embedder, StubEmbedder, VectorStoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingAfter {
        inner: StubEmbedder,
        ok_batches: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FailingAfter {
        fn model_id(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        async fn embed_texts(
            &self,
            texts: &[String],
            is_query: bool,
        ) -> scout_vector_store::Result<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_batches {
                return Err(VectorStoreError::EmbeddingError("provider down".into()));
            }
            self.inner.embed_texts(texts, is_query).await
        }
    }

    fn seeded_store(files: usize) -> (tempfile::TempDir, Store, String) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let repo = store.register_repo(dir.path(), None).unwrap();
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        for i in 0..files {
            let content = format!("export function handler{i}() {{ return {i}; }}\n");
            store
                .apply_file_chunks(&repo.id, &format!("src/h{i}.ts"), "typescript", &chunker.chunk(&content))
                .unwrap();
        }
        store
            .apply_file_chunks(&repo.id, "logo.txt", "text", &chunker.chunk("plain words\n"))
            .unwrap();
        (dir, store, repo.id)
    }

    #[tokio::test]
    async fn without_embedder_is_a_no_op() {
        let (_dir, store, repo) = seeded_store(3);
        let report = ensure_embedded(&store, &Capabilities::none(), &repo, 2, 10)
            .await
            .unwrap();
        assert_eq!(report, BackfillReport::default());
        assert_eq!(store.embedded_chunk_count(&repo).unwrap(), 0);
    }

    #[tokio::test]
    async fn embeds_in_batches_and_skips_non_embeddable() {
        let (_dir, store, repo) = seeded_store(5);
        let embedder = Arc::new(StubEmbedder::new(8));
        let caps = Capabilities::none().with_embedder(embedder.clone());

        let report = ensure_embedded(&store, &caps, &repo, 2, 10).await.unwrap();
        assert_eq!(report.embedded_count, 5);
        assert_eq!(report.batches, 3);
        assert!(!report.aborted);
        assert_eq!(embedder.batch_calls(), 3);

        let again = ensure_embedded(&store, &caps, &repo, 2, 10).await.unwrap();
        assert_eq!(again.embedded_count, 0);
    }

    #[tokio::test]
    async fn batch_ceiling_leaves_work_for_next_call() {
        let (_dir, store, repo) = seeded_store(5);
        let caps = Capabilities::none().with_embedder(Arc::new(StubEmbedder::new(8)));

        let first = ensure_embedded(&store, &caps, &repo, 2, 1).await.unwrap();
        assert_eq!(first.embedded_count, 2);
        assert!(first.exhausted_budget);

        let rest = ensure_embedded(&store, &caps, &repo, 2, 10).await.unwrap();
        assert_eq!(rest.embedded_count, 3);
    }

    #[tokio::test]
    async fn failure_keeps_progress_and_aborts() {
        let (_dir, store, repo) = seeded_store(5);
        let caps = Capabilities::none().with_embedder(Arc::new(FailingAfter {
            inner: StubEmbedder::new(8),
            ok_batches: 1,
            calls: AtomicUsize::new(0),
        }));

        let report = ensure_embedded(&store, &caps, &repo, 2, 10).await.unwrap();
        assert!(report.aborted);
        assert_eq!(report.embedded_count, 2);
        assert_eq!(store.embedded_chunk_count(&repo).unwrap(), 2);
    }
}
