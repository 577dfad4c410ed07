use crate::config::VocabConfig;
use crate::error::Result;
use scout_code_chunker::split_identifier;
use scout_store::{FileMetadataRecord, VocabCluster};
use scout_vector_store::{cosine_similarity, validate_batch, Embedder};
use std::collections::{BTreeMap, BTreeSet};

const MIN_TERM_LEN: usize = 3;

const TERM_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "this", "that", "get", "set", "new", "src",
    "lib", "app", "index", "main", "mod", "test", "tests", "spec", "util", "utils", "helper",
    "helpers", "common", "default", "type", "types", "impl", "internal", "init", "config",
];

/// Identifier terms and the files they occur in, most widespread first
pub fn collect_terms(files: &[FileMetadataRecord], max_terms: usize) -> Vec<(String, Vec<String>)> {
    let mut occurrences: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for file in files {
        let mut terms = BTreeSet::new();
        for export in &file.exports {
            terms.extend(split_identifier(export));
        }
        for segment in file.path.split('/') {
            let segment = segment.split('.').next().unwrap_or(segment);
            terms.extend(split_identifier(segment));
        }
        for term in terms {
            if is_vocab_term(&term) {
                occurrences.entry(term).or_default().insert(file.path.clone());
            }
        }
    }

    let mut ranked: Vec<(String, Vec<String>)> = occurrences
        .into_iter()
        .map(|(term, files)| (term, files.into_iter().collect()))
        .collect();
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(max_terms);
    ranked
}

fn is_vocab_term(term: &str) -> bool {
    term.chars().count() >= MIN_TERM_LEN
        && term.chars().all(|c| c.is_ascii_alphabetic())
        && !TERM_STOPWORDS.contains(&term)
}

/// Group semantically close identifier terms.
///
/// Terms are embedded and merged agglomeratively with average linkage: the
/// two clusters with the highest mean pairwise cosine similarity merge while
/// that mean stays at or above the threshold and the result fits
/// `max_cluster_terms`. Clusters need at least two terms.
pub async fn build_vocab_clusters(
    embedder: &dyn Embedder,
    files: &[FileMetadataRecord],
    config: &VocabConfig,
    batch_size: usize,
) -> Result<Vec<VocabCluster>> {
    let terms = collect_terms(files, config.max_terms);
    if terms.len() < 2 {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = terms.iter().map(|(t, _)| t.clone()).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed_texts(batch, false).await?;
        validate_batch(embedder, batch, &embedded)?;
        vectors.extend(embedded);
    }

    let similarity: Vec<Vec<f32>> = vectors
        .iter()
        .map(|a| vectors.iter().map(|b| cosine_similarity(a, b)).collect())
        .collect();
    let groups = average_link_clusters(
        &similarity,
        config.similarity_threshold,
        config.max_cluster_terms,
    );

    let clusters: Vec<VocabCluster> = groups
        .into_iter()
        .map(|members| {
            let mut member_files = BTreeSet::new();
            for &m in &members {
                member_files.extend(terms[m].1.iter().cloned());
            }
            VocabCluster {
                terms: members.iter().map(|&m| terms[m].0.clone()).collect(),
                files: member_files
                    .into_iter()
                    .take(config.max_cluster_files)
                    .collect(),
            }
        })
        .collect();

    log::debug!(
        "Built {} vocab clusters from {} terms",
        clusters.len(),
        terms.len()
    );
    Ok(clusters)
}

/// Average-linkage agglomerative clustering over a symmetric similarity
/// matrix. Returns groups of two or more indices, each sorted, ordered by
/// their first index.
pub(crate) fn average_link_clusters(
    similarity: &[Vec<f32>],
    threshold: f32,
    max_size: usize,
) -> Vec<Vec<usize>> {
    let n = similarity.len();
    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    // Sum of pairwise similarities between live clusters
    let mut link: Vec<Vec<f64>> = similarity
        .iter()
        .map(|row| row.iter().map(|&v| f64::from(v)).collect())
        .collect();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            let Some(a) = &members[i] else { continue };
            for j in (i + 1)..n {
                let Some(b) = &members[j] else { continue };
                if a.len() + b.len() > max_size {
                    continue;
                }
                let mean = link[i][j] / (a.len() * b.len()) as f64;
                if mean >= f64::from(threshold) && best.map_or(true, |(_, _, m)| mean > m) {
                    best = Some((i, j, mean));
                }
            }
        }
        let Some((keep, absorb, _)) = best else { break };

        for k in 0..n {
            let merged = link[keep][k] + link[absorb][k];
            link[keep][k] = merged;
            link[k][keep] = merged;
        }
        let absorbed = members[absorb].take().unwrap_or_default();
        if let Some(kept) = members[keep].as_mut() {
            kept.extend(absorbed);
            kept.sort_unstable();
        }
    }

    members
        .into_iter()
        .flatten()
        .filter(|group| group.len() >= 2)
        .collect()
}
