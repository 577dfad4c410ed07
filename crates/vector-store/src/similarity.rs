use crate::types::VectorHit;
use scout_store::StoredChunk;
use std::collections::HashSet;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Brute-force scan: score every embedded chunk against the query vector
/// and keep the `limit` best, highest first.
pub fn rank_chunks(query: &[f32], chunks: &[StoredChunk], limit: usize) -> Vec<VectorHit> {
    let mut hits: Vec<VectorHit> = chunks
        .iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding.as_deref()?;
            Some(VectorHit {
                chunk_id: chunk.id,
                path: chunk.path.clone(),
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                language: chunk.language.clone(),
                score: cosine_similarity(query, embedding),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
    hits.truncate(limit);
    hits
}

/// Collapse chunk hits to one (the best) per file, preserving rank order
pub fn best_per_file(hits: Vec<VectorHit>) -> Vec<VectorHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(id: i64, path: &str, embedding: Option<Vec<f32>>) -> StoredChunk {
        StoredChunk {
            id,
            path: path.to_string(),
            chunk_index: 0,
            content_hash: String::new(),
            start_line: 1,
            end_line: 10,
            content: String::new(),
            language: "rust".to_string(),
            embedding,
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn rank_skips_unembedded_and_orders_by_score() {
        let chunks = vec![
            chunk(1, "a.rs", Some(vec![0.0, 1.0])),
            chunk(2, "b.rs", Some(vec![1.0, 0.0])),
            chunk(3, "c.rs", None),
            chunk(4, "d.rs", Some(vec![0.7, 0.7])),
        ];
        let hits = rank_chunks(&[1.0, 0.0], &chunks, 2);
        let ids: Vec<i64> = hits.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn best_per_file_keeps_first_hit() {
        let chunks = vec![
            chunk(1, "a.rs", Some(vec![1.0, 0.0])),
            chunk(2, "a.rs", Some(vec![0.9, 0.1])),
            chunk(3, "b.rs", Some(vec![0.5, 0.5])),
        ];
        let hits = best_per_file(rank_chunks(&[1.0, 0.0], &chunks, 10));
        let ids: Vec<i64> = hits.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
