use crate::query_classifier::QueryKind;
use std::collections::HashMap;

/// Weighted Reciprocal Rank Fusion of two chunk rankings
#[derive(Debug, Clone, Copy)]
pub struct RrfFusion {
    /// RRF constant k
    k: f32,
}

/// Relative trust in each ranking for one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub semantic: f32,
    pub grep: f32,
}

impl FusionWeights {
    /// Symbols favour literal matches, prose favours embeddings
    pub fn for_kind(kind: QueryKind) -> Self {
        match kind {
            QueryKind::Symbol => Self { semantic: 0.3, grep: 0.7 },
            QueryKind::StackTrace | QueryKind::ErrorMessage => Self { semantic: 0.5, grep: 0.5 },
            QueryKind::Natural => Self { semantic: 0.7, grep: 0.3 },
        }
    }
}

impl RrfFusion {
    pub const DEFAULT_K: f32 = 60.0;

    pub fn new(k: f32) -> Self {
        Self { k }
    }

    /// Fuse two rankings of chunk ids, each ordered best first.
    ///
    /// score(d) = Σ weight_i / (k + rank_i(d)), ranks starting at 1.
    /// Returns (chunk_id, fused_score) sorted by score descending, ties by
    /// first appearance.
    pub fn fuse(&self, semantic: &[i64], grep: &[i64], weights: FusionWeights) -> Vec<(i64, f32)> {
        let mut scores: HashMap<i64, (f32, usize)> = HashMap::new();
        let mut order = 0usize;
        for (ranking, weight) in [(semantic, weights.semantic), (grep, weights.grep)] {
            for (rank, id) in ranking.iter().enumerate() {
                let entry = scores.entry(*id).or_insert_with(|| {
                    order += 1;
                    (0.0, order)
                });
                entry.0 += weight / (self.k + rank as f32 + 1.0);
            }
        }

        let mut fused: Vec<(i64, f32, usize)> = scores
            .into_iter()
            .map(|(id, (score, first_seen))| (id, score, first_seen))
            .collect();
        fused.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.2.cmp(&b.2)));
        fused.into_iter().map(|(id, score, _)| (id, score)).collect()
    }
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn agreement_beats_a_single_ranking() {
        let fusion = RrfFusion::default();
        let weights = FusionWeights { semantic: 0.5, grep: 0.5 };
        let fused = fusion.fuse(&[1, 2, 3], &[2, 4], weights);
        assert_eq!(fused[0].0, 2);
        let ids: Vec<i64> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 1, 4, 3]);
    }

    #[test]
    fn weights_follow_query_kind() {
        let fusion = RrfFusion::default();
        let symbol = fusion.fuse(&[1], &[2], FusionWeights::for_kind(QueryKind::Symbol));
        assert_eq!(symbol[0].0, 2);
        let natural = fusion.fuse(&[1], &[2], FusionWeights::for_kind(QueryKind::Natural));
        assert_eq!(natural[0].0, 1);
        let expected = 0.7 / 61.0;
        assert!((natural[0].1 - expected).abs() < 1e-6);
    }

    #[test]
    fn empty_rankings_fuse_to_nothing() {
        assert!(RrfFusion::default()
            .fuse(&[], &[], FusionWeights::for_kind(QueryKind::Natural))
            .is_empty());
    }
}
