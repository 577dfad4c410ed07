use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Text embedding capability.
///
/// Implementations return exactly one vector of [`Embedder::dimension`]
/// floats per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model, recorded alongside cached results
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed a batch. `is_query` lets asymmetric models use their query prompt.
    async fn embed_texts(&self, texts: &[String], is_query: bool) -> Result<Vec<Vec<f32>>>;
}

/// Check an embedder response against the request
pub fn validate_batch(embedder: &dyn Embedder, texts: &[String], vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != texts.len() {
        return Err(VectorStoreError::BatchMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }
    let expected = embedder.dimension();
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(VectorStoreError::InvalidDimension {
            expected,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Deterministic, model-free embedder.
///
/// Each lowercase alphanumeric token maps to a fixed pseudo-random unit vector;
/// a text is the normalized sum of its token vectors, so texts sharing words
/// land close together.
pub struct StubEmbedder {
    dimension: usize,
    batch_calls: AtomicUsize,
}

impl StubEmbedder {
    pub const MODEL_ID: &'static str = "stub";

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_texts` calls served so far
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut sum = vec![0.0_f32; self.dimension];
        let mut any = false;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            any = true;
            let v = stub_embed(&token.to_lowercase(), self.dimension);
            for (acc, x) in sum.iter_mut().zip(v) {
                *acc += x;
            }
        }
        if !any {
            return stub_embed(text, self.dimension);
        }
        normalize(&mut sum);
        sum
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_id(&self) -> &str {
        Self::MODEL_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_texts(&self, texts: &[String], _is_query: bool) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[tokio::test]
    async fn stub_is_deterministic_and_normalized() {
        let embedder = StubEmbedder::new(16);
        let texts = vec!["validate session token".to_string()];
        let a = embedder.embed_texts(&texts, false).await.unwrap();
        let b = embedder.embed_texts(&texts, true).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 16);
        let norm: f32 = a[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert_eq!(embedder.batch_calls(), 2);
    }

    #[tokio::test]
    async fn shared_tokens_increase_similarity() {
        let embedder = StubEmbedder::new(256);
        let texts = vec![
            "login session".to_string(),
            "function login(user) { createSession }".to_string(),
            "format date utc".to_string(),
        ];
        let v = embedder.embed_texts(&texts, false).await.unwrap();
        assert!(cosine_similarity(&v[0], &v[1]) > cosine_similarity(&v[0], &v[2]));
    }

    #[tokio::test]
    async fn validate_batch_catches_dimension_mismatch() {
        let embedder = StubEmbedder::new(4);
        let texts = vec!["a".to_string()];
        assert!(validate_batch(&embedder, &texts, &[vec![0.0; 4]]).is_ok());
        assert!(matches!(
            validate_batch(&embedder, &texts, &[vec![0.0; 3]]),
            Err(VectorStoreError::InvalidDimension { expected: 4, actual: 3 })
        ));
        assert!(matches!(
            validate_batch(&embedder, &texts, &[]),
            Err(VectorStoreError::BatchMismatch { .. })
        ));
    }
}
