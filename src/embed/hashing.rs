//! Deterministic feature-hashing embedder
//!
//! Tokens and token bigrams are hashed with blake3 into a fixed number of
//! signed buckets and the result is L2-normalised. No model download or
//! network access is needed, which makes this the default backend and the
//! one used throughout the tests.

use super::{normalize_embedding, Embedder};
use crate::error::Result;
use async_trait::async_trait;

pub struct HashEmbedder {
    model_name: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(model_name: &str, dimension: usize) -> Self {
        Self {
            model_name: model_name.to_string(),
            dimension: dimension.max(1),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&bytes[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }

    /// Embed one text synchronously
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = Self::tokens(text);

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        normalize_embedding(&vector)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::cosine_similarity;

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = HashEmbedder::new("test", 64);
        let a = embedder.embed(vec!["servo on pin 9".to_string()]).await.unwrap();
        let b = embedder.embed(vec!["servo on pin 9".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 64);
    }

    #[test]
    fn test_normalised() {
        let embedder = HashEmbedder::new("test", 128);
        let v = embedder.embed_one("The quick brown fox");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_related_text_scores_higher() {
        let embedder = HashEmbedder::new("test", 384);
        let query = embedder.embed_one("how do I wire a servo motor");
        let related = embedder.embed_one("Wire the servo motor signal lead to pin 9");
        let unrelated = embedder.embed_one("Bake the bread at 220 degrees for forty minutes");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = HashEmbedder::new("test", 32);
        assert_eq!(embedder.embed_one("LED Blink"), embedder.embed_one("led blink"));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new("test", 16);
        assert!(embedder.embed_one("  ...  ").iter().all(|v| *v == 0.0));
    }
}
