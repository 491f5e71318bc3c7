//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - A deterministic offline hashing backend
//! - An HTTP embedding backend
//! - Local fastembed models (feature `local-embed`)
//! - Batch processing for efficiency

mod hashing;
mod http_backend;

#[cfg(feature = "local-embed")]
mod fastembed_impl;

pub use hashing::*;
pub use http_backend::*;

#[cfg(feature = "local-embed")]
pub use fastembed_impl::*;

use crate::config::{EmbeddingBackendKind, EmbeddingConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;

pub fn normalize_embedding(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Trait for embedding providers
///
/// Implementations must be deterministic for a given model version: the same
/// text always maps to the same vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.backend_kind()? {
        EmbeddingBackendKind::Hash => Ok(Box::new(HashEmbedder::new(
            &config.model,
            config.resolved_dimension(),
        ))),
        EmbeddingBackendKind::Http => Ok(Box::new(HttpEmbedder::new(config)?)),
        #[cfg(feature = "local-embed")]
        EmbeddingBackendKind::FastEmbed => Ok(Box::new(FastEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embed"))]
        EmbeddingBackendKind::FastEmbed => Err(Error::Config(
            "The fastembed backend requires building with the 'local-embed' feature".to_string(),
        )),
    }
}

/// Embed texts in batches, checking that every vector has the embedder's dimension
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let expected = texts.len();
    let mut all_embeddings = Vec::with_capacity(expected);

    for chunk in texts.chunks(batch_size.max(1)) {
        let batch_texts: Vec<String> = chunk.to_vec();
        let embeddings = embedder.embed(batch_texts).await?;
        if embeddings.len() != chunk.len() {
            return Err(Error::Embedding(format!(
                "Backend returned {} embeddings for {} inputs",
                embeddings.len(),
                chunk.len()
            )));
        }
        all_embeddings.extend(embeddings);
    }

    if let Some(bad) = all_embeddings
        .iter()
        .find(|v| v.len() != embedder.dimension())
    {
        return Err(Error::EmbeddingDimension {
            model: embedder.model_name().to_string(),
            expected: embedder.dimension(),
            actual: bad.len(),
        });
    }

    Ok(all_embeddings)
}
