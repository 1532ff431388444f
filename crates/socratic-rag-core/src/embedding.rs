//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that embedding backends implement, plus
//! the pure similarity helper used by the in-memory index.
//!
//! The concrete OpenAI implementation lives in the `socratic-rag` app crate.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-large"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `3072`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
    fn dims(&self) -> usize {
        (**self).dims()
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_texts(texts).await
    }
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed_query(text).await
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors,
/// zero vectors, or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
