//! Retrieval abstraction for Socratic RAG.
//!
//! The orchestrator depends only on [`Retriever`]: "give me up to `k`
//! passages for this query". [`EmbeddingRetriever`] is the stock
//! implementation, pairing an [`Embedder`] with a read-only
//! [`VectorIndex`].

pub mod memory;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use crate::embedding::Embedder;
use crate::models::RetrievedChunk;
pub use memory::{ScoredChunk, VectorIndex};

/// The retrieval capability the orchestrator consumes.
///
/// Implementations must return fewer than `k` passages, not an error,
/// when the store holds fewer than `k`.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` passages relevant to `query`, best first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

#[async_trait]
impl<T: Retriever + ?Sized> Retriever for Arc<T> {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        (**self).retrieve(query, k).await
    }
}

/// How candidates are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Plain cosine similarity.
    Similarity,
    /// Maximal marginal relevance over the `fetch_k` nearest candidates.
    Mmr,
}

impl FromStr for SearchStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "similarity" => Ok(SearchStrategy::Similarity),
            "mmr" => Ok(SearchStrategy::Mmr),
            other => bail!("Unknown search strategy: '{}'. Use similarity or mmr.", other),
        }
    }
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub strategy: SearchStrategy,
    /// Candidate pool size for MMR.
    pub fetch_k: usize,
    /// MMR trade-off: `1.0` is pure relevance, `0.0` is pure diversity.
    pub lambda_mult: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::Mmr,
            fetch_k: 40,
            lambda_mult: 0.5,
        }
    }
}

/// A [`Retriever`] that embeds the query and searches a [`VectorIndex`].
pub struct EmbeddingRetriever<E> {
    index: Arc<VectorIndex>,
    embedder: E,
    params: SearchParams,
}

impl<E: Embedder> EmbeddingRetriever<E> {
    pub fn new(index: Arc<VectorIndex>, embedder: E, params: SearchParams) -> Self {
        Self {
            index,
            embedder,
            params,
        }
    }
}

#[async_trait]
impl<E: Embedder> Retriever for EmbeddingRetriever<E> {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let hits = match self.params.strategy {
            SearchStrategy::Similarity => self.index.similarity_search(&query_vec, k),
            SearchStrategy::Mmr => self.index.mmr_search(
                &query_vec,
                k,
                self.params.fetch_k,
                self.params.lambda_mult,
            ),
        };

        tracing::debug!(
            query,
            requested = k,
            returned = hits.len(),
            top_score = ?hits.first().map(|h| h.score),
            "retrieved passages"
        );

        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::make_chunk;

    /// Maps text onto two axes by counting "rust" and "python".
    struct KeywordAxes;

    #[async_trait]
    impl Embedder for KeywordAxes {
        fn model_name(&self) -> &str {
            "axes"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("rust").count() as f32,
                        t.matches("python").count() as f32,
                    ]
                })
                .collect())
        }
    }

    async fn retriever(strategy: SearchStrategy) -> EmbeddingRetriever<KeywordAxes> {
        let texts = ["rust ownership", "python typing", "rust and python ffi"];
        let chunks: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| make_chunk("notes.md", i as i64, t))
            .collect();
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vectors = KeywordAxes.embed_texts(&owned).await.unwrap();
        let mut index = VectorIndex::new();
        index.insert(chunks, vectors).unwrap();
        let params = SearchParams {
            strategy,
            ..SearchParams::default()
        };
        EmbeddingRetriever::new(Arc::new(index), KeywordAxes, params)
    }

    #[tokio::test]
    async fn test_similarity_retrieve() {
        let r = retriever(SearchStrategy::Similarity).await;
        let hits = r.retrieve("rust", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "rust ownership");
    }

    #[tokio::test]
    async fn test_small_store_returns_fewer() {
        let r = retriever(SearchStrategy::Mmr).await;
        let hits = r.retrieve("python", 10).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let r = EmbeddingRetriever::new(
            Arc::new(VectorIndex::new()),
            KeywordAxes,
            SearchParams::default(),
        );
        assert!(r.retrieve("rust", 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "mmr".parse::<SearchStrategy>().unwrap(),
            SearchStrategy::Mmr
        );
        assert!("hybrid".parse::<SearchStrategy>().is_err());
    }
}
