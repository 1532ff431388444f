//! In-memory vector index.
//!
//! Built once, then shared read-only behind an `Arc`; searches take `&self`
//! and need no locking. Search is brute-force cosine similarity over all
//! stored vectors, with an optional maximal-marginal-relevance rerank.

use std::collections::HashSet;

use anyhow::{bail, Result};

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, RetrievedChunk};

#[derive(Debug)]
struct StoredVector {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// A search hit with its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: RetrievedChunk,
    pub score: f32,
}

/// In-memory index of embedded chunks.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<StoredVector>,
    hashes: HashSet<String>,
    dims: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add chunks with their vectors. Returns the number actually inserted.
    ///
    /// Chunks whose content hash is already indexed are skipped.
    ///
    /// # Errors
    ///
    /// Fails if the slices differ in length or a vector's dimensionality
    /// differs from the vectors already stored.
    pub fn insert(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<usize> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut inserted = 0;
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            match self.dims {
                Some(d) if d != vector.len() => {
                    bail!("vector has {} dims, index expects {}", vector.len(), d)
                }
                None => self.dims = Some(vector.len()),
                _ => {}
            }
            if !self.hashes.insert(chunk.hash.clone()) {
                continue;
            }
            self.entries.push(StoredVector { chunk, vector });
            inserted += 1;
        }
        Ok(inserted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Top-`k` chunks by cosine similarity, best first.
    pub fn similarity_search(&self, query_vec: &[f32], k: usize) -> Vec<ScoredChunk> {
        self.ranked(query_vec, k)
            .into_iter()
            .map(|(i, score)| self.hit(i, score))
            .collect()
    }

    /// Maximal marginal relevance search.
    ///
    /// Takes the `fetch_k` most similar chunks, then greedily picks `k` of
    /// them, trading relevance against redundancy:
    /// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, selected))`.
    /// `lambda = 1.0` reduces to plain similarity order.
    pub fn mmr_search(
        &self,
        query_vec: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Vec<ScoredChunk> {
        let mut pool = self.ranked(query_vec, fetch_k.max(k));
        let mut selected: Vec<(usize, f32)> = Vec::with_capacity(k.min(pool.len()));

        while selected.len() < k && !pool.is_empty() {
            let mut best_pos = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (pos, &(i, relevance)) in pool.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|&(j, _)| {
                        cosine_similarity(&self.entries[i].vector, &self.entries[j].vector)
                    })
                    .reduce(f32::max)
                    .unwrap_or(0.0);
                let score = lambda * relevance - (1.0 - lambda) * redundancy;
                if score > best_score {
                    best_score = score;
                    best_pos = pos;
                }
            }
            selected.push(pool.remove(best_pos));
        }

        selected
            .into_iter()
            .map(|(i, score)| self.hit(i, score))
            .collect()
    }

    /// Indices of the top-`limit` entries with their similarity, best first.
    fn ranked(&self, query_vec: &[f32], limit: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, sv)| (i, cosine_similarity(query_vec, &sv.vector)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(limit);
        scored
    }

    fn hit(&self, i: usize, score: f32) -> ScoredChunk {
        let chunk = &self.entries[i].chunk;
        ScoredChunk {
            chunk: RetrievedChunk::new(chunk.text.clone()).with_source(chunk.source.clone()),
            score,
        }
    }
}
