//! Index construction and the process-wide shared index.
//!
//! Building is a three-step pipeline: load documents → chunk → embed and
//! insert into a [`VectorIndex`]. [`SharedIndex`] runs it at most once
//! successfully per process. Concurrent first callers wait on the same
//! initialization instead of building twice. A failed build leaves the cell
//! empty, so the next caller tries again.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use socratic_rag_core::chunk::chunk_text;
use socratic_rag_core::models::{Chunk, RetrievedChunk};
use socratic_rag_core::store::{EmbeddingRetriever, SearchParams, VectorIndex};
use socratic_rag_core::{Embedder, Retriever};

use crate::config::{ChunkingConfig, Config, DataConfig};
use crate::loader::{load_documents, LoadedDocument};

/// The subset of [`Config`] that determines index contents.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub data: DataConfig,
    pub chunking: ChunkingConfig,
    pub batch_size: usize,
}

impl IndexSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data: config.data.clone(),
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size,
        }
    }
}

/// Counts reported after a build (or a dry run, where `indexed` is 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub indexed: usize,
}

pub fn chunk_documents(docs: &[LoadedDocument], chunking: &ChunkingConfig) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| {
            chunk_text(
                &doc.source,
                &doc.text,
                chunking.chunk_size,
                chunking.chunk_overlap,
            )
        })
        .collect()
}

/// Load and chunk without embedding. Blocking filesystem I/O.
pub fn prepare_chunks(settings: &IndexSettings) -> Result<(usize, Vec<Chunk>)> {
    let docs = load_documents(&settings.data)?;
    let chunks = chunk_documents(&docs, &settings.chunking);
    info!(documents = docs.len(), chunks = chunks.len(), "split documents into chunks");
    Ok((docs.len(), chunks))
}

/// Embed `chunks` in batches of `batch_size` and insert them into a fresh
/// index.
///
/// Chunks whose hash was already seen are dropped before embedding. Every
/// returned vector must have `embedder.dims()` components.
pub async fn embed_chunks<E>(chunks: Vec<Chunk>, embedder: &E, batch_size: usize) -> Result<VectorIndex>
where
    E: Embedder + ?Sized,
{
    let mut seen = HashSet::new();
    let unique: Vec<Chunk> = chunks
        .into_iter()
        .filter(|c| seen.insert(c.hash.clone()))
        .collect();
    let total = unique.len();
    let dims = embedder.dims();

    let mut index = VectorIndex::new();
    let mut done = 0usize;
    let mut remaining = unique.into_iter().peekable();

    while remaining.peek().is_some() {
        let batch: Vec<Chunk> = remaining.by_ref().take(batch_size.max(1)).collect();
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed_texts(&texts)
            .await
            .with_context(|| format!("Failed to embed chunks {}..{}", done, done + batch.len()))?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "Embedding model {} returned {} dims, expected {}",
                embedder.model_name(),
                bad.len(),
                dims
            );
        }
        done += batch.len();
        index.insert(batch, vectors)?;
        debug!(done, total, "embedded batch");
    }

    Ok(index)
}

/// Run the whole pipeline once.
pub async fn build_index<E>(settings: &IndexSettings, embedder: &E) -> Result<(VectorIndex, IndexStats)>
where
    E: Embedder + ?Sized,
{
    let owned = settings.clone();
    let (documents, chunks) = tokio::task::spawn_blocking(move || prepare_chunks(&owned))
        .await
        .context("Document loading task failed")??;
    let chunk_count = chunks.len();

    let index = embed_chunks(chunks, embedder, settings.batch_size).await?;
    let stats = IndexStats {
        documents,
        chunks: chunk_count,
        indexed: index.len(),
    };
    info!(
        documents = stats.documents,
        chunks = stats.chunks,
        indexed = stats.indexed,
        model = embedder.model_name(),
        "vector index ready"
    );
    Ok((index, stats))
}

/// A lazily-built index shared by every request in the process.
pub struct SharedIndex<E> {
    settings: IndexSettings,
    embedder: Arc<E>,
    cell: OnceCell<(Arc<VectorIndex>, IndexStats)>,
}

impl<E: Embedder> SharedIndex<E> {
    pub fn new(settings: IndexSettings, embedder: Arc<E>) -> Self {
        Self {
            settings,
            embedder,
            cell: OnceCell::new(),
        }
    }

    /// The index, building it on first use.
    pub async fn get(&self) -> Result<Arc<VectorIndex>> {
        Ok(Arc::clone(&self.init().await?.0))
    }

    /// Stats of the (possibly just built) index.
    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(self.init().await?.1)
    }

    pub fn is_built(&self) -> bool {
        self.cell.initialized()
    }

    pub fn embedder(&self) -> &Arc<E> {
        &self.embedder
    }

    async fn init(&self) -> Result<&(Arc<VectorIndex>, IndexStats)> {
        self.cell
            .get_or_try_init(|| async {
                let (index, stats) = build_index(&self.settings, self.embedder.as_ref()).await?;
                Ok::<_, anyhow::Error>((Arc::new(index), stats))
            })
            .await
    }
}

/// [`Retriever`] over a [`SharedIndex`]; the first retrieval triggers the build.
pub struct LazyRetriever<E> {
    shared: Arc<SharedIndex<E>>,
    params: SearchParams,
}

impl<E: Embedder> LazyRetriever<E> {
    pub fn new(shared: Arc<SharedIndex<E>>, params: SearchParams) -> Self {
        Self { shared, params }
    }
}

#[async_trait]
impl<E: Embedder> Retriever for LazyRetriever<E> {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let index = self.shared.get().await?;
        EmbeddingRetriever::new(index, Arc::clone(self.shared.embedder()), self.params.clone())
            .retrieve(query, k)
            .await
    }
}
