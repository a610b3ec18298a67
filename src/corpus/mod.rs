//! Corpus lifecycle and retrieval
//!
//! The `CorpusManager` owns building and persisting the corpus; a loaded
//! `Corpus` answers queries. Chunks, their vectors, and their source
//! records share ordinals end to end: the i-th vector in the index always
//! belongs to the i-th chunk and the i-th source record.

mod store;

pub use store::{
    BundleChecksums, CorpusManifest, CorpusStore, SourceRecord, MANIFEST_SCHEMA_VERSION,
};

use crate::chunker::{Chunk, Chunker, KeywordFilter};
use crate::document::Document;
use crate::embedding::{
    EmbeddingBatcher, EmbeddingError, EmbeddingProvider, FlatIndex, IndexError,
};
use ahash::{HashMap, HashMapExt};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CorpusError {
    /// No committed bundle at the expected location
    #[error("No corpus found at {path}")]
    NotFound { path: PathBuf },

    /// Bundle present but unusable; a rebuild is the only recovery
    #[error("Corpus is corrupt: {reason}")]
    Corrupt { reason: String },

    /// Query rejected before touching the provider or index
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding provider error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },
}

/// One retrieval hit with provenance, ranked by distance
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    /// Chunk text
    pub text: String,
    /// Site the chunk's document was scraped from
    pub source_url: String,
    /// Archive snapshot, when the scraper recorded one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    /// Squared Euclidean distance to the query; lower is closer
    pub distance: f32,
    /// Position of the chunk in the corpus
    pub ordinal: usize,
}

/// Summary of one corpus build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Documents handed to the build
    pub documents_in: usize,
    /// Documents that contributed at least one chunk
    pub documents_indexed: usize,
    /// Documents rejected by the keyword filter
    pub documents_filtered: usize,
    /// Documents with no chunkable content
    pub documents_empty: usize,
    /// Chunks embedded and indexed
    pub chunks: usize,
    /// Chunks that fell back to the zero-vector sentinel
    pub degraded_embeddings: usize,
    /// Embedding dimension of the built corpus (0 when empty)
    pub dimension: usize,
}

/// Builds, persists, and reloads the corpus.
///
/// Construct one explicitly and pass it where needed; there is no ambient
/// global state. A rebuild replaces the previous bundle wholesale.
pub struct CorpusManager {
    store: CorpusStore,
    chunker: Chunker,
    keyword_filter: Option<KeywordFilter>,
    batch_size: usize,
    max_retries: usize,
}

impl CorpusManager {
    pub fn new(store: CorpusStore, chunker: Chunker) -> Self {
        Self {
            store,
            chunker,
            keyword_filter: None,
            batch_size: 32,
            max_retries: 1,
        }
    }

    /// Gate documents through a keyword relevance filter before chunking.
    pub fn with_keyword_filter(mut self, filter: KeywordFilter) -> Self {
        self.keyword_filter = Some(filter);
        self
    }

    pub fn with_batching(mut self, batch_size: usize, max_retries: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    /// Build a fresh corpus from `documents` and persist it.
    pub fn build(
        &self,
        provider: &dyn EmbeddingProvider,
        documents: &[Document],
    ) -> Result<BuildReport, CorpusError> {
        let mut chunk_texts: Vec<String> = Vec::new();
        let mut sources: Vec<SourceRecord> = Vec::new();
        let mut documents_indexed = 0usize;
        let mut documents_filtered = 0usize;
        let mut documents_empty = 0usize;

        for document in documents {
            let Some(text) = document.text() else {
                documents_empty += 1;
                debug!("Skipping {}: no usable content", document.origin_url);
                continue;
            };
            if let Some(filter) = &self.keyword_filter {
                if !filter.admits(text) {
                    documents_filtered += 1;
                    debug!(
                        "Filtered out {}: fewer than {} mentions of {:?}",
                        document.origin_url,
                        filter.min_count(),
                        filter.keyword()
                    );
                    continue;
                }
            }

            let document_chunks = self.chunk_document(document, text);
            if document_chunks.is_empty() {
                documents_empty += 1;
                continue;
            }

            documents_indexed += 1;
            for chunk in document_chunks {
                chunk_texts.push(chunk.text);
                sources.push(SourceRecord {
                    source_url: chunk.source_url,
                    archive_url: chunk.archive_url,
                });
            }
        }

        info!(
            "Chunked {} of {} documents into {} chunks",
            documents_indexed,
            documents.len(),
            chunk_texts.len()
        );

        let batcher = EmbeddingBatcher::new(provider, self.batch_size, self.max_retries);
        let outcome = batcher.embed_all(&chunk_texts)?;
        let degraded_embeddings = outcome.degraded_count();
        let index = FlatIndex::build(outcome.vectors)?;

        self.store.write(
            &index,
            &chunk_texts,
            &sources,
            provider.model_name(),
            documents_indexed,
        )?;

        Ok(BuildReport {
            documents_in: documents.len(),
            documents_indexed,
            documents_filtered,
            documents_empty,
            chunks: chunk_texts.len(),
            degraded_embeddings,
            dimension: index.dimension().unwrap_or(0),
        })
    }

    fn chunk_document(&self, document: &Document, text: &str) -> Vec<Chunk> {
        self.chunker
            .chunk(text)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                text,
                source_url: document.origin_url.clone(),
                archive_url: document.archive_url.clone(),
                sequence_index,
            })
            .collect()
    }

    /// Reload the persisted corpus.
    pub fn load(&self) -> Result<Corpus, CorpusError> {
        let (manifest, index, chunks, sources) = self.store.read()?;
        info!(
            "Loaded corpus: {} chunks, model {}, built {}",
            chunks.len(),
            manifest.model,
            manifest.built_at
        );
        Ok(Corpus {
            manifest,
            index,
            chunks,
            sources,
        })
    }
}

/// A loaded, immutable corpus.
///
/// Queries take `&self`, so one loaded corpus can serve any number of
/// them. Mutation never happens in place; a new build replaces the bundle
/// on disk and is picked up by the next load.
pub struct Corpus {
    manifest: CorpusManifest,
    index: FlatIndex,
    chunks: Vec<String>,
    sources: Vec<SourceRecord>,
}

impl Corpus {
    pub fn manifest(&self) -> &CorpusManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Top-`k` chunks nearest to `text`, closest first.
    ///
    /// Blank query text and `k == 0` are rejected. An empty corpus yields
    /// an empty result without touching the provider; a corpus with fewer
    /// than `k` chunks yields them all.
    pub fn query(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, CorpusError> {
        if text.trim().is_empty() {
            return Err(CorpusError::InvalidQuery("query text is empty".to_string()));
        }
        if k == 0 {
            return Err(CorpusError::InvalidQuery(
                "result limit must be at least 1".to_string(),
            ));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = provider.embed(text)?;
        self.query_vector(&query_vector, k)
    }

    /// Search with an already-embedded query vector.
    pub fn query_vector(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, CorpusError> {
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .map(|hit| {
                let source = &self.sources[hit.ordinal];
                ScoredChunk {
                    text: self.chunks[hit.ordinal].clone(),
                    source_url: source.source_url.clone(),
                    archive_url: source.archive_url.clone(),
                    distance: hit.distance,
                    ordinal: hit.ordinal,
                }
            })
            .collect())
    }

    /// Chunk counts per source site, for coverage reporting.
    pub fn source_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for source in &self.sources {
            *counts.entry(source.source_url.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Join retrieved chunk texts into the context block handed to downstream
/// consumers, truncated to `max_chars` on a character boundary.
pub fn context_block(results: &[ScoredChunk], max_chars: usize) -> String {
    let joined = results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.chars().count() <= max_chars {
        return joined;
    }
    joined.chars().take(max_chars).collect()
}
