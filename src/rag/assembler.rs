//! Chunk, retrieve, rerank, pack.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use super::budget::{assemble_context_within_budget, context_tokens, get_optimal_context_window};
use super::chunker::document_chunks;
use super::error::{RagError, RagResult};
use super::format::format_context;
use super::types::{
    AssembledContext, BatchFailure, BatchReport, RagChunk, RagDocument, RetrievalOptions,
};
use crate::cache::TieredEmbeddingCache;
use crate::embedding::reranker::{DEFAULT_RERANK_TIMEOUT, validate_scores};
use crate::embedding::{EmbeddingGenerator, ModelLoader, Reranker, RerankerError};
use crate::storage::RecordStore;
use crate::vectordb::{SearchOptions, StoredVector, VectorMatch, VectorStore};

pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_MAX_CANDIDATES: usize = 50;
pub const DEFAULT_INDEX_CONCURRENCY: usize = 4;

/// Record metadata key holding a chunk's position in its document.
pub const POSITION_METADATA_KEY: &str = "position";

#[derive(Debug, Clone)]
/// Configuration for [`RagContextAssembler`].
pub struct RagConfig {
    /// Words per chunk.
    pub chunk_size: usize,
    /// Words shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Candidates sent to the reranker.
    pub max_candidates: usize,
    /// Reranked chunks scoring below this are dropped.
    pub rerank_threshold: Option<f32>,
    /// Upper bound on one reranker call.
    pub rerank_timeout: Duration,
    /// Documents indexed or removed concurrently in batch calls.
    pub index_concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            rerank_threshold: None,
            rerank_timeout: DEFAULT_RERANK_TIMEOUT,
            index_concurrency: DEFAULT_INDEX_CONCURRENCY,
        }
    }
}

impl RagConfig {
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn with_rerank_threshold(mut self, threshold: f32) -> Self {
        self.rerank_threshold = Some(threshold);
        self
    }

    pub fn with_rerank_timeout(mut self, timeout: Duration) -> Self {
        self.rerank_timeout = timeout;
        self
    }

    pub fn with_index_concurrency(mut self, concurrency: usize) -> Self {
        self.index_concurrency = concurrency;
        self
    }

    pub fn validate(&self) -> RagResult<()> {
        let fail = |reason: &str| {
            Err(RagError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.chunk_size == 0 {
            return fail("chunk_size must be > 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            return fail("chunk_overlap must be smaller than chunk_size");
        }
        if self.max_candidates == 0 {
            return fail("max_candidates must be > 0");
        }
        if self.rerank_timeout.is_zero() {
            return fail("rerank_timeout must be > 0");
        }
        if self.index_concurrency == 0 {
            return fail("index_concurrency must be > 0");
        }
        Ok(())
    }
}

/// Id of the vector record holding chunk `position` of `document_id`.
pub fn chunk_id(document_id: &str, position: usize) -> String {
    format!("{}#{}", document_id, position)
}

/// Indexes documents as embedded chunks and assembles cited, budget-bounded context.
///
/// Shares its generator, vector store and cache with other callers. Reranking is optional
/// and never fails a retrieval: on any reranker error the similarity order is kept.
pub struct RagContextAssembler<L: ModelLoader, S: RecordStore> {
    generator: Arc<EmbeddingGenerator<L>>,
    store: Arc<VectorStore<S>>,
    cache: Arc<TieredEmbeddingCache>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RagConfig,
}

impl<L: ModelLoader, S: RecordStore> std::fmt::Debug for RagContextAssembler<L, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagContextAssembler")
            .field("config", &self.config)
            .field("reranker", &self.reranker.is_some())
            .finish_non_exhaustive()
    }
}

impl<L: ModelLoader, S: RecordStore> RagContextAssembler<L, S> {
    pub fn new(
        generator: Arc<EmbeddingGenerator<L>>,
        store: Arc<VectorStore<S>>,
        cache: Arc<TieredEmbeddingCache>,
        config: RagConfig,
    ) -> RagResult<Self> {
        config.validate()?;
        Ok(Self {
            generator,
            store,
            cache,
            reranker: None,
            config,
        })
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn generator(&self) -> &EmbeddingGenerator<L> {
        &self.generator
    }

    pub fn store(&self) -> &VectorStore<S> {
        &self.store
    }

    pub fn cache(&self) -> &TieredEmbeddingCache {
        &self.cache
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Embeds and stores every chunk of `document`, replacing chunks from earlier indexing.
    ///
    /// Returns the number of chunks stored. Existing chunks are only replaced once every new
    /// chunk has been embedded, and are restored if storing the new chunks fails.
    #[instrument(skip(self, document), fields(document_id = %document.id))]
    pub async fn index_document(&self, document: &RagDocument) -> RagResult<usize> {
        if document.id.trim().is_empty() {
            return Err(RagError::InvalidDocument {
                reason: "document id is empty".to_string(),
            });
        }

        let chunks = document_chunks(document, self.config.chunk_size, self.config.chunk_overlap);
        if chunks.iter().all(|chunk| chunk.trim().is_empty()) {
            return Err(RagError::EmptyDocument {
                document_id: document.id.clone(),
            });
        }

        let batch = self
            .generator
            .embed_batch(&chunks, Some(&self.cache))
            .await?;

        let records: Vec<StoredVector> = chunks
            .iter()
            .zip(batch.embeddings)
            .enumerate()
            .map(|(position, (text, embedding))| {
                let id = chunk_id(&document.id, position);
                let mut record = StoredVector::new(
                    id.clone(),
                    document.id.as_str(),
                    id,
                    text.as_str(),
                    embedding.into_vector(),
                );
                record.metadata = document.metadata.clone();
                record
                    .metadata
                    .insert(POSITION_METADATA_KEY.to_string(), position.to_string());
                record
            })
            .collect();

        let (stored, stale) = self.store.replace_document(&document.id, records).await?;

        info!(
            chunks = stored,
            stale,
            computed = batch.computed,
            cached = batch.cached,
            "Document indexed"
        );
        Ok(stored)
    }

    /// Indexes `documents`, continuing past per-document failures.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn index_documents(&self, documents: &[RagDocument]) -> BatchReport {
        let outcomes: Vec<(usize, &str, RagResult<usize>)> =
            stream::iter(documents.iter().enumerate())
                .map(|(index, document)| async move {
                    (
                        index,
                        document.id.as_str(),
                        self.index_document(document).await,
                    )
                })
                .buffered(self.config.index_concurrency)
                .collect()
                .await;

        let report = batch_report(outcomes);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch indexing complete"
        );
        report
    }

    /// Deletes every chunk of `document_id`; a document with no chunks is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_document(&self, document_id: &str) -> RagResult<usize> {
        let removed = self.store.delete_by_document(document_id).await?;
        debug!(removed, "Document removed");
        Ok(removed)
    }

    /// Removes `document_ids`, continuing past per-document failures.
    #[instrument(skip(self, document_ids), fields(count = document_ids.len()))]
    pub async fn remove_documents(&self, document_ids: &[String]) -> BatchReport {
        let outcomes: Vec<(usize, &str, RagResult<usize>)> =
            stream::iter(document_ids.iter().enumerate())
                .map(|(index, document_id)| async move {
                    (
                        index,
                        document_id.as_str(),
                        self.remove_document(document_id).await,
                    )
                })
                .buffered(self.config.index_concurrency)
                .collect()
                .await;

        batch_report(outcomes)
    }

    /// Finds the chunks most relevant to `query`, reranked when a reranker is set.
    #[instrument(skip(self, query, options), fields(query_len = query.len(), top_k = options.top_k))]
    pub async fn retrieve(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> RagResult<Vec<RagChunk>> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }
        if options.top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.generator.embed_cached(query, &self.cache).await?;

        let rerank = options.rerank && self.reranker.is_some();
        let fetch = if rerank {
            options.top_k.max(self.config.max_candidates)
        } else {
            options.top_k
        };
        let search = SearchOptions::new(options.min_relevance, fetch)
            .with_documents(options.document_ids.iter().cloned());

        let candidates: Vec<RagChunk> = self
            .store
            .find_similar(embedding.vector(), &search)
            .await?
            .into_iter()
            .map(to_chunk)
            .collect();
        debug!(candidates = candidates.len(), "Similarity candidates");

        let mut chunks = if rerank {
            self.rerank_results(query, candidates).await
        } else {
            candidates
        };
        chunks.truncate(options.top_k);
        Ok(chunks)
    }

    /// Reorders `candidates` by reranker score.
    ///
    /// Only the first `max_candidates` are scored; the reranked list replaces the input and
    /// chunks below `rerank_threshold` are dropped. Without a reranker, or on any failure,
    /// timeout or malformed response, `candidates` comes back unchanged.
    #[instrument(skip(self, query, candidates), fields(candidates = candidates.len()))]
    pub async fn rerank_results(&self, query: &str, candidates: Vec<RagChunk>) -> Vec<RagChunk> {
        let Some(reranker) = self.reranker.as_deref() else {
            return candidates;
        };
        if candidates.is_empty() {
            return candidates;
        }

        let pool = &candidates[..candidates.len().min(self.config.max_candidates)];
        match self.try_rerank(reranker, query, pool).await {
            Ok(mut reranked) => {
                if let Some(threshold) = self.config.rerank_threshold {
                    reranked.retain(|chunk| chunk.score >= threshold);
                }
                debug!(kept = reranked.len(), "Candidates reranked");
                reranked
            }
            Err(e) => {
                warn!(error = %e, "Reranking failed, keeping similarity order");
                candidates
            }
        }
    }

    async fn try_rerank(
        &self,
        reranker: &dyn Reranker,
        query: &str,
        candidates: &[RagChunk],
    ) -> Result<Vec<RagChunk>, RerankerError> {
        let documents: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();

        let scores = tokio::time::timeout(
            self.config.rerank_timeout,
            reranker.rerank(query, &documents),
        )
        .await
        .map_err(|_| RerankerError::Timeout {
            timeout_ms: self.config.rerank_timeout.as_millis() as u64,
        })??;

        validate_scores(&scores, candidates.len())?;
        if scores.is_empty() {
            return Err(RerankerError::MalformedResponse {
                reason: "no scores returned".to_string(),
            });
        }

        let mut seen = vec![false; candidates.len()];
        let mut reranked = Vec::with_capacity(scores.len());
        for score in &scores {
            if std::mem::replace(&mut seen[score.index], true) {
                return Err(RerankerError::MalformedResponse {
                    reason: format!("duplicate index {}", score.index),
                });
            }
            reranked.push(RagChunk {
                score: score.score,
                ..candidates[score.index].clone()
            });
        }

        reranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(reranked)
    }

    /// Retrieves for `query`, packs the result into the budget allowed for `model_name`,
    /// and renders the prompt text.
    #[instrument(skip(self, query, options), fields(query_len = query.len()))]
    pub async fn build_context(
        &self,
        query: &str,
        token_budget: usize,
        model_name: &str,
        options: &RetrievalOptions,
    ) -> RagResult<AssembledContext> {
        let budget = get_optimal_context_window(token_budget, model_name);
        let chunks = self.retrieve(query, options).await?;

        let context = assemble_context_within_budget(&chunks, budget);
        let estimated_tokens = context_tokens(&context);
        let prompt = format_context(&context, query);

        info!(
            chunks = context.total_chunks,
            documents = context.document_ids.len(),
            estimated_tokens,
            budget,
            "Context assembled"
        );

        Ok(AssembledContext {
            context,
            prompt,
            token_budget: budget,
            estimated_tokens,
        })
    }
}

fn to_chunk(found: VectorMatch) -> RagChunk {
    let VectorMatch { record, score } = found;
    let position = record
        .metadata
        .get(POSITION_METADATA_KEY)
        .and_then(|p| p.parse().ok());
    RagChunk::new(record.text, score).with_source(record.document_id, position)
}

fn batch_report<T>(outcomes: Vec<(usize, &str, RagResult<T>)>) -> BatchReport {
    let mut report = BatchReport {
        total: outcomes.len(),
        ..Default::default()
    };

    for (index, document_id, outcome) in outcomes {
        match outcome {
            Ok(_) => report.succeeded += 1,
            Err(e) => {
                warn!(index, document_id, error = %e, "Batch item failed");
                report.failed += 1;
                report.errors.push(BatchFailure {
                    index,
                    document_id: document_id.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}
