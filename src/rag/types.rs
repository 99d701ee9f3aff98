use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default number of chunks returned by a retrieval.
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 5;

/// Default minimum cosine similarity for a retrieved chunk.
pub const DEFAULT_MIN_RELEVANCE: f32 = 0.2;

/// A source document to index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagDocument {
    pub id: String,
    pub text: String,
    /// Pre-split chunks; when set they are indexed verbatim and `text` is ignored.
    #[serde(default)]
    pub chunks: Option<Vec<String>>,
    /// Copied onto every chunk record.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RagDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn pre_chunked<I, S>(id: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            chunks: Some(chunks.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Where a chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    /// Zero-based chunk position within the document, when known.
    pub position: Option<usize>,
}

/// A retrieved chunk with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagChunk {
    pub text: String,
    pub score: f32,
    pub metadata: Option<ChunkMetadata>,
}

impl RagChunk {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
            metadata: None,
        }
    }

    pub fn with_source(mut self, document_id: impl Into<String>, position: Option<usize>) -> Self {
        self.metadata = Some(ChunkMetadata {
            document_id: document_id.into(),
            position,
        });
        self
    }

    pub fn document_id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.document_id.as_str())
    }
}

/// Chunks selected for a prompt, most relevant first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagContext {
    pub chunks: Vec<RagChunk>,
    /// Distinct source documents in first-appearance order.
    pub document_ids: Vec<String>,
    /// Number of chunks in `chunks`.
    pub total_chunks: usize,
}

impl RagContext {
    pub fn from_chunks(chunks: Vec<RagChunk>) -> Self {
        let mut document_ids: Vec<String> = Vec::new();
        for id in chunks.iter().filter_map(RagChunk::document_id) {
            if !document_ids.iter().any(|seen| seen == id) {
                document_ids.push(id.to_string());
            }
        }
        Self {
            total_chunks: chunks.len(),
            chunks,
            document_ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Query parameters for [`RagContextAssembler::retrieve`](super::RagContextAssembler::retrieve).
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub min_relevance: f32,
    /// Restrict to these documents (empty = all).
    pub document_ids: Vec<String>,
    /// Send candidates through the reranker when one is configured.
    pub rerank: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_RETRIEVAL_TOP_K,
            min_relevance: DEFAULT_MIN_RELEVANCE,
            document_ids: Vec::new(),
            rerank: true,
        }
    }
}

impl RetrievalOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_ids.push(document_id.into());
        self
    }

    pub fn without_rerank(mut self) -> Self {
        self.rerank = false;
        self
    }
}

/// One failed item of a batch call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    /// Position of the item in the request.
    pub index: usize,
    pub document_id: String,
    pub error: String,
}

/// Outcome of [`index_documents`](super::RagContextAssembler::index_documents) and
/// [`remove_documents`](super::RagContextAssembler::remove_documents).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sorted by `index`.
    pub errors: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Budget-packed context plus the prompt text built from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    pub context: RagContext,
    pub prompt: String,
    /// Token budget actually applied after the model ceiling.
    pub token_budget: usize,
    /// Estimated tokens used by the selected chunks.
    pub estimated_tokens: usize,
}
