//! Retrieval-augmented context assembly.
//!
//! Documents are chunked into overlapping word windows, embedded and stored in the
//! [`VectorStore`](crate::vectordb::VectorStore). A query is embedded, matched by cosine
//! similarity, optionally reranked, packed greedily into a token budget and rendered as
//! numbered, cited sources for a downstream prompt.

pub mod assembler;
pub mod budget;
pub mod chunker;
pub mod error;
pub mod format;
pub mod types;


pub use assembler::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_INDEX_CONCURRENCY, DEFAULT_MAX_CANDIDATES,
    POSITION_METADATA_KEY, RagConfig, RagContextAssembler, chunk_id,
};
pub use budget::{
    CONTEXT_SAFETY_MARGIN, DEFAULT_CONTEXT_CEILING, RESPONSE_RESERVE_TOKENS,
    assemble_context_within_budget, estimate_tokens, get_optimal_context_window,
    model_context_limit,
};
pub use chunker::{chunk_words, document_chunks};
pub use error::{RagError, RagResult};
pub use format::format_context;
pub use types::{
    AssembledContext, BatchFailure, BatchReport, ChunkMetadata, DEFAULT_MIN_RELEVANCE,
    DEFAULT_RETRIEVAL_TOP_K, RagChunk, RagContext, RagDocument, RetrievalOptions,
};
