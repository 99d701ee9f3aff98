//! Test fixtures for integration tests.

use std::sync::Arc;

use sieve::cache::TieredEmbeddingCache;
use sieve::embedding::{EmbeddingGenerator, GeneratorConfig, MockLoader, MockModel};
use sieve::rag::{RagConfig, RagContextAssembler, RagDocument};
use sieve::storage::RecordStore;
use sieve::vectordb::{StoredVector, VectorStore, VectorStoreConfig};

pub const MODEL_VERSION: &str = "keywords-v1";

pub const KEYWORDS: &[&str] = &[
    "cat", "dog", "pet", "vet", "tax", "invoice", "budget", "rust", "compiler",
];

pub const FIXED_TIMESTAMP: i64 = 1702512000000;

/// Bag-of-keywords model: texts sharing keywords score high against each other.
pub fn keyword_model() -> MockModel {
    MockModel::keywords(KEYWORDS, MODEL_VERSION)
}

pub fn embedding_dim() -> usize {
    KEYWORDS.len() + 1
}

pub fn generator(model: MockModel) -> EmbeddingGenerator<MockLoader> {
    EmbeddingGenerator::new(MockLoader::new(model), GeneratorConfig::new(embedding_dim()))
        .expect("valid generator config")
}

pub fn assembler<S: RecordStore>(
    model: MockModel,
    store: S,
    cache: TieredEmbeddingCache,
) -> RagContextAssembler<MockLoader, S> {
    let vectors = VectorStore::new(
        store,
        VectorStoreConfig::default().with_dimension(embedding_dim()),
    );
    RagContextAssembler::new(
        Arc::new(generator(model)),
        Arc::new(vectors),
        Arc::new(cache),
        RagConfig::default().with_chunking(6, 2),
    )
    .expect("valid rag config")
}

/// Three small documents on unrelated topics.
pub fn sample_documents() -> Vec<RagDocument> {
    vec![
        RagDocument::new(
            "pets",
            "Every cat needs a vet visit once a year. A dog needs one too. \
             Pet insurance covers the vet bill for a cat or a dog.",
        )
        .with_metadata("title", "Pet care"),
        RagDocument::new(
            "finance",
            "File the tax return before the deadline. Keep every invoice. \
             A monthly budget makes the tax season calmer.",
        )
        .with_metadata("title", "Household finance"),
        RagDocument::pre_chunked(
            "rust",
            [
                "The rust compiler checks ownership.",
                "The compiler rejects data races at compile time.",
            ],
        ),
    ]
}

#[derive(Default)]
pub struct StoredVectorBuilder {
    id: Option<String>,
    document_id: Option<String>,
    text: Option<String>,
    vector: Option<Vec<f32>>,
    timestamp: Option<i64>,
}

impl StoredVectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn document(mut self, document_id: &str) -> Self {
        self.document_id = Some(document_id.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_seeded_vector(mut self, seed: u64) -> Self {
        self.vector = Some(generate_deterministic_vector(seed, embedding_dim()));
        self
    }

    pub fn build(self) -> StoredVector {
        let id = self.id.unwrap_or_else(|| "vector-0".to_string());
        StoredVector::new(
            id.clone(),
            self.document_id.unwrap_or_else(|| "document-0".to_string()),
            id,
            self.text.unwrap_or_default(),
            self.vector
                .unwrap_or_else(|| generate_deterministic_vector(0, embedding_dim())),
        )
        .with_timestamp(self.timestamp.unwrap_or(FIXED_TIMESTAMP))
    }
}

/// Pseudo-random vector in `[-1, 1]`, identical for identical seeds.
pub fn generate_deterministic_vector(seed: u64, dim: usize) -> Vec<f32> {
    let mut state = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    (0..dim)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        })
        .collect()
}

/// `count` records spread round-robin over `documents` documents.
pub fn create_batch_vectors(count: usize, documents: usize) -> Vec<StoredVector> {
    (0..count)
        .map(|i| {
            StoredVectorBuilder::new()
                .id(&format!("vec-{}", i))
                .document(&format!("doc-{}", i % documents))
                .text(&format!("record {}", i))
                .with_seeded_vector(i as u64)
                .build()
        })
        .collect()
}
