//! Sieve command-line entrypoint.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

use sieve::cache::{DEFAULT_REMOTE_TIMEOUT, HttpRemoteCache, TieredEmbeddingCache};
use sieve::config::Config;
use sieve::embedding::reranker::build_reranker;
use sieve::embedding::{BertLoader, EmbeddingGenerator, ModelLoader, StubLoader, StubModel};
use sieve::rag::{
    DEFAULT_MIN_RELEVANCE, DEFAULT_RETRIEVAL_TOP_K, RagContextAssembler, RagDocument,
    RetrievalOptions,
};
use sieve::storage::DiskStore;
use sieve::vectordb::VectorStore;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "sieve", version, about = "Semantic retrieval and RAG context assembly")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store a text file as one document
    Index {
        document_id: String,
        file: PathBuf,
    },
    /// Retrieve context for a question and print the prompt
    Query {
        question: String,
        /// Requested context budget in tokens
        #[arg(long, default_value_t = 8_000)]
        budget: usize,
        /// Target model; caps the budget to its context window
        #[arg(long, default_value = "claude")]
        model: String,
        #[arg(long, default_value_t = DEFAULT_RETRIEVAL_TOP_K)]
        top_k: usize,
        #[arg(long, default_value_t = DEFAULT_MIN_RELEVANCE)]
        min_relevance: f32,
        /// Restrict retrieval to these documents
        #[arg(long = "document")]
        documents: Vec<String>,
        /// Print the assembled context as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every chunk of a document
    Remove { document_id: String },
    /// Print cache and vector store statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    match config.bert_config() {
        Some(bert) => run(BertLoader::new(bert), &config, cli.command).await,
        None => {
            tracing::warn!("No SIEVE_MODEL_PATH configured, embedding with the stub model");
            let stub = StubModel::new(
                config.embedding_dim,
                format!("{}-stub", config.model_version),
            );
            run(StubLoader::new(stub), &config, cli.command).await
        }
    }
}

async fn run<L: ModelLoader>(loader: L, config: &Config, command: Command) -> anyhow::Result<()> {
    let assembler = build_assembler(loader, config).await?;

    match command {
        Command::Index { document_id, file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let document = RagDocument::new(&document_id, text)
                .with_metadata("source", file.display().to_string());

            let chunks = assembler.index_document(&document).await?;
            println!("indexed {} chunks for '{}'", chunks, document_id);
        }
        Command::Query {
            question,
            budget,
            model,
            top_k,
            min_relevance,
            documents,
            json,
        } => {
            let mut options = RetrievalOptions::default()
                .with_top_k(top_k)
                .with_min_relevance(min_relevance);
            options.document_ids = documents;

            let built = assembler
                .build_context(&question, budget, &model, &options)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&built)?);
            } else {
                println!("{}", built.prompt);
            }
        }
        Command::Remove { document_id } => {
            let removed = assembler.remove_document(&document_id).await?;
            println!("removed {} chunks for '{}'", removed, document_id);
        }
        Command::Stats => {
            let report = serde_json::json!({
                "cache": assembler.cache().stats().await,
                "vectors": assembler.store().stats().await?,
                "documents": assembler.store().list_documents().await?,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn build_assembler<L: ModelLoader>(
    loader: L,
    config: &Config,
) -> anyhow::Result<RagContextAssembler<L, DiskStore>> {
    let cache_store = DiskStore::new(config.cache_dir());
    cache_store.ensure_root().await?;
    let vector_store = DiskStore::new(config.vectors_dir());
    vector_store.ensure_root().await?;

    let mut cache = TieredEmbeddingCache::new(config.cache_config())?.with_persistent(cache_store);
    if let Some(url) = &config.remote_cache_url {
        cache = cache.with_remote(HttpRemoteCache::new(url, DEFAULT_REMOTE_TIMEOUT)?);
        match config.principal() {
            Some(principal) => cache.set_principal(principal),
            None => tracing::warn!("Remote cache configured without credentials, tier disabled"),
        }
    }

    let generator = EmbeddingGenerator::new(loader, config.generator_config())?;
    let vectors = VectorStore::new(vector_store, config.vector_store_config());

    let mut assembler = RagContextAssembler::new(
        Arc::new(generator),
        Arc::new(vectors),
        Arc::new(cache),
        config.rag_config(),
    )?;

    if let Some(reranker_config) = config.reranker_config() {
        assembler = assembler.with_reranker(build_reranker(&reranker_config).await?);
    }

    tracing::info!(
        storage_path = %config.storage_path.display(),
        reranker = assembler.has_reranker(),
        "Sieve ready"
    );
    Ok(assembler)
}
