//! Ingestion and query pipelines.
//!
//! Coordinates reader → chunker → embedder → vector store for ingestion, and
//! embedder → vector store → optional completer for queries. Local failures
//! (file format, chunking, empty documents) are detected before any external
//! call so a bad input never leaves partial network side effects; external
//! failures are annotated with the stage that failed.

use std::path::Path;

use crate::chunk::{self, SplitError, SplitterConfig};
use crate::completion;
use crate::config::{Config, Secrets};
use crate::embedding;
use crate::models::{ScoredMatch, VectorRecord};
use crate::reader::{self, ReadError};
use crate::store;
use crate::traits::{embed_query, Completer, Embedder, VectorStore};

/// External pipeline stage, used to annotate collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    VectorStore,
    Completion,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Embedding => "embedding",
            Stage::VectorStore => "vector store",
            Stage::Completion => "completion",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum PipelineError {
    /// Chunking produced zero chunks; raised before any external call.
    EmptyDocument(String),
    /// The target index/namespace collection does not exist.
    NamespaceNotFound(String),
    Read(ReadError),
    Split(SplitError),
    /// A collaborator failed; `stage` names which one.
    External { stage: Stage, message: String },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::EmptyDocument(path) => {
                write!(f, "document '{}' produced no chunks", path)
            }
            PipelineError::NamespaceNotFound(name) => {
                write!(f, "index '{}' does not exist", name)
            }
            PipelineError::Read(e) => write!(f, "{}", e),
            PipelineError::Split(e) => write!(f, "{}", e),
            PipelineError::External { stage, message } => {
                write!(f, "{} stage failed: {}", stage, message)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ReadError> for PipelineError {
    fn from(e: ReadError) -> Self {
        PipelineError::Read(e)
    }
}

impl From<SplitError> for PipelineError {
    fn from(e: SplitError) -> Self {
        PipelineError::Split(e)
    }
}

fn external(stage: Stage, err: anyhow::Error) -> PipelineError {
    PipelineError::External {
        stage,
        message: format!("{:#}", err),
    }
}

/// Result of a query: ranked chunks, or a synthesized answer with the chunks
/// that supported it.
#[derive(Debug)]
pub enum QueryOutcome {
    Matches(Vec<ScoredMatch>),
    Answer {
        answer: String,
        matches: Vec<ScoredMatch>,
    },
}

/// Ingest one document: read, chunk, embed, and store under `namespace`.
///
/// Returns the number of chunks stored — the sole success signal the store
/// exposes.
pub async fn ingest_document(
    config: &Config,
    embedder: &dyn Embedder,
    vector_store: &dyn VectorStore,
    path: &Path,
    namespace: &str,
) -> Result<usize, PipelineError> {
    let splitter = SplitterConfig::new(config.chunking.chunk_size, config.chunking.overlap)?;

    let document = reader::read_document(path)?;
    let chunks = chunk::chunk_document(&document.path, &document.text, &splitter)?;

    if chunks.is_empty() {
        return Err(PipelineError::EmptyDocument(document.path));
    }

    let exists = vector_store
        .index_exists()
        .await
        .map_err(|e| external(Stage::VectorStore, e))?;
    if !exists {
        return Err(PipelineError::NamespaceNotFound(config.index.name.clone()));
    }

    // Batches run in sequence and extend in order, so record order follows
    // chunk order.
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let batch_vectors = embedder
            .embed(&texts)
            .await
            .map_err(|e| external(Stage::Embedding, e))?;
        if batch_vectors.len() != batch.len() {
            return Err(PipelineError::External {
                stage: Stage::Embedding,
                message: format!(
                    "model {} returned {} vectors for {} inputs",
                    embedder.model_name(),
                    batch_vectors.len(),
                    batch.len()
                ),
            });
        }
        vectors.extend(batch_vectors);
    }

    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, values)| VectorRecord {
            id: chunk.id.clone(),
            values,
            text: chunk.text.clone(),
            hash: chunk.hash.clone(),
        })
        .collect();

    let stored = vector_store
        .upsert(namespace, &records)
        .await
        .map_err(|e| external(Stage::VectorStore, e))?;

    Ok(stored)
}

/// Run a similarity search for `query`, optionally synthesizing an answer.
///
/// An empty match list is a valid outcome, not an error.
pub async fn query_index(
    embedder: &dyn Embedder,
    vector_store: &dyn VectorStore,
    completer: Option<&dyn Completer>,
    index_name: &str,
    query: &str,
    namespace: &str,
    top_k: usize,
) -> Result<QueryOutcome, PipelineError> {
    let exists = vector_store
        .index_exists()
        .await
        .map_err(|e| external(Stage::VectorStore, e))?;
    if !exists {
        return Err(PipelineError::NamespaceNotFound(index_name.to_string()));
    }

    let query_vector = embed_query(embedder, query)
        .await
        .map_err(|e| external(Stage::Embedding, e))?;

    let matches = vector_store
        .query(namespace, &query_vector, top_k)
        .await
        .map_err(|e| external(Stage::VectorStore, e))?;

    match completer {
        Some(completer) => {
            let context: Vec<String> = matches.iter().map(|m| m.text.clone()).collect();
            let answer = completer
                .complete(query, &context)
                .await
                .map_err(|e| external(Stage::Completion, e))?;
            Ok(QueryOutcome::Answer { answer, matches })
        }
        None => Ok(QueryOutcome::Matches(matches)),
    }
}

/// CLI wrapper: read and chunk a document, printing the chunks without
/// calling any external service. Needs no credentials.
pub async fn run_ingest_dry(config: &Config, path: &Path) -> anyhow::Result<()> {
    let splitter = SplitterConfig::new(config.chunking.chunk_size, config.chunking.overlap)?;
    let document = reader::read_document(path)?;
    let chunks = chunk::chunk_document(&document.path, &document.text, &splitter)?;

    println!("ingest {} (dry-run)", path.display());
    println!("  format: {}", document.format.as_str());
    println!("  chunks: {}", chunks.len());
    for chunk in &chunks {
        println!("Chunk {}: {}", chunk.chunk_index + 1, chunk.text);
    }
    Ok(())
}

/// CLI wrapper: ingest a file and report what happened.
pub async fn run_ingest(
    config: &Config,
    secrets: &Secrets,
    path: &Path,
    namespace: Option<String>,
) -> anyhow::Result<()> {
    let namespace = namespace.unwrap_or_else(|| config.index.default_namespace.clone());

    let embedder = embedding::create_embedder(config, secrets)?;
    let vector_store = store::create_store(config, secrets)?;

    let stored = ingest_document(
        config,
        embedder.as_ref(),
        vector_store.as_ref(),
        path,
        &namespace,
    )
    .await?;

    println!("ingest {}", path.display());
    println!("  namespace: {}", namespace);
    println!("  embedding model: {}", embedder.model_name());
    println!("  chunks stored: {}", stored);
    println!("ok");
    Ok(())
}

/// CLI wrapper: query the index and print ranked chunks or an answer.
pub async fn run_query(
    config: &Config,
    secrets: &Secrets,
    query: &str,
    namespace: Option<String>,
    top_k: Option<usize>,
    answer: bool,
) -> anyhow::Result<()> {
    let namespace = namespace.unwrap_or_else(|| config.index.default_namespace.clone());
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let embedder = embedding::create_embedder(config, secrets)?;
    let vector_store = store::create_store(config, secrets)?;
    let completer = if answer {
        Some(completion::create_completer(config, secrets)?)
    } else {
        None
    };

    let outcome = query_index(
        embedder.as_ref(),
        vector_store.as_ref(),
        completer.as_deref(),
        &config.index.name,
        query,
        &namespace,
        top_k,
    )
    .await?;

    match outcome {
        QueryOutcome::Matches(matches) => {
            if matches.is_empty() {
                println!("No matches.");
                return Ok(());
            }
            println!("Retrieved Chunks:");
            for (i, m) in matches.iter().enumerate() {
                println!();
                println!("Chunk {} (score {:.4}): {}", i + 1, m.score, m.text);
            }
        }
        QueryOutcome::Answer { answer, matches } => {
            println!("Answer:");
            println!("{}", answer);
            if !matches.is_empty() {
                println!();
                println!("Supporting chunks:");
                for (i, m) in matches.iter().enumerate() {
                    println!("  {}. (score {:.4}) {}", i + 1, m.score, m.text);
                }
            }
        }
    }
    Ok(())
}

/// CLI wrapper: print index statistics.
pub async fn run_stats(config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
    let vector_store = store::create_store(config, secrets)?;

    if !vector_store.index_exists().await? {
        anyhow::bail!("index '{}' does not exist", config.index.name);
    }

    let stats = vector_store.describe_stats().await?;

    println!("index {}", config.index.name);
    println!("  dimension: {}", stats.dimension);
    println!("  total vectors: {}", stats.total_vectors);
    for (name, count) in &stats.namespaces {
        println!("  namespace {}: {}", name, count);
    }
    Ok(())
}
