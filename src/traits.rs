//! Seams for the external collaborators: embeddings, vector storage, and
//! answer synthesis.
//!
//! The pipelines only ever talk to these traits, so the concrete provider is
//! an injected dependency rather than a hard import, and tests can run
//! against in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexStats, ScoredMatch, VectorRecord};

/// Produces fixed-length embedding vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
///
/// Convenience wrapper around [`Embedder::embed`] for single-text use cases.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let results = embedder.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// A managed vector index partitioned into namespaces.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether the configured index exists on the remote service.
    async fn index_exists(&self) -> Result<bool>;

    /// Store records under `namespace`. At-least-once semantics; returns the
    /// number of records accepted.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Nearest-neighbor search scoped to `namespace`, most similar first.
    /// An empty result list is a valid response.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>>;

    /// Aggregate index statistics.
    async fn describe_stats(&self) -> Result<IndexStats>;
}

/// Synthesizes a natural-language answer from retrieved context.
///
/// Implementations run in deterministic mode (temperature 0) so the same
/// question and context reproduce the same answer.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, question: &str, context: &[String]) -> Result<String>;
}
