//! Pinecone vector-store client.
//!
//! Implements [`VectorStore`] against the Pinecone REST API. The control
//! plane (`api.pinecone.io`) resolves the index description and data-plane
//! host; upserts, queries, and stats go to the index host directly.
//!
//! Chunk text rides along in vector metadata under the `"text"` key, so a
//! similarity search can return the stored text without a second lookup;
//! the chunk's content hash is stored next to it under `"hash"`.
//! Data-plane calls use the same retry/backoff policy as the embedding
//! providers.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::{Config, Secrets};
use crate::models::{IndexStats, ScoredMatch, VectorRecord};
use crate::traits::VectorStore;

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

/// Maximum vectors per upsert request (service limit).
const UPSERT_BATCH: usize = 100;

/// Create the configured [`VectorStore`].
pub fn create_store(config: &Config, secrets: &Secrets) -> Result<Box<dyn VectorStore>> {
    match config.index.provider.as_str() {
        "pinecone" => Ok(Box::new(PineconeStore::new(
            config.index.name.clone(),
            secrets.vector_store_api_key.clone(),
            config.embedding.max_retries,
            config.embedding.timeout_secs,
        ))),
        other => bail!("Unknown vector-store provider: {}", other),
    }
}

pub struct PineconeStore {
    index_name: String,
    api_key: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl PineconeStore {
    pub fn new(index_name: String, api_key: String, max_retries: u32, timeout_secs: u64) -> Self {
        Self {
            index_name,
            api_key,
            max_retries,
            timeout_secs,
        }
    }

    fn client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?)
    }

    /// Describe the index on the control plane. `None` when the index does
    /// not exist.
    async fn describe_index(&self) -> Result<Option<serde_json::Value>> {
        let client = self.client()?;
        let url = format!("{}/indexes/{}", CONTROL_PLANE_URL, self.index_name);

        let response = client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Pinecone API error {}: {}", status, body_text);
        }

        Ok(Some(response.json().await?))
    }

    /// Resolve the data-plane host for the configured index.
    async fn resolve_host(&self) -> Result<String> {
        let description = self
            .describe_index()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Index '{}' does not exist", self.index_name))?;

        description
            .get("host")
            .and_then(|h| h.as_str())
            .map(|h| format!("https://{}", h))
            .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone response: missing index host"))
    }

    /// POST a JSON body to the data plane with retry/backoff.
    ///
    /// HTTP 429 and 5xx retry; other 4xx fail immediately.
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let client = self.client()?;
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Pinecone API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Pinecone API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Pinecone request failed after retries")))
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn index_exists(&self) -> Result<bool> {
        Ok(self.describe_index().await?.is_some())
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
        let host = self.resolve_host().await?;
        let url = format!("{}/vectors/upsert", host);
        let mut accepted = 0usize;

        for batch in records.chunks(UPSERT_BATCH) {
            let vectors: Vec<serde_json::Value> = batch
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "values": r.values,
                        "metadata": { "text": r.text, "hash": r.hash },
                    })
                })
                .collect();

            let body = serde_json::json!({
                "vectors": vectors,
                "namespace": namespace,
            });

            let json = self.post_json(&url, &body).await?;
            accepted += json
                .get("upsertedCount")
                .and_then(|c| c.as_u64())
                .unwrap_or(batch.len() as u64) as usize;
        }

        Ok(accepted)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>> {
        let host = self.resolve_host().await?;
        let url = format!("{}/query", host);

        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "namespace": namespace,
            "includeMetadata": true,
        });

        let json = self.post_json(&url, &body).await?;
        parse_query_response(&json)
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        let host = self.resolve_host().await?;
        let url = format!("{}/describe_index_stats", host);

        let json = self.post_json(&url, &serde_json::json!({})).await?;
        parse_stats_response(&json)
    }
}

/// Parse a query response into ranked matches. Matches without text metadata
/// are skipped; an empty `matches` array is a valid, empty result.
fn parse_query_response(json: &serde_json::Value) -> Result<Vec<ScoredMatch>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone response: missing matches array"))?;

    let results = matches
        .iter()
        .filter_map(|m| {
            let text = m
                .get("metadata")
                .and_then(|md| md.get("text"))
                .and_then(|t| t.as_str())?;
            let score = m.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
            Some(ScoredMatch {
                text: text.to_string(),
                score,
            })
        })
        .collect();

    Ok(results)
}

fn parse_stats_response(json: &serde_json::Value) -> Result<IndexStats> {
    let mut stats = IndexStats {
        dimension: json.get("dimension").and_then(|d| d.as_u64()).unwrap_or(0) as usize,
        total_vectors: json
            .get("totalVectorCount")
            .and_then(|c| c.as_u64())
            .unwrap_or(0),
        ..Default::default()
    };

    if let Some(namespaces) = json.get("namespaces").and_then(|n| n.as_object()) {
        for (name, entry) in namespaces {
            let count = entry
                .get("vectorCount")
                .and_then(|c| c.as_u64())
                .unwrap_or(0);
            stats.namespaces.insert(name.clone(), count);
        }
    }

    Ok(stats)
}
