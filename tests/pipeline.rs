//! Pipeline tests against in-memory fakes.
//!
//! The ingestion and query pipelines only talk to the collaborator traits,
//! so these tests swap in counting fakes and assert the orchestration
//! contract: ordering, fail-fast behavior, and stage annotation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use ragpipe::config::{
    ChunkingConfig, CompletionConfig, Config, EmbeddingConfig, IndexConfig, RetrievalConfig,
};
use ragpipe::models::{IndexStats, ScoredMatch, VectorRecord};
use ragpipe::pipeline::{ingest_document, query_index, PipelineError, QueryOutcome, Stage};
use ragpipe::reader::ReadError;
use ragpipe::traits::{Completer, Embedder, VectorStore};

fn test_config() -> Config {
    Config {
        index: IndexConfig {
            name: "demo".to_string(),
            provider: "pinecone".to_string(),
            default_namespace: "user-data".to_string(),
        },
        chunking: ChunkingConfig::default(),
        embedding: EmbeddingConfig::default(),
        retrieval: RetrievalConfig::default(),
        completion: CompletionConfig::default(),
    }
}

fn write_doc(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ───────────────────────── fakes ─────────────────────────

#[derive(Default)]
struct FakeEmbedder {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embed"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("simulated embedding outage");
        }
        Ok(texts
            .iter()
            .map(|t| vec![t.chars().count() as f32, 1.0])
            .collect())
    }
}

struct FakeStore {
    exists: bool,
    exists_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    stored: Mutex<Vec<(String, Vec<VectorRecord>)>>,
    matches: Vec<ScoredMatch>,
}

impl FakeStore {
    fn new(exists: bool) -> Self {
        Self {
            exists,
            exists_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            stored: Mutex::new(Vec::new()),
            matches: Vec::new(),
        }
    }

    fn with_matches(matches: Vec<ScoredMatch>) -> Self {
        Self {
            matches,
            ..Self::new(true)
        }
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn index_exists(&self) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.exists)
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.stored
            .lock()
            .unwrap()
            .push((namespace.to_string(), records.to_vec()));
        Ok(records.len())
    }

    async fn query(&self, _ns: &str, _vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>> {
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        Ok(IndexStats::default())
    }
}

/// Returns one vector fewer than requested.
#[derive(Default)]
struct ShortEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for ShortEmbedder {
    fn model_name(&self) -> &str {
        "fake-short"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().skip(1).map(|_| vec![0.0, 1.0]).collect())
    }
}

struct FakeCompleter;

#[async_trait]
impl Completer for FakeCompleter {
    async fn complete(&self, question: &str, context: &[String]) -> Result<String> {
        Ok(format!(
            "answer to '{}' from {} chunks",
            question,
            context.len()
        ))
    }
}

// ───────────────────────── ingestion ─────────────────────────

#[tokio::test]
async fn ingest_stores_one_record_per_chunk_in_order() {
    let tmp = TempDir::new().unwrap();
    let text = "A sentence about storage. Another one about retrieval. ".repeat(6);
    let path = write_doc(&tmp, "doc.txt", &text);

    let config = test_config();
    let embedder = FakeEmbedder::default();
    let store = FakeStore::new(true);

    let stored = ingest_document(&config, &embedder, &store, &path, "sample")
        .await
        .unwrap();

    let expected = ragpipe::chunk::split_text(
        &text,
        &ragpipe::chunk::SplitterConfig::new(100, 20).unwrap(),
    )
    .unwrap();
    assert_eq!(stored, expected.len());

    let recorded = store.stored.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    let (namespace, records) = &recorded[0];
    assert_eq!(namespace, "sample");
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn empty_document_fails_before_any_external_call() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(&tmp, "blank.txt", "   \n\n \t  ");

    let config = test_config();
    let embedder = FakeEmbedder::default();
    let store = FakeStore::new(true);

    let err = ingest_document(&config, &embedder, &store, &path, "sample")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::EmptyDocument(_)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.exists_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreadable_file_fails_before_any_external_call() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(&tmp, "doc.xyz", "content in an unknown format");

    let config = test_config();
    let embedder = FakeEmbedder::default();
    let store = FakeStore::new(true);

    let err = ingest_document(&config, &embedder, &store, &path, "sample")
        .await
        .unwrap_err();

    match err {
        PipelineError::Read(ReadError::UnsupportedFormat(ext)) => assert_eq!(ext, ".xyz"),
        other => panic!("expected UnsupportedFormat, got {}", other),
    }
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.exists_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_index_is_namespace_not_found() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(&tmp, "doc.txt", "real content worth chunking");

    let config = test_config();
    let embedder = FakeEmbedder::default();
    let store = FakeStore::new(false);

    let err = ingest_document(&config, &embedder, &store, &path, "sample")
        .await
        .unwrap_err();

    match err {
        PipelineError::NamespaceNotFound(name) => assert_eq!(name, "demo"),
        other => panic!("expected NamespaceNotFound, got {}", other),
    }
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn embedding_failure_is_annotated_with_its_stage() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(&tmp, "doc.txt", "some content to embed");

    let config = test_config();
    let embedder = FakeEmbedder {
        fail: true,
        ..Default::default()
    };
    let store = FakeStore::new(true);

    let err = ingest_document(&config, &embedder, &store, &path, "sample")
        .await
        .unwrap_err();

    match err {
        PipelineError::External { stage, message } => {
            assert_eq!(stage, Stage::Embedding);
            assert!(message.contains("simulated embedding outage"));
        }
        other => panic!("expected External, got {}", other),
    }
    assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ingest_preserves_chunk_order_across_embedding_batches() {
    let tmp = TempDir::new().unwrap();
    let text = "Sentences keep arriving one after another in a long stream. ".repeat(12);
    let path = write_doc(&tmp, "doc.txt", &text);

    let mut config = test_config();
    config.embedding.batch_size = 2;
    let embedder = FakeEmbedder::default();
    let store = FakeStore::new(true);

    ingest_document(&config, &embedder, &store, &path, "sample")
        .await
        .unwrap();

    let expected = ragpipe::chunk::split_text(
        &text,
        &ragpipe::chunk::SplitterConfig::new(100, 20).unwrap(),
    )
    .unwrap();
    assert!(expected.len() > 2, "need several chunks to span batches");
    assert_eq!(
        embedder.calls.load(Ordering::SeqCst),
        expected.len().div_ceil(2)
    );

    let recorded = store.stored.lock().unwrap();
    let (_, records) = &recorded[0];
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn embedding_batch_count_mismatch_names_the_model() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(&tmp, "doc.txt", "text the embedder will short-change");

    let config = test_config();
    let embedder = ShortEmbedder::default();
    let store = FakeStore::new(true);

    let err = ingest_document(&config, &embedder, &store, &path, "sample")
        .await
        .unwrap_err();

    match err {
        PipelineError::External { stage, message } => {
            assert_eq!(stage, Stage::Embedding);
            assert!(message.contains("fake-short"), "message: {}", message);
            assert!(message.contains("vectors"), "message: {}", message);
        }
        other => panic!("expected External, got {}", other),
    }
    assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stored_records_carry_the_chunk_content_hash() {
    use sha2::{Digest, Sha256};

    let tmp = TempDir::new().unwrap();
    let path = write_doc(&tmp, "doc.txt", "hashed content travels with its vector");

    let config = test_config();
    let embedder = FakeEmbedder::default();
    let store = FakeStore::new(true);

    ingest_document(&config, &embedder, &store, &path, "sample")
        .await
        .unwrap();

    let recorded = store.stored.lock().unwrap();
    let (_, records) = &recorded[0];
    assert!(!records.is_empty());
    for record in records {
        let mut hasher = Sha256::new();
        hasher.update(record.text.as_bytes());
        assert_eq!(record.hash, format!("{:x}", hasher.finalize()));
    }
}

// ───────────────────────── query ─────────────────────────

#[tokio::test]
async fn query_with_no_matches_returns_an_empty_list_not_an_error() {
    let embedder = FakeEmbedder::default();
    let store = FakeStore::with_matches(Vec::new());

    let outcome = query_index(&embedder, &store, None, "demo", "anything?", "sample", 5)
        .await
        .unwrap();

    match outcome {
        QueryOutcome::Matches(matches) => assert!(matches.is_empty()),
        other => panic!("expected Matches, got {:?}", other),
    }
}

#[tokio::test]
async fn query_returns_ranked_matches() {
    let embedder = FakeEmbedder::default();
    let store = FakeStore::with_matches(vec![
        ScoredMatch {
            text: "most similar".to_string(),
            score: 0.95,
        },
        ScoredMatch {
            text: "less similar".to_string(),
            score: 0.71,
        },
    ]);

    let outcome = query_index(&embedder, &store, None, "demo", "similar to what?", "sample", 5)
        .await
        .unwrap();

    match outcome {
        QueryOutcome::Matches(matches) => {
            assert_eq!(matches.len(), 2);
            assert_eq!(matches[0].text, "most similar");
            assert!(matches[0].score >= matches[1].score);
        }
        other => panic!("expected Matches, got {:?}", other),
    }
}

#[tokio::test]
async fn query_respects_top_k() {
    let embedder = FakeEmbedder::default();
    let matches = (0..10)
        .map(|i| ScoredMatch {
            text: format!("chunk {}", i),
            score: 1.0 - i as f32 * 0.05,
        })
        .collect();
    let store = FakeStore::with_matches(matches);

    let outcome = query_index(&embedder, &store, None, "demo", "q", "sample", 3)
        .await
        .unwrap();

    match outcome {
        QueryOutcome::Matches(matches) => assert_eq!(matches.len(), 3),
        other => panic!("expected Matches, got {:?}", other),
    }
}

#[tokio::test]
async fn query_against_missing_index_is_namespace_not_found() {
    let embedder = FakeEmbedder::default();
    let store = FakeStore::new(false);

    let err = query_index(&embedder, &store, None, "demo", "q", "sample", 5)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NamespaceNotFound(_)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn answer_synthesis_feeds_retrieved_chunks_to_the_completer() {
    let embedder = FakeEmbedder::default();
    let store = FakeStore::with_matches(vec![
        ScoredMatch {
            text: "fact one".to_string(),
            score: 0.9,
        },
        ScoredMatch {
            text: "fact two".to_string(),
            score: 0.8,
        },
    ]);
    let completer = FakeCompleter;

    let outcome = query_index(
        &embedder,
        &store,
        Some(&completer),
        "demo",
        "what are the facts?",
        "sample",
        5,
    )
    .await
    .unwrap();

    match outcome {
        QueryOutcome::Answer { answer, matches } => {
            assert_eq!(answer, "answer to 'what are the facts?' from 2 chunks");
            assert_eq!(matches.len(), 2);
        }
        other => panic!("expected Answer, got {:?}", other),
    }
}
