//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the ingestion and query pipelines.

use std::collections::BTreeMap;

/// Source format of a document, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    PlainText,
    Pdf,
    WordDocument,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::PlainText => "plain text",
            SourceFormat::Pdf => "pdf",
            SourceFormat::WordDocument => "word document",
        }
    }
}

/// A document read from disk, identified by its source path.
///
/// Documents are read once per pipeline run and discarded after chunking;
/// nothing in this layer persists them.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: String,
    pub format: SourceFormat,
    pub text: String,
}

/// A chunk of a document's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk paired with its embedding vector, ready for upsert.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
    /// SHA-256 of `text`, stored alongside it for staleness detection.
    pub hash: String,
}

/// A similarity-search result, most similar first.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub text: String,
    pub score: f32,
}

/// Aggregate statistics reported by the vector index.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub dimension: usize,
    pub total_vectors: u64,
    /// Vector count per namespace, keyed by namespace name.
    pub namespaces: BTreeMap<String, u64>,
}
