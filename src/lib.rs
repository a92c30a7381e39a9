//! # ragpipe
//!
//! A document chunking and retrieval pipeline over hosted embedding and
//! vector-store APIs.
//!
//! ragpipe reads a document (plain text, PDF, or Word), splits it into
//! overlapping chunks, embeds the chunks via a hosted embedding API, and
//! upserts them into a managed vector index under a namespace. Queries embed
//! the question, run a similarity search, and can optionally synthesize an
//! answer with a hosted language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌──────────┐   ┌─────────────┐
//! │ Reader │──▶│ Chunker │──▶│ Embedder │──▶│ VectorStore │
//! │txt/pdf/│   │recursive│   │ (hosted) │   │  (hosted)   │
//! │  docx  │   │ +overlap│   └──────────┘   └──────┬──────┘
//! └────────┘   └─────────┘                         │ query
//!                                          ┌───────▼───────┐
//!                                          │   Completer   │
//!                                          │ (optional QA) │
//!                                          └───────────────┘
//! ```
//!
//! Similarity search, embedding models, and answer generation are external
//! collaborators behind the [`traits`] seams; only reading, chunking, and
//! orchestration live here.
//!
//! ## Quick Start
//!
//! ```bash
//! rag ingest ./sample.txt --namespace sample
//! rag query "what does the document say about refunds?" --namespace sample
//! rag query "summarize the policy" --answer
//! rag stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`models`] | Core data types |
//! | [`reader`] | Multi-format file reading |
//! | [`chunk`] | Recursive overlapping text chunker |
//! | [`traits`] | External collaborator seams |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama) |
//! | [`store`] | Pinecone vector-store client |
//! | [`completion`] | Answer synthesis |
//! | [`pipeline`] | Ingestion and query orchestration |

pub mod chunk;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod store;
pub mod traits;
