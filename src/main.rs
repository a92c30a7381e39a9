//! # ragpipe CLI (`rag`)
//!
//! Commands for ingesting documents into the vector index and querying them.
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ingest <path>` | Read, chunk, embed, and store a document |
//! | `rag query "<text>"` | Similarity search, optionally with `--answer` |
//! | `rag stats` | Show vector-index statistics |
//!
//! Exit status: 0 on success, 1 on any error. Errors print a single
//! human-readable line on stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragpipe::config::{self, Secrets};
use ragpipe::pipeline;

/// ragpipe — chunk documents, embed them, and query them through a hosted
/// vector index.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "ragpipe — a document chunking and retrieval pipeline",
    version,
    long_about = "ragpipe reads plain-text, PDF, and Word documents, splits them into \
    overlapping chunks, embeds the chunks through a hosted embedding API, and stores them \
    in a managed vector index. Queries run similarity search over a namespace and can \
    optionally synthesize an answer with a language model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a document into the vector index.
    ///
    /// Reads the file (txt, md, pdf, docx), chunks it with the configured
    /// chunk size and overlap, embeds each chunk, and upserts the vectors
    /// under the namespace.
    Ingest {
        /// Path to the document.
        path: PathBuf,

        /// Namespace to store chunks under (defaults to index.default_namespace).
        #[arg(long)]
        namespace: Option<String>,

        /// Read and chunk only; print the chunks without calling any service.
        #[arg(long)]
        dry_run: bool,
    },

    /// Query the vector index.
    ///
    /// Embeds the query text and returns the most similar stored chunks,
    /// or a synthesized answer with `--answer`.
    Query {
        /// The query text.
        query: String,

        /// Namespace to search (defaults to index.default_namespace).
        #[arg(long)]
        namespace: Option<String>,

        /// Number of matches to retrieve.
        #[arg(long)]
        top_k: Option<usize>,

        /// Synthesize a natural-language answer from the retrieved chunks.
        #[arg(long)]
        answer: bool,
    },

    /// Show statistics for the configured vector index.
    Stats,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    // Dry-run ingestion stays local and needs no credentials.
    if let Commands::Ingest {
        path,
        dry_run: true,
        ..
    } = &cli.command
    {
        return pipeline::run_ingest_dry(&cfg, path).await;
    }

    let secrets = Secrets::from_env(&cfg)?;

    match cli.command {
        Commands::Ingest {
            path, namespace, ..
        } => pipeline::run_ingest(&cfg, &secrets, &path, namespace).await,
        Commands::Query {
            query,
            namespace,
            top_k,
            answer,
        } => pipeline::run_query(&cfg, &secrets, &query, namespace, top_k, answer).await,
        Commands::Stats => pipeline::run_stats(&cfg, &secrets).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
