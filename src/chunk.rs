//! Recursive-separator text chunker.
//!
//! Splits document text into overlapping chunks that respect a configurable
//! `chunk_size` character budget. Splitting tries a prioritized separator
//! list (paragraph break, line break, sentence end, space), always choosing
//! the coarsest separator that appears in the text, and re-splits oversized
//! pieces at the next finer level.
//!
//! Pieces keep their trailing separator, so chunks are true substrings of the
//! input: concatenating each chunk minus its overlap prefix reconstructs the
//! original text exactly. A token longer than `chunk_size` with no remaining
//! separator is emitted whole rather than truncated.
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text, and contiguous
//! indices starting at 0.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Separator priority, coarsest first. A piece that is still too large after
/// the final separator is an atomic token and is kept whole.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Chunker configuration: sizes are in characters, not bytes.
#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    /// Maximum characters per chunk (atomic oversized tokens excepted).
    pub chunk_size: usize,
    /// Characters repeated from the end of each chunk at the start of the next.
    pub overlap: usize,
}

/// Configuration error raised before any splitting is attempted.
#[derive(Debug)]
pub enum SplitError {
    InvalidConfig { chunk_size: usize, overlap: usize },
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::InvalidConfig {
                chunk_size,
                overlap,
            } => write!(
                f,
                "invalid chunker configuration: overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            ),
        }
    }
}

impl std::error::Error for SplitError {}

impl SplitterConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SplitError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(SplitError::InvalidConfig {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

/// Split text into overlapping chunks in reading order.
///
/// Deterministic: the same (text, config) pair always yields the same
/// sequence. Empty or whitespace-only input yields an empty sequence.
pub fn split_text(text: &str, config: &SplitterConfig) -> Result<Vec<String>, SplitError> {
    // Re-validate so callers constructing the config directly still fail fast.
    let config = SplitterConfig::new(config.chunk_size, config.overlap)?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Pieces are budgeted at chunk_size - overlap so that a piece plus the
    // carried overlap prefix never pushes a merged chunk past chunk_size.
    let piece_budget = config.chunk_size - config.overlap;
    let mut pieces = Vec::new();
    split_recursive(text, piece_budget, &SEPARATORS, &mut pieces);
    Ok(merge_pieces(&pieces, config.chunk_size, config.overlap))
}

/// Split text into [`Chunk`]s with contiguous indices starting at 0.
pub fn chunk_document(
    document_id: &str,
    text: &str,
    config: &SplitterConfig,
) -> Result<Vec<Chunk>, SplitError> {
    let chunks = split_text(text, config)?
        .into_iter()
        .enumerate()
        .map(|(i, text)| make_chunk(document_id, i as i64, text))
        .collect();
    Ok(chunks)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s` (all of `s` when shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Break `text` into pieces of at most `max_chars`, trying separators in
/// priority order. `split_inclusive` keeps the separator on each piece so no
/// characters are lost.
fn split_recursive<'a>(
    text: &'a str,
    max_chars: usize,
    separators: &[&str],
    out: &mut Vec<&'a str>,
) {
    if char_len(text) <= max_chars {
        out.push(text);
        return;
    }
    let Some((sep, finer)) = separators.split_first() else {
        // Atomic token larger than the budget: keep it whole.
        out.push(text);
        return;
    };
    if !text.contains(sep) {
        split_recursive(text, max_chars, finer, out);
        return;
    }
    for piece in text.split_inclusive(sep) {
        if char_len(piece) <= max_chars {
            out.push(piece);
        } else {
            split_recursive(piece, max_chars, finer, out);
        }
    }
}

/// Greedily merge pieces back together in original order up to `chunk_size`,
/// carrying the last `overlap` characters of each emitted chunk forward as
/// the start of the next.
fn merge_pieces(pieces: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    // Characters at the start of `buf` that came from the previous chunk.
    let mut carried = 0usize;

    for piece in pieces {
        let has_new_content = char_len(&buf) > carried;
        if has_new_content && char_len(&buf) + char_len(piece) > chunk_size {
            let tail = tail_chars(&buf, overlap).to_string();
            chunks.push(std::mem::replace(&mut buf, tail));
            carried = char_len(&buf);
        }
        buf.push_str(piece);
    }

    // A final buffer holding only the carried overlap would duplicate text.
    if char_len(&buf) > carried {
        chunks.push(buf);
    }

    chunks
}

fn make_chunk(document_id: &str, index: i64, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text,
        hash,
    }
}
