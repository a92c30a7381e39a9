//! Multi-format document reader (plain text, PDF, Word documents).
//!
//! Determines the format from the file extension (case-insensitive) and
//! returns plain UTF-8 text. All extraction happens before any network call
//! is made, so a malformed file never causes partial pipeline side effects.

use std::io::Read;
use std::path::Path;

use crate::models::{Document, SourceFormat};

/// Maximum decompressed bytes to read from the document XML entry
/// (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Reader error. Format errors are detected before any external service is
/// contacted.
#[derive(Debug)]
pub enum ReadError {
    /// Extension not handled; carries the extension as written (e.g. `".xyz"`).
    UnsupportedFormat(String),
    /// File content is not valid UTF-8.
    Decode(String),
    /// File is not a readable PDF.
    Pdf(String),
    /// File is not a readable Word document.
    Doc(String),
    Io(std::io::Error),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::UnsupportedFormat(ext) => write!(f, "unsupported file type: {}", ext),
            ReadError::Decode(e) => write!(f, "text decoding failed: {}", e),
            ReadError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ReadError::Doc(e) => write!(f, "Word document extraction failed: {}", e),
            ReadError::Io(e) => write!(f, "failed to read file: {}", e),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> Self {
        ReadError::Io(e)
    }
}

/// Read a file and extract its text content based on the extension.
pub fn read_document(path: &Path) -> Result<Document, ReadError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let (format, text) = match ext.as_str() {
        "txt" | "md" => (SourceFormat::PlainText, read_plain_text(path)?),
        "pdf" => (SourceFormat::Pdf, read_pdf(path)?),
        "docx" | "doc" => (SourceFormat::WordDocument, read_word_document(path)?),
        _ => {
            return Err(ReadError::UnsupportedFormat(if ext.is_empty() {
                "(no extension)".to_string()
            } else {
                format!(".{}", ext)
            }))
        }
    };

    Ok(Document {
        path: path.display().to_string(),
        format,
        text,
    })
}

fn read_plain_text(path: &Path) -> Result<String, ReadError> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|e| ReadError::Decode(e.to_string()))
}

/// Extract text from every page in document order, concatenated.
fn read_pdf(path: &Path) -> Result<String, ReadError> {
    let bytes = std::fs::read(path)?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ReadError::Pdf(e.to_string()))
}

/// Extract every paragraph's text in document order, joined with a single
/// space. Handles the OOXML container (`.docx`); a legacy binary `.doc` is
/// not a ZIP archive and surfaces as [`ReadError::Doc`].
fn read_word_document(path: &Path) -> Result<String, ReadError> {
    let bytes = std::fs::read(path)?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .map_err(|e| ReadError::Doc(e.to_string()))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ReadError::Doc(format!("word/document.xml: {}", e)))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ReadError::Doc(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ReadError::Doc(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_paragraphs(&doc_xml)
}

/// Walk the document XML collecting `w:t` runs, closing a paragraph at each
/// `</w:p>`.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ReadError> {
    // No trim_text: leading/trailing spaces inside a run are significant,
    // and only text inside `w:t` is collected anyway.
    let mut reader = quick_xml::Reader::from_reader(xml);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text_run => {
                current.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if !current.is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                    in_text_run = false;
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ReadError::Doc(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join(" "))
}
