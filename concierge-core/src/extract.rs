//! Document text extraction
//!
//! Supported inputs are PDF (via lopdf) and plain text. The file kind is
//! derived from the uploaded filename, never from content sniffing, to match
//! the ingestion API contract.

use lopdf::Document;
use thiserror::Error;

/// Supported document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
}

impl FileKind {
    /// Determine the file kind from a filename extension (case-insensitive).
    /// Returns `None` for unsupported extensions.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(FileKind::Pdf),
            "txt" | "text" => Some(FileKind::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Text => "txt",
        }
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to extract text from PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("No text content found in file")]
    Empty,
}

/// Extract text from raw file content.
///
/// Returns [`ExtractError::Empty`] when the document contains no text after
/// trimming.
pub fn extract_text(kind: FileKind, content: &[u8]) -> Result<String, ExtractError> {
    let text = match kind {
        FileKind::Pdf => extract_pdf(content)?,
        FileKind::Text => decode_text(content),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text.to_string())
}

fn extract_pdf(content: &[u8]) -> Result<String, ExtractError> {
    let doc = Document::load_mem(content)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    Ok(doc.extract_text(&pages)?)
}

/// Decode plain-text bytes: UTF-8 first, then Latin-1. Every byte maps to a
/// codepoint in Latin-1, so decoding never fails outright.
pub fn decode_text(content: &[u8]) -> String {
    match std::str::from_utf8(content) {
        Ok(s) => s.to_string(),
        Err(_) => content.iter().map(|&b| b as char).collect(),
    }
}
