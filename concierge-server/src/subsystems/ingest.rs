//! Ingestion subsystem — the document processing pipeline
//!
//! Implements `POST /process-file`: download the document, extract its text,
//! split it into overlapping windows, embed every chunk, and store one row
//! per chunk. The database write is a single transaction — either every
//! chunk of a document lands or none do.

use std::time::Duration;

use concierge_core::chunker::{InvalidChunking, SlidingChunker};
use concierge_core::extract::{self, ExtractError, FileKind};
use concierge_core::{ConciergeConfig, EmbeddingBackend, EmbeddingError};
use pgvector::Vector;
use sqlx::PgPool;
use thiserror::Error;

/// Ingestion failures, one variant per pipeline stage.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file type: {0} — only PDF and TXT files are supported")]
    UnsupportedFileType(String),

    #[error("Invalid chunking configuration: {0}")]
    Chunking(#[from] InvalidChunking),

    #[error("Failed to download file: {0}")]
    Download(#[from] reqwest::Error),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Failed to embed chunks: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IngestError {
    /// True when the failure was caused by the request itself rather than a
    /// downstream service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, IngestError::UnsupportedFileType(_))
    }
}

/// Outcome of a successful ingestion run.
#[derive(Debug)]
pub struct IngestReport {
    pub chunks_processed: usize,
}

/// Run the full pipeline for one document.
pub async fn process_file(
    url: &str,
    filename: &str,
    agent_id: &str,
    pool: &PgPool,
    config: &ConciergeConfig,
    backend: &dyn EmbeddingBackend,
) -> Result<IngestReport, IngestError> {
    let kind = FileKind::from_filename(filename)
        .ok_or_else(|| IngestError::UnsupportedFileType(filename.to_string()))?;

    let content = download_file(url).await?;
    tracing::debug!(url, bytes = content.len(), "Downloaded file");

    let text = extract::extract_text(kind, &content)?;

    let chunker = SlidingChunker::new(
        config.chunking.chunk_size as usize,
        config.chunking.chunk_overlap as usize,
    )?;
    let chunks = chunker.chunk(&text);

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = backend.embed_documents(&texts).await?;

    let total_chunks = chunks.len();
    let mut tx = pool.begin().await?;

    for (chunk, embedding) in chunks.iter().zip(vectors) {
        let metadata = serde_json::json!({
            "filename": filename,
            "url": url,
            "chunk_index": chunk.index,
            "total_chunks": total_chunks,
            "file_type": kind.as_str(),
            "start_offset": chunk.start,
        });

        sqlx::query(
            "INSERT INTO embeddings (agent_id, text, metadata, vector) VALUES ($1, $2, $3, $4)",
        )
        .bind(agent_id)
        .bind(&chunk.text)
        .bind(&metadata)
        .bind(Vector::from(embedding))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        agent_id,
        filename,
        chunks = total_chunks,
        backend = backend.name(),
        "Processed and stored document"
    );

    Ok(IngestReport {
        chunks_processed: total_chunks,
    })
}

/// Download a file, failing on non-2xx statuses.
async fn download_file(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_404_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = download_file(&format!("{}/missing.txt", mock_server.uri())).await;
        assert!(result.is_err(), "Expected error on 404 download");
    }

    #[tokio::test]
    async fn test_download_returns_body_bytes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file body".to_vec()))
            .mount(&mock_server)
            .await;

        let result = download_file(&format!("{}/doc.txt", mock_server.uri())).await;
        assert_eq!(result.unwrap(), b"file body");
    }

    #[test]
    fn test_unsupported_file_type_is_client_error() {
        let err = IngestError::UnsupportedFileType("report.docx".to_string());
        assert!(err.is_client_error());

        let err = IngestError::Extract(ExtractError::Empty);
        assert!(!err.is_client_error());
    }
}
