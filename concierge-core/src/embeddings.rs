//! Embeddings module for Concierge — Cohere-backed embedding support
//!
//! Provides an `EmbeddingBackend` trait with a Cohere implementation
//! (`embed-english-v3.0`, 1024-dim). Document chunks are embedded in batches
//! with `input_type: search_document`; queries use `search_query`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Default Cohere embedding dimensions (embed-english-v3.0)
pub const COHERE_DIMENSIONS: usize = 1024;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of document chunks, one vector per input, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a search query. Providers that support input-type hints (e.g.
    /// Cohere) use `search_query` here instead of `search_document`.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Returns the embedding dimension (e.g., 1024).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Input type hint for the embed API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    SearchDocument,
    SearchQuery,
}

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Response returned {actual} embeddings for {expected} texts")]
    MissingEmbedding { expected: usize, actual: usize },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Cannot embed an empty batch")]
    EmptyBatch,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// Config
// ============================================================================

/// Cohere embedding client configuration
#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub max_batch: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl EmbeddingClientConfig {
    pub fn new(api_key: Option<String>, model: String, dimensions: usize) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("COHERE_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model,
            dimensions,
            max_batch: 96,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }

    /// Build from the `[embedding]` section, pulling the API key from the
    /// `COHERE_API_KEY` environment variable.
    pub fn from_config(config: &crate::config::EmbeddingConfig) -> Self {
        Self {
            api_key: std::env::var("COHERE_API_KEY").unwrap_or_default(),
            model: config.model.clone(),
            dimensions: config.dimensions as usize,
            max_batch: config.max_batch as usize,
            max_retries: config.max_retries as usize,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

// ============================================================================
// Cohere API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: InputType,
    truncate: &'a str,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct CohereErrorResponse {
    message: Option<String>,
}

// ============================================================================
// CohereEmbeddingClient
// ============================================================================

/// Cohere embedding client — calls the Cohere `/v1/embed` API.
#[derive(Debug, Clone)]
pub struct CohereEmbeddingClient {
    client: Client,
    config: EmbeddingClientConfig,
    base_url: String,
}

impl CohereEmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self, EmbeddingError> {
        Self::with_base_url(config, "https://api.cohere.ai".to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: EmbeddingClientConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Embed a batch of at most `max_batch` texts with retry.
    async fn embed_batch(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || self.embed_once(texts, input_type)).await;

        match result {
            Ok(vecs) => Ok(vecs),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All embedding retry attempts failed"
                );
                Err(EmbeddingError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn embed_once(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/v1/embed", self.base_url);

        let request = CohereRequest {
            model: &self.config.model,
            texts,
            input_type,
            truncate: "END",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CohereErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Cohere API error");

            return Err(EmbeddingError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let cohere_response: CohereResponse = response.json().await?;
        let embeddings = cohere_response.embeddings;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::MissingEmbedding {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        for embedding in &embeddings {
            if embedding.len() != self.config.dimensions {
                return Err(EmbeddingError::InvalidDimensions {
                    expected: self.config.dimensions,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingBackend for CohereEmbeddingClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }

        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.max_batch) {
            let mut vecs = self.embed_batch(batch, InputType::SearchDocument).await?;
            all.append(&mut vecs);
        }
        Ok(all)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let texts = [text.to_string()];
        let mut vecs = self.embed_batch(&texts, InputType::SearchQuery).await?;
        // embed_once guarantees one vector per input
        Ok(vecs.remove(0))
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "cohere"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str) -> EmbeddingClientConfig {
        EmbeddingClientConfig {
            api_key: api_key.to_string(),
            model: "embed-english-v3.0".to_string(),
            dimensions: COHERE_DIMENSIONS,
            max_batch: 96,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }

    fn mock_vector(seed: usize) -> Vec<f32> {
        (0..COHERE_DIMENSIONS)
            .map(|i| ((i + seed) as f32) / COHERE_DIMENSIONS as f32)
            .collect()
    }

    fn mock_embed_response(count: usize) -> serde_json::Value {
        let embeddings: Vec<Vec<f32>> = (0..count).map(mock_vector).collect();
        serde_json::json!({
            "id": "test-response",
            "embeddings": embeddings,
            "meta": { "api_version": { "version": "1" } }
        })
    }

    #[tokio::test]
    async fn test_embed_documents_calls_api_and_returns_1024_dim_vectors() {
        let mock_server = MockServer::start().await;
        let client = CohereEmbeddingClient::with_base_url(
            test_config("test-api-key"),
            mock_server.uri(),
        )
        .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/v1/embed"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_json(serde_json::json!({
                "model": "embed-english-v3.0",
                "texts": ["hello world"],
                "input_type": "search_document",
                "truncate": "END"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embed_response(1)))
            .mount(&mock_server)
            .await;

        let result = client
            .embed_documents(&["hello world".to_string()])
            .await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        let embeddings = result.unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].len(), 1024, "Expected 1024 dimensions");
    }

    #[tokio::test]
    async fn test_embed_query_uses_search_query_input_type() {
        let mock_server = MockServer::start().await;
        let client = CohereEmbeddingClient::with_base_url(
            test_config("test-api-key"),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/embed"))
            .and(body_json(serde_json::json!({
                "model": "embed-english-v3.0",
                "texts": ["refund policy"],
                "input_type": "search_query",
                "truncate": "END"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embed_response(1)))
            .mount(&mock_server)
            .await;

        let result = client.embed_query("refund policy").await;
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn test_embed_returns_error_on_api_500() {
        let mock_server = MockServer::start().await;
        let client = CohereEmbeddingClient::with_base_url(
            test_config("test-api-key"),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "message": "internal server error"
            })))
            .mount(&mock_server)
            .await;

        let result = client.embed_documents(&["hello".to_string()]).await;

        assert!(result.is_err(), "Expected error on 500 response");
        match result {
            Err(EmbeddingError::RetryExhausted { attempts }) => {
                assert_eq!(attempts, 3, "Expected 3 retry attempts");
            }
            _ => panic!("Expected RetryExhausted error"),
        }
    }

    #[tokio::test]
    async fn test_embed_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = CohereEmbeddingClient::with_base_url(
            test_config("test-api-key"),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "message": "rate limit exceeded"
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embed_response(1)))
            .mount(&mock_server)
            .await;

        let result = client.embed_documents(&["hello".to_string()]).await;

        assert!(result.is_ok(), "Expected success after retry");
        assert_eq!(result.unwrap()[0].len(), 1024);
    }

    #[tokio::test]
    async fn test_client_fails_with_missing_api_key() {
        let result = CohereEmbeddingClient::new(test_config(""));

        assert!(result.is_err(), "Expected error with missing API key");
        match result {
            Err(EmbeddingError::MissingApiKey) => {}
            _ => panic!("Expected MissingApiKey error"),
        }
    }

    #[tokio::test]
    async fn test_embed_returns_error_on_wrong_dimensions() {
        let mock_server = MockServer::start().await;
        let client = CohereEmbeddingClient::with_base_url(
            test_config("test-api-key"),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "test-response",
                "embeddings": [[0.1, 0.2, 0.3]]
            })))
            .mount(&mock_server)
            .await;

        let result = client.embed_documents(&["hello".to_string()]).await;

        assert!(result.is_err(), "Expected error on wrong dimensions");
        match result {
            Err(EmbeddingError::RetryExhausted { .. }) => {
                // dimension errors are retried, then surfaced as exhaustion
            }
            Err(EmbeddingError::InvalidDimensions { expected, actual }) => {
                assert_eq!(expected, 1024);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected InvalidDimensions or RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_documents_splits_into_batches() {
        let mock_server = MockServer::start().await;
        let mut config = test_config("test-api-key");
        config.max_batch = 2;
        let client =
            CohereEmbeddingClient::with_base_url(config, mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "model": "embed-english-v3.0",
                "texts": ["a", "b"],
                "input_type": "search_document",
                "truncate": "END"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embed_response(2)))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "model": "embed-english-v3.0",
                "texts": ["c"],
                "input_type": "search_document",
                "truncate": "END"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embed_response(1)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let texts: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let result = client.embed_documents(&texts).await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap().len(), 3, "One vector per input text");
    }

    #[tokio::test]
    async fn test_embed_empty_batch_is_error() {
        let mock_server = MockServer::start().await;
        let client = CohereEmbeddingClient::with_base_url(
            test_config("test-api-key"),
            mock_server.uri(),
        )
        .unwrap();

        let result = client.embed_documents(&[]).await;
        assert!(matches!(result, Err(EmbeddingError::EmptyBatch)));
    }

    #[tokio::test]
    async fn test_embed_returns_error_on_missing_embedding() {
        let mock_server = MockServer::start().await;
        let client = CohereEmbeddingClient::with_base_url(
            test_config("test-api-key"),
            mock_server.uri(),
        )
        .unwrap();

        // two texts in, one embedding out
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embed_response(1)))
            .mount(&mock_server)
            .await;

        let texts: Vec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let result = client.embed_documents(&texts).await;

        assert!(result.is_err(), "Expected error when embeddings are missing");
    }
}
