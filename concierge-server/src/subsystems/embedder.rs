//! Embedder subsystem — embedding backend construction
//!
//! The HTTP handlers build a fresh backend per request from the application
//! config; tests inject their own [`EmbeddingBackend`] directly into the
//! pipeline functions.

use concierge_core::{
    CohereEmbeddingClient, ConciergeConfig, EmbeddingBackend, EmbeddingClientConfig,
    EmbeddingError,
};

/// Create the Cohere embedding backend from the application config.
///
/// The API key is read from the `COHERE_API_KEY` environment variable.
pub fn create_backend_from_config(
    config: &ConciergeConfig,
) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    let client_config = EmbeddingClientConfig::from_config(&config.embedding);
    Ok(Box::new(CohereEmbeddingClient::new(client_config)?))
}
