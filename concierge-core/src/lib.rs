pub mod chat;
pub mod chunker;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod models;

pub use chat::{ChatClientConfig, ChatError, GeminiChatClient};
pub use chunker::{Chunk, SlidingChunker};
pub use config::ConciergeConfig;
pub use embeddings::{
    CohereEmbeddingClient, EmbeddingBackend, EmbeddingClientConfig, EmbeddingError,
    COHERE_DIMENSIONS,
};
pub use error::ConciergeError;
pub use extract::{ExtractError, FileKind};
