//! Retrieval subsystem — stored-chunk listing and similarity search
//!
//! - `GET /embeddings/{agent_id}` lists every record for an agent.
//! - `POST /search-similar` embeds the query and ranks the agent's chunks
//!   by cosine similarity in pgvector (`score = 1 - distance`).

use anyhow::Result;
use chrono::{DateTime, Utc};
use concierge_core::models::EmbeddingRecord;
use concierge_core::EmbeddingBackend;
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Maximum allowed limit for similarity search results
const MAX_LIMIT: i64 = 20;

/// Default limit when none specified
const DEFAULT_LIMIT: i64 = 5;

/// One similarity search hit.
#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarChunk {
    pub id: Uuid,
    pub text: String,
    pub metadata: serde_json::Value,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// Fetch every stored record for an agent, newest first.
pub async fn list_embeddings(
    pool: &PgPool,
    agent_id: &str,
) -> Result<Vec<EmbeddingRecord>, sqlx::Error> {
    sqlx::query_as::<_, EmbeddingRecord>(
        r#"
        SELECT id, agent_id, text, metadata, vector, created_at
        FROM embeddings
        WHERE agent_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await
}

/// Rank an agent's chunks by cosine similarity to `query`.
///
/// Limit is clamped to [1, 20]; defaults to 5.
pub async fn search_similar(
    pool: &PgPool,
    backend: &dyn EmbeddingBackend,
    agent_id: &str,
    query: &str,
    limit: Option<u32>,
) -> Result<Vec<SimilarChunk>> {
    let limit = limit
        .map(|l| (l as i64).clamp(1, MAX_LIMIT))
        .unwrap_or(DEFAULT_LIMIT);

    let query_vector = backend.embed_query(query).await?;
    let vector = Vector::from(query_vector);

    let rows = sqlx::query_as::<_, (Uuid, String, serde_json::Value, Option<f64>, DateTime<Utc>)>(
        r#"
        SELECT
            id,
            text,
            metadata,
            1 - (vector <=> $1::vector) AS score,
            created_at
        FROM embeddings
        WHERE agent_id = $2
        ORDER BY vector <=> $1::vector
        LIMIT $3
        "#,
    )
    .bind(&vector)
    .bind(agent_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, text, metadata, score, created_at)| SimilarChunk {
            id,
            text,
            metadata,
            score: score.unwrap_or(0.0),
            created_at,
        })
        .collect())
}
