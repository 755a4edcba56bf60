use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored knowledge-base chunk. One row per chunk; `agent_id` is the
/// partition key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub id: Uuid,
    pub agent_id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub vector: Vector,
    pub created_at: DateTime<Utc>,
}
