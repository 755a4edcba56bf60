//! Concierge HTTP REST API
//!
//! Axum-based HTTP server exposing the support backend.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! pure inner function. The inner functions are directly testable without
//! axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health                — health check with DB status
//! - GET  /version               — server version info
//! - POST /chat                  — agent-generated customer reply
//! - POST /process-file          — download, chunk, embed, and store a document
//! - GET  /embeddings/:agent_id  — stored chunk records for an agent
//! - POST /search-similar        — cosine similarity search over stored chunks

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use concierge_core::{ConciergeConfig, FileKind};
use serde::Deserialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::subsystems::{chat, embedder, ingest, retrieve};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub config: ConciergeConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/chat", post(chat_handler))
        .route("/process-file", post(process_file_handler))
        .route("/embeddings/:agent_id", get(embeddings_handler))
        .route("/search-similar", post(search_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    pool: PgPool,
    config: ConciergeConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { pool, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Concierge HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(rename = "agentId")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessFileRequest {
    pub url: Option<String>,
    pub filename: Option<String>,
    #[serde(rename = "agentId")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub agent_id: Option<String>,
    pub limit: Option<u32>,
}

// ============================================================================
// Validation (pure, directly testable)
// ============================================================================

fn blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Validate a chat request; returns (message, agent_id).
pub fn validate_chat_request(req: &ChatRequest) -> Result<(String, String), String> {
    if blank(&req.message) || blank(&req.agent_id) {
        return Err("message and agentId are required".to_string());
    }
    Ok((
        req.message.clone().unwrap_or_default(),
        req.agent_id.clone().unwrap_or_default(),
    ))
}

/// Validate a process-file request; returns (url, filename, agent_id).
///
/// The filename must carry a supported extension — the kind check runs here
/// so the request fails before any download starts.
pub fn validate_process_request(
    req: &ProcessFileRequest,
) -> Result<(String, String, String), String> {
    if blank(&req.url) || blank(&req.filename) || blank(&req.agent_id) {
        return Err("URL, filename, and agentId are required".to_string());
    }

    let filename = req.filename.clone().unwrap_or_default();
    if FileKind::from_filename(&filename).is_none() {
        return Err("Only PDF and TXT files are supported".to_string());
    }

    Ok((
        req.url.clone().unwrap_or_default(),
        filename,
        req.agent_id.clone().unwrap_or_default(),
    ))
}

/// Validate a similarity-search request; returns (query, agent_id).
pub fn validate_search_request(req: &SearchRequest) -> Result<(String, String), String> {
    if blank(&req.query) || blank(&req.agent_id) {
        return Err("query and agent_id are required".to_string());
    }
    Ok((
        req.query.clone().unwrap_or_default(),
        req.agent_id.clone().unwrap_or_default(),
    ))
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": msg.into(),
        "status": "error",
    })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    let pg_ver = match concierge_core::db::health_check(pool).await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            );
        }
    };

    let pgvector_ver = match concierge_core::db::check_pgvector(pool).await {
        Ok(v) => v,
        Err(e) => format!("unavailable: {}", e),
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "postgresql": pg_ver,
            "pgvector": pgvector_ver,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "concierge",
    })
}

/// Inner chat — validates the message and delegates to the chat subsystem.
pub async fn chat_inner(
    pool: &PgPool,
    config: &ConciergeConfig,
    req: ChatRequest,
) -> (StatusCode, serde_json::Value) {
    let (message, agent_id) = match validate_chat_request(&req) {
        Ok(fields) => fields,
        Err(e) => return (StatusCode::BAD_REQUEST, error_body(e)),
    };

    // A missing embedding backend degrades the reply (no knowledge-base
    // context) rather than failing the request.
    let backend = match embedder::create_backend_from_config(config) {
        Ok(b) => Some(b),
        Err(e) => {
            tracing::warn!(error = %e, "Embedding backend unavailable — answering without context");
            None
        }
    };

    let chat_client = match chat::create_chat_client_from_config(config) {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(format!("Chat client unavailable: {}", e)),
            );
        }
    };

    match chat::answer(&message, &agent_id, pool, config, backend.as_deref(), &chat_client).await {
        Ok(reply) => (StatusCode::OK, serde_json::json!({ "response": reply })),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

/// Inner process-file — validates the request and runs the ingestion
/// pipeline.
pub async fn process_file_inner(
    pool: &PgPool,
    config: &ConciergeConfig,
    req: ProcessFileRequest,
) -> (StatusCode, serde_json::Value) {
    let (url, filename, agent_id) = match validate_process_request(&req) {
        Ok(fields) => fields,
        Err(e) => return (StatusCode::BAD_REQUEST, error_body(e)),
    };

    let backend = match embedder::create_backend_from_config(config) {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(format!("Embedding backend unavailable: {}", e)),
            );
        }
    };

    let start = Instant::now();

    match ingest::process_file(&url, &filename, &agent_id, pool, config, backend.as_ref()).await {
        Ok(report) => {
            let took_ms = start.elapsed().as_millis() as u64;
            (
                StatusCode::OK,
                serde_json::json!({
                    "success": true,
                    "message": format!(
                        "Successfully processed and stored {} chunks from {}",
                        report.chunks_processed, filename
                    ),
                    "chunks_processed": report.chunks_processed,
                    "took_ms": took_ms,
                }),
            )
        }
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, error_body(format!("Error processing file: {}", e)))
        }
    }
}

/// Inner embeddings listing — returns every stored record for the agent.
pub async fn embeddings_inner(pool: &PgPool, agent_id: &str) -> (StatusCode, serde_json::Value) {
    match retrieve::list_embeddings(pool, agent_id).await {
        Ok(records) => (
            StatusCode::OK,
            serde_json::json!({
                "agent_id": agent_id,
                "total_embeddings": records.len(),
                "embeddings": records,
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(format!("Error retrieving embeddings: {}", e)),
        ),
    }
}

/// Inner similarity search.
pub async fn search_inner(
    pool: &PgPool,
    config: &ConciergeConfig,
    req: SearchRequest,
) -> (StatusCode, serde_json::Value) {
    let (query, agent_id) = match validate_search_request(&req) {
        Ok(fields) => fields,
        Err(e) => return (StatusCode::BAD_REQUEST, error_body(e)),
    };

    let backend = match embedder::create_backend_from_config(config) {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(format!("Embedding backend unavailable: {}", e)),
            );
        }
    };

    match retrieve::search_similar(pool, backend.as_ref(), &agent_id, &query, req.limit).await {
        Ok(results) => (
            StatusCode::OK,
            serde_json::json!({
                "query": query,
                "agent_id": agent_id,
                "total_results": results.len(),
                "results": results,
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(format!("Error searching similar chunks: {}", e)),
        ),
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let (status, body) = chat_inner(&state.pool, &state.config, req).await;
    (status, Json(body))
}

pub async fn process_file_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ProcessFileRequest>,
) -> impl IntoResponse {
    let (status, body) = process_file_inner(&state.pool, &state.config, req).await;
    (status, Json(body))
}

pub async fn embeddings_handler(
    State(state): State<Arc<HttpState>>,
    Path(agent_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = embeddings_inner(&state.pool, &agent_id).await;
    (status, Json(body))
}

pub async fn search_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    let (status, body) = search_inner(&state.pool, &state.config, req).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — pure functions, no DB required
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["service"], "concierge");
    }

    #[test]
    fn test_validate_chat_request_requires_fields() {
        let req = ChatRequest {
            message: Some("hi".to_string()),
            agent_id: None,
        };
        assert!(validate_chat_request(&req).is_err());

        let req = ChatRequest {
            message: Some("   ".to_string()),
            agent_id: Some("agent-1".to_string()),
        };
        assert!(validate_chat_request(&req).is_err());

        let req = ChatRequest {
            message: Some("hi".to_string()),
            agent_id: Some("agent-1".to_string()),
        };
        let (message, agent_id) = validate_chat_request(&req).unwrap();
        assert_eq!(message, "hi");
        assert_eq!(agent_id, "agent-1");
    }

    #[test]
    fn test_validate_process_request_requires_fields() {
        let req = ProcessFileRequest {
            url: None,
            filename: Some("doc.pdf".to_string()),
            agent_id: Some("agent-1".to_string()),
        };
        assert!(validate_process_request(&req).is_err());
    }

    #[test]
    fn test_validate_process_request_rejects_unsupported_extension() {
        let req = ProcessFileRequest {
            url: Some("https://example.com/report.docx".to_string()),
            filename: Some("report.docx".to_string()),
            agent_id: Some("agent-1".to_string()),
        };
        let err = validate_process_request(&req).unwrap_err();
        assert!(err.contains("Only PDF and TXT"));
    }

    #[test]
    fn test_validate_process_request_accepts_pdf_and_txt() {
        for filename in ["manual.pdf", "notes.txt", "notes.text", "MANUAL.PDF"] {
            let req = ProcessFileRequest {
                url: Some("https://example.com/file".to_string()),
                filename: Some(filename.to_string()),
                agent_id: Some("agent-1".to_string()),
            };
            assert!(
                validate_process_request(&req).is_ok(),
                "{} should be accepted",
                filename
            );
        }
    }

    #[test]
    fn test_validate_search_request() {
        let req = SearchRequest {
            query: Some("refund policy".to_string()),
            agent_id: Some("agent-1".to_string()),
            limit: Some(3),
        };
        assert!(validate_search_request(&req).is_ok());

        let req = SearchRequest {
            query: None,
            agent_id: Some("agent-1".to_string()),
            limit: None,
        };
        assert!(validate_search_request(&req).is_err());
    }

    #[test]
    fn test_error_body_shape() {
        let body = error_body("boom");
        assert_eq!(body["error"], "boom");
        assert_eq!(body["status"], "error");
    }
}
