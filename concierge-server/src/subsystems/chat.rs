//! Chat subsystem — support-agent orchestration
//!
//! Implements `POST /chat`: retrieve knowledge-base context for the agent,
//! assemble the support persona prompt, and delegate the reply to the LLM.
//! Context retrieval degrades gracefully — if the embedding backend is down
//! the customer still gets an answer, just without knowledge-base grounding.

use anyhow::Result;
use concierge_core::{ChatClientConfig, ChatError, ConciergeConfig, EmbeddingBackend, GeminiChatClient};
use sqlx::PgPool;

use super::retrieve::{self, SimilarChunk};

/// How many knowledge-base chunks to surface to the LLM.
const CONTEXT_LIMIT: u32 = 5;

/// Create the Gemini chat client from the application config.
///
/// The API key is read from the `GEMINI_API_KEY` environment variable.
pub fn create_chat_client_from_config(
    config: &ConciergeConfig,
) -> Result<GeminiChatClient, ChatError> {
    GeminiChatClient::new(ChatClientConfig::from_config(&config.chat))
}

/// Answer a customer message on behalf of `agent_id`.
///
/// `backend` is optional: when it is `None` (e.g. no embedding API key is
/// configured) or retrieval fails, the reply is generated without
/// knowledge-base context instead of failing the request.
pub async fn answer(
    message: &str,
    agent_id: &str,
    pool: &PgPool,
    config: &ConciergeConfig,
    backend: Option<&dyn EmbeddingBackend>,
    chat_client: &GeminiChatClient,
) -> Result<String> {
    let context = match backend {
        Some(backend) => {
            match retrieve::search_similar(pool, backend, agent_id, message, Some(CONTEXT_LIMIT))
                .await
            {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(
                        agent_id,
                        error = %e,
                        "Knowledge-base retrieval failed — answering without context"
                    );
                    Vec::new()
                }
            }
        }
        None => {
            tracing::warn!(agent_id, "No embedding backend — answering without context");
            Vec::new()
        }
    };

    let system = build_system_prompt(config.chat.calendar_url.as_deref());
    let user = build_user_prompt(message, &context);

    let reply = chat_client.generate(&system, &user).await?;
    Ok(reply)
}

/// The support-agent persona instruction.
pub fn build_system_prompt(calendar_url: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are a skilled customer support agent. Answer policy and product \
         questions using the knowledge-base context provided with each \
         message. Always answer in a polite, supportive, and clear way. \
         If the context does not cover the question, say so rather than \
         guessing.",
    );

    if let Some(url) = calendar_url {
        prompt.push_str(&format!(
            " If the customer wants to schedule a meeting, provide them with \
             the following calendar URL: {url}"
        ));
    }

    prompt
}

/// The customer message plus the retrieved context block.
pub fn build_user_prompt(message: &str, context: &[SimilarChunk]) -> String {
    if context.is_empty() {
        return format!("Customer message: {message}\n\nNo relevant context found.");
    }

    let formatted: String = context
        .iter()
        .map(|c| format!("- {} (score: {:.4})", c.text, c.score))
        .collect::<Vec<_>>()
        .join("\n");

    format!("Customer message: {message}\n\nRelevant context:\n{formatted}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn chunk(text: &str, score: f64) -> SimilarChunk {
        SimilarChunk {
            id: Uuid::new_v4(),
            text: text.to_string(),
            metadata: serde_json::json!({}),
            score,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_system_prompt_includes_calendar_url_when_set() {
        let prompt = build_system_prompt(Some("https://cal.example.com/support"));
        assert!(prompt.contains("https://cal.example.com/support"));

        let prompt = build_system_prompt(None);
        assert!(!prompt.contains("calendar URL"));
    }

    #[test]
    fn test_user_prompt_formats_context_block() {
        let context = vec![chunk("Refunds take 5 days.", 0.91234)];
        let prompt = build_user_prompt("How long do refunds take?", &context);

        assert!(prompt.contains("Customer message: How long do refunds take?"));
        assert!(prompt.contains("Relevant context:"));
        assert!(prompt.contains("- Refunds take 5 days. (score: 0.9123)"));
    }

    #[test]
    fn test_user_prompt_without_context() {
        let prompt = build_user_prompt("Hello", &[]);
        assert!(prompt.contains("No relevant context found."));
    }
}
