//! concierge-cli — command-line frontend for the Concierge support backend
//!
//! Talks to the HTTP API; handy for smoke-testing a deployment or driving
//! ingestion from scripts.
//!
//! # Subcommands
//! - `status`                                    — server health
//! - `chat <message> -a <agent>`                 — ask the support agent
//! - `process-file <url> <filename> -a <agent>`  — ingest a document
//! - `embeddings <agent>`                        — list stored chunks
//! - `search <query> -a <agent> [-n <limit>]`    — similarity search

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8790";
const DEFAULT_LIMIT: u32 = 5;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "concierge-cli",
    version,
    about = "Concierge customer-support backend CLI"
)]
struct Cli {
    /// Concierge HTTP server URL (overrides CONCIERGE_HTTP_URL env var)
    #[arg(long, env = "CONCIERGE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show server health
    Status,

    /// Send a customer message to the support agent
    Chat {
        /// The customer message
        message: String,

        /// Agent (knowledge partition) to answer as
        #[arg(short, long)]
        agent: String,
    },

    /// Download, chunk, embed, and store a document
    ProcessFile {
        /// URL of the document to ingest
        url: String,

        /// Filename (determines the file type: .pdf, .txt, .text)
        filename: String,

        /// Agent (knowledge partition) to store chunks under
        #[arg(short, long)]
        agent: String,
    },

    /// List stored chunk records for an agent
    Embeddings {
        /// Agent identifier
        agent: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Similarity search over an agent's stored chunks
    Search {
        /// Query text
        query: String,

        /// Agent identifier
        #[arg(short, long)]
        agent: String,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ProcessFileResponse {
    success: bool,
    message: String,
    chunks_processed: usize,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    text: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_results: usize,
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsListing {
    agent_id: String,
    total_embeddings: usize,
    embeddings: Vec<serde_json::Value>,
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn http_client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?)
}

fn fail_on_error_body(status: reqwest::StatusCode, body: &str) -> anyhow::Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string());
    anyhow::bail!("Server returned {}: {}", status, detail)
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client.get(format!("{}/health", server)).send()?;
    let status = resp.status();
    let body = resp.text()?;

    let json: serde_json::Value = serde_json::from_str(&body)?;
    println!("server:     {}", server);
    println!("status:     {}", json["status"].as_str().unwrap_or("unknown"));
    if let Some(v) = json["version"].as_str() {
        println!("version:    {}", v);
    }
    if let Some(v) = json["pgvector"].as_str() {
        println!("pgvector:   {}", v);
    }
    if !status.is_success() {
        anyhow::bail!("Server unhealthy");
    }
    Ok(())
}

fn do_chat(server: &str, message: &str, agent: &str) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client
        .post(format!("{}/chat", server))
        .json(&serde_json::json!({ "message": message, "agentId": agent }))
        .send()?;

    let status = resp.status();
    let body = resp.text()?;
    fail_on_error_body(status, &body)?;

    let chat: ChatResponse = serde_json::from_str(&body)?;
    println!("{}", chat.response);
    Ok(())
}

fn do_process_file(server: &str, url: &str, filename: &str, agent: &str) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client
        .post(format!("{}/process-file", server))
        .json(&serde_json::json!({
            "url": url,
            "filename": filename,
            "agentId": agent,
        }))
        .send()?;

    let status = resp.status();
    let body = resp.text()?;
    fail_on_error_body(status, &body)?;

    let report: ProcessFileResponse = serde_json::from_str(&body)?;
    if report.success {
        println!("{} ({} chunks)", report.message, report.chunks_processed);
    } else {
        anyhow::bail!("Ingestion failed: {}", report.message);
    }
    Ok(())
}

fn do_embeddings(server: &str, agent: &str, json_output: bool) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client
        .get(format!("{}/embeddings/{}", server, agent))
        .send()?;

    let status = resp.status();
    let body = resp.text()?;
    fail_on_error_body(status, &body)?;

    if json_output {
        println!("{}", body);
        return Ok(());
    }

    let listing: EmbeddingsListing = serde_json::from_str(&body)?;
    println!(
        "{} record(s) for agent {}",
        listing.total_embeddings, listing.agent_id
    );
    for record in &listing.embeddings {
        let id = record["id"].as_str().unwrap_or("?");
        let text = record["text"].as_str().unwrap_or("");
        let preview: String = text.chars().take(80).collect();
        println!("  {}  {}", id, preview);
    }
    Ok(())
}

fn do_search(
    server: &str,
    query: &str,
    agent: &str,
    limit: u32,
    json_output: bool,
) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client
        .post(format!("{}/search-similar", server))
        .json(&serde_json::json!({
            "query": query,
            "agent_id": agent,
            "limit": limit,
        }))
        .send()?;

    let status = resp.status();
    let body = resp.text()?;
    fail_on_error_body(status, &body)?;

    if json_output {
        println!("{}", body);
        return Ok(());
    }

    let search: SearchResponse = serde_json::from_str(&body)?;
    println!("{} result(s)", search.total_results);
    for hit in &search.results {
        let preview: String = hit.text.chars().take(100).collect();
        println!("  [{:.4}] {}", hit.score, preview);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Status => do_status(&cli.server),
        Commands::Chat { message, agent } => do_chat(&cli.server, message, agent),
        Commands::ProcessFile {
            url,
            filename,
            agent,
        } => do_process_file(&cli.server, url, filename, agent),
        Commands::Embeddings { agent, json } => do_embeddings(&cli.server, agent, *json),
        Commands::Search {
            query,
            agent,
            limit,
            json,
        } => do_search(&cli.server, query, agent, *limit, *json),
    }
}
