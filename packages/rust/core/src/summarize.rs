//! Summarization collaborator.
//!
//! Treated as an opaque text-in/text-out service behind the [`Summarizer`]
//! trait; the production implementation talks to Ollama's generate API.
//! Callers route every request through the storage summary cache, so a model
//! only ever sees a given article once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use presswatch_retrieve::http_client;
use presswatch_shared::{PressWatchError, Result};

/// Prompt prefix for article summarization.
const SUMMARY_PROMPT: &str =
    "Please summarize the following article concisely into bullet points:";

/// Generation can take a while on local models; allow well beyond the
/// ordinary fetch timeout.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(180);

/// Contract for the summarization backend.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Model identifier, part of the summary cache key.
    fn model_name(&self) -> &str;

    /// Produce a summary for the given article text.
    async fn summarize(&self, text: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Ollama implementation
// ---------------------------------------------------------------------------

/// Summarizer backed by an Ollama server's `/api/generate` endpoint.
pub struct OllamaSummarizer {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaSummarizer {
    /// Create a summarizer talking to `endpoint` (e.g. `http://localhost:11434`).
    pub fn new(endpoint: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: http_client(GENERATE_TIMEOUT)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn summarize(&self, text: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: format!("{SUMMARY_PROMPT}\n\n{text}"),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| PressWatchError::Summarize(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PressWatchError::Summarize(format!(
                "generate API returned HTTP {status}"
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PressWatchError::Summarize(format!("invalid generate response: {e}")))?;

        debug!(chars = body.response.len(), "summary generated");
        Ok(body.response.trim().to_string())
    }
}
