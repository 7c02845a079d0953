//! Abstractions for generating structured bill summaries via a local model runtime.
//!
//! The Ollama-backed client asks the model for a JSON object. Transport failures surface as
//! [`SummarizationClientError`] so the pipeline can retry them; a reply that is not usable JSON
//! is not an error and yields the templated fallback summary instead.

pub mod prompt;
pub mod types;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config::get_config;

pub use prompt::{DEFAULT_MAX_PROMPT_CHARS, build_prompt, fallback_summary, parse_model_output};
pub use types::{
    BillSummary, Citation, SummarizationClientError, SummaryRequest, SummarySection,
    SummarySource,
};

/// Interface implemented by summarization providers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a structured summary for one bill document.
    async fn summarize(
        &self,
        request: &SummaryRequest,
    ) -> Result<BillSummary, SummarizationClientError>;
}

/// Build the summarizer selected by the global configuration.
pub fn get_summarizer() -> Result<Box<dyn Summarizer>, SummarizationClientError> {
    let config = get_config();
    let summarizer =
        OllamaSummarizer::new(config.ollama_url.clone(), config.summarization_model.clone())?;
    Ok(Box::new(summarizer))
}

/// Summarizer backed by Ollama's `/api/generate` endpoint.
pub struct OllamaSummarizer {
    http: Client,
    base_url: String,
    model: String,
    max_prompt_chars: usize,
}

impl OllamaSummarizer {
    /// Construct a summarizer for `model` served at `base_url`.
    pub fn new(base_url: String, model: String) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent("billwatch/summary")
            .build()
            .map_err(|error| SummarizationClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        })
    }

    /// Override the bill text budget embedded in each prompt.
    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(
        &self,
        request: &SummaryRequest,
    ) -> Result<BillSummary, SummarizationClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": build_prompt(request, self.max_prompt_chars),
            "stream": false,
            "format": "json",
            "options": {
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SummarizationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(SummarizationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        match parse_model_output(&body.response) {
            Some(summary) => Ok(summary),
            None => {
                tracing::warn!(
                    bill = %request.bill,
                    version = %request.version_code,
                    "Model output was not usable JSON; using templated summary"
                );
                Ok(fallback_summary(request))
            }
        }
    }
}
