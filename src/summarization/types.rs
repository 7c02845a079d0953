//! Request and response shapes exchanged with the summarization service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bill::BillKey;

/// Errors surfaced while calling the summarization service.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider was unreachable.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider envelope could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Everything the summarization service is given about one document.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    /// Bill the document belongs to.
    pub bill: BillKey,
    /// Version code of the document.
    pub version_code: String,
    /// Title as published.
    pub title: String,
    /// Sponsor display name.
    pub sponsor: Option<String>,
    /// Committee names.
    pub committees: Vec<String>,
    /// Latest action date (`YYYY-MM-DD`).
    pub action_date: Option<String>,
    /// Extracted prose of the document body.
    pub full_text: String,
}

/// Where a summary came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    /// Parsed from the model's structured output.
    #[default]
    Model,
    /// Built from document metadata because the model output was unusable.
    Template,
}

/// Reference from a summary section back to the bill text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Human-readable label, e.g. `Sec. 2`.
    #[serde(default)]
    pub label: String,
    /// Section identifier in the source markup.
    #[serde(default)]
    pub section_id: String,
}

/// One entry of the section-by-section breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySection {
    /// Section heading.
    #[serde(default)]
    pub title: String,
    /// Plain-language explanation.
    #[serde(default)]
    pub text: String,
    /// Supporting citations.
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Structured output of the summarization service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    /// Narrative summary.
    #[serde(default)]
    pub summary: String,
    /// One-line tagline.
    #[serde(default)]
    pub tagline: String,
    /// Policy areas the bill touches.
    #[serde(default)]
    pub impact_areas: Vec<String>,
    /// Section-by-section breakdown.
    #[serde(default)]
    pub structured_summary: Vec<SummarySection>,
    /// Origin of this summary.
    #[serde(default)]
    pub source: SummarySource,
}
