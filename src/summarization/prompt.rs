//! Prompt assembly, model-output parsing, and the templated fallback summary.

use serde_json::Value;

use super::types::{BillSummary, SummaryRequest, SummarySection, SummarySource};

/// Character budget for bill text embedded in a prompt.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 60_000;

const OVERVIEW_EXCERPT_CHARS: usize = 600;

/// Build the structured-summary prompt, truncating the bill text to `max_text_chars`.
pub fn build_prompt(request: &SummaryRequest, max_text_chars: usize) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "System: You analyze United States legislation for a general audience. Be neutral and \
         factual. Never speculate beyond the text. Respond with a single JSON object with the keys \
         \"summary\" (string, 3-6 sentences), \"tagline\" (string, one sentence), \"impactAreas\" \
         (array of short strings), and \"structuredSummary\" (array of objects with \"title\", \
         \"text\", and \"citations\", where each citation has \"label\" and \"sectionId\").\n\n",
    );

    prompt.push_str(&format!(
        "Bill: {} ({}th Congress), version {}\n",
        request.bill.label(),
        request.bill.congress,
        request.version_code
    ));
    prompt.push_str(&format!("Title: {}\n", request.title));
    if let Some(sponsor) = request.sponsor.as_deref() {
        prompt.push_str(&format!("Sponsor: {sponsor}\n"));
    }
    if !request.committees.is_empty() {
        prompt.push_str(&format!("Committees: {}\n", request.committees.join("; ")));
    }
    if let Some(date) = request.action_date.as_deref() {
        prompt.push_str(&format!("Latest action: {date}\n"));
    }

    let (text, truncated) = truncate_chars(&request.full_text, max_text_chars);
    prompt.push_str("\nBill text:\n");
    prompt.push_str(text);
    if truncated {
        prompt.push_str("\n[Text truncated]");
    }
    prompt.push('\n');
    prompt
}

/// Parse the model's reply. Code fences around the JSON object are tolerated.
///
/// The object must carry a string `summary` and an array `structuredSummary`; any other shape is
/// treated as malformed so the caller falls back to the templated summary.
pub fn parse_model_output(raw: &str) -> Option<BillSummary> {
    let body = strip_code_fence(raw.trim());
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&body[start..=end]).ok()?;
    let has_shape = value.get("summary").is_some_and(Value::is_string)
        && value.get("structuredSummary").is_some_and(Value::is_array);
    if !has_shape {
        return None;
    }
    let mut summary: BillSummary = serde_json::from_value(value).ok()?;
    summary.source = SummarySource::Model;
    Some(summary)
}

/// Deterministic summary built from document metadata alone.
pub fn fallback_summary(request: &SummaryRequest) -> BillSummary {
    let label = request.bill.label();
    let mut summary = format!("{label}, \"{}\"", request.title.trim());
    if let Some(sponsor) = request.sponsor.as_deref() {
        summary.push_str(&format!(", sponsored by {sponsor}"));
    }
    summary.push_str(&format!(
        ", was published as version \"{}\" in the {}th Congress",
        request.version_code, request.bill.congress
    ));
    if let Some(date) = request.action_date.as_deref() {
        summary.push_str(&format!(" with its latest action on {date}"));
    }
    summary.push('.');
    if !request.committees.is_empty() {
        summary.push_str(&format!(
            " It was referred to the {}.",
            request.committees.join(" and the ")
        ));
    }

    let (excerpt, truncated) = truncate_chars(request.full_text.trim(), OVERVIEW_EXCERPT_CHARS);
    let overview = if excerpt.is_empty() {
        summary.clone()
    } else if truncated {
        format!("{excerpt}...")
    } else {
        excerpt.to_string()
    };

    BillSummary {
        tagline: format!("{label}: {}", request.title.trim()),
        summary,
        impact_areas: Vec::new(),
        structured_summary: vec![SummarySection {
            title: "Overview".into(),
            text: overview,
            citations: Vec::new(),
        }],
        source: SummarySource::Template,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}
