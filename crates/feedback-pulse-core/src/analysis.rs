//! AI analysis of a single feedback record.
//!
//! # Pipeline
//!
//! ```text
//! fetch ──▶ prompt ──▶ complete ──▶ extract {…} ──▶ validate ──▶ persist ──▶ reload
//!   │                                   │
//!   └─ NotFound                         └─ MalformedResponse (no write)
//! ```
//!
//! Parsing is two stages. [`extract_json_span`] finds the first balanced
//! `{...}` in the raw model text, ignoring surrounding prose or markdown
//! fences. [`parse_analysis`] then validates that object field by field:
//! an invalid field becomes `None` instead of failing the whole analysis.
//!
//! The orchestrator is single-shot. Retries are the caller's business, and
//! the persist step is an unconditional overwrite (last write wins).

use serde::Serialize;
use serde_json::Value;

use crate::completion::CompletionService;
use crate::models::{Analysis, FeedbackRecord, Sentiment, Urgency};
use crate::store::FeedbackStore;
use crate::themes::Themes;

/// Labels the model is asked to choose themes from. The model is not
/// constrained to them, so output is validated structurally only.
pub const THEME_VOCABULARY: [&str; 10] = [
    "documentation",
    "pricing",
    "performance",
    "onboarding",
    "bugs",
    "feature-request",
    "ux",
    "support",
    "security",
    "billing",
];

/// Default output-length hint passed to the completion service.
pub const DEFAULT_MAX_TOKENS: u32 = 200;

/// Errors surfaced by [`analyze_feedback`].
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Missing feedback ID")]
    MissingId,
    #[error("Invalid feedback ID: '{0}'")]
    InvalidId(String),
    #[error("Feedback not found: {0}")]
    NotFound(i64),
    #[error("Failed to parse AI analysis: {reason}")]
    MalformedResponse { reason: String, raw: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Parse a path/CLI identifier into a record ID.
pub fn parse_feedback_id(raw: &str) -> Result<i64, AnalysisError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AnalysisError::MissingId);
    }
    raw.parse::<i64>()
        .map_err(|_| AnalysisError::InvalidId(raw.to_string()))
}

/// Build the fixed instruction prompt for one record.
pub fn build_prompt(content: &str) -> String {
    format!(
        r#"Analyze this customer feedback and respond with ONLY a JSON object (no markdown, no explanation):
{{
  "sentiment": "positive" or "neutral" or "negative",
  "sentiment_score": number from 0-100 (0=very negative, 50=neutral, 100=very positive),
  "themes": ["theme1", "theme2"] (choose from: {vocabulary}),
  "urgency": "low" or "medium" or "high"
}}

Feedback: "{content}""#,
        vocabulary = THEME_VOCABULARY.join(", "),
        content = content,
    )
}

/// Return the first balanced `{...}` span in `raw`.
///
/// Braces inside JSON string literals (including escaped quotes) do not
/// count toward balance. Returns `None` when no opening brace is ever
/// closed.
pub fn extract_json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&raw[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

fn whole_score(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n,
        _ => return None,
    };
    let score = match n.as_i64() {
        Some(i) => i,
        None => {
            let f = n.as_f64()?;
            if f.fract() != 0.0 {
                return None;
            }
            f as i64
        }
    };
    (0..=100).contains(&score).then_some(score)
}

fn normalize_themes(value: &Value) -> Option<Themes> {
    match value {
        Value::Array(items) => Themes::from_labels(items.iter().filter_map(Value::as_str)),
        Value::String(s) => Themes::parse(s),
        _ => None,
    }
}

fn vocabulary_field<T: std::str::FromStr>(object: &Value, field: &str) -> Option<T> {
    let raw = object.get(field)?.as_str()?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(field, value = raw, "dropping out-of-domain analysis value");
            None
        }
    }
}

/// Parse raw model output into a validated [`Analysis`].
///
/// Fails only when no JSON object can be located or parsed. Field-level
/// problems (non-integer score, unknown sentiment, non-array themes) null
/// the offending field.
pub fn parse_analysis(raw: &str) -> Result<Analysis, AnalysisError> {
    let malformed = |reason: String| AnalysisError::MalformedResponse {
        reason,
        raw: raw.to_string(),
    };

    let span = extract_json_span(raw).ok_or_else(|| malformed("No JSON found in response".into()))?;
    let object: Value =
        serde_json::from_str(span).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
    if !object.is_object() {
        return Err(malformed("expected a JSON object".into()));
    }

    Ok(Analysis {
        sentiment: vocabulary_field::<Sentiment>(&object, "sentiment"),
        sentiment_score: object.get("sentiment_score").and_then(whole_score),
        themes: object.get("themes").and_then(normalize_themes),
        urgency: vocabulary_field::<Urgency>(&object, "urgency"),
    })
}

/// Per-call options for [`analyze_feedback`].
#[derive(Debug, Clone, Copy)]
pub struct AnalyzeOptions {
    pub max_tokens: u32,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Result of a successful analysis: the validated tuple and the record as
/// reloaded from the store after the write.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub analysis: Analysis,
    pub feedback: FeedbackRecord,
}

/// Analyze one record end to end and persist the result.
pub async fn analyze_feedback<S, C>(
    store: &S,
    completion: &C,
    id: i64,
    options: AnalyzeOptions,
) -> Result<AnalysisOutcome, AnalysisError>
where
    S: FeedbackStore + ?Sized,
    C: CompletionService + ?Sized,
{
    let record = store
        .get_feedback(id)
        .await?
        .ok_or(AnalysisError::NotFound(id))?;

    let prompt = build_prompt(&record.content);
    let raw = completion.complete(&prompt, options.max_tokens).await?;

    let analysis = match parse_analysis(&raw) {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(id, model = completion.model_name(), raw = %raw, "unparseable analysis response");
            return Err(e);
        }
    };

    if !store.apply_analysis(id, &analysis).await? {
        return Err(AnalysisError::NotFound(id));
    }

    let feedback = store
        .get_feedback(id)
        .await?
        .ok_or(AnalysisError::NotFound(id))?;

    tracing::info!(
        id,
        sentiment = ?analysis.sentiment,
        urgency = ?analysis.urgency,
        "analysis persisted"
    );

    Ok(AnalysisOutcome { analysis, feedback })
}
