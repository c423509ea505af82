//! Core data models used throughout Feedback Pulse.
//!
//! These types represent feedback records as they are stored and served,
//! the closed vocabularies (source, sentiment, urgency) used by filters and
//! analysis, and the normalized analysis tuple written back to the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::themes::Themes;

/// Channel a piece of feedback was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Discord,
    Github,
    Twitter,
    Support,
    Email,
    Forum,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Discord,
        Source::Github,
        Source::Twitter,
        Source::Support,
        Source::Email,
        Source::Forum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Discord => "discord",
            Source::Github => "github",
            Source::Twitter => "twitter",
            Source::Support => "support",
            Source::Email => "email",
            Source::Forum => "forum",
        }
    }
}

/// Overall tone of a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

/// How quickly a feedback record needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub const ALL: [Urgency; 3] = [Urgency::Low, Urgency::Medium, Urgency::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }
}

/// Error returned when a string is not a member of a closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{value}' (expected one of: {expected})")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

macro_rules! vocabulary_impls {
    ($ty:ty, $kind:literal) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                <$ty>::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(needle))
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                        expected: <$ty>::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary_impls!(Source, "source");
vocabulary_impls!(Sentiment, "sentiment");
vocabulary_impls!(Urgency, "urgency");

/// A single piece of ingested feedback, as stored and served.
///
/// `source` is kept as the raw ingested string: ingestion happens outside
/// this system, so the record must round-trip whatever it was given.
/// Timestamps use the store's `YYYY-MM-DD HH:MM:SS` UTC text format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub source: String,
    pub author: Option<String>,
    pub content: String,
    pub created_at: String,
    pub sentiment: Option<Sentiment>,
    pub sentiment_score: Option<i64>,
    pub themes: Option<Themes>,
    pub urgency: Option<Urgency>,
    pub analyzed_at: Option<String>,
}

impl FeedbackRecord {
    /// True once any analysis field has been written.
    pub fn is_analyzed(&self) -> bool {
        self.analyzed_at.is_some()
    }
}

/// A feedback record about to be inserted (seed/import path).
#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    pub source: String,
    #[serde(default)]
    pub author: Option<String>,
    pub content: String,
    /// Store time is used when absent.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The normalized analysis tuple written to a record.
///
/// Every field is optional: invalid model output degrades field by field
/// instead of rejecting the whole analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analysis {
    pub sentiment: Option<Sentiment>,
    pub sentiment_score: Option<i64>,
    #[serde(serialize_with = "crate::themes::serialize_as_list")]
    pub themes: Option<Themes>,
    pub urgency: Option<Urgency>,
}

/// Decode a stored vocabulary column, tolerating out-of-domain values.
pub fn decode_lenient<T: FromStr<Err = UnknownVariant>>(
    column: &str,
    raw: Option<&str>,
) -> Option<T> {
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(column, value = raw, error = %e, "ignoring out-of-domain stored value");
            None
        }
    }
}
