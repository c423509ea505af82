//! Listing filters and pagination metadata.
//!
//! [`RawFilterParams`] is the untrusted, stringly-typed input coming from a
//! query string or CLI flags. [`FeedbackFilter::from_raw`] validates it into
//! a typed [`FeedbackFilter`] that the query builder and stores consume.

use serde::{Deserialize, Serialize};

use crate::models::{Sentiment, Source, UnknownVariant, Urgency};

/// Page size used when the request does not specify one.
pub const DEFAULT_LIMIT: i64 = 20;
/// Largest page size a request may ask for; larger values are clamped.
pub const MAX_LIMIT: i64 = 100;
/// Longest lookback window applied as a predicate. Larger windows reach past
/// any stored record and the store's date arithmetic overflows, so they
/// are treated as "no window".
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Unvalidated listing parameters, exactly as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFilterParams {
    pub source: Option<String>,
    pub sentiment: Option<String>,
    pub urgency: Option<String>,
    pub days: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Page-size policy applied while validating filters.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

/// Validation failure for listing parameters. Always user-correctable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error(transparent)]
    Vocabulary(#[from] UnknownVariant),
    #[error("{field} must be a positive integer, got '{value}'")]
    NotPositive { field: &'static str, value: String },
    #[error("offset must be a non-negative integer, got '{0}'")]
    BadOffset(String),
}

/// A validated listing request. All predicates are optional and conjunctive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackFilter {
    pub source: Option<Source>,
    pub sentiment: Option<Sentiment>,
    pub urgency: Option<Urgency>,
    /// Lookback window in days, relative to store time.
    pub days: Option<i64>,
    /// Case-insensitive substring matched against `content`.
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for FeedbackFilter {
    fn default() -> Self {
        Self {
            source: None,
            sentiment: None,
            urgency: None,
            days: None,
            search: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn positive(field: &'static str, raw: &str) -> Result<i64, FilterError> {
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(FilterError::NotPositive {
            field,
            value: raw.to_string(),
        }),
    }
}

impl FeedbackFilter {
    /// Validate raw parameters.
    ///
    /// Empty values count as absent. `limit` above `limits.max_limit` is
    /// clamped; zero, negative, or non-numeric `limit`/`days`/`offset` are
    /// rejected so no unbounded or negative-offset query can be produced.
    /// `days` beyond [`MAX_LOOKBACK_DAYS`] drops the window predicate.
    pub fn from_raw(raw: &RawFilterParams, limits: PageLimits) -> Result<Self, FilterError> {
        let source = present(&raw.source).map(str::parse::<Source>).transpose()?;
        let sentiment = present(&raw.sentiment)
            .map(str::parse::<Sentiment>)
            .transpose()?;
        let urgency = present(&raw.urgency)
            .map(str::parse::<Urgency>)
            .transpose()?;
        let days = present(&raw.days)
            .map(|d| positive("days", d))
            .transpose()?
            .filter(|d| *d <= MAX_LOOKBACK_DAYS);
        let limit = match present(&raw.limit) {
            Some(l) => positive("limit", l)?.min(limits.max_limit),
            None => limits.default_limit,
        };
        let offset = match present(&raw.offset) {
            Some(o) => match o.parse::<i64>() {
                Ok(n) if n >= 0 => n,
                _ => return Err(FilterError::BadOffset(o.to_string())),
            },
            None => 0,
        };
        // Search keeps its inner whitespace; only all-blank input is dropped.
        let search = raw
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);

        Ok(Self {
            source,
            sentiment,
            urgency,
            days,
            search,
            limit,
            offset,
        })
    }
}

/// Pagination metadata returned alongside a page of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub pages: i64,
    pub current_page: i64,
}

impl PageMeta {
    /// `limit` must be positive; [`FeedbackFilter::from_raw`] guarantees it.
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        let limit = limit.max(1);
        let pages = if total <= 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            total,
            limit,
            offset,
            pages,
            current_page: offset / limit + 1,
        }
    }
}
