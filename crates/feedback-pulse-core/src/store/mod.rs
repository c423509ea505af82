//! Storage abstraction for Feedback Pulse.
//!
//! The [`FeedbackStore`] trait defines every storage operation the listing,
//! stats, and analysis pipelines need, so the same core logic runs against
//! SQLite in production and [`memory::InMemoryStore`] in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::filter::FeedbackFilter;
use crate::models::{Analysis, FeedbackRecord, NewFeedback};

/// Columns the stats aggregator may group by.
///
/// A closed set, so group-by column names are never taken from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Source,
    Sentiment,
    Urgency,
}

impl GroupField {
    pub fn column(&self) -> &'static str {
        match self {
            GroupField::Source => "source",
            GroupField::Sentiment => "sentiment",
            GroupField::Urgency => "urgency",
        }
    }
}

/// One row of a grouped count. `key` is `None` for the null group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub key: Option<String>,
    pub count: i64,
}

/// One page of records plus the filter-wide total.
#[derive(Debug, Clone)]
pub struct FeedbackPage {
    pub rows: Vec<FeedbackRecord>,
    pub total: i64,
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_feedback`](FeedbackStore::list_feedback) | Filtered page + exact total |
/// | [`get_feedback`](FeedbackStore::get_feedback) | Single record by ID |
/// | [`apply_analysis`](FeedbackStore::apply_analysis) | Overwrite the five analysis fields |
/// | [`count_total`](FeedbackStore::count_total) | Row count |
/// | [`count_by`](FeedbackStore::count_by) | Grouped count over one column |
/// | [`count_recent`](FeedbackStore::count_recent) | Rows created within N days |
/// | [`theme_values`](FeedbackStore::theme_values) | All non-null persisted theme strings |
/// | [`unanalyzed_ids`](FeedbackStore::unanalyzed_ids) | IDs never analyzed, newest first |
/// | [`insert_feedback`](FeedbackStore::insert_feedback) | Seed a record |
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Fetch one page of records matching `filter`, with the total count
    /// computed over the identical predicate set.
    async fn list_feedback(&self, filter: &FeedbackFilter) -> Result<FeedbackPage>;

    async fn get_feedback(&self, id: i64) -> Result<Option<FeedbackRecord>>;

    /// Overwrite `sentiment`, `sentiment_score`, `themes`, `urgency` and set
    /// `analyzed_at` to store time. Returns `false` when no row has `id`.
    async fn apply_analysis(&self, id: i64, analysis: &Analysis) -> Result<bool>;

    async fn count_total(&self) -> Result<i64>;

    async fn count_by(&self, field: GroupField) -> Result<Vec<GroupCount>>;

    async fn count_recent(&self, days: i64) -> Result<i64>;

    async fn theme_values(&self) -> Result<Vec<String>>;

    async fn unanalyzed_ids(&self, limit: Option<i64>) -> Result<Vec<i64>>;

    /// Insert a record and return its store-assigned ID.
    async fn insert_feedback(&self, item: &NewFeedback) -> Result<i64>;
}
