//! In-memory [`FeedbackStore`] implementation for testing.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Filtering mirrors the
//! SQLite predicates: exact matches on vocabulary columns, an ASCII
//! case-insensitive substring match for search, and a lookback window
//! evaluated against the current clock on every call.

use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};

use crate::filter::FeedbackFilter;
use crate::models::{Analysis, FeedbackRecord, NewFeedback};

use super::{FeedbackPage, FeedbackStore, GroupCount, GroupField};

/// Timestamp format shared with the SQLite store.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn store_now() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn within_days(created_at: &str, days: i64) -> bool {
    match NaiveDateTime::parse_from_str(created_at, TIMESTAMP_FORMAT) {
        Ok(ts) => ts >= Utc::now().naive_utc() - Duration::days(days),
        Err(_) => false,
    }
}

/// In-memory store for tests.
pub struct InMemoryStore {
    records: RwLock<Vec<FeedbackRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(record: &FeedbackRecord, filter: &FeedbackFilter) -> bool {
    if let Some(source) = filter.source {
        if record.source != source.as_str() {
            return false;
        }
    }
    if filter.sentiment.is_some() && record.sentiment != filter.sentiment {
        return false;
    }
    if filter.urgency.is_some() && record.urgency != filter.urgency {
        return false;
    }
    if let Some(days) = filter.days {
        if !within_days(&record.created_at, days) {
            return false;
        }
    }
    if let Some(ref search) = filter.search {
        let haystack = record.content.to_ascii_lowercase();
        if !haystack.contains(&search.to_ascii_lowercase()) {
            return false;
        }
    }
    true
}

#[async_trait]
impl FeedbackStore for InMemoryStore {
    async fn list_feedback(&self, filter: &FeedbackFilter) -> Result<FeedbackPage> {
        let records = self.records.read().unwrap();
        let mut hits: Vec<&FeedbackRecord> = records.iter().filter(|r| matches(r, filter)).collect();
        hits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        let total = hits.len() as i64;
        let rows = hits
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(FeedbackPage { rows, total })
    }

    async fn get_feedback(&self, id: i64) -> Result<Option<FeedbackRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn apply_analysis(&self, id: i64, analysis: &Analysis) -> Result<bool> {
        let mut records = self.records.write().unwrap();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.sentiment = analysis.sentiment;
                record.sentiment_score = analysis.sentiment_score;
                record.themes = analysis.themes.clone();
                record.urgency = analysis.urgency;
                record.analyzed_at = Some(store_now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_total(&self) -> Result<i64> {
        Ok(self.records.read().unwrap().len() as i64)
    }

    async fn count_by(&self, field: GroupField) -> Result<Vec<GroupCount>> {
        let records = self.records.read().unwrap();
        let mut groups: Vec<GroupCount> = Vec::new();
        for record in records.iter() {
            let key = match field {
                GroupField::Source => Some(record.source.clone()),
                GroupField::Sentiment => record.sentiment.map(|s| s.as_str().to_string()),
                GroupField::Urgency => record.urgency.map(|u| u.as_str().to_string()),
            };
            match groups.iter_mut().find(|g| g.key == key) {
                Some(g) => g.count += 1,
                None => groups.push(GroupCount { key, count: 1 }),
            }
        }
        // SQLite returns groups ordered by key with NULL first.
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(groups)
    }

    async fn count_recent(&self, days: i64) -> Result<i64> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| within_days(&r.created_at, days))
            .count() as i64)
    }

    async fn theme_values(&self) -> Result<Vec<String>> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter_map(|r| r.themes.as_ref().map(|t| t.join()))
            .collect())
    }

    async fn unanalyzed_ids(&self, limit: Option<i64>) -> Result<Vec<i64>> {
        let records = self.records.read().unwrap();
        let mut pending: Vec<&FeedbackRecord> =
            records.iter().filter(|r| r.analyzed_at.is_none()).collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let take = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(pending.into_iter().take(take).map(|r| r.id).collect())
    }

    async fn insert_feedback(&self, item: &NewFeedback) -> Result<i64> {
        let created_at = match item.created_at {
            Some(ref ts) => NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
                .with_context(|| format!("invalid created_at: {}", ts))?
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            None => store_now(),
        };
        let mut records = self.records.write().unwrap();
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        records.push(FeedbackRecord {
            id,
            source: item.source.clone(),
            author: item.author.clone(),
            content: item.content.clone(),
            created_at,
            sentiment: None,
            sentiment_score: None,
            themes: None,
            urgency: None,
            analyzed_at: None,
        });
        Ok(id)
    }
}
