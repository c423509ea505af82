//! Global feedback statistics.
//!
//! [`compute_stats`] combines five aggregate queries (total, by source, by
//! sentiment, by urgency, recent) with an in-process theme tally. The tally
//! cannot be pushed down to the store because themes are persisted as a
//! flat comma-joined string; it is O(analyzed rows × themes per row).
//!
//! Stats are never filtered and never cached.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;

use crate::store::{FeedbackStore, GroupCount, GroupField};
use crate::themes::split_labels;

/// Fixed window for [`StatsReport::recent_count`].
pub const RECENT_WINDOW_DAYS: i64 = 7;
/// Maximum number of entries in [`StatsReport::top_themes`].
pub const TOP_THEMES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentimentCount {
    pub sentiment: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrgencyCount {
    pub urgency: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeCount {
    pub theme: String,
    pub count: i64,
}

/// Aggregate summary over all feedback, recomputed on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub total: i64,
    pub by_source: Vec<SourceCount>,
    pub by_sentiment: Vec<SentimentCount>,
    pub by_urgency: Vec<UrgencyCount>,
    pub recent_count: i64,
    pub top_themes: Vec<ThemeCount>,
}

/// Count theme labels across persisted theme strings.
///
/// Ranked by count descending. Ties keep first-seen order (stable sort
/// over insertion order), so output is deterministic for a given input
/// order. Truncated to `top`.
pub fn tally_themes<'a, I>(values: I, top: usize) -> Vec<ThemeCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut counts: Vec<ThemeCount> = Vec::new();

    for value in values {
        for label in split_labels(value) {
            match index.get(label) {
                Some(&i) => counts[i].count += 1,
                None => {
                    index.insert(label, counts.len());
                    counts.push(ThemeCount {
                        theme: label.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(top);
    counts
}

fn into_pairs<T>(groups: Vec<GroupCount>, make: impl Fn(Option<String>, i64) -> T) -> Vec<T> {
    groups.into_iter().map(|g| make(g.key, g.count)).collect()
}

/// Compute a [`StatsReport`] from the current store state.
pub async fn compute_stats<S: FeedbackStore + ?Sized>(store: &S) -> Result<StatsReport> {
    let total = store.count_total().await?;
    let by_source = into_pairs(store.count_by(GroupField::Source).await?, |source, count| {
        SourceCount { source, count }
    });
    let by_sentiment = into_pairs(
        store.count_by(GroupField::Sentiment).await?,
        |sentiment, count| SentimentCount { sentiment, count },
    );
    let by_urgency = into_pairs(store.count_by(GroupField::Urgency).await?, |urgency, count| {
        UrgencyCount { urgency, count }
    });
    let recent_count = store.count_recent(RECENT_WINDOW_DAYS).await?;

    let theme_values = store.theme_values().await?;
    let top_themes = tally_themes(theme_values.iter().map(String::as_str), TOP_THEMES);

    tracing::debug!(
        total,
        recent_count,
        distinct_themes = top_themes.len(),
        "computed stats"
    );

    Ok(StatsReport {
        total,
        by_source,
        by_sentiment,
        by_urgency,
        recent_count,
        top_themes,
    })
}
