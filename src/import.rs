//! `fbp import`: load feedback records from a JSON or JSONL file.
//!
//! Accepts either a JSON array of objects or one object per line:
//!
//! ```json
//! { "source": "discord", "author": "@dev", "content": "Docs are great", "created_at": "2026-01-05T10:00:00Z" }
//! ```
//!
//! `created_at` may be RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare date; it is
//! normalized to the store's UTC text format. When absent, store time is used.
//! Analysis fields are never imported: new records start unanalyzed.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::Path;

use feedback_pulse_core::models::NewFeedback;
use feedback_pulse_core::store::memory::TIMESTAMP_FORMAT;
use feedback_pulse_core::store::FeedbackStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    let items = parse_import(&content)?;

    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let mut id_range: Option<(i64, i64)> = None;
    for item in &items {
        let id = store.insert_feedback(item).await?;
        id_range = Some(match id_range {
            Some((first, _)) => (first, id),
            None => (id, id),
        });
    }

    tracing::info!(count = items.len(), file = %path.display(), "imported feedback");
    println!("{}", import_summary(items.len(), id_range));

    pool.close().await;
    Ok(())
}

/// The ids are the first and last assigned; other writers may have taken
/// ids in between, so the range is only called contiguous when it is.
fn import_summary(count: usize, id_range: Option<(i64, i64)>) -> String {
    match id_range {
        Some((first, last)) if last - first + 1 == count as i64 => {
            format!("Imported {} records (ids {}..={}).", count, first, last)
        }
        Some((first, last)) => format!(
            "Imported {} records (first id {}, last id {}).",
            count, first, last
        ),
        None => "Imported 0 records.".to_string(),
    }
}

/// Parse and normalize an import payload. Fails on the first invalid record
/// so nothing is written from a partially bad file.
pub fn parse_import(content: &str) -> Result<Vec<NewFeedback>> {
    let trimmed = content.trim_start();
    let raw: Vec<NewFeedback> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).context("Invalid JSON array")?
    } else {
        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).with_context(|| format!("Invalid JSON on line {}", i + 1))
            })
            .collect::<Result<_>>()?
    };

    raw.into_iter()
        .enumerate()
        .map(|(i, item)| normalize(item).with_context(|| format!("record {}", i + 1)))
        .collect()
}

fn normalize(mut item: NewFeedback) -> Result<NewFeedback> {
    item.source = item.source.trim().to_lowercase();
    if item.source.is_empty() {
        bail!("source must not be empty");
    }
    if item.content.trim().is_empty() {
        bail!("content must not be empty");
    }
    item.author = item
        .author
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    item.created_at = match item.created_at.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(ts) => Some(normalize_timestamp(ts)?),
    };
    Ok(item)
}

/// Convert a timestamp to the store's `YYYY-MM-DD HH:MM:SS` UTC text.
pub fn normalize_timestamp(raw: &str) -> Result<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc().format(TIMESTAMP_FORMAT).to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Ok(dt.format(TIMESTAMP_FORMAT).to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.format(TIMESTAMP_FORMAT).to_string());
        }
    }
    bail!("unrecognized timestamp '{}'", raw)
}
