//! `fbp list`: filtered, paginated listing from the terminal.
//!
//! Flags go through the same [`FeedbackFilter::from_raw`] validation as the
//! HTTP query string, so `--limit 0` or `--sentiment happy` fail the same way
//! they would with a 400.

use anyhow::Result;
use serde_json::json;

use feedback_pulse_core::filter::{FeedbackFilter, PageMeta, RawFilterParams};
use feedback_pulse_core::models::FeedbackRecord;
use feedback_pulse_core::store::FeedbackStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

const EXCERPT_CHARS: usize = 120;

pub async fn run_list(config: &Config, raw: RawFilterParams, json_output: bool) -> Result<()> {
    let filter = FeedbackFilter::from_raw(&raw, config.query.page_limits())?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let page = store.list_feedback(&filter).await?;
    let meta = PageMeta::new(page.total, filter.limit, filter.offset);

    if json_output {
        let body = json!({ "data": page.rows, "meta": meta });
        println!("{}", serde_json::to_string_pretty(&body)?);
        pool.close().await;
        return Ok(());
    }

    if page.rows.is_empty() {
        println!("No feedback.");
        pool.close().await;
        return Ok(());
    }

    for record in &page.rows {
        print_record(record);
    }
    println!(
        "page {} of {} ({} total)",
        meta.current_page, meta.pages, meta.total
    );

    pool.close().await;
    Ok(())
}

fn print_record(record: &FeedbackRecord) {
    println!(
        "#{} [{}] {} / {}",
        record.id,
        record.created_at,
        record.source,
        record.author.as_deref().unwrap_or("(anonymous)")
    );
    if record.is_analyzed() {
        println!(
            "    sentiment: {} ({})  urgency: {}",
            record.sentiment.map(|s| s.as_str()).unwrap_or("-"),
            record
                .sentiment_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.urgency.map(|u| u.as_str()).unwrap_or("-"),
        );
        if let Some(themes) = &record.themes {
            println!("    themes: {}", themes.join());
        }
    } else {
        println!("    (not analyzed)");
    }
    println!("    \"{}\"", excerpt(&record.content));
    println!();
}

fn excerpt(content: &str) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}
