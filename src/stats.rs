//! `fbp stats`: print the aggregate report.
//!
//! Uses the same [`compute_stats`] as `GET /api/stats`, so the terminal view
//! and the dashboard never disagree.

use anyhow::Result;

use feedback_pulse_core::stats::{compute_stats, StatsReport, RECENT_WINDOW_DAYS};

use crate::config::Config;
use crate::db;
use crate::progress::format_number;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: compute the report and print it (or emit JSON).
pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let report = compute_stats(&store).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(config, &report);
    }
    Ok(())
}

fn print_report(config: &Config, report: &StatsReport) {
    println!("Feedback Pulse: Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Total:       {}", format_number(report.total as u64));
    println!(
        "  Last {} days: {}",
        RECENT_WINDOW_DAYS,
        format_number(report.recent_count as u64)
    );

    print_group(
        "By source",
        "SOURCE",
        report.total,
        report
            .by_source
            .iter()
            .map(|c| (c.source.as_deref(), c.count)),
    );
    print_group(
        "By sentiment",
        "SENTIMENT",
        report.total,
        report
            .by_sentiment
            .iter()
            .map(|c| (c.sentiment.as_deref(), c.count)),
    );
    print_group(
        "By urgency",
        "URGENCY",
        report.total,
        report
            .by_urgency
            .iter()
            .map(|c| (c.urgency.as_deref(), c.count)),
    );

    if !report.top_themes.is_empty() {
        println!();
        println!("  Top themes:");
        for t in &report.top_themes {
            println!("    {:<24} {:>6}", t.theme, t.count);
        }
    }
}

fn print_group<'a>(
    title: &str,
    header: &str,
    total: i64,
    rows: impl Iterator<Item = (Option<&'a str>, i64)>,
) {
    let rows: Vec<_> = rows.collect();
    if rows.is_empty() {
        return;
    }
    println!();
    println!("  {}:", title);
    println!("    {:<24} {:>6} {:>6}", header, "COUNT", "SHARE");
    println!("    {}", "-".repeat(38));
    for (key, count) in rows {
        println!(
            "    {:<24} {:>6} {:>5}%",
            key.unwrap_or("(unanalyzed)"),
            count,
            percent(count, total)
        );
    }
}

fn percent(count: i64, total: i64) -> i64 {
    if total > 0 {
        (count * 100) / total
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_empty_table() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
    }
}
