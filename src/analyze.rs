//! `fbp analyze`: run AI analysis from the terminal.
//!
//! A single ID goes straight through [`analyze_feedback`] and prints the
//! resulting tuple. Several IDs, or `--unanalyzed`, go through the batch
//! controller with progress on stderr; stats are recomputed once after the
//! last batch settles.

use anyhow::{bail, Result};

use feedback_pulse_core::analysis::{
    analyze_feedback, parse_feedback_id, AnalysisError, AnalysisOutcome, AnalyzeOptions,
};
use feedback_pulse_core::batch::{bulk_analyze, dedup_ids, BatchController, ItemResult};
use feedback_pulse_core::completion::CompletionService;
use feedback_pulse_core::stats::compute_stats;
use feedback_pulse_core::store::FeedbackStore;

use crate::completion::create_completion;
use crate::config::Config;
use crate::db;
use crate::progress::ProgressMode;
use crate::sqlite_store::SqliteStore;

/// Selection and tuning flags for `fbp analyze`.
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    pub ids: Vec<String>,
    pub unanalyzed: bool,
    pub limit: Option<i64>,
    pub batch_size: Option<usize>,
    pub progress: ProgressMode,
}

pub async fn run_analyze(config: &Config, args: AnalyzeArgs) -> Result<()> {
    if args.ids.is_empty() && !args.unanalyzed {
        bail!("Specify one or more feedback IDs, or pass --unanalyzed.");
    }
    if let Some(limit) = args.limit {
        if limit < 1 {
            bail!("--limit must be >= 1");
        }
    }

    let mut ids = args
        .ids
        .iter()
        .map(|raw| parse_feedback_id(raw))
        .collect::<Result<Vec<i64>, AnalysisError>>()?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let completion = create_completion(&config.completion)?;
    let options = AnalyzeOptions {
        max_tokens: config.analysis.max_tokens,
    };

    if args.unanalyzed {
        ids.extend(store.unanalyzed_ids(args.limit).await?);
    }
    let ids = dedup_ids(&ids);

    let result = if ids.len() == 1 && !args.unanalyzed {
        analyze_one(&store, completion.as_ref(), ids[0], options).await
    } else {
        let batch_size = args.batch_size.unwrap_or(config.analysis.batch_size);
        analyze_many(
            &store,
            completion.as_ref(),
            &ids,
            BatchController::new(batch_size),
            options,
            args.progress,
        )
        .await
    };

    pool.close().await;
    result
}

async fn analyze_one(
    store: &SqliteStore,
    completion: &dyn CompletionService,
    id: i64,
    options: AnalyzeOptions,
) -> Result<()> {
    match analyze_feedback(store, completion, id, options).await {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(AnalysisError::MalformedResponse { reason, raw }) => {
            eprintln!("Raw model response:\n{}", raw);
            bail!("Failed to parse AI analysis for #{}: {}", id, reason)
        }
        Err(e) => Err(e.into()),
    }
}

async fn analyze_many(
    store: &SqliteStore,
    completion: &dyn CompletionService,
    ids: &[i64],
    controller: BatchController,
    options: AnalyzeOptions,
    progress: ProgressMode,
) -> Result<()> {
    if ids.is_empty() {
        println!("Nothing to analyze.");
        return Ok(());
    }

    let reporter = progress.reporter();
    let report = bulk_analyze(
        store,
        completion,
        ids,
        controller,
        options,
        reporter.as_ref(),
    )
    .await;

    // Refresh once, after the whole selection settled.
    let stats = compute_stats(store).await?;

    for item in &report.items {
        match &item.result {
            ItemResult::Ok { value } => print_outcome(value),
            ItemResult::Failed { error } => println!("#{}  FAILED  {}", item.id, error),
        }
    }
    println!();
    println!(
        "Analyzed {} of {} records in {} batches ({} failed).",
        report.succeeded(),
        report.items.len(),
        report.batches,
        report.failed()
    );
    let unanalyzed = stats
        .by_sentiment
        .iter()
        .find(|c| c.sentiment.is_none())
        .map(|c| c.count)
        .unwrap_or(0);
    println!(
        "Totals: {} records, {} without sentiment.",
        stats.total, unanalyzed
    );

    if report.failed() > 0 {
        bail!(
            "{} of {} analyses failed",
            report.failed(),
            report.items.len()
        );
    }
    Ok(())
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let a = &outcome.analysis;
    println!(
        "#{}  sentiment: {} ({})  urgency: {}  themes: {}",
        outcome.feedback.id,
        a.sentiment.map(|s| s.as_str()).unwrap_or("-"),
        a.sentiment_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        a.urgency.map(|u| u.as_str()).unwrap_or("-"),
        a.themes
            .as_ref()
            .map(|t| t.join())
            .unwrap_or_else(|| "-".to_string()),
    );
}
