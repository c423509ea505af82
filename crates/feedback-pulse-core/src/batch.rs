//! Bulk analysis with bounded concurrency.
//!
//! [`BatchController`] partitions a selection of IDs into fixed-size
//! batches. Every item in a batch is dispatched at once and the batch is
//! awaited until all items settle (`join_all`), then the next batch starts.
//! Batches are strictly sequential; items within a batch are unordered.
//!
//! Failures are recorded per item and never abort the run. Progress is
//! reported once per batch, not per item, and a single
//! [`BatchEvent::Finished`] marks the point where dependent views should
//! be refreshed.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;

use crate::analysis::{analyze_feedback, AnalysisOutcome, AnalyzeOptions};
use crate::completion::CompletionService;
use crate::store::FeedbackStore;

/// Default number of analyses in flight per batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// A progress notification from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// A batch settled. `completed` counts items attempted so far.
    BatchSettled {
        batch: usize,
        batches: usize,
        completed: usize,
        total: usize,
        failed: usize,
    },
    /// All batches settled. Emitted exactly once per run.
    Finished { succeeded: usize, failed: usize },
}

/// Receives [`BatchEvent`]s as a run progresses.
pub trait BatchProgressReporter: Send + Sync {
    fn report(&self, event: BatchEvent);
}

/// Reporter that discards every event.
pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchEvent) {}
}

/// Outcome of one item in a run.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome<T> {
    pub id: i64,
    #[serde(flatten)]
    pub result: ItemResult<T>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ItemResult<T> {
    Ok { value: T },
    Failed { error: String },
}

impl<T> ItemOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self.result, ItemResult::Ok { .. })
    }
}

/// Aggregated result of a run, items in selection order.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub items: Vec<ItemOutcome<T>>,
    pub batches: usize,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}

/// Remove repeated IDs, keeping the first occurrence of each.
pub fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Fixed-width batch sequencer.
#[derive(Debug, Clone, Copy)]
pub struct BatchController {
    batch_size: usize,
}

impl Default for BatchController {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchController {
    /// A zero batch size is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run `task` over every distinct ID in `ids`.
    pub async fn run<T, E, F, Fut>(
        &self,
        ids: &[i64],
        task: F,
        reporter: &dyn BatchProgressReporter,
    ) -> BatchReport<T>
    where
        F: Fn(i64) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let ids = dedup_ids(ids);
        let total = ids.len();
        let batches = total.div_ceil(self.batch_size);
        let mut items = Vec::with_capacity(total);
        let mut completed = 0;

        for (index, batch) in ids.chunks(self.batch_size).enumerate() {
            let settled = join_all(batch.iter().map(|&id| {
                let fut = task(id);
                async move { (id, fut.await) }
            }))
            .await;

            let mut failed = 0;
            for (id, result) in settled {
                let result = match result {
                    Ok(value) => ItemResult::Ok { value },
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(id, error = %e, "bulk item failed");
                        ItemResult::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                items.push(ItemOutcome { id, result });
            }

            completed += batch.len();
            reporter.report(BatchEvent::BatchSettled {
                batch: index + 1,
                batches,
                completed,
                total,
                failed,
            });
        }

        let report = BatchReport { items, batches };
        reporter.report(BatchEvent::Finished {
            succeeded: report.succeeded(),
            failed: report.failed(),
        });
        report
    }
}

/// Analyze every ID in `ids` through [`analyze_feedback`] in batches.
pub async fn bulk_analyze<S, C>(
    store: &S,
    completion: &C,
    ids: &[i64],
    controller: BatchController,
    options: AnalyzeOptions,
    reporter: &dyn BatchProgressReporter,
) -> BatchReport<AnalysisOutcome>
where
    S: FeedbackStore + ?Sized,
    C: CompletionService + ?Sized,
{
    controller
        .run(
            ids,
            |id| analyze_feedback(store, completion, id, options),
            reporter,
        )
        .await
}
