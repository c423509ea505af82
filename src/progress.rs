//! Bulk-analysis progress reporting.
//!
//! Reports observable progress during `fbp analyze` so operators see how many
//! records have been attempted and how many failed. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use feedback_pulse_core::batch::{BatchEvent, BatchProgressReporter, NoProgress};

/// Human-friendly progress on stderr: "analyze  batch 2/3  6 / 7 records  (1 failed)".
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchEvent) {
        let line = match &event {
            BatchEvent::BatchSettled {
                batch,
                batches,
                completed,
                total,
                failed,
            } => {
                let failed_note = if *failed > 0 {
                    format!("  ({} failed)", failed)
                } else {
                    String::new()
                };
                format!(
                    "analyze  batch {}/{}  {} / {} records{}\n",
                    batch,
                    batches,
                    format_number(*completed as u64),
                    format_number(*total as u64),
                    failed_note
                )
            }
            BatchEvent::Finished { succeeded, failed } => format!(
                "analyze  done  {} succeeded, {} failed\n",
                format_number(*succeeded as u64),
                format_number(*failed as u64)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchEvent) {
        let obj = match &event {
            BatchEvent::BatchSettled {
                batch,
                batches,
                completed,
                total,
                failed,
            } => serde_json::json!({
                "event": "progress",
                "batch": batch,
                "batches": batches,
                "n": completed,
                "total": total,
                "failed": failed
            }),
            BatchEvent::Finished { succeeded, failed } => serde_json::json!({
                "event": "finished",
                "succeeded": succeeded,
                "failed": failed
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
