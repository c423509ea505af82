//! # Feedback Pulse CLI (`fbp`)
//!
//! The `fbp` binary is the primary interface for Feedback Pulse. It provides
//! commands for database initialization, importing feedback, listing and
//! aggregating it, running AI analysis, and starting the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! fbp --config ./config/fbp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fbp init` | Create the SQLite database and schema |
//! | `fbp import <file>` | Load feedback from a JSON array or JSONL file |
//! | `fbp list` | Filtered, paginated listing |
//! | `fbp stats` | Aggregate report (totals, groups, top themes) |
//! | `fbp analyze <id>...` | Run AI analysis on records |
//! | `fbp serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! fbp init
//! fbp import ./seed.jsonl
//! fbp list --sentiment negative --urgency high --days 7
//! fbp analyze --unanalyzed --limit 30 --progress human
//! fbp serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use feedback_pulse::analyze::{self, AnalyzeArgs};
use feedback_pulse::config;
use feedback_pulse::import;
use feedback_pulse::list;
use feedback_pulse::migrate;
use feedback_pulse::progress::ProgressMode;
use feedback_pulse::server;
use feedback_pulse::stats;
use feedback_pulse_core::filter::RawFilterParams;

/// Feedback Pulse CLI: query, aggregate, and AI-analyze customer feedback.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fbp.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fbp",
    about = "Feedback Pulse: query, aggregate, and AI-analyze customer feedback",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fbp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Import feedback records from a JSON array or JSONL file.
    Import {
        /// Path to the file.
        file: PathBuf,
    },

    /// List feedback with filters and pagination.
    List {
        /// Channel: discord, github, twitter, support, email, forum.
        #[arg(long)]
        source: Option<String>,

        /// positive, neutral, or negative.
        #[arg(long)]
        sentiment: Option<String>,

        /// low, medium, or high.
        #[arg(long)]
        urgency: Option<String>,

        /// Only records created within the last N days.
        #[arg(long)]
        days: Option<String>,

        /// Case-insensitive substring match on content.
        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        limit: Option<String>,

        #[arg(long)]
        offset: Option<String>,

        /// Print `{ data, meta }` JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print aggregate statistics.
    Stats {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run AI analysis on one or more records.
    ///
    /// Several IDs are processed in fixed-size batches; a failing record
    /// does not stop the rest.
    Analyze {
        /// Feedback IDs.
        ids: Vec<String>,

        /// Also select every record that has not been analyzed yet.
        #[arg(long)]
        unanalyzed: bool,

        /// Cap the number of records picked by `--unanalyzed`.
        #[arg(long)]
        limit: Option<i64>,

        /// Override `[analysis].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Start the HTTP API server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feedback_pulse=info,tower_http=warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::List {
            source,
            sentiment,
            urgency,
            days,
            search,
            limit,
            offset,
            json,
        } => {
            let raw = RawFilterParams {
                source,
                sentiment,
                urgency,
                days,
                search,
                limit,
                offset,
            };
            list::run_list(&cfg, raw, json).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Analyze {
            ids,
            unanalyzed,
            limit,
            batch_size,
            progress,
        } => {
            let args = AnalyzeArgs {
                ids,
                unanalyzed,
                limit,
                batch_size,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            analyze::run_analyze(&cfg, args).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
