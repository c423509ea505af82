//! # Feedback Pulse
//!
//! Query, aggregate, and AI-analyze customer feedback.
//!
//! Feedback records from community and support channels live in SQLite.
//! Operators filter and page through them, read aggregate stats, and enrich
//! records with model-derived sentiment, themes, and urgency, one at a time
//! or in bounded batches.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────┐   ┌──────────┐
//! │ import/seed  │──▶│        SQLite         │◀──│ analysis │◀── completion
//! └──────────────┘   │  feedback (+indexes)  │   │  + batch │    (Workers AI /
//!                    └──────────┬────────────┘   └──────────┘     OpenAI)
//!                               │
//!                  ┌────────────┴──────────┐
//!                  ▼                       ▼
//!             ┌──────────┐           ┌──────────┐
//!             │   CLI    │           │   HTTP   │
//!             │  (fbp)   │           │  (axum)  │
//!             └──────────┘           └──────────┘
//! ```
//!
//! Runtime-agnostic logic (filter validation, query building, stats,
//! analysis parsing, batching) lives in `feedback-pulse-core`; this crate
//! supplies the SQLite store, completion clients, CLI, and server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema bootstrap |
//! | [`sqlite_store`] | SQLite implementation of the store trait |
//! | [`completion`] | Completion service clients |
//! | [`server`] | HTTP API server |
//! | [`progress`] | Bulk-analysis progress on stderr |
//! | [`list`], [`stats`], [`analyze`], [`import`] | CLI commands |

pub mod analyze;
pub mod completion;
pub mod config;
pub mod db;
pub mod import;
pub mod list;
pub mod migrate;
pub mod progress;
pub mod server;
pub mod sqlite_store;
pub mod stats;
