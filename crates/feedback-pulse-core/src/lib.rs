//! # Feedback Pulse Core
//!
//! Runtime-agnostic logic for Feedback Pulse: data models, the theme codec,
//! filter parsing and SQL query building, stats aggregation, analysis
//! parsing and orchestration, the bulk batch controller, and the store and
//! completion-service abstractions.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Concrete
//! stores and completion clients live in the `feedback-pulse` app crate.

pub mod analysis;
pub mod batch;
pub mod completion;
pub mod filter;
pub mod models;
pub mod query;
pub mod stats;
pub mod store;
pub mod themes;
