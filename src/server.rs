//! HTTP API server.
//!
//! Exposes listing, stats, and analysis over a JSON HTTP API consumed by the
//! dashboard frontend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/feedback` | Filtered, paginated listing with `meta` |
//! | `GET`  | `/api/stats` | Aggregate report over all feedback |
//! | `POST` | `/api/analyze/{id}` | Analyze one record and persist the result |
//! | `POST` | `/api/bulk-analyze` | Analyze `{ "ids": [...] }` in fixed-size batches |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Any other path is served from `[server].static_dir` when configured.
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Failed to parse AI analysis", "raw": "<model text>" }
//! ```
//!
//! `raw` is present only for unparseable model responses. Status codes:
//! 400 (validation), 404 (unknown record), 500 (model or internal failure).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; preflight requests are
//! answered by the CORS layer with an empty success.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use feedback_pulse_core::analysis::{
    analyze_feedback, parse_feedback_id, AnalysisError, AnalyzeOptions,
};
use feedback_pulse_core::batch::{bulk_analyze, BatchController, ItemResult, NoProgress};
use feedback_pulse_core::completion::CompletionService;
use feedback_pulse_core::filter::{FeedbackFilter, FilterError, PageMeta, RawFilterParams};
use feedback_pulse_core::models::{Analysis, FeedbackRecord};
use feedback_pulse_core::stats::{compute_stats, StatsReport};
use feedback_pulse_core::store::FeedbackStore;

use crate::completion::create_completion;
use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: SqliteStore,
    completion: Arc<dyn CompletionService>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            completion,
        }
    }

    fn analyze_options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            max_tokens: self.config.analysis.max_tokens,
        }
    }
}

/// Starts the HTTP server with the completion provider named in config.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let completion: Arc<dyn CompletionService> = Arc::from(create_completion(&config.completion)?);
    run_server_with_completion(config, completion).await
}

/// Starts the HTTP server with a caller-supplied completion service.
///
/// Used by embedders and tests that script model output.
///
/// # Example
///
/// ```rust,no_run
/// use feedback_pulse::completion::DisabledCompletion;
/// use feedback_pulse::server::run_server_with_completion;
/// use std::sync::Arc;
///
/// # async fn example(config: &feedback_pulse::config::Config) -> anyhow::Result<()> {
/// run_server_with_completion(config, Arc::new(DisabledCompletion)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_completion(
    config: &Config,
    completion: Arc<dyn CompletionService>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;

    if !config.completion.is_enabled() {
        tracing::warn!("completion provider is disabled; analysis requests will fail");
    }
    tracing::info!(
        model = completion.model_name(),
        batch_size = config.analysis.batch_size,
        "completion service ready"
    );

    let state = AppState::new(config.clone(), SqliteStore::new(pool), completion);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "feedback API listening");
    println!("Feedback API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with all API routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.server.static_dir.clone();

    let router = Router::new()
        .route("/api/feedback", get(handle_list_feedback))
        .route("/api/stats", get(handle_stats))
        .route("/api/analyze", post(handle_analyze_missing_id))
        .route("/api/analyze/", post(handle_analyze_missing_id))
        .route("/api/analyze/{id}", post(handle_analyze))
        .route("/api/bulk-analyze", post(handle_bulk_analyze))
        .route("/health", get(handle_health))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(cors).layer(TraceLayer::new_for_http())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    /// Model output that could not be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            raw: None,
        }
    }
}

/// API error types that map to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorResponse::new(message)),
            ApiError::Filter(err) => {
                tracing::debug!(error = %err, "rejected filter");
                (StatusCode::BAD_REQUEST, ErrorResponse::new(err.to_string()))
            }
            ApiError::Analysis(err) => match err {
                AnalysisError::MissingId => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("Missing feedback ID"),
                ),
                AnalysisError::InvalidId(raw) => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(format!("Invalid feedback ID: '{}'", raw)),
                ),
                AnalysisError::NotFound(id) => {
                    tracing::debug!(id, "feedback not found");
                    (
                        StatusCode::NOT_FOUND,
                        ErrorResponse::new("Feedback not found"),
                    )
                }
                AnalysisError::MalformedResponse { raw, .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Failed to parse AI analysis".to_string(),
                        raw: Some(raw),
                    },
                ),
                AnalysisError::Internal(source) => internal(source),
            },
            ApiError::Internal(source) => internal(source),
        };
        (status, Json(body)).into_response()
    }
}

fn internal(source: anyhow::Error) -> (StatusCode, ErrorResponse) {
    tracing::error!(error = %format!("{:#}", source), "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::new("Internal server error"),
    )
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/feedback ============

#[derive(Serialize)]
struct FeedbackListResponse {
    data: Vec<FeedbackRecord>,
    meta: PageMeta,
}

/// Handler for `GET /api/feedback`.
///
/// Empty parameters count as absent. Unknown vocabulary values and
/// malformed numbers are rejected with `400`; an oversized `limit` is clamped.
async fn handle_list_feedback(
    State(state): State<AppState>,
    query: Result<Query<RawFilterParams>, QueryRejection>,
) -> Result<Json<FeedbackListResponse>, ApiError> {
    let Query(raw) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let filter = FeedbackFilter::from_raw(&raw, state.config.query.page_limits())?;
    let page = state.store.list_feedback(&filter).await?;

    Ok(Json(FeedbackListResponse {
        meta: PageMeta::new(page.total, filter.limit, filter.offset),
        data: page.rows,
    }))
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsReport>, ApiError> {
    Ok(Json(compute_stats(&state.store).await?))
}

// ============ POST /api/analyze/{id} ============

#[derive(Serialize)]
struct AnalyzeResponse {
    message: &'static str,
    analysis: Analysis,
    feedback: FeedbackRecord,
}

async fn handle_analyze_missing_id() -> ApiError {
    ApiError::Analysis(AnalysisError::MissingId)
}

/// Handler for `POST /api/analyze/{id}`.
///
/// Returns `400` for a non-integer ID, `404` when the record does not exist,
/// and `500` with the raw model text when the response is unparseable. In the
/// error cases the stored record is left untouched.
async fn handle_analyze(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Path(raw_id) = path.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let id = parse_feedback_id(&raw_id)?;
    let outcome = analyze_feedback(
        &state.store,
        state.completion.as_ref(),
        id,
        state.analyze_options(),
    )
    .await?;

    Ok(Json(AnalyzeResponse {
        message: "Analysis complete",
        analysis: outcome.analysis,
        feedback: outcome.feedback,
    }))
}

// ============ POST /api/bulk-analyze ============

#[derive(Deserialize)]
struct BulkAnalyzeRequest {
    ids: Vec<i64>,
}

#[derive(Serialize)]
struct BulkItemResult {
    id: i64,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct BulkAnalyzeResponse {
    total: usize,
    succeeded: usize,
    failed: usize,
    results: Vec<BulkItemResult>,
    /// Stats recomputed once after every batch settled.
    stats: StatsReport,
}

/// Handler for `POST /api/bulk-analyze`.
///
/// Runs the selection through the batch controller; a failing record is
/// reported in `results` without affecting the others.
async fn handle_bulk_analyze(
    State(state): State<AppState>,
    body: Result<Json<BulkAnalyzeRequest>, JsonRejection>,
) -> Result<Json<BulkAnalyzeResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let controller = BatchController::new(state.config.analysis.batch_size);
    let report = bulk_analyze(
        &state.store,
        state.completion.as_ref(),
        &request.ids,
        controller,
        state.analyze_options(),
        &NoProgress,
    )
    .await;

    let stats = compute_stats(&state.store).await?;

    tracing::info!(
        total = report.items.len(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        batches = report.batches,
        "bulk analysis finished"
    );

    let succeeded = report.succeeded();
    let failed = report.failed();
    let results: Vec<BulkItemResult> = report
        .items
        .into_iter()
        .map(|item| match item.result {
            ItemResult::Ok { .. } => BulkItemResult {
                id: item.id,
                ok: true,
                error: None,
            },
            ItemResult::Failed { error } => BulkItemResult {
                id: item.id,
                ok: false,
                error: Some(error),
            },
        })
        .collect();

    Ok(Json(BulkAnalyzeResponse {
        total: results.len(),
        succeeded,
        failed,
        results,
        stats,
    }))
}
