// src/api.rs
//! HTTP surface: /health, /analyze, /batch, /compare and (optionally) /metrics.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::analyze::{Analyzer, TextInput};
use crate::compare::{Comparator, ComparisonReport, FallbackMode};
use crate::error::SentimentError;
use crate::metrics::Metrics;
use crate::sentiment::SentimentResult;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    /// `None` when no external source is configured; /compare answers 503.
    pub comparator: Option<Arc<Comparator>>,
}

impl AppState {
    pub fn new(analyzer: Analyzer, comparator: Option<Comparator>) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            comparator: comparator.map(Arc::new),
        }
    }
}

pub fn create_router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/batch", post(analyze_batch))
        .route("/compare", post(compare))
        .with_state(state);

    let router = match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    };
    router.layer(CorsLayer::very_permissive())
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Sentiment(SentimentError),
    NoExternalSource,
    Internal(String),
}

impl From<SentimentError> for ApiError {
    fn from(e: SentimentError) -> Self {
        ApiError::Sentiment(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Sentiment(e) => {
                let status = match &e {
                    SentimentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    SentimentError::ExternalService(_) => StatusCode::BAD_GATEWAY,
                    SentimentError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, json!({ "error": e }))
            }
            ApiError::NoExternalSource => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": { "kind": "unconfigured", "detail": "no external source configured" } }),
            ),
            ApiError::Internal(msg) => {
                error!(target: "sentimetric::api", error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": { "kind": "internal", "detail": "internal error" } }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ------------------------------------------------------------
// Handlers
// ------------------------------------------------------------

#[derive(Deserialize)]
struct AnalyzeReq {
    text: Value,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeReq>,
) -> Result<Json<SentimentResult>, ApiError> {
    Ok(Json(state.analyzer.analyze(&body.text)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum BatchEntry {
    Ok(SentimentResult),
    Error(SentimentError),
}

async fn analyze_batch(
    State(state): State<AppState>,
    Json(items): Json<Vec<Value>>,
) -> Result<Json<Vec<BatchEntry>>, ApiError> {
    let analyzer = Arc::clone(&state.analyzer);
    let results = tokio::task::spawn_blocking(move || analyzer.analyze_batch(&items))
        .await
        .map_err(|e| ApiError::Internal(format!("batch worker: {e}")))?;
    let out = results
        .into_iter()
        .map(|r| match r {
            Ok(v) => BatchEntry::Ok(v),
            Err(e) => BatchEntry::Error(e),
        })
        .collect();
    Ok(Json(out))
}

#[derive(Deserialize)]
struct CompareReq {
    text: Value,
    #[serde(default)]
    fallback: Option<FallbackMode>,
}

async fn compare(
    State(state): State<AppState>,
    Json(body): Json<CompareReq>,
) -> Result<Json<ComparisonReport>, ApiError> {
    let comparator = state.comparator.as_ref().ok_or(ApiError::NoExternalSource)?;
    let text = body.text.as_text()?;
    let mode = body.fallback.unwrap_or(comparator.config().fallback);
    let report = comparator.compare_with(&text, mode).await?;
    Ok(Json(report))
}
