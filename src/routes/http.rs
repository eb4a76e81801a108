// GET handlers: service metadata and metric history queries

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use crate::models::{BucketInterval, InvalidInterval};
use crate::version::{NAME, VERSION};

const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// GET /version
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/system_info - static host identity, captured once at startup.
pub(super) async fn system_info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.system_info.as_ref().clone())
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryParams {
    interval: Option<String>,
    limit: Option<u32>,
}

/// GET /api/metrics/history?interval=5+minutes&limit=100
///
/// Returns bucket aggregates for one interval, newest first. An unknown
/// interval is a 400 naming the accepted values.
pub(super) async fn metrics_history_handler(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let interval = match params.interval.as_deref() {
        Some(raw) => raw.parse().map_err(|e: InvalidInterval| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": e.to_string(),
                    "valid_intervals": BucketInterval::ALL.map(|i| i.as_str()),
                })),
            )
        })?,
        None => BucketInterval::FiveMinutes,
    };
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let metrics = state
        .store
        .bucket_history(interval, limit)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({
        "interval": interval.as_str(),
        "data_points": metrics.len(),
        "metrics": metrics,
    })))
}

/// GET /api/metrics/summary
///
/// Latest bucket per interval; intervals with no data yet are absent.
pub(super) async fn metrics_summary_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let summaries = state.store.bucket_summary().await.map_err(internal_error)?;
    Ok(Json(json!({
        "summaries": summaries,
        "timestamp": Utc::now(),
    })))
}

fn internal_error(e: anyhow::Error) -> (StatusCode, Json<Value>) {
    tracing::warn!("History query failed: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error" })),
    )
}
