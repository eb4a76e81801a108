// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::metrics_store::MetricsStore;
use crate::models::{Snapshot, SystemInfo};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) snapshot_tx: broadcast::Sender<Snapshot>,
    pub(crate) store: Arc<MetricsStore>,
    pub(crate) system_info: Arc<SystemInfo>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
    pub(crate) config: AppConfig,
}

pub fn app(
    snapshot_tx: broadcast::Sender<Snapshot>,
    store: Arc<MetricsStore>,
    system_info: Arc<SystemInfo>,
    ws_connections: Arc<AtomicUsize>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        snapshot_tx,
        store,
        system_info,
        ws_connections,
        config,
    };
    Router::new()
        .route("/", get(|| async { "SystemPulse: host telemetry over WebSockets" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/system_info", get(http::system_info_handler)) // GET /api/system_info
        .route("/api/metrics/history", get(http::metrics_history_handler)) // GET /api/metrics/history
        .route("/api/metrics/summary", get(http::metrics_summary_handler)) // GET /api/metrics/summary
        .route("/ws/metrics", get(ws::ws_metrics)) // WS /ws/metrics
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
