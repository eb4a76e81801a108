// WebSocket handler and stream loop for the live metrics feed

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::{Snapshot, SystemInfo};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements the live connection count on drop (connect = +1, drop = -1).
struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }
}

pub(super) async fn ws_metrics(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tx = state.snapshot_tx.clone();
    let conn_count = state.ws_connections.clone();
    let system_info = state.system_info.clone();
    let sample_interval_ms = state.config.sampling.sample_interval_ms;
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        if let Err(e) =
            stream_metrics(socket, &mut rx, conn_count, system_info, sample_interval_ms).await
        {
            tracing::info!("Metrics stream error: {}", e);
        }
    })
}

async fn stream_metrics(
    socket: WebSocket,
    rx: &mut broadcast::Receiver<Snapshot>,
    conn_count: Arc<AtomicUsize>,
    system_info: Arc<SystemInfo>,
    sample_interval_ms: u64,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let _guard = SessionGuard(conn_count);
    tracing::info!("Client connected to metrics stream");

    let (mut sender, mut receiver) = socket.split();

    let ack = serde_json::json!({
        "type": "connected",
        "system_info": system_info.as_ref(),
        "sample_interval_ms": sample_interval_ms,
    });
    let ack_json = serde_json::to_string(&ack)?;
    let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(ack_json.into()))).await;
    if r.is_err() || r.unwrap_or(Ok(())).is_err() {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(snapshot) => {
                        let update = serde_json::json!({ "type": "update", "data": snapshot });
                        let json = serde_json::to_string(&update)?;
                        let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(json.into()))).await;
                        if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Slow consumer: resume from the live edge, newest wins.
                        tracing::warn!("WebSocket /ws/metrics client lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
