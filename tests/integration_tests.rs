// Integration tests: HTTP endpoints and the WebSocket metrics stream

use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use systempulse::config::AppConfig;
use systempulse::metrics_store::{MetricsStore, StorePolicies};
use systempulse::models::{
    CpuMetrics, MemoryMetrics, MetricsRow, NetworkMetrics, Snapshot, SystemClock, SystemInfo,
};
use systempulse::routes;
use tokio::sync::broadcast;

const TEST_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[database]
path = "data/test.db"
max_pool_size = 2
retention_days = 30
compress_after_hours = 1

[sampling]
sample_interval_ms = 1000
stats_log_interval_secs = 60

[publishing]
broadcast_capacity = 10
"#;

struct TestApp {
    server: TestServer,
    tx: broadcast::Sender<Snapshot>,
    store: Arc<MetricsStore>,
    ws_connections: Arc<AtomicUsize>,
    _dir: tempfile::TempDir,
}

/// Build a TestServer with http_transport (required for WebSocket tests)
/// over a fresh store in a temp dir.
async fn spawn_app() -> TestApp {
    let config = AppConfig::load_from_str(TEST_CONFIG).unwrap();
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("metrics.db");
    let store = Arc::new(
        MetricsStore::connect(
            path.to_str().unwrap(),
            config.database.max_pool_size,
            StorePolicies::new(
                config.database.retention_days,
                config.database.compress_after_hours,
            ),
        )
        .await
        .unwrap(),
    );
    store.init().await.unwrap();

    let (tx, _) = broadcast::channel(config.publishing.broadcast_capacity);
    let ws_connections = Arc::new(AtomicUsize::new(0));
    let system_info = Arc::new(SystemInfo {
        os: "Linux 6.8.0".into(),
        hostname: "testhost".into(),
        cpu_model: "Test CPU".into(),
        cpu_cores: 8,
        cpu_physical_cores: 4,
    });
    let app = routes::app(
        tx.clone(),
        store.clone(),
        system_info,
        ws_connections.clone(),
        config,
    );
    let server = TestServer::builder().http_transport().try_build(app).unwrap();
    TestApp {
        server,
        tx,
        store,
        ws_connections,
        _dir: dir,
    }
}

fn snapshot(ts_ms: i64, cpu_percent: f64) -> Snapshot {
    Snapshot {
        timestamp: chrono::DateTime::from_timestamp_millis(ts_ms).unwrap(),
        hostname: "testhost".into(),
        cpu: CpuMetrics {
            percent: cpu_percent,
            ..CpuMetrics::default()
        },
        memory: MemoryMetrics::default(),
        disk: vec![],
        network: NetworkMetrics::default(),
        temperature: vec![],
        system_time: SystemClock {
            boot_time: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
            uptime: "0d 00:00:00".into(),
        },
    }
}

async fn append(store: &MetricsStore, ts_ms: i64, cpu_percent: f64) {
    store
        .append_row(&MetricsRow::from_snapshot(&snapshot(ts_ms, cpu_percent)))
        .await
        .unwrap();
}

/// Receive text frames until one parses as JSON with the wanted "type".
async fn receive_json_with_type(
    ws: &mut axum_test::TestWebSocket,
    wanted: &str,
) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    loop {
        let text = ws.receive_text().await;
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&text)
            && v.get("type").and_then(|t| t.as_str()) == Some(wanted)
        {
            return v;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {wanted} message"
        );
    }
}

#[tokio::test]
async fn test_root_endpoint() {
    let app = spawn_app().await;
    let response = app.server.get("/").await;
    response.assert_status_ok();
    response.assert_text("SystemPulse: host telemetry over WebSockets");
}

#[tokio::test]
async fn test_version_endpoint() {
    let app = spawn_app().await;
    let response = app.server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("systempulse")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_system_info_endpoint() {
    let app = spawn_app().await;
    let response = app.server.get("/api/system_info").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("hostname").and_then(|v| v.as_str()),
        Some("testhost")
    );
    assert_eq!(json.get("cpu_cores").and_then(|v| v.as_u64()), Some(8));
}

#[tokio::test]
async fn test_history_rejects_unknown_interval() {
    let app = spawn_app().await;
    let response = app
        .server
        .get("/api/metrics/history")
        .add_query_param("interval", "2 minutes")
        .await;
    response.assert_status_bad_request();
    let json: serde_json::Value = response.json();
    let error = json.get("error").and_then(|v| v.as_str()).unwrap();
    assert!(error.contains("invalid interval"));
    assert_eq!(
        json.get("valid_intervals").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(3)
    );
}

#[tokio::test]
async fn test_history_defaults_to_five_minutes() {
    let app = spawn_app().await;
    append(&app.store, 0, 10.0).await;
    append(&app.store, 65_000, 30.0).await;

    let response = app.server.get("/api/metrics/history").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("interval").and_then(|v| v.as_str()),
        Some("5 minutes")
    );
    // Both rows fall in the same 5-minute bucket
    assert_eq!(json.get("data_points").and_then(|v| v.as_u64()), Some(1));
    let metrics = json.get("metrics").and_then(|v| v.as_array()).unwrap();
    assert_eq!(metrics[0].get("sample_count").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(
        metrics[0].get("cpu_percent_avg").and_then(|v| v.as_f64()),
        Some(20.0)
    );
}

#[tokio::test]
async fn test_history_interval_and_limit() {
    let app = spawn_app().await;
    append(&app.store, 0, 10.0).await;
    append(&app.store, 30_000, 20.0).await;
    append(&app.store, 65_000, 30.0).await;

    let response = app
        .server
        .get("/api/metrics/history")
        .add_query_param("interval", "1 minute")
        .await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("data_points").and_then(|v| v.as_u64()), Some(2));
    let metrics = json.get("metrics").and_then(|v| v.as_array()).unwrap();
    // Newest first
    assert_eq!(
        metrics[0].get("cpu_percent_avg").and_then(|v| v.as_f64()),
        Some(30.0)
    );
    assert_eq!(
        metrics[1].get("cpu_percent_avg").and_then(|v| v.as_f64()),
        Some(15.0)
    );

    let limited = app
        .server
        .get("/api/metrics/history")
        .add_query_param("interval", "1 minute")
        .add_query_param("limit", "1")
        .await;
    let json: serde_json::Value = limited.json();
    assert_eq!(json.get("data_points").and_then(|v| v.as_u64()), Some(1));
}

#[tokio::test]
async fn test_summary_endpoint() {
    let app = spawn_app().await;

    let empty = app.server.get("/api/metrics/summary").await;
    empty.assert_status_ok();
    let json: serde_json::Value = empty.json();
    assert_eq!(
        json.get("summaries").map(|s| s.as_object().unwrap().len()),
        Some(0)
    );

    append(&app.store, 65_000, 42.0).await;
    let filled = app.server.get("/api/metrics/summary").await;
    let json: serde_json::Value = filled.json();
    let summaries = json.get("summaries").and_then(|s| s.as_object()).unwrap();
    assert_eq!(summaries.len(), 3);
    assert!(summaries.contains_key("1 minute"));
    assert!(summaries.contains_key("5 minutes"));
    assert!(summaries.contains_key("1 hour"));
    assert!(json.get("timestamp").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_ws_ack_then_update() {
    let app = spawn_app().await;
    let mut ws = app
        .server
        .get_websocket("/ws/metrics")
        .await
        .into_websocket()
        .await;

    let ack = receive_json_with_type(&mut ws, "connected").await;
    assert_eq!(
        ack.pointer("/system_info/hostname").and_then(|v| v.as_str()),
        Some("testhost")
    );
    assert_eq!(
        ack.get("sample_interval_ms").and_then(|v| v.as_u64()),
        Some(1000)
    );

    // The session is subscribed once the ack is out; a broadcast now must
    // arrive as an update event.
    app.tx.send(snapshot(42_000, 55.0)).unwrap();
    let update = receive_json_with_type(&mut ws, "update").await;
    assert_eq!(
        update.pointer("/data/hostname").and_then(|v| v.as_str()),
        Some("testhost")
    );
    assert_eq!(
        update.pointer("/data/cpu/percent").and_then(|v| v.as_f64()),
        Some(55.0)
    );
}

#[tokio::test]
async fn test_ws_connection_gauge_rises_and_falls() {
    let app = spawn_app().await;
    assert_eq!(app.ws_connections.load(Ordering::Relaxed), 0);

    let mut ws = app
        .server
        .get_websocket("/ws/metrics")
        .await
        .into_websocket()
        .await;
    receive_json_with_type(&mut ws, "connected").await;
    assert_eq!(app.ws_connections.load(Ordering::Relaxed), 1);

    ws.close().await;
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(2);
    while app.ws_connections.load(Ordering::Relaxed) != 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "connection gauge did not return to zero"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }
}
