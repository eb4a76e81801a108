use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use systempulse::*;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();
    tracing::info!("{} v{}", version::NAME, version::VERSION);

    let app_config = config::AppConfig::load()?;
    let (tx, _) = broadcast::channel::<models::Snapshot>(app_config.publishing.broadcast_capacity);

    let source = source::SysinfoSource::new();
    let system_info = Arc::new(
        source
            .system_info()
            .await
            .map_err(|e| anyhow::anyhow!("system info: {}", e))?,
    );

    let store = Arc::new(
        metrics_store::MetricsStore::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
            metrics_store::StorePolicies::new(
                app_config.database.retention_days,
                app_config.database.compress_after_hours,
            ),
        )
        .await?,
    );
    store.init().await?;

    let ws_connections = Arc::new(AtomicUsize::new(0));
    let rows_written_total = Arc::new(AtomicU64::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let (write_tx, write_rx) = tokio::sync::mpsc::channel(worker::WRITE_QUEUE_CAPACITY);

    let writer_handle =
        worker::spawn_row_writer(write_rx, store.clone(), rows_written_total.clone());
    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            sampler: sampler::Sampler::new(source, system_info.hostname.clone()),
            tx: tx.clone(),
            write_tx,
            ws_connections: ws_connections.clone(),
            rows_written_total,
            shutdown_rx,
        },
        worker::WorkerConfig {
            sample_interval_ms: app_config.sampling.sample_interval_ms,
            stats_log_interval_secs: app_config.sampling.stats_log_interval_secs,
        },
    );
    let _maintenance = maintenance::spawn(store.clone(), app_config.maintenance.clone());

    let app = routes::app(tx, store, system_info, ws_connections, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let in_container = std::path::Path::new("/.dockerenv").exists()
        || std::env::var("CONTAINER").as_deref() == Ok("1");

    if in_container {
        // In Docker: run server until error or SIGTERM (no signal handler; avoids immediate exit)
        axum::serve(listener, app).await?;
    } else {
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(_) => {
                            let _ = tokio::signal::ctrl_c().await;
                            return;
                        }
                    };
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                #[cfg(not(unix))]
                {
                    tokio::signal::ctrl_c().await
                }
            } => {
                tracing::info!("Received shutdown signal");
                // Stop sampling, then let the writer drain the queue.
                let _ = shutdown_tx.send(());
                let _ = worker_handle.await;
                let _ = writer_handle.await;
            }
        }
    }

    Ok(())
}
