// Background sampling worker: one task owns the sampler (and with it the
// network rate state), broadcasts snapshots to live sessions, and enqueues
// them for the dedicated row writer task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, Instant, interval};

use crate::metrics_store::MetricsStore;
use crate::models::{MetricsRow, Snapshot};
use crate::sampler::Sampler;
use crate::source::MetricsSource;

/// Rate limit for "no receivers" logging (avoid a line every tick when no
/// one is connected).
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Write queue depth between the sampling worker and the row writer. The
/// worker never awaits on a full queue; it drops the tick from storage.
pub const WRITE_QUEUE_CAPACITY: usize = 64;

/// Channels, shared counters, and shutdown for the sampling worker.
pub struct WorkerDeps<S: MetricsSource> {
    pub sampler: Sampler<S>,
    pub tx: broadcast::Sender<Snapshot>,
    pub write_tx: mpsc::Sender<Snapshot>,
    pub ws_connections: Arc<AtomicUsize>,
    pub rows_written_total: Arc<AtomicU64>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Worker timing and logging config. Stats logging runs on real-time
/// intervals, independent of sample_interval_ms.
pub struct WorkerConfig {
    pub sample_interval_ms: u64,
    pub stats_log_interval_secs: u64,
}

/// Spawns the task that drains the write queue into the store, one row per
/// snapshot. A failed append is retried once immediately; a second failure
/// drops the tick from storage and the live stream is unaffected. When the
/// worker drops its sender the queue drains and the task exits.
pub fn spawn_row_writer(
    mut write_rx: mpsc::Receiver<Snapshot>,
    store: Arc<MetricsStore>,
    rows_written_total: Arc<AtomicU64>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = write_rx.recv().await {
            let row = MetricsRow::from_snapshot(&snapshot);
            if let Err(first) = store.append_row(&row).await {
                match store.append_row(&row).await {
                    Ok(()) => {
                        tracing::warn!(
                            error = %first,
                            operation = "append_row",
                            "row write failed once, retry succeeded"
                        );
                    }
                    Err(second) => {
                        tracing::warn!(
                            error = %second,
                            operation = "append_row",
                            created_at = row.created_at,
                            "row write failed after retry, tick dropped from storage"
                        );
                        continue;
                    }
                }
            }
            rows_written_total.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!("Row writer shutting down");
    })
}

pub fn spawn<S: MetricsSource>(
    deps: WorkerDeps<S>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        mut sampler,
        tx,
        write_tx,
        ws_connections,
        rows_written_total,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        sample_interval_ms,
        stats_log_interval_secs,
    } = config;

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_millis(sample_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut write_queue_dropped: u64 = 0;
        let mut last_no_receivers_warn: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let snapshot = sampler.sample().await;

                    if tx.send(snapshot.clone()).is_err() {
                        let should_warn = last_no_receivers_warn
                            .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL);
                        if should_warn {
                            tracing::debug!(
                                operation = "broadcast_snapshot",
                                "No active WebSocket clients; broadcast channel has no receivers"
                            );
                            last_no_receivers_warn = Some(Instant::now());
                        }
                    }

                    match write_tx.try_send(snapshot) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            write_queue_dropped += 1;
                            tracing::warn!(
                                operation = "enqueue_row",
                                "write queue full, tick dropped from storage"
                            );
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            tracing::debug!("Row writer channel closed");
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        ws_clients = ws_connections.load(Ordering::Relaxed),
                        rows_written_total = rows_written_total.load(Ordering::Relaxed),
                        write_queue_dropped,
                        "app stats"
                    );
                }
            }
        }
    })
}
