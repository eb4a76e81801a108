// Background data lifecycle: retention sweep, compression sweep, VACUUM.
// One task per policy, independent of the write path.
// VACUUM runs on a configurable schedule (cron expression or fixed interval).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::MaintenanceConfig;
use crate::metrics_store::MetricsStore;

pub struct MaintenanceHandles {
    pub retention: tokio::task::JoinHandle<()>,
    pub compression: tokio::task::JoinHandle<()>,
}

/// Spawns the retention and compression sweeps. The vacuum scheduler feeds
/// the retention task so VACUUM runs on the same connection cadence as the
/// deletes it reclaims.
pub fn spawn(store: Arc<MetricsStore>, config: MaintenanceConfig) -> MaintenanceHandles {
    let compression_interval = config.compression_sweep_interval_secs;
    let retention = tokio::spawn(run_retention(store.clone(), config));
    let compression = tokio::spawn(run_compression(store, compression_interval));
    MaintenanceHandles {
        retention,
        compression,
    }
}

#[instrument(skip(store, config), fields(interval_secs = config.retention_sweep_interval_secs))]
async fn run_retention(store: Arc<MetricsStore>, config: MaintenanceConfig) {
    let mut sweep =
        tokio::time::interval(Duration::from_secs(config.retention_sweep_interval_secs));
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let (vacuum_tx, mut vacuum_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(vacuum_scheduler(config, vacuum_tx));

    loop {
        tokio::select! {
            _ = sweep.tick() => {
                match store.prune_expired().await {
                    Ok(stats) if stats.raw_rows + stats.segments + stats.buckets > 0 => {
                        info!(
                            raw_rows = stats.raw_rows,
                            segments = stats.segments,
                            buckets = stats.buckets,
                            "retention sweep"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "retention sweep failed"),
                }
            }
            _ = vacuum_rx.recv() => {
                if let Err(e) = store.vacuum().await {
                    warn!(error = %e, "vacuum failed");
                } else {
                    info!("vacuum complete");
                }
            }
        }
    }
}

#[instrument(skip(store), fields(interval_secs = sweep_interval_secs))]
async fn run_compression(store: Arc<MetricsStore>, sweep_interval_secs: u64) {
    let mut sweep = tokio::time::interval(Duration::from_secs(sweep_interval_secs));
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        sweep.tick().await;
        match store.compress_aged().await {
            Ok(0) => {}
            Ok(segments) => info!(segments, "compression sweep packed aged windows"),
            Err(e) => warn!(error = %e, "compression sweep failed"),
        }
    }
}

/// Sends a message on `tx` at each VACUUM time (cron or fixed interval). Uses local time for cron.
async fn vacuum_scheduler(config: MaintenanceConfig, tx: tokio::sync::mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.vacuum_schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid vacuum_schedule; VACUUM will not run");
            return;
        };
        loop {
            let now = chrono::Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.vacuum_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}
