// Snapshot assembly: per-group reads with graceful degradation, plus
// network rate derivation from the previous tick's counters.

use chrono::Utc;
use tokio::time::Instant;
use tracing::warn;

use crate::models::{
    CpuMetrics, MemoryMetrics, NetworkMetrics, Snapshot, SystemClock, format_uptime,
};
use crate::source::{MetricsSource, NetworkCounters};

/// Minimum elapsed window for a rate computation. Two samples landing at
/// (near-)identical instants divide by this instead of ~0.
const MIN_RATE_WINDOW_SECS: f64 = 0.001;

/// Last-seen cumulative counters and the instant they were read. Owned
/// exclusively by the sampling task; `&mut` access is the synchronization.
#[derive(Debug, Default)]
pub struct RateState {
    last: Option<(NetworkCounters, Instant)>,
}

impl RateState {
    /// Fold new counter readings into the state and return
    /// `(send_rate_mbps, recv_rate_mbps)`. A counter reset shows up as a
    /// decreased counter; its delta clamps to zero, never negative. The
    /// first reading has no window and reports zero rates.
    pub fn advance(&mut self, counters: NetworkCounters, now: Instant) -> (f64, f64) {
        let rates = match self.last {
            Some((prev, prev_at)) => {
                let elapsed = now
                    .duration_since(prev_at)
                    .as_secs_f64()
                    .max(MIN_RATE_WINDOW_SECS);
                let sent_delta = counters.bytes_sent.saturating_sub(prev.bytes_sent);
                let recv_delta = counters.bytes_recv.saturating_sub(prev.bytes_recv);
                (
                    sent_delta as f64 * 8.0 / (elapsed * 1_000_000.0),
                    recv_delta as f64 * 8.0 / (elapsed * 1_000_000.0),
                )
            }
            None => (0.0, 0.0),
        };
        self.last = Some((counters, now));
        rates
    }
}

/// Turns raw source readings into normalized snapshots. Each metric group is
/// an independent failure domain: a failed read degrades that group to
/// zero/empty defaults and the snapshot still goes out.
pub struct Sampler<S> {
    source: S,
    hostname: String,
    rate: RateState,
}

impl<S: MetricsSource> Sampler<S> {
    pub fn new(source: S, hostname: impl Into<String>) -> Self {
        Self {
            source,
            hostname: hostname.into(),
            rate: RateState::default(),
        }
    }

    pub async fn sample(&mut self) -> Snapshot {
        let timestamp = Utc::now();

        let cpu = match self.source.cpu_metrics().await {
            Ok(mut cpu) => {
                // Multi-core counters can momentarily report >100.
                cpu.percent = cpu.percent.clamp(0.0, 100.0);
                cpu
            }
            Err(e) => {
                warn!(error = %e, group = "cpu", "metric group read failed, degrading to defaults");
                CpuMetrics::default()
            }
        };

        let memory = match self.source.memory_metrics().await {
            Ok(memory) => memory,
            Err(e) => {
                warn!(error = %e, group = "memory", "metric group read failed, degrading to defaults");
                MemoryMetrics::default()
            }
        };

        let disk = match self.source.disk_usage().await {
            Ok(disk) => disk,
            Err(e) => {
                warn!(error = %e, group = "disk", "metric group read failed, degrading to defaults");
                Vec::new()
            }
        };

        let network = match self.source.network_counters().await {
            Ok(counters) => {
                let (send_rate_mbps, recv_rate_mbps) = self.rate.advance(counters, Instant::now());
                NetworkMetrics {
                    bytes_sent_total: counters.bytes_sent,
                    bytes_recv_total: counters.bytes_recv,
                    send_rate_mbps,
                    recv_rate_mbps,
                }
            }
            Err(e) => {
                warn!(error = %e, group = "network", "metric group read failed, degrading to defaults");
                // Rate state is left untouched so the next good reading
                // computes its delta over the true elapsed window.
                NetworkMetrics::default()
            }
        };

        let temperature = match self.source.temperatures().await {
            Ok(temperature) => temperature,
            Err(e) => {
                warn!(error = %e, group = "temperature", "metric group read failed, degrading to defaults");
                Vec::new()
            }
        };

        let system_time = match self.source.clock().await {
            Ok(clock) => SystemClock {
                boot_time: clock.boot_time,
                uptime: format_uptime(clock.uptime),
            },
            Err(e) => {
                warn!(error = %e, group = "clock", "metric group read failed, degrading to defaults");
                SystemClock::default()
            }
        };

        Snapshot {
            timestamp,
            hostname: self.hostname.clone(),
            cpu,
            memory,
            disk,
            network,
            temperature,
            system_time,
        }
    }
}
