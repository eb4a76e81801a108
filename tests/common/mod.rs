// Shared test helpers: a scripted metrics source for deterministic sampling

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use systempulse::models::{CpuMetrics, DiskUsage, MemoryMetrics, TemperatureReading};
use systempulse::source::{ClockReading, MetricsSource, NetworkCounters};

/// Scripted source: network readings come from a queue (`None` entries fail
/// that call; the last `Some` repeats once the queue is drained). Other
/// groups return fixed values, with optional scripted failures.
pub struct FakeSource {
    network_script: Mutex<VecDeque<Option<NetworkCounters>>>,
    last_counters: Mutex<NetworkCounters>,
    pub cpu_percent: f64,
    pub fail_temperatures: bool,
}

impl FakeSource {
    pub fn new(network_script: Vec<Option<NetworkCounters>>) -> Self {
        Self {
            network_script: Mutex::new(network_script.into()),
            last_counters: Mutex::new(NetworkCounters::default()),
            cpu_percent: 12.5,
            fail_temperatures: false,
        }
    }

    pub fn with_counters(readings: Vec<(u64, u64)>) -> Self {
        Self::new(
            readings
                .into_iter()
                .map(|(bytes_sent, bytes_recv)| {
                    Some(NetworkCounters {
                        bytes_sent,
                        bytes_recv,
                    })
                })
                .collect(),
        )
    }
}

impl MetricsSource for FakeSource {
    async fn cpu_metrics(&self) -> anyhow::Result<CpuMetrics> {
        Ok(CpuMetrics {
            percent: self.cpu_percent,
            load_1: 0.5,
            load_5: 0.4,
            load_15: 0.3,
            freq_current: 2400.0,
            freq_min: 800.0,
            freq_max: 4200.0,
        })
    }

    async fn memory_metrics(&self) -> anyhow::Result<MemoryMetrics> {
        Ok(MemoryMetrics {
            total: 16_000_000_000,
            used: 4_000_000_000,
            available: 12_000_000_000,
            percent: 25.0,
            swap_total: 2_000_000_000,
            swap_used: 0,
            swap_free: 2_000_000_000,
            swap_percent: 0.0,
        })
    }

    async fn disk_usage(&self) -> anyhow::Result<Vec<DiskUsage>> {
        Ok(vec![DiskUsage {
            device: "/dev/sda1".into(),
            mountpoint: "/".into(),
            total: 500_000_000_000,
            used: 200_000_000_000,
            free: 300_000_000_000,
            percent: 40.0,
        }])
    }

    async fn network_counters(&self) -> anyhow::Result<NetworkCounters> {
        let next = self.network_script.lock().unwrap().pop_front();
        match next {
            Some(Some(counters)) => {
                *self.last_counters.lock().unwrap() = counters;
                Ok(counters)
            }
            Some(None) => Err(anyhow::anyhow!("scripted network failure")),
            None => Ok(*self.last_counters.lock().unwrap()),
        }
    }

    async fn temperatures(&self) -> anyhow::Result<Vec<TemperatureReading>> {
        if self.fail_temperatures {
            return Err(anyhow::anyhow!("scripted sensor failure"));
        }
        Ok(vec![TemperatureReading {
            name: "coretemp".into(),
            current: 48.0,
            high: Some(90.0),
            critical: Some(105.0),
        }])
    }

    async fn clock(&self) -> anyhow::Result<ClockReading> {
        Ok(ClockReading {
            boot_time: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
            uptime: Duration::from_secs(93_784),
        })
    }
}
