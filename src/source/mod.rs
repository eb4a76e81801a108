// OS metric readings via sysinfo

mod linux;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sysinfo::{Components, Disks, Networks, System};
use tracing::instrument;

use crate::models::{CpuMetrics, DiskUsage, MemoryMetrics, SystemInfo, TemperatureReading};

/// Raw cumulative interface counters, summed across interfaces. Rate
/// derivation happens in the sampler, not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ClockReading {
    pub boot_time: DateTime<Utc>,
    pub uptime: Duration,
}

/// Point-in-time readings of one metric group each. Every method is an
/// independent failure domain: the sampler degrades the failing group and
/// keeps the rest of the snapshot.
pub trait MetricsSource: Send + Sync + 'static {
    fn cpu_metrics(&self) -> impl Future<Output = anyhow::Result<CpuMetrics>> + Send;
    fn memory_metrics(&self) -> impl Future<Output = anyhow::Result<MemoryMetrics>> + Send;
    fn disk_usage(&self) -> impl Future<Output = anyhow::Result<Vec<DiskUsage>>> + Send;
    fn network_counters(&self) -> impl Future<Output = anyhow::Result<NetworkCounters>> + Send;
    fn temperatures(&self) -> impl Future<Output = anyhow::Result<Vec<TemperatureReading>>> + Send;
    fn clock(&self) -> impl Future<Output = anyhow::Result<ClockReading>> + Send;
}

/// Production source backed by sysinfo. Reads run on the blocking pool;
/// sysinfo state lives behind std mutexes shared with the blocking tasks.
pub struct SysinfoSource {
    sys: Arc<std::sync::Mutex<System>>,
    disks: Arc<std::sync::Mutex<Disks>>,
    networks: Arc<std::sync::Mutex<Networks>>,
    components: Arc<std::sync::Mutex<Components>>,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let disks = Disks::new_with_refreshed_list();
        let networks = Networks::new_with_refreshed_list();
        let components = Components::new_with_refreshed_list();
        Self {
            sys: Arc::new(std::sync::Mutex::new(sys)),
            disks: Arc::new(std::sync::Mutex::new(disks)),
            networks: Arc::new(std::sync::Mutex::new(networks)),
            components: Arc::new(std::sync::Mutex::new(components)),
        }
    }

    /// Static host identity; fetched once at startup.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "system_info"))]
    pub async fn system_info(&self) -> anyhow::Result<SystemInfo> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            let os_name = System::name().unwrap_or_else(|| std::env::consts::OS.into());
            let kernel = System::kernel_version().unwrap_or_default();
            let os = format!("{} {}", os_name, kernel).trim_end().to_string();
            let hostname = System::host_name().unwrap_or_else(|| "unknown".into());
            let cpu_model = linux::read_cpu_model()
                .or_else(|| {
                    sys.cpus()
                        .first()
                        .map(|c| c.name().to_string())
                        .filter(|s| !s.is_empty() && s != "cpu0")
                })
                .unwrap_or_else(|| "Unknown".into());
            Ok(SystemInfo {
                os,
                hostname,
                cpu_model,
                cpu_cores: sys.cpus().len() as u32,
                cpu_physical_cores: System::physical_core_count().unwrap_or(0) as u32,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}

impl MetricsSource for SysinfoSource {
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "cpu_metrics"))]
    async fn cpu_metrics(&self) -> anyhow::Result<CpuMetrics> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            // Usage is measured against the previous refresh, so the first
            // tick after startup reads 0.
            sys.refresh_cpu_all();
            let usage = sys.global_cpu_usage() as f64;
            let load = System::load_average();
            let freq_current = sys.cpus().first().map_or(0, |c| c.frequency()) as f64;
            Ok(CpuMetrics {
                percent: usage,
                load_1: load.one,
                load_5: load.five,
                load_15: load.fifteen,
                freq_current,
                freq_min: linux::read_cpufreq_mhz("cpuinfo_min_freq").unwrap_or(0.0),
                freq_max: linux::read_cpufreq_mhz("cpuinfo_max_freq").unwrap_or(0.0),
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "memory_metrics"))]
    async fn memory_metrics(&self) -> anyhow::Result<MemoryMetrics> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_memory();

            let total = sys.total_memory();
            let available = sys.available_memory();
            let used = total.saturating_sub(available);
            let percent = if total > 0 {
                (used as f64 / total as f64) * 100.0
            } else {
                0.0
            };

            let swap_total = sys.total_swap();
            let swap_used = sys.used_swap();
            let swap_free = swap_total.saturating_sub(swap_used);
            let swap_percent = if swap_total > 0 {
                (swap_used as f64 / swap_total as f64) * 100.0
            } else {
                0.0
            };

            Ok(MemoryMetrics {
                total,
                used,
                available,
                percent,
                swap_total,
                swap_used,
                swap_free,
                swap_percent,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "disk_usage"))]
    async fn disk_usage(&self) -> anyhow::Result<Vec<DiskUsage>> {
        let disks = self.disks.clone();
        tokio::task::spawn_blocking(move || {
            let mut disks = disks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
            disks.refresh(false);
            let usage = disks
                .list()
                .iter()
                .map(|d| {
                    let total = d.total_space();
                    let free = d.available_space();
                    let used = total.saturating_sub(free);
                    let percent = if total > 0 {
                        (used as f64 / total as f64) * 100.0
                    } else {
                        0.0
                    };
                    DiskUsage {
                        device: d.name().to_string_lossy().into_owned(),
                        mountpoint: d.mount_point().to_string_lossy().into_owned(),
                        total,
                        used,
                        free,
                        percent,
                    }
                })
                .collect();
            Ok(usage)
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "network_counters"))]
    async fn network_counters(&self) -> anyhow::Result<NetworkCounters> {
        let networks = self.networks.clone();
        tokio::task::spawn_blocking(move || {
            let mut networks = networks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
            networks.refresh(true);
            let mut counters = NetworkCounters::default();
            for (_name, data) in networks.list() {
                counters.bytes_sent += data.total_transmitted();
                counters.bytes_recv += data.total_received();
            }
            Ok(counters)
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "temperatures"))]
    async fn temperatures(&self) -> anyhow::Result<Vec<TemperatureReading>> {
        let components = self.components.clone();
        tokio::task::spawn_blocking(move || {
            let mut components = components
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo components lock poisoned: {}", e))?;
            components.refresh(true);
            // Sensors without a current reading are omitted rather than
            // reported as 0.
            let readings = components
                .iter()
                .filter_map(|c| {
                    let current = f64::from(c.temperature()?);
                    Some(TemperatureReading {
                        name: c.label().to_string(),
                        current,
                        high: c.max().map(f64::from),
                        critical: c.critical().map(f64::from),
                    })
                })
                .collect();
            Ok(readings)
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "clock"))]
    async fn clock(&self) -> anyhow::Result<ClockReading> {
        tokio::task::spawn_blocking(move || {
            let boot_secs = System::boot_time();
            let boot_time =
                DateTime::from_timestamp(boot_secs as i64, 0).unwrap_or(DateTime::UNIX_EPOCH);
            Ok(ClockReading {
                boot_time,
                uptime: Duration::from_secs(System::uptime()),
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}
