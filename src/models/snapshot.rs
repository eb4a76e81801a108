// Live telemetry snapshot and its nested metric groups.
// Wire format is snake_case JSON; instants serialize as ISO-8601 strings.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub percent: f64,
    pub load_1: f64,
    pub load_5: f64,
    pub load_15: f64,
    /// MHz; 0 when the platform does not expose frequency.
    pub freq_current: f64,
    pub freq_min: f64,
    pub freq_max: f64,
}

/// Byte counts plus derived percentages for RAM and swap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
    pub swap_percent: f64,
}

/// One mounted, typed filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskUsage {
    pub device: String,
    pub mountpoint: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// Cumulative interface counters (summed across interfaces, monotonic since
/// boot) plus rates derived from the previous sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub bytes_sent_total: u64,
    pub bytes_recv_total: u64,
    pub send_rate_mbps: f64,
    pub recv_rate_mbps: f64,
}

/// One hardware sensor. `high`/`critical` are thresholds the platform may
/// not report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub name: String,
    pub current: f64,
    pub high: Option<f64>,
    pub critical: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemClock {
    pub boot_time: DateTime<Utc>,
    /// Rendered `Nd HH:MM:SS`.
    pub uptime: String,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            boot_time: DateTime::UNIX_EPOCH,
            uptime: format_uptime(Duration::ZERO),
        }
    }
}

/// One sampling instant for one host. Built per tick, broadcast to live
/// subscribers and handed to the persistence writer, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: Vec<DiskUsage>,
    pub network: NetworkMetrics,
    pub temperature: Vec<TemperatureReading>,
    pub system_time: SystemClock,
}

/// Render an uptime duration as `Nd HH:MM:SS`.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
}
