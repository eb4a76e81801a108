// Persisted form of a snapshot: one flat row per (hostname, created_at).

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

use super::Snapshot;

/// Append-only fact row. Rows are never updated; they leave the store only
/// through retention expiry or by being packed into a compressed segment.
/// Multi-disk and multi-sensor detail is live-only: the row persists the
/// first disk entry and the first temperature sensor as representatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
pub struct MetricsRow {
    pub hostname: String,
    /// Sample instant, epoch milliseconds UTC.
    pub created_at: i64,
    pub cpu_percent: f64,
    pub cpu_freq_current: f64,
    pub cpu_freq_min: f64,
    pub cpu_freq_max: f64,
    pub memory_total: u64,
    pub memory_available: u64,
    pub memory_used: u64,
    pub memory_percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
    pub swap_percent: f64,
    pub disk_total: u64,
    pub disk_used: u64,
    pub disk_free: u64,
    pub disk_percent: f64,
    pub network_bytes_sent: u64,
    pub network_bytes_recv: u64,
    pub network_send_rate: f64,
    pub network_recv_rate: f64,
    pub temperature: f64,
    /// Boot instant, epoch milliseconds UTC.
    pub boot_time: i64,
}

impl MetricsRow {
    pub fn from_snapshot(s: &Snapshot) -> Self {
        let disk = s.disk.first();
        let temp = s.temperature.first();
        Self {
            hostname: s.hostname.clone(),
            created_at: s.timestamp.timestamp_millis(),
            cpu_percent: s.cpu.percent,
            cpu_freq_current: s.cpu.freq_current,
            cpu_freq_min: s.cpu.freq_min,
            cpu_freq_max: s.cpu.freq_max,
            memory_total: s.memory.total,
            memory_available: s.memory.available,
            memory_used: s.memory.used,
            memory_percent: s.memory.percent,
            swap_total: s.memory.swap_total,
            swap_used: s.memory.swap_used,
            swap_free: s.memory.swap_free,
            swap_percent: s.memory.swap_percent,
            disk_total: disk.map_or(0, |d| d.total),
            disk_used: disk.map_or(0, |d| d.used),
            disk_free: disk.map_or(0, |d| d.free),
            disk_percent: disk.map_or(0.0, |d| d.percent),
            network_bytes_sent: s.network.bytes_sent_total,
            network_bytes_recv: s.network.bytes_recv_total,
            network_send_rate: s.network.send_rate_mbps,
            network_recv_rate: s.network.recv_rate_mbps,
            temperature: temp.map_or(0.0, |t| t.current),
            boot_time: s.system_time.boot_time.timestamp_millis(),
        }
    }
}
