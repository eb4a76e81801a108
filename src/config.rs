use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sampling: SamplingConfig,
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
    /// Rows, segments, and buckets older than this are deleted by the retention sweep.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Raw rows older than this are packed into compressed hour segments.
    #[serde(default = "default_compress_after_hours")]
    pub compress_after_hours: u32,
}

fn default_retention_days() -> u32 {
    30
}

fn default_compress_after_hours() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    pub sample_interval_ms: u64,
    /// How often to log app stats (ws clients, rows written/dropped) at INFO level.
    pub stats_log_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of snapshots kept in the broadcast channel for /ws/metrics (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_retention_sweep_interval_secs")]
    pub retention_sweep_interval_secs: u64,
    #[serde(default = "default_compression_sweep_interval_secs")]
    pub compression_sweep_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    #[serde(default)]
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            retention_sweep_interval_secs: default_retention_sweep_interval_secs(),
            compression_sweep_interval_secs: default_compression_sweep_interval_secs(),
            vacuum_schedule: None,
            vacuum_interval_secs: default_vacuum_interval_secs(),
        }
    }
}

fn default_retention_sweep_interval_secs() -> u64 {
    3_600
}

fn default_compression_sweep_interval_secs() -> u64 {
    900
}

fn default_vacuum_interval_secs() -> u64 {
    86_400
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.database.retention_days > 0,
            "database.retention_days must be > 0, got {}",
            self.database.retention_days
        );
        anyhow::ensure!(
            self.database.compress_after_hours > 0,
            "database.compress_after_hours must be > 0, got {}",
            self.database.compress_after_hours
        );
        anyhow::ensure!(
            u64::from(self.database.retention_days) * 24 > u64::from(self.database.compress_after_hours),
            "database.retention_days ({} days) must exceed database.compress_after_hours ({} hours)",
            self.database.retention_days,
            self.database.compress_after_hours
        );
        anyhow::ensure!(
            self.sampling.sample_interval_ms > 0,
            "sampling.sample_interval_ms must be > 0, got {}",
            self.sampling.sample_interval_ms
        );
        anyhow::ensure!(
            self.sampling.stats_log_interval_secs > 0,
            "sampling.stats_log_interval_secs must be > 0, got {}",
            self.sampling.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.maintenance.retention_sweep_interval_secs > 0,
            "maintenance.retention_sweep_interval_secs must be > 0, got {}",
            self.maintenance.retention_sweep_interval_secs
        );
        anyhow::ensure!(
            self.maintenance.compression_sweep_interval_secs > 0,
            "maintenance.compression_sweep_interval_secs must be > 0, got {}",
            self.maintenance.compression_sweep_interval_secs
        );
        anyhow::ensure!(
            self.maintenance.vacuum_interval_secs > 0,
            "maintenance.vacuum_interval_secs must be > 0, got {}",
            self.maintenance.vacuum_interval_secs
        );
        if let Some(ref cron_str) = self.maintenance.vacuum_schedule {
            anyhow::ensure!(
                cron_str.parse::<cron::Schedule>().is_ok(),
                "maintenance.vacuum_schedule {:?} is not a valid cron expression (seconds field required, e.g. \"0 0 3 * * *\")",
                cron_str
            );
        }
        Ok(())
    }
}
