// SQLite time-series store: append-only raw facts, transactional bucket
// rollups, hour-window compression, retention.

mod bucket;
mod segment;

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::instrument;

use crate::models::{BucketAggregate, BucketInterval, MetricsRow};

const POLICY_RETENTION_MS: &str = "retention_ms";
const POLICY_COMPRESS_AFTER_MS: &str = "compress_after_ms";

/// Data lifecycle knobs, recorded in the store on init so a reconfigured
/// restart is visible in the data file itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicies {
    pub retention_ms: i64,
    pub compress_after_ms: i64,
}

impl StorePolicies {
    pub fn new(retention_days: u32, compress_after_hours: u32) -> Self {
        Self {
            retention_ms: (retention_days as i64) * 24 * 60 * 60 * 1000,
            compress_after_ms: (compress_after_hours as i64) * 60 * 60 * 1000,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PruneStats {
    pub raw_rows: u64,
    pub segments: u64,
    pub buckets: u64,
}

pub struct MetricsStore {
    pool: SqlitePool,
    policies: StorePolicies,
}

impl MetricsStore {
    pub async fn connect(
        path: &str,
        max_pool_size: u32,
        policies: StorePolicies,
    ) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool, policies })
    }

    /// Create schema and record policies. Idempotent: a second call against
    /// an already-initialized file changes nothing and never errors.
    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS store_policy (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics_raw (
                hostname TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                cpu_percent REAL NOT NULL,
                cpu_freq_current REAL NOT NULL,
                cpu_freq_min REAL NOT NULL,
                cpu_freq_max REAL NOT NULL,
                memory_total INTEGER NOT NULL,
                memory_available INTEGER NOT NULL,
                memory_used INTEGER NOT NULL,
                memory_percent REAL NOT NULL,
                swap_total INTEGER NOT NULL,
                swap_used INTEGER NOT NULL,
                swap_free INTEGER NOT NULL,
                swap_percent REAL NOT NULL,
                disk_total INTEGER NOT NULL,
                disk_used INTEGER NOT NULL,
                disk_free INTEGER NOT NULL,
                disk_percent REAL NOT NULL,
                network_bytes_sent INTEGER NOT NULL,
                network_bytes_recv INTEGER NOT NULL,
                network_send_rate REAL NOT NULL,
                network_recv_rate REAL NOT NULL,
                temperature REAL NOT NULL,
                boot_time INTEGER NOT NULL,
                PRIMARY KEY (hostname, created_at)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_metrics_raw_created_at ON metrics_raw(created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics_segment (
                hostname TEXT NOT NULL,
                segment_start INTEGER NOT NULL,
                segment_end INTEGER NOT NULL,
                row_count INTEGER NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (hostname, segment_start)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_metrics_segment_end ON metrics_segment(segment_end)",
        )
        .execute(&self.pool)
        .await?;

        bucket::init_bucket_table(&self.pool).await?;

        for (key, value) in [
            (POLICY_RETENTION_MS, self.policies.retention_ms),
            (POLICY_COMPRESS_AFTER_MS, self.policies.compress_after_ms),
        ] {
            sqlx::query(
                "INSERT INTO store_policy (key, value) VALUES ($1, $2)
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Policies as recorded in the data file, None before the first init.
    pub async fn stored_policies(&self) -> anyhow::Result<Option<StorePolicies>> {
        let mut values = BTreeMap::new();
        let rows = sqlx::query("SELECT key, value FROM store_policy")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: i64 = row.try_get("value")?;
            values.insert(key, value);
        }
        match (
            values.get(POLICY_RETENTION_MS),
            values.get(POLICY_COMPRESS_AFTER_MS),
        ) {
            (Some(&retention_ms), Some(&compress_after_ms)) => Ok(Some(StorePolicies {
                retention_ms,
                compress_after_ms,
            })),
            _ => Ok(None),
        }
    }

    /// Append one fact row and fold it into all three bucket rollups in a
    /// single transaction.
    #[instrument(skip(self, row), fields(repo = "metrics", operation = "append_row", hostname = %row.hostname))]
    pub async fn append_row(&self, row: &MetricsRow) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO metrics_raw
            (hostname, created_at, cpu_percent, cpu_freq_current, cpu_freq_min, cpu_freq_max,
             memory_total, memory_available, memory_used, memory_percent,
             swap_total, swap_used, swap_free, swap_percent,
             disk_total, disk_used, disk_free, disk_percent,
             network_bytes_sent, network_bytes_recv, network_send_rate, network_recv_rate,
             temperature, boot_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(&row.hostname)
        .bind(row.created_at)
        .bind(row.cpu_percent)
        .bind(row.cpu_freq_current)
        .bind(row.cpu_freq_min)
        .bind(row.cpu_freq_max)
        .bind(row.memory_total as i64)
        .bind(row.memory_available as i64)
        .bind(row.memory_used as i64)
        .bind(row.memory_percent)
        .bind(row.swap_total as i64)
        .bind(row.swap_used as i64)
        .bind(row.swap_free as i64)
        .bind(row.swap_percent)
        .bind(row.disk_total as i64)
        .bind(row.disk_used as i64)
        .bind(row.disk_free as i64)
        .bind(row.disk_percent)
        .bind(row.network_bytes_sent as i64)
        .bind(row.network_bytes_recv as i64)
        .bind(row.network_send_rate)
        .bind(row.network_recv_rate)
        .bind(row.temperature)
        .bind(row.boot_time)
        .execute(&mut *tx)
        .await?;

        for interval in BucketInterval::ALL {
            bucket::upsert_bucket(&mut tx, interval, row).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Raw rows in [from_ms, to_ms), ascending by timestamp. Packed segments
    /// overlapping the range are unpacked and merged in, so compression is
    /// invisible to callers.
    #[instrument(skip(self), fields(repo = "metrics", operation = "raw_rows_in_range"))]
    pub async fn raw_rows_in_range(
        &self,
        from_ms: i64,
        to_ms: i64,
    ) -> anyhow::Result<Vec<MetricsRow>> {
        let rows = sqlx::query(
            "SELECT hostname, created_at, cpu_percent, cpu_freq_current, cpu_freq_min, cpu_freq_max,
                    memory_total, memory_available, memory_used, memory_percent,
                    swap_total, swap_used, swap_free, swap_percent,
                    disk_total, disk_used, disk_free, disk_percent,
                    network_bytes_sent, network_bytes_recv, network_send_rate, network_recv_rate,
                    temperature, boot_time
             FROM metrics_raw WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at ASC",
        )
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Self::parse_raw_row(&row)?);
        }

        let blobs = sqlx::query(
            "SELECT data FROM metrics_segment WHERE segment_end > $1 AND segment_start < $2",
        )
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;
        for blob_row in blobs {
            let data: Vec<u8> = blob_row.try_get("data")?;
            let packed = segment::unpack_rows(&data)?;
            out.extend(
                packed
                    .into_iter()
                    .filter(|r| r.created_at >= from_ms && r.created_at < to_ms),
            );
        }

        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }

    /// Bucket aggregates for one interval, newest first, at most `limit`.
    /// A limit of zero short-circuits to an empty result.
    #[instrument(skip(self), fields(repo = "metrics", operation = "bucket_history", interval = %interval))]
    pub async fn bucket_history(
        &self,
        interval: BucketInterval,
        limit: u32,
    ) -> anyhow::Result<Vec<BucketAggregate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT bucket_start, cpu_percent_sum, memory_percent_sum, disk_percent_sum,
                    temperature_sum, network_send_rate_sum, network_recv_rate_sum, sample_count
             FROM metrics_bucket WHERE bucket_seconds = $1
             ORDER BY bucket_start DESC LIMIT $2",
        )
        .bind(interval.as_secs())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(bucket::parse_bucket_row(&row)?);
        }
        Ok(out)
    }

    pub async fn latest_bucket(
        &self,
        interval: BucketInterval,
    ) -> anyhow::Result<Option<BucketAggregate>> {
        let row = sqlx::query(
            "SELECT bucket_start, cpu_percent_sum, memory_percent_sum, disk_percent_sum,
                    temperature_sum, network_send_rate_sum, network_recv_rate_sum, sample_count
             FROM metrics_bucket WHERE bucket_seconds = $1
             ORDER BY bucket_start DESC LIMIT 1",
        )
        .bind(interval.as_secs())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| bucket::parse_bucket_row(&r)).transpose()
    }

    /// Latest bucket per interval; intervals with no data yet are absent,
    /// never fabricated.
    #[instrument(skip(self), fields(repo = "metrics", operation = "bucket_summary"))]
    pub async fn bucket_summary(&self) -> anyhow::Result<BTreeMap<&'static str, BucketAggregate>> {
        let mut out = BTreeMap::new();
        for interval in BucketInterval::ALL {
            if let Some(agg) = self.latest_bucket(interval).await? {
                out.insert(interval.as_str(), agg);
            }
        }
        Ok(out)
    }

    /// Delete raw rows, segments, and buckets whose entire window lies past
    /// the retention horizon.
    #[instrument(skip(self), fields(repo = "metrics", operation = "prune_expired"))]
    pub async fn prune_expired(&self) -> anyhow::Result<PruneStats> {
        let cutoff = Utc::now().timestamp_millis() - self.policies.retention_ms;

        let raw = sqlx::query("DELETE FROM metrics_raw WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        let segments = sqlx::query("DELETE FROM metrics_segment WHERE segment_end <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        let buckets =
            sqlx::query("DELETE FROM metrics_bucket WHERE bucket_start + bucket_seconds * 1000 <= $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;

        Ok(PruneStats {
            raw_rows: raw.rows_affected(),
            segments: segments.rows_affected(),
            buckets: buckets.rows_affected(),
        })
    }

    /// Pack whole hour windows of raw rows older than the compression
    /// horizon into segments. Each window is one short transaction; a
    /// partial trailing window stays raw until it has fully aged. Returns
    /// the number of segments written.
    #[instrument(skip(self), fields(repo = "metrics", operation = "compress_aged"))]
    pub async fn compress_aged(&self) -> anyhow::Result<u64> {
        let cutoff = Utc::now().timestamp_millis() - self.policies.compress_after_ms;
        let mut packed = 0u64;
        loop {
            let min_ts = sqlx::query_scalar::<_, Option<i64>>(
                "SELECT MIN(created_at) FROM metrics_raw WHERE created_at < $1",
            )
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await?;
            let Some(min_ts) = min_ts else {
                break;
            };
            let window_start = segment::window_start(min_ts);
            let window_end = window_start + segment::SEGMENT_WIDTH_MS;
            if window_end > cutoff {
                break;
            }
            packed += self.pack_window(window_start, window_end).await?;
        }
        Ok(packed)
    }

    async fn pack_window(&self, window_start: i64, window_end: i64) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT hostname, created_at, cpu_percent, cpu_freq_current, cpu_freq_min, cpu_freq_max,
                    memory_total, memory_available, memory_used, memory_percent,
                    swap_total, swap_used, swap_free, swap_percent,
                    disk_total, disk_used, disk_free, disk_percent,
                    network_bytes_sent, network_bytes_recv, network_send_rate, network_recv_rate,
                    temperature, boot_time
             FROM metrics_raw WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at ASC",
        )
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&mut *tx)
        .await?;

        let mut by_host: BTreeMap<String, Vec<MetricsRow>> = BTreeMap::new();
        for row in rows {
            let parsed = Self::parse_raw_row(&row)?;
            by_host.entry(parsed.hostname.clone()).or_default().push(parsed);
        }

        let mut segments = 0u64;
        for (hostname, mut host_rows) in by_host {
            // A segment may already exist for this window if rows arrived
            // after an earlier sweep packed it; merge instead of clobbering.
            let existing = sqlx::query(
                "SELECT data FROM metrics_segment WHERE hostname = $1 AND segment_start = $2",
            )
            .bind(&hostname)
            .bind(window_start)
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(existing) = existing {
                let data: Vec<u8> = existing.try_get("data")?;
                let mut merged = segment::unpack_rows(&data)?;
                merged.append(&mut host_rows);
                merged.sort_by_key(|r| r.created_at);
                host_rows = merged;
            }

            let data = segment::pack_rows(&host_rows)?;
            sqlx::query(
                "INSERT OR REPLACE INTO metrics_segment
                 (hostname, segment_start, segment_end, row_count, data)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&hostname)
            .bind(window_start)
            .bind(window_end)
            .bind(host_rows.len() as i64)
            .bind(&data)
            .execute(&mut *tx)
            .await?;
            segments += 1;
        }

        sqlx::query("DELETE FROM metrics_raw WHERE created_at >= $1 AND created_at < $2")
            .bind(window_start)
            .bind(window_end)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(segments)
    }

    /// Reclaim space after deletes (run periodically after pruning).
    #[instrument(skip(self), fields(repo = "metrics", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    fn parse_raw_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<MetricsRow> {
        Ok(MetricsRow {
            hostname: row.try_get("hostname")?,
            created_at: row.try_get("created_at")?,
            cpu_percent: row.try_get("cpu_percent")?,
            cpu_freq_current: row.try_get("cpu_freq_current")?,
            cpu_freq_min: row.try_get("cpu_freq_min")?,
            cpu_freq_max: row.try_get("cpu_freq_max")?,
            memory_total: row.try_get::<i64, _>("memory_total")? as u64,
            memory_available: row.try_get::<i64, _>("memory_available")? as u64,
            memory_used: row.try_get::<i64, _>("memory_used")? as u64,
            memory_percent: row.try_get("memory_percent")?,
            swap_total: row.try_get::<i64, _>("swap_total")? as u64,
            swap_used: row.try_get::<i64, _>("swap_used")? as u64,
            swap_free: row.try_get::<i64, _>("swap_free")? as u64,
            swap_percent: row.try_get("swap_percent")?,
            disk_total: row.try_get::<i64, _>("disk_total")? as u64,
            disk_used: row.try_get::<i64, _>("disk_used")? as u64,
            disk_free: row.try_get::<i64, _>("disk_free")? as u64,
            disk_percent: row.try_get("disk_percent")?,
            network_bytes_sent: row.try_get::<i64, _>("network_bytes_sent")? as u64,
            network_bytes_recv: row.try_get::<i64, _>("network_bytes_recv")? as u64,
            network_send_rate: row.try_get("network_send_rate")?,
            network_recv_rate: row.try_get("network_recv_rate")?,
            temperature: row.try_get("temperature")?,
            boot_time: row.try_get("boot_time")?,
        })
    }
}
