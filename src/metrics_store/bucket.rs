// Bucket rollups: schema, transactional fold-in, row mapping.
// Buckets store running sums; averages materialize at read time.

use chrono::DateTime;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use crate::models::{BucketAggregate, BucketInterval, MetricsRow};

pub(super) async fn init_bucket_table(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metrics_bucket (
            bucket_seconds INTEGER NOT NULL,
            bucket_start INTEGER NOT NULL,
            cpu_percent_sum REAL NOT NULL,
            memory_percent_sum REAL NOT NULL,
            disk_percent_sum REAL NOT NULL,
            temperature_sum REAL NOT NULL,
            network_send_rate_sum REAL NOT NULL,
            network_recv_rate_sum REAL NOT NULL,
            sample_count INTEGER NOT NULL,
            PRIMARY KEY (bucket_seconds, bucket_start)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Fold one raw row into its bucket for `interval`, inside the caller's
/// transaction with the raw insert. A reader can therefore never observe a
/// durably written row missing from its rollup.
pub(super) async fn upsert_bucket(
    conn: &mut sqlx::SqliteConnection,
    interval: BucketInterval,
    row: &MetricsRow,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO metrics_bucket
        (bucket_seconds, bucket_start, cpu_percent_sum, memory_percent_sum, disk_percent_sum,
         temperature_sum, network_send_rate_sum, network_recv_rate_sum, sample_count)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1)
        ON CONFLICT (bucket_seconds, bucket_start) DO UPDATE SET
            cpu_percent_sum = cpu_percent_sum + excluded.cpu_percent_sum,
            memory_percent_sum = memory_percent_sum + excluded.memory_percent_sum,
            disk_percent_sum = disk_percent_sum + excluded.disk_percent_sum,
            temperature_sum = temperature_sum + excluded.temperature_sum,
            network_send_rate_sum = network_send_rate_sum + excluded.network_send_rate_sum,
            network_recv_rate_sum = network_recv_rate_sum + excluded.network_recv_rate_sum,
            sample_count = sample_count + 1
        "#,
    )
    .bind(interval.as_secs())
    .bind(interval.bucket_start_ms(row.created_at))
    .bind(row.cpu_percent)
    .bind(row.memory_percent)
    .bind(row.disk_percent)
    .bind(row.temperature)
    .bind(row.network_send_rate)
    .bind(row.network_recv_rate)
    .execute(conn)
    .await?;
    Ok(())
}

pub(super) fn parse_bucket_row(row: &SqliteRow) -> anyhow::Result<BucketAggregate> {
    let bucket_start_ms: i64 = row.try_get("bucket_start")?;
    let sample_count: i64 = row.try_get("sample_count")?;
    let n = sample_count.max(1) as f64;
    let bucket_start = DateTime::from_timestamp_millis(bucket_start_ms)
        .ok_or_else(|| anyhow::anyhow!("bucket_start out of range: {}", bucket_start_ms))?;
    Ok(BucketAggregate {
        bucket_start,
        cpu_percent_avg: row.try_get::<f64, _>("cpu_percent_sum")? / n,
        memory_percent_avg: row.try_get::<f64, _>("memory_percent_sum")? / n,
        disk_percent_avg: row.try_get::<f64, _>("disk_percent_sum")? / n,
        temperature_avg: row.try_get::<f64, _>("temperature_sum")? / n,
        network_send_rate_avg: row.try_get::<f64, _>("network_send_rate_sum")? / n,
        network_recv_rate_avg: row.try_get::<f64, _>("network_recv_rate_sum")? / n,
        sample_count,
    })
}
