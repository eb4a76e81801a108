// Model tests: wire format (snake_case JSON), uptime rendering, row projection, intervals

use std::time::Duration;

use chrono::{TimeZone, Utc};
use systempulse::models::*;

fn sample_snapshot() -> Snapshot {
    Snapshot {
        timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 10, 30, 0).unwrap(),
        hostname: "pi5".into(),
        cpu: CpuMetrics {
            percent: 12.5,
            load_1: 0.5,
            load_5: 0.4,
            load_15: 0.3,
            freq_current: 2400.0,
            freq_min: 800.0,
            freq_max: 4200.0,
        },
        memory: MemoryMetrics {
            total: 16_000,
            used: 4_000,
            available: 12_000,
            percent: 25.0,
            swap_total: 2_000,
            swap_used: 500,
            swap_free: 1_500,
            swap_percent: 25.0,
        },
        disk: vec![
            DiskUsage {
                device: "/dev/sda1".into(),
                mountpoint: "/".into(),
                total: 1000,
                used: 400,
                free: 600,
                percent: 40.0,
            },
            DiskUsage {
                device: "/dev/sdb1".into(),
                mountpoint: "/data".into(),
                total: 2000,
                used: 100,
                free: 1900,
                percent: 5.0,
            },
        ],
        network: NetworkMetrics {
            bytes_sent_total: 1000,
            bytes_recv_total: 2000,
            send_rate_mbps: 0.008,
            recv_rate_mbps: 0.004,
        },
        temperature: vec![
            TemperatureReading {
                name: "coretemp".into(),
                current: 48.0,
                high: Some(90.0),
                critical: Some(105.0),
            },
            TemperatureReading {
                name: "nvme".into(),
                current: 35.5,
                high: None,
                critical: None,
            },
        ],
        system_time: SystemClock {
            boot_time: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
            uptime: format_uptime(Duration::from_secs(95_400)),
        },
    }
}

#[test]
fn snapshot_serializes_snake_case_with_iso_instants() {
    let snapshot = sample_snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"system_time\""));
    assert!(json.contains("\"send_rate_mbps\""));
    assert!(json.contains("\"bytes_sent_total\""));
    assert!(json.contains("\"swap_percent\""));
    assert!(json.contains("2025-06-02T10:30:00"));
    assert!(json.contains("\"boot_time\""));
    assert!(json.contains("2025-06-01T08:00:00"));

    let back: Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back.hostname, "pi5");
    assert_eq!(back.timestamp, snapshot.timestamp);
    assert_eq!(back.system_time.boot_time, snapshot.system_time.boot_time);
    assert_eq!(back.disk.len(), 2);
    assert_eq!(back.temperature[1].high, None);
}

#[test]
fn uptime_renders_days_and_zero_padded_clock() {
    assert_eq!(format_uptime(Duration::ZERO), "0d 00:00:00");
    assert_eq!(format_uptime(Duration::from_secs(59)), "0d 00:00:59");
    assert_eq!(format_uptime(Duration::from_secs(93_784)), "1d 02:03:04");
    assert_eq!(format_uptime(Duration::from_secs(12 * 86_400)), "12d 00:00:00");
}

#[test]
fn metrics_row_takes_first_disk_and_sensor_as_representative() {
    let snapshot = sample_snapshot();
    let row = MetricsRow::from_snapshot(&snapshot);
    assert_eq!(row.hostname, "pi5");
    assert_eq!(row.created_at, snapshot.timestamp.timestamp_millis());
    assert_eq!(row.disk_total, 1000);
    assert_eq!(row.disk_percent, 40.0);
    assert_eq!(row.temperature, 48.0);
    assert_eq!(
        row.boot_time,
        snapshot.system_time.boot_time.timestamp_millis()
    );
}

#[test]
fn metrics_row_defaults_when_groups_are_empty() {
    let mut snapshot = sample_snapshot();
    snapshot.disk.clear();
    snapshot.temperature.clear();
    let row = MetricsRow::from_snapshot(&snapshot);
    assert_eq!(row.disk_total, 0);
    assert_eq!(row.disk_percent, 0.0);
    assert_eq!(row.temperature, 0.0);
}

#[test]
fn metrics_row_wincode_roundtrip() {
    let row = MetricsRow::from_snapshot(&sample_snapshot());
    let bytes = wincode::serialize(&row).unwrap();
    let back: MetricsRow = wincode::deserialize(&bytes).unwrap();
    assert_eq!(back, row);
}

#[test]
fn interval_parses_exact_strings() {
    assert_eq!(
        "1 minute".parse::<BucketInterval>().unwrap(),
        BucketInterval::OneMinute
    );
    assert_eq!(
        "5 minutes".parse::<BucketInterval>().unwrap(),
        BucketInterval::FiveMinutes
    );
    assert_eq!(
        "1 hour".parse::<BucketInterval>().unwrap(),
        BucketInterval::OneHour
    );
    for interval in BucketInterval::ALL {
        assert_eq!(interval.to_string().parse::<BucketInterval>(), Ok(interval));
    }
}

#[test]
fn interval_rejects_unknown_and_names_valid_set() {
    let err = "2 minutes".parse::<BucketInterval>().unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("2 minutes"));
    assert!(msg.contains("1 minute"));
    assert!(msg.contains("5 minutes"));
    assert!(msg.contains("1 hour"));
}

#[test]
fn interval_widths_and_bucket_flooring() {
    assert_eq!(BucketInterval::OneMinute.as_secs(), 60);
    assert_eq!(BucketInterval::FiveMinutes.as_secs(), 300);
    assert_eq!(BucketInterval::OneHour.as_secs(), 3_600);

    assert_eq!(BucketInterval::OneMinute.bucket_start_ms(65_000), 60_000);
    assert_eq!(BucketInterval::OneMinute.bucket_start_ms(59_999), 0);
    assert_eq!(BucketInterval::OneMinute.bucket_start_ms(60_000), 60_000);
    assert_eq!(BucketInterval::FiveMinutes.bucket_start_ms(299_999), 0);
    assert_eq!(BucketInterval::FiveMinutes.bucket_start_ms(300_000), 300_000);
    assert_eq!(BucketInterval::OneHour.bucket_start_ms(3_599_999), 0);
    // Pre-epoch instants floor toward minus infinity, not toward zero
    assert_eq!(BucketInterval::OneMinute.bucket_start_ms(-1), -60_000);
}
