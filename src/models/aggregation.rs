// Bucket rollups: one aggregate row per (interval, bucket start).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three fixed rollup widths. History and summary queries accept exactly
/// these, spelled as their `as_str` forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketInterval {
    OneMinute,
    FiveMinutes,
    OneHour,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid interval {0:?}: valid values are \"1 minute\", \"5 minutes\", \"1 hour\"")]
pub struct InvalidInterval(pub String);

impl BucketInterval {
    pub const ALL: [BucketInterval; 3] = [
        BucketInterval::OneMinute,
        BucketInterval::FiveMinutes,
        BucketInterval::OneHour,
    ];

    pub fn as_secs(self) -> i64 {
        match self {
            BucketInterval::OneMinute => 60,
            BucketInterval::FiveMinutes => 300,
            BucketInterval::OneHour => 3_600,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BucketInterval::OneMinute => "1 minute",
            BucketInterval::FiveMinutes => "5 minutes",
            BucketInterval::OneHour => "1 hour",
        }
    }

    /// Floor an epoch-ms timestamp to the start of its bucket.
    pub fn bucket_start_ms(self, ts_ms: i64) -> i64 {
        let width = self.as_secs() * 1_000;
        ts_ms.div_euclid(width) * width
    }
}

impl FromStr for BucketInterval {
    type Err = InvalidInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1 minute" => Ok(BucketInterval::OneMinute),
            "5 minutes" => Ok(BucketInterval::FiveMinutes),
            "1 hour" => Ok(BucketInterval::OneHour),
            other => Err(InvalidInterval(other.to_string())),
        }
    }
}

impl fmt::Display for BucketInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean of the raw rows whose timestamp falls in
/// `[bucket_start, bucket_start + interval)`. Derived by the store; never
/// written directly by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketAggregate {
    pub bucket_start: DateTime<Utc>,
    pub cpu_percent_avg: f64,
    pub memory_percent_avg: f64,
    pub disk_percent_avg: f64,
    pub temperature_avg: f64,
    pub network_send_rate_avg: f64,
    pub network_recv_rate_avg: f64,
    pub sample_count: i64,
}
