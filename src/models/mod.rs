// Domain models: live snapshots, static identity, persisted rows, bucket rollups

mod aggregation;
mod row;
mod snapshot;
mod system;

pub use aggregation::{BucketAggregate, BucketInterval, InvalidInterval};
pub use row::MetricsRow;
pub use snapshot::{
    CpuMetrics, DiskUsage, MemoryMetrics, NetworkMetrics, Snapshot, SystemClock,
    TemperatureReading, format_uptime,
};
pub use system::SystemInfo;
