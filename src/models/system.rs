// Static host identity

use serde::{Deserialize, Serialize};

/// Static system identity; captured once at startup and exposed via
/// GET /api/system_info and the WS ack event. Never sampled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub hostname: String,
    pub cpu_model: String,
    pub cpu_cores: u32,
    pub cpu_physical_cores: u32,
}
