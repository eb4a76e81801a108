// Build-time identity from Cargo.toml

/// Crate version, e.g. "0.4.0".
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported by /version and the startup log.
pub const NAME: &str = env!("CARGO_PKG_NAME");
