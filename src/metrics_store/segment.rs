// Compressed raw history: whole hour windows packed into one blob per
// (hostname, window). Blob layout: [version: u8][wincode row batch].

use crate::models::MetricsRow;

pub(super) const SEGMENT_VERSION: u8 = 1;

/// Packed window width, aligned to the epoch.
pub(super) const SEGMENT_WIDTH_MS: i64 = 3_600_000;

pub(super) fn window_start(ts_ms: i64) -> i64 {
    ts_ms.div_euclid(SEGMENT_WIDTH_MS) * SEGMENT_WIDTH_MS
}

pub(super) fn pack_rows(rows: &[MetricsRow]) -> anyhow::Result<Vec<u8>> {
    let payload = wincode::serialize(&rows.to_vec())
        .map_err(|e| anyhow::anyhow!("wincode segment: {}", e))?;
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(SEGMENT_VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Segments have no legacy unversioned form; an unknown version byte is an
/// error, not a fallback.
pub(super) fn unpack_rows(bytes: &[u8]) -> anyhow::Result<Vec<MetricsRow>> {
    match bytes.split_first() {
        Some((&SEGMENT_VERSION, payload)) => wincode::deserialize(payload)
            .map_err(|e| anyhow::anyhow!("wincode segment: {}", e)),
        Some((version, _)) => Err(anyhow::anyhow!("unsupported segment version: {}", version)),
        None => Err(anyhow::anyhow!("empty segment blob")),
    }
}
