//! Persistence layer.
//!
//! JSON snapshots for the small amount of state that outlives a cycle:
//! the recommendation ledger, the team-id cache, and the latest cycle's
//! forecast records for downstream consumers.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::engine::pipeline::ForecastRecord;

/// Serialize `value` as pretty JSON to `path`.
///
/// Writes to a sibling temp file first and renames it over the target, so
/// a crash mid-write never leaves a truncated snapshot behind.
pub fn write_json<T: Serialize + ?Sized>(path: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise snapshot")?;
    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, &json).with_context(|| format!("Failed to write {tmp}"))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to move {tmp} to {path}"))?;
    debug!(path, bytes = json.len(), "Snapshot written");
    Ok(())
}

/// Read a JSON snapshot from `path`.
pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {path}"))
}

/// Save one cycle's forecast records.
pub fn save_forecasts(records: &[ForecastRecord], path: &str) -> Result<()> {
    write_json(path, records)?;
    info!(path, records = records.len(), "Forecasts saved");
    Ok(())
}

/// Load the last saved forecast records. Returns None if there are none yet.
pub fn load_forecasts(path: &str) -> Result<Option<Vec<ForecastRecord>>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
