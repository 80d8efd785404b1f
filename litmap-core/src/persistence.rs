//! Session snapshots and saved backend payloads on disk.
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so an
//! interrupted run never leaves a half-written snapshot behind.

use crate::error::{LitmapError, Result};
use crate::state::ResearchState;
use serde_json::Value;
use std::io;
use std::path::Path;
use tracing::info;

/// Atomically write `data` as pretty-printed JSON, creating parent directories.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes, creating parent directories.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load JSON from `path`. `Ok(None)` when the file does not exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let value =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

/// Save a session snapshot.
pub fn save_snapshot(path: &Path, state: &ResearchState) -> Result<()> {
    atomic_write_json(path, state)?;
    info!(
        path = %path.display(),
        session = %state.session_id,
        papers = state.papers.len(),
        clusters = state.clusters.len(),
        "Saved session snapshot"
    );
    Ok(())
}

/// Load a session snapshot saved by [`save_snapshot`].
pub fn load_snapshot(path: &Path) -> Result<Option<ResearchState>> {
    Ok(load_json(path)?)
}

/// Read a saved backend payload (for example a `/api/clusters` response).
///
/// Unlike [`load_json`], a missing file is an error.
pub fn load_payload(path: &Path) -> Result<Value> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(LitmapError::from)
}
