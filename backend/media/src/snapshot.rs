//! Snapshot store: persists inbound camera frames to local disk.
//!
//! Frames arrive as base64 text, either bare or wrapped in a
//! `data:image/*;base64,` URI. The store decodes them and writes one file
//! per capture; the path is only returned once the bytes are on disk.

use std::path::PathBuf;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use clawbridge_core::BridgeError;

/// Data-URI prefix emitted by `canvas.toDataURL()` and friends.
static DATA_URI_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/\w+;base64,").unwrap());

/// Writes inbound snapshots under a single directory with collision-free
/// filenames.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Decode and persist one snapshot, returning the file path.
    ///
    /// The filename combines the capture timestamp with a random suffix so a
    /// burst of same-millisecond captures cannot collide. The file is fully
    /// flushed before the path is handed back.
    pub async fn save(&self, data: &str) -> Result<PathBuf, BridgeError> {
        let raw = DATA_URI_PREFIX.replace(data, "");
        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|e| BridgeError::Storage(format!("invalid base64 snapshot: {e}")))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BridgeError::Storage(format!("cannot create {}: {e}", self.dir.display())))?;

        let filename = format!(
            "snapshot-{}-{}.jpg",
            Utc::now().timestamp_millis(),
            short_suffix()
        );
        let path = self.dir.join(filename);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| BridgeError::Storage(format!("cannot create {}: {e}", path.display())))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| BridgeError::Storage(format!("write to {} failed: {e}", path.display())))?;
        file.sync_all()
            .await
            .map_err(|e| BridgeError::Storage(format!("flush of {} failed: {e}", path.display())))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Snapshot saved");
        Ok(path)
    }
}

fn short_suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
