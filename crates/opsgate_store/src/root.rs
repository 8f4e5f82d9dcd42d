//! Storage-root resolution.

use opsgate_error::{OpsgateResult, StorageError};
use std::path::PathBuf;
use tracing::debug;

/// Resolve the storage root: the first writable candidate among, in
/// order, `OPSGATE_DATA_DIR`, the platform data directory, a hidden
/// home directory, and the working directory.
pub fn resolve_root() -> OpsgateResult<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(dir) = std::env::var("OPSGATE_DATA_DIR") {
        candidates.push(PathBuf::from(dir));
    }
    if let Some(data) = dirs::data_dir() {
        candidates.push(data.join("opsgate"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".opsgate"));
    }
    candidates.push(PathBuf::from(".opsgate"));

    for candidate in candidates {
        if std::fs::create_dir_all(&candidate).is_ok() {
            let probe = candidate.join(".write_probe");
            if std::fs::write(&probe, b"ok").is_ok() {
                let _ = std::fs::remove_file(&probe);
                debug!(root = %candidate.display(), "Resolved storage root");
                return Ok(candidate);
            }
        }
    }

    Err(StorageError::new("no writable storage root candidate").into())
}
