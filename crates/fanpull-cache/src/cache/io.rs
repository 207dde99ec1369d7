//! Filesystem side of the store: entry files, atomic writes, quarantine.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tracing::warn;

use crate::error::{CacheError, CacheResult};

use super::CacheEntry;

/// What was found at an entry path.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    Missing,
    Corrupt(CacheError),
    Entry(CacheEntry),
}

/// Read and decode one entry file.
///
/// Absence and undecodable content are outcomes; only I/O failures are errors.
pub(crate) async fn read_entry(path: &Path) -> CacheResult<ReadOutcome> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
        Err(e) => return Err(CacheError::io(path, format!("failed to read entry: {}", e))),
    };

    match serde_json::from_slice::<CacheEntry>(&bytes) {
        Ok(entry) => Ok(ReadOutcome::Entry(entry.normalized())),
        Err(e) => Ok(ReadOutcome::Corrupt(CacheError::corrupt(path, e))),
    }
}

/// Serialize an entry as pretty JSON and write it atomically.
pub(crate) async fn write_entry(path: &Path, entry: &CacheEntry) -> CacheResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CacheError::io(parent, format!("failed to create cache directory: {}", e)))?;
    }

    let content = serde_json::to_string_pretty(entry)
        .map_err(|e| CacheError::io(path, format!("failed to serialize entry: {}", e)))?;
    write_atomic(path, &content).await
}

async fn write_atomic(path: &Path, content: &str) -> CacheResult<()> {
    let temp_path = path.with_extension("tmp");

    fs::write(&temp_path, content)
        .await
        .map_err(|e| CacheError::io(&temp_path, format!("failed to write temp file: {}", e)))?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| CacheError::io(path, format!("failed to rename temp file: {}", e)))?;

    Ok(())
}

/// Delete a file, treating "already gone" as success.
pub(crate) async fn remove_if_exists(path: &Path) -> CacheResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, format!("failed to remove entry: {}", e))),
    }
}

/// Remove a corrupt entry file. Never fails: a file that cannot be removed
/// is logged and left behind.
pub(crate) async fn quarantine(path: &Path, cause: &CacheError) -> bool {
    warn!(path = %path.display(), error = %cause, "cache entry corrupt, removing");
    match remove_if_exists(path).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!(error = %e, "failed to remove corrupt cache entry");
            false
        }
    }
}
