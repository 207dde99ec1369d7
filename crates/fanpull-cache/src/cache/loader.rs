//! Startup hydration of the in-memory tier from entry files.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult};
use crate::keys;

use super::io::{self, ReadOutcome};
use super::CacheEntry;

const CACHE_SUFFIX: &str = ".cache";

/// Entry files read concurrently while loading.
const LOAD_CONCURRENCY: usize = 16;

/// Outcome of a full load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entry files found.
    pub files: usize,

    /// Entries now held in memory.
    pub loaded: usize,

    /// Corrupt files deleted.
    pub removed: usize,
}

pub(crate) struct Loaded {
    pub entries: HashMap<String, CacheEntry>,
    pub report: LoadReport,
}

/// Hash key for an entry file name, or `None` if the loader ignores it.
///
/// Names must end in `.cache` (any case) and must not start with `_`.
pub(crate) fn hash_key_from_file_name(name: &str) -> Option<&str> {
    if name.starts_with('_') || name.len() < CACHE_SUFFIX.len() {
        return None;
    }
    let split = name.len() - CACHE_SUFFIX.len();
    if !name.is_char_boundary(split) {
        return None;
    }
    let (stem, suffix) = name.split_at(split);
    suffix.eq_ignore_ascii_case(CACHE_SUFFIX).then_some(stem)
}

pub(crate) async fn load_dir(dir: &Path) -> CacheResult<Loaded> {
    let files = list_entry_files(dir).await?;
    info!(dir = %dir.display(), files = files.len(), "loading cache files");

    let mut report = LoadReport {
        files: files.len(),
        ..LoadReport::default()
    };
    let mut entries = HashMap::with_capacity(files.len());

    let mut reads = stream::iter(files)
        .map(|(hash_key, path)| async move {
            let outcome = io::read_entry(&path).await;
            (hash_key, path, outcome)
        })
        .buffer_unordered(LOAD_CONCURRENCY);

    let mut seen = 0usize;
    while let Some((hash_key, path, outcome)) = reads.next().await {
        match outcome? {
            ReadOutcome::Entry(entry) => {
                entries.insert(hash_key, entry);
            }
            ReadOutcome::Corrupt(cause) => {
                if io::quarantine(&path, &cause).await {
                    report.removed += 1;
                }
            }
            // Deleted between listing and reading.
            ReadOutcome::Missing => {}
        }

        seen += 1;
        if seen % 100 == 0 {
            debug!(seen, total = report.files, "cache load progress");
        }
    }

    report.loaded = entries.len();
    info!(
        "{} cache item{}",
        report.loaded,
        if report.loaded == 1 { "" } else { "s" }
    );

    Ok(Loaded { entries, report })
}

async fn list_entry_files(dir: &Path) -> CacheResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();

    if !fs::try_exists(dir).await.unwrap_or(false) {
        debug!(dir = %dir.display(), "cache directory missing, nothing to load");
        return Ok(files);
    }

    let mut listing = fs::read_dir(dir)
        .await
        .map_err(|e| CacheError::io(dir, format!("failed to read cache directory: {}", e)))?;

    while let Some(entry) = listing
        .next_entry()
        .await
        .map_err(|e| CacheError::io(dir, format!("failed to read directory entry: {}", e)))?
    {
        let name = entry.file_name();
        let Some(hash_key) = name.to_str().and_then(hash_key_from_file_name) else {
            continue;
        };

        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        files.push((hash_key.to_string(), entry.path()));
    }

    Ok(canonicalize_names(dir, files).await)
}

/// Rename entry files with an odd-case suffix (`<h>.CACHE`) to `<h>.cache`,
/// the only name `get`, `exists` and `wipe` look at.
///
/// When both names exist the canonical file wins and the other is deleted.
/// A file that cannot be renamed is loaded from where it is.
async fn canonicalize_names(dir: &Path, files: Vec<(String, PathBuf)>) -> Vec<(String, PathBuf)> {
    let present: HashSet<String> = files
        .iter()
        .filter_map(|(_, path)| path.file_name()?.to_str().map(String::from))
        .collect();

    let mut canonical_files = Vec::with_capacity(files.len());
    for (hash_key, path) in files {
        let canonical_name = keys::file_name(&hash_key);
        if path.file_name().and_then(|n| n.to_str()) == Some(canonical_name.as_str()) {
            canonical_files.push((hash_key, path));
            continue;
        }

        if present.contains(&canonical_name) {
            warn!(path = %path.display(), "duplicate cache entry file, removing");
            if let Err(e) = io::remove_if_exists(&path).await {
                warn!(error = %e, "failed to remove duplicate cache entry");
            }
            continue;
        }

        let canonical = dir.join(&canonical_name);
        match fs::rename(&path, &canonical).await {
            Ok(()) => {
                debug!(from = %path.display(), to = %canonical.display(), "renamed cache entry file");
                canonical_files.push((hash_key, canonical));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to rename cache entry file");
                canonical_files.push((hash_key, path));
            }
        }
    }
    canonical_files
}
