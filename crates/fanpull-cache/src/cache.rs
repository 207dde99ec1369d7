//! Two-tier content-addressed store.
//!
//! An in-memory map in front of one JSON file per entry. Both tiers are keyed
//! by the hash key; every write updates both, and a read that misses memory
//! but finds a file backfills memory.
//!
//! # Cache Structure
//!
//! ```text
//! {cache_dir}/
//!   {hashKey}.cache    # {"rawKey", "hashKey", "updated", "data"}
//! ```
//!
//! Files ending in anything but `.cache`, or starting with `_`, are left
//! alone. Entries never expire; they go away through [`CacheStore::wipe`] or
//! by deleting the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::CacheResult;
use crate::keys::{self, build_hash_key};
use crate::types::{CacheConfig, Payload};

mod io;
mod loader;

pub use loader::LoadReport;

use io::ReadOutcome;

/// A persisted cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CacheEntry {
    /// Canonical request identity.
    pub raw_key: String,

    /// SHA-256 of `raw_key`; also the file stem.
    pub hash_key: String,

    /// Time of the last write.
    pub updated: DateTime<Utc>,

    /// The fetched value, verbatim.
    pub data: Payload,

    /// Which `Payload` variant was stored. Absent in files written by older
    /// tooling, which are read back by shape alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PayloadKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PayloadKind {
    Text,
    Json,
}

impl CacheEntry {
    pub(crate) fn new(raw_key: &str, hash_key: String, data: Payload) -> Self {
        let kind = match data {
            Payload::Text(_) => PayloadKind::Text,
            Payload::Json(_) => PayloadKind::Json,
        };
        Self {
            raw_key: raw_key.to_string(),
            hash_key,
            updated: Utc::now(),
            data,
            kind: Some(kind),
        }
    }

    /// Undo the untagged encoding's one ambiguity: a structured string value
    /// deserializes as `Text`.
    pub(crate) fn normalized(mut self) -> Self {
        if self.kind == Some(PayloadKind::Json) {
            self.data = self.data.into_json();
        }
        self
    }
}

/// Content-addressed fetch cache.
///
/// Share it between components as `Arc<CacheStore>`. The map lock is held
/// across the disk write in [`set`](Self::set) and [`wipe`](Self::wipe), so a
/// reader never sees one tier updated without the other.
#[derive(Debug)]
pub struct CacheStore {
    cache_dir: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    /// Create an empty store over `cache_dir` without touching the disk.
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store from config and hydrate it from disk.
    pub async fn open(config: &CacheConfig) -> CacheResult<(Self, LoadReport)> {
        let store = Self::with_dir(&config.cache_dir);
        let report = store.load_all().await?;
        Ok((store, report))
    }

    /// Get the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, hash_key: &str) -> PathBuf {
        self.cache_dir.join(keys::file_name(hash_key))
    }

    /// Number of entries held in memory.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether `raw_key` is cached in memory or on disk.
    pub async fn exists(&self, raw_key: &str) -> bool {
        let hash_key = build_hash_key(raw_key);
        if self.entries.read().await.contains_key(&hash_key) {
            return true;
        }
        fs::try_exists(self.entry_path(&hash_key))
            .await
            .unwrap_or(false)
    }

    /// Get the payload stored for `raw_key`.
    ///
    /// Returns `None` when absent. A file that exists but cannot be decoded
    /// is removed and reported as absent.
    pub async fn get(&self, raw_key: &str) -> CacheResult<Option<Payload>> {
        let hash_key = build_hash_key(raw_key);

        if let Some(entry) = self.entries.read().await.get(&hash_key) {
            debug!(hash_key = %hash_key, "cache hit (memory)");
            return Ok(Some(entry.data.clone()));
        }

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(&hash_key) {
            return Ok(Some(entry.data.clone()));
        }

        let path = self.entry_path(&hash_key);
        match io::read_entry(&path).await? {
            ReadOutcome::Entry(entry) => {
                debug!(hash_key = %hash_key, "cache hit (disk)");
                let data = entry.data.clone();
                entries.insert(hash_key, entry);
                Ok(Some(data))
            }
            ReadOutcome::Corrupt(cause) => {
                io::quarantine(&path, &cause).await;
                Ok(None)
            }
            ReadOutcome::Missing => {
                debug!(hash_key = %hash_key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Store `payload` under `raw_key`, replacing any previous value.
    pub async fn set(&self, raw_key: &str, payload: Payload) -> CacheResult<()> {
        let hash_key = build_hash_key(raw_key);
        let entry = CacheEntry::new(raw_key, hash_key.clone(), payload);

        let mut entries = self.entries.write().await;
        io::write_entry(&self.entry_path(&hash_key), &entry).await?;
        entries.insert(hash_key.clone(), entry);

        debug!(hash_key = %hash_key, "cached entry");
        Ok(())
    }

    /// Remove `raw_key` from both tiers. No-op if absent.
    pub async fn wipe(&self, raw_key: &str) -> CacheResult<()> {
        let hash_key = build_hash_key(raw_key);

        let mut entries = self.entries.write().await;
        let removed_file = io::remove_if_exists(&self.entry_path(&hash_key)).await?;
        let removed_mem = entries.remove(&hash_key).is_some();

        if removed_file || removed_mem {
            debug!(hash_key = %hash_key, "wiped cache entry");
        }
        Ok(())
    }

    /// Replace the in-memory tier with every readable entry file.
    ///
    /// Corrupt files are deleted and counted in [`LoadReport::removed`].
    /// Writers wait for the scan, so a concurrent `set` is either on disk
    /// before it starts or applied to the loaded map after it.
    pub async fn load_all(&self) -> CacheResult<LoadReport> {
        let mut entries = self.entries.write().await;
        let loaded = loader::load_dir(&self.cache_dir).await?;
        *entries = loaded.entries;
        Ok(loaded.report)
    }
}
