//! Durable state: stored torrent entries, desired-pause set, cleaned set.
//!
//! Everything is small JSON, rewritten whole on every change: a temp file
//! next to the target followed by a rename, so readers never observe a
//! partial write.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::magnet::StableId;

const ENTRIES_FILE: &str = "entries.json";
const PAUSED_FILE: &str = "paused.json";
const CLEANED_FILE: &str = "cleaned.json";

/// Errors from the persisted state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One persisted torrent, unique by `key`.
///
/// Created on add, updated in place on re-add or category edit, deleted on
/// remove.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key: StableId,
    pub magnet: String,
    pub save_path: PathBuf,
    pub category: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Whole-file JSON persistence under a state directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
    temp_suffix: &'static str,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>, temp_suffix: &'static str) -> Self {
        Self {
            dir: dir.into(),
            temp_suffix,
        }
    }

    /// Loads all stored entries; a missing file is an empty store.
    pub async fn load_entries(&self) -> Result<Vec<StoredEntry>, StoreError> {
        self.load(ENTRIES_FILE).await
    }

    /// Atomically overwrites the stored entries.
    pub async fn save_entries(&self, entries: &[StoredEntry]) -> Result<(), StoreError> {
        self.save(ENTRIES_FILE, entries).await
    }

    /// Loads the set of identities the user wants paused.
    pub async fn load_paused(&self) -> Result<HashSet<StableId>, StoreError> {
        self.load(PAUSED_FILE).await
    }

    pub async fn save_paused(&self, paused: &HashSet<StableId>) -> Result<(), StoreError> {
        self.save(PAUSED_FILE, paused).await
    }

    /// Loads the set of identities whose completion action already ran.
    pub async fn load_cleaned(&self) -> Result<HashSet<StableId>, StoreError> {
        self.load(CLEANED_FILE).await
    }

    pub async fn save_cleaned(&self, cleaned: &HashSet<StableId>) -> Result<(), StoreError> {
        self.save(CLEANED_FILE, cleaned).await
    }

    async fn load<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, StoreError> {
        let path = self.dir.join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file);
        let temp = temp_path(&path, self.temp_suffix);
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }
}

fn temp_path(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    target.with_file_name(name)
}
