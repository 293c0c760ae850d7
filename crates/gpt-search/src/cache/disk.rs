//! Durable cache entries on the local filesystem.
//!
//! Layout:
//! ```text
//! .cache/
//!   complete/
//!     3f9a...e1.json
//!   search/
//!   fetch/
//! ```
//!
//! Each file holds the identity, the serialized arguments, the result and a
//! timestamp. Writes go to a temp file first and are renamed into place, so
//! a crash never leaves a half-written entry behind.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{CacheKey, CallStore};
use crate::{Result, SearchError};

/// On-disk form of a cache entry.
#[derive(Serialize, Deserialize, Debug)]
struct StoredEntry {
    identity: String,
    args: String,
    result: serde_json::Value,
    /// RFC 3339 time the entry was written.
    stored_at: String,
}

/// Cache store backed by one JSON file per entry.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            SearchError::Cache(format!("failed to create {}: {e}", root.display()))
        })?;
        Ok(Self { root })
    }

    /// The store's root directory.
    pub fn dir(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(sanitize(key.identity()))
            .join(format!("{}.json", key.digest()))
    }
}

impl CallStore for DiskStore {
    fn load(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) => {
                warn!("Skipping unreadable cache entry {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str::<StoredEntry>(&json) {
            // Guard against digest collisions and hand-edited files.
            Ok(entry) if entry.identity == key.identity() && entry.args == key.args() => {
                Some(entry.result)
            }
            Ok(_) => {
                warn!("Cache entry {} does not match its key", path.display());
                None
            }
            Err(e) => {
                warn!("Skipping malformed cache entry {}: {e}", path.display());
                None
            }
        }
    }

    fn save(&self, key: &CacheKey, value: serde_json::Value) -> Result<()> {
        let final_path = self.entry_path(key);
        let dir = final_path
            .parent()
            .ok_or_else(|| SearchError::Cache("cache entry has no parent dir".into()))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| SearchError::Cache(format!("failed to create cache dir: {e}")))?;

        let entry = StoredEntry {
            identity: key.identity().to_string(),
            args: key.args().to_string(),
            result: value,
            stored_at: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| SearchError::Cache(format!("failed to serialize entry: {e}")))?;

        let tmp_path = final_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| SearchError::Cache(format!("failed to write temp entry: {e}")))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| SearchError::Cache(format!("failed to rename entry: {e}")))?;
        Ok(())
    }
}

/// Keep identity directory names filesystem-safe.
fn sanitize(identity: &str) -> String {
    identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
