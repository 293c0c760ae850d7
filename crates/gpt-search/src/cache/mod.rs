//! Memoized calls for completions, searches and page fetches.
//!
//! Every expensive operation is keyed by `(identity, serialized arguments)`.
//! [`memoize`] checks a [`CallStore`] before running the operation and writes
//! the result back afterwards. Only successful results are stored: a failed
//! call leaves no trace, so the next identical call tries again.
//!
//! Two stores ship with the crate:
//!
//! - [`DiskStore`] persists entries as JSON files (default `.cache/`) and
//!   survives restarts. Entries never expire; clear the directory by hand.
//! - [`MemoryStore`] keeps entries for the lifetime of the process. Used for
//!   `--no-cache` runs and in tests.
//!
//! A store that fails to read or write degrades to an uncached call with a
//! warning. Caching is never the reason a run fails.

pub mod disk;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{Result, SearchError};

pub use disk::DiskStore;

/// Identity of a memoized call: operation name plus serialized arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    identity: String,
    args: String,
}

impl CacheKey {
    /// Build a key by serializing `args` with `serde_json`.
    pub fn new(identity: &str, args: &impl Serialize) -> Result<Self> {
        let args = serde_json::to_string(args)
            .map_err(|e| SearchError::Cache(format!("failed to serialize {identity} args: {e}")))?;
        Ok(Self {
            identity: identity.to_string(),
            args,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Serialized arguments, exactly as hashed.
    pub fn args(&self) -> &str {
        &self.args
    }

    /// Stable hex digest of the serialized arguments.
    pub fn digest(&self) -> String {
        blake3::hash(self.args.as_bytes()).to_hex().to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digest = self.digest();
        write!(f, "{}:{}", self.identity, digest.get(..12).unwrap_or(&digest))
    }
}

/// Backing storage for memoized results.
pub trait CallStore: Send + Sync {
    /// Return the stored result for `key`, if any.
    fn load(&self, key: &CacheKey) -> Option<serde_json::Value>;

    /// Store `value` under `key`, replacing any previous entry.
    fn save(&self, key: &CacheKey, value: serde_json::Value) -> Result<()>;
}

/// A result returned by [`memoize`], tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    /// `true` when the value was replayed from the store.
    pub hit: bool,
}

/// Run `op` unless `store` already holds a result for `key`.
///
/// On a miss, an `Ok` result is written back before returning. An `Err` is
/// returned untouched and never stored. An entry that no longer decodes as
/// `T` is treated as a miss and overwritten.
pub async fn memoize<T, F, Fut>(store: &dyn CallStore, key: CacheKey, op: F) -> Result<Cached<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if let Some(stored) = store.load(&key) {
        match serde_json::from_value::<T>(stored) {
            Ok(value) => {
                debug!("cache hit: {key}");
                return Ok(Cached { value, hit: true });
            }
            Err(e) => warn!("Discarding undecodable cache entry {key}: {e}"),
        }
    }

    debug!("cache miss: {key}");
    let value = op().await?;

    match serde_json::to_value(&value) {
        Ok(json) => {
            if let Err(e) = store.save(&key, json) {
                warn!("Failed to store {key}: {e}");
            }
        }
        Err(e) => warn!("Failed to serialize result for {key}: {e}"),
    }

    Ok(Cached { value, hit: false })
}

/// In-process store. Entries live until the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<CacheKey, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CallStore for MemoryStore {
    fn load(&self, key: &CacheKey) -> Option<serde_json::Value> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn save(&self, key: &CacheKey, value: serde_json::Value) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), value);
        Ok(())
    }
}
