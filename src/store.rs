// src/store.rs
//! Key/value persistence. Each key is read and written independently; a write
//! replaces the whole value for that key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{RadarError, Result};

pub const KEY_PREFERENCES: &str = "preferences";
pub const KEY_PROFILE: &str = "profile";
pub const KEY_PROJECTS: &str = "projects";
pub const KEY_BADGE: &str = "badge";
pub const KEY_DARK_MODE: &str = "darkMode";

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Read `key` as `T`. Missing keys and values that no longer match the schema
/// both yield `T::default()`; only store I/O failures are errors.
pub async fn load_or_default<T>(store: &dyn KvStore, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match store.get(key).await? {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => match serde_json::from_value(v) {
            Ok(t) => Ok(t),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value has unexpected shape; using default");
                Ok(T::default())
            }
        },
    }
}

pub async fn save<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let v = serde_json::to_value(value).map_err(|e| RadarError::Storage(e.to_string()))?;
    store.set(key, v).await
}

// ------------------------------------------------------------
// In-memory store (tests, ephemeral runs)
// ------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.inner.lock().insert(key.to_string(), value);
        Ok(())
    }
}

// ------------------------------------------------------------
// JSON file store
// ------------------------------------------------------------

/// All keys live in one JSON object on disk. Writes go through a temp file and
/// a rename so a crash never leaves a half-written state file.
pub struct JsonFileStore {
    path: PathBuf,
    cache: tokio::sync::Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = match tokio::fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => BTreeMap::new(),
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "state file unreadable; starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(RadarError::Storage(format!("read {}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            cache: tokio::sync::Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, snapshot: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| RadarError::Storage(format!("state dir: {e}")))?;
            }
        }
        let bytes =
            serde_json::to_vec_pretty(snapshot).map_err(|e| RadarError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| RadarError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| RadarError::Storage(format!("rename {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.cache.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        // Lock held across the flush so concurrent writers serialize.
        let mut guard = self.cache.lock().await;
        guard.insert(key.to_string(), value);
        self.flush(&guard).await
    }
}
