//! Mutex-guarded JSON document store.
//!
//! The document on disk is the source of truth; the in-memory copy is a
//! cache written through on every mutation. The fill handler and the risk
//! monitor both mutate the same documents, so every read-modify-write
//! runs under the store's async mutex, and saves go through a temp-file
//! rename to stay whole across a crash.

use crate::error::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

pub struct JsonStore<T> {
    path: PathBuf,
    cache: Mutex<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    /// Open a store, loading the existing document or starting from
    /// `T::default()` when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let value = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            debug!(path = %path.display(), "Store file absent, starting empty");
            T::default()
        };

        Ok(Self {
            path,
            cache: Mutex::new(value),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot the current document.
    pub async fn read(&self) -> T {
        self.cache.lock().await.clone()
    }

    /// Atomically mutate the document and persist it. The mutation's
    /// return value is handed back to the caller.
    pub async fn update<R>(&self, mutate: impl FnOnce(&mut T) -> R) -> StoreResult<R> {
        let mut cache = self.cache.lock().await;
        let result = mutate(&mut cache);
        self.save(&cache)?;
        Ok(result)
    }

    fn save(&self, value: &T) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(value)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
