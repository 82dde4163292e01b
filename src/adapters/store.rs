//! Key/value persistence of processing records.
//!
//! Keys are `"resume:" + id`; values are the record's JSON. The store is
//! written sequentially by the orchestrator, but implementations still
//! guard their own state so one store can be shared across orchestrators.

use crate::error::{AdapterError, PipelineError};
use crate::record::{record_key, ProcessingRecord, RecordId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Key/value store for serialised records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or overwrite `key`.
    async fn set(&self, key: &str, value: String) -> Result<(), AdapterError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError>;

    /// All keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, AdapterError>;
}

/// Serialise `record` and write it under its key.
pub async fn put_record(
    store: &dyn RecordStore,
    record: &ProcessingRecord,
) -> Result<(), AdapterError> {
    store.set(&record.key(), record.to_json()?).await
}

/// Load and deserialise the record with `id`, if present.
pub async fn get_record(
    store: &dyn RecordStore,
    id: &RecordId,
) -> Result<Option<ProcessingRecord>, AdapterError> {
    match store.get(&record_key(id)).await? {
        Some(json) => Ok(Some(ProcessingRecord::from_json(&json)?)),
        None => Ok(None),
    }
}

// ── In-memory ────────────────────────────────────────────────────────────

/// A process-local store, useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, AdapterError> {
        self.entries
            .lock()
            .map_err(|_| AdapterError::Join("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn set(&self, key: &str, value: String) -> Result<(), AdapterError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, AdapterError> {
        Ok(self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ── JSON file ────────────────────────────────────────────────────────────

/// A store backed by a single JSON object file (`{ key: value, … }`).
///
/// Every `set` rewrites the whole file atomically (temp file + rename), so a
/// crash mid-write leaves the previous version intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: tokio::sync::Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open `path`, loading existing entries or starting empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |detail: String| PipelineError::StoreOpenFailed {
            path: path.clone(),
            detail,
        };

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| open_err(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| open_err(e.to_string()))?;
                }
                BTreeMap::new()
            }
            Err(e) => return Err(open_err(e.to_string())),
        };

        debug!("Opened record store {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: tokio::sync::Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), AdapterError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| AdapterError::Io {
                path: tmp_path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| AdapterError::Io {
                path: self.path.clone(),
                source: e,
            })
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn set(&self, key: &str, value: String) -> Result<(), AdapterError> {
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(key.to_string(), value);

        if let Err(e) = self.persist(&entries).await {
            // Keep memory in step with what is on disk.
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, AdapterError> {
        Ok(self
            .entries
            .lock()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
