use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Swappable key-value persistence used for cache metadata and playback state
#[async_trait]
pub trait KeyValueStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V>;

    async fn set(&self, key: &str, value: V) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<Option<V>, StorageError>;

    async fn entries(&self) -> Vec<(String, V)>;
}

/// Whole map kept in memory and rewritten to one JSON file on every change
pub struct JsonFileStore<V> {
    path: PathBuf,
    values: Mutex<BTreeMap<String, V>>,
}

impl<V> JsonFileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open the file at `path`. A missing or unreadable file yields an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match load(&path).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not load store, starting empty"
                );
                BTreeMap::new()
            }
        };

        tracing::debug!(path = %path.display(), entries = values.len(), "Store opened");

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    async fn persist(&self, values: &BTreeMap<String, V>) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(values)?;
        write_atomically(&self.path, &json).await?;
        Ok(())
    }
}

async fn load<V: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, V>, StorageError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write to a sibling temp file and rename it over `path`
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl<V> KeyValueStore<V> for JsonFileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.values.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: V) -> Result<(), StorageError> {
        let mut values = self.values.lock().await;
        values.insert(key.to_string(), value);
        self.persist(&values).await
    }

    async fn remove(&self, key: &str) -> Result<Option<V>, StorageError> {
        let mut values = self.values.lock().await;
        let removed = values.remove(key);
        if removed.is_some() {
            self.persist(&values).await?;
        }
        Ok(removed)
    }

    async fn entries(&self) -> Vec<(String, V)> {
        self.values
            .lock()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Non-persistent store, used when no file is configured and in tests
pub struct MemoryStore<V> {
    values: parking_lot::RwLock<BTreeMap<String, V>>,
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self {
            values: parking_lot::RwLock::new(BTreeMap::new()),
        }
    }
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<V> KeyValueStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.values.read().get(key).cloned()
    }

    async fn set(&self, key: &str, value: V) -> Result<(), StorageError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<V>, StorageError> {
        Ok(self.values.write().remove(key))
    }

    async fn entries(&self) -> Vec<(String, V)> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
