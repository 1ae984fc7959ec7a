use crate::domain::tts::{Language, Speed};
use crate::infrastructure::storage::{write_atomically, JsonFileStore, KeyValueStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Characters of text that take part in the key
pub const KEY_TEXT_PREFIX_CHARS: usize = 500;
const METADATA_FILE: &str = "metadata.json";
const BLOB_EXTENSION: &str = "mp3";

/// Content address of a synthesized blob
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Normal speed adds nothing to the hash
    pub fn compute(text: &str, backend_id: &str, language: &Language, speed: Speed) -> Self {
        let prefix: String = text.chars().take(KEY_TEXT_PREFIX_CHARS).collect();
        let text_length = text.chars().count();

        let mut hasher = Sha256::new();
        hasher.update(prefix.as_bytes());
        hasher.update([0u8]);
        hasher.update(backend_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(language.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(text_length.to_string().as_bytes());
        if !speed.is_normal() {
            hasher.update([0u8]);
            hasher.update(speed.value().to_bits().to_le_bytes());
        }

        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn audio_ref(&self) -> String {
        format!("{}.{}", self.0, BLOB_EXTENSION)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted record for one cached blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub timestamp: DateTime<Utc>,
    pub backend_id: String,
    pub language: String,
    pub text_length: usize,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CachedAudio {
    pub audio_ref: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    pub expired: usize,
    pub over_budget: usize,
    pub remaining_entries: usize,
    pub remaining_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub hot_entries: u64,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub retention: Duration,
    pub max_bytes: u64,
    pub hot_max_bytes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            max_bytes: 500 * 1024 * 1024,
            hot_max_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Disk-backed audio cache with an in-memory layer for recent blobs.
///
/// Storage failures never surface: they are logged and treated as a miss
/// (reads) or as "not cached" (writes).
pub struct CacheStore {
    blob_dir: PathBuf,
    metadata: Arc<dyn KeyValueStore<CacheMetadata>>,
    hot: Cache<String, Arc<Vec<u8>>>,
    settings: CacheSettings,
}

impl CacheStore {
    /// Open a cache rooted at `dir` (blobs plus `metadata.json`)
    pub async fn open(dir: impl Into<PathBuf>, settings: CacheSettings) -> Self {
        let dir = dir.into();
        let metadata = JsonFileStore::<CacheMetadata>::open(dir.join(METADATA_FILE)).await;
        Self::new(dir, Arc::new(metadata), settings)
    }

    pub fn new(
        blob_dir: impl Into<PathBuf>,
        metadata: Arc<dyn KeyValueStore<CacheMetadata>>,
        settings: CacheSettings,
    ) -> Self {
        let hot = Cache::builder()
            .weigher(|_key: &String, value: &Arc<Vec<u8>>| -> u32 {
                value.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(settings.hot_max_bytes)
            .build();

        Self {
            blob_dir: blob_dir.into(),
            metadata,
            hot,
            settings,
        }
    }

    pub async fn lookup(
        &self,
        text: &str,
        backend_id: &str,
        language: &Language,
        speed: Speed,
    ) -> Option<CachedAudio> {
        let key = CacheKey::compute(text, backend_id, language, speed);
        let mut entry = self.metadata.get(key.as_str()).await?;

        let data = match self.hot.get(key.as_str()).await {
            Some(data) => data,
            None => match tokio::fs::read(self.blob_path(&key)).await {
                Ok(bytes) => {
                    let data = Arc::new(bytes);
                    self.hot.insert(key.to_string(), data.clone()).await;
                    data
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(cache_key = %key, "Cached blob missing, dropping entry");
                    self.remove_entry(key.as_str()).await;
                    return None;
                }
                Err(e) => {
                    tracing::warn!(
                        cache_key = %key,
                        error = %e,
                        "Cached blob unreadable, treating as miss"
                    );
                    return None;
                }
            },
        };

        entry.timestamp = Utc::now();
        if let Err(e) = self.metadata.set(key.as_str(), entry).await {
            tracing::warn!(cache_key = %key, error = %e, "Failed to touch cache entry");
        }

        tracing::debug!(
            cache_key = %key,
            backend_id = %backend_id,
            size = data.len(),
            "Cache hit"
        );

        Some(CachedAudio {
            audio_ref: key.audio_ref(),
            data: data.as_ref().clone(),
        })
    }

    /// Write `audio` under the key for these inputs, replacing any previous entry
    pub async fn store(
        &self,
        text: &str,
        backend_id: &str,
        language: &Language,
        speed: Speed,
        audio: &[u8],
    ) -> Option<String> {
        let key = CacheKey::compute(text, backend_id, language, speed);

        if let Err(e) = write_atomically(&self.blob_path(&key), audio).await {
            tracing::warn!(cache_key = %key, error = %e, "Failed to write cache blob");
            return None;
        }

        let entry = CacheMetadata {
            timestamp: Utc::now(),
            backend_id: backend_id.to_string(),
            language: language.to_string(),
            text_length: text.chars().count(),
            size_bytes: audio.len() as u64,
        };
        if let Err(e) = self.metadata.set(key.as_str(), entry).await {
            tracing::warn!(cache_key = %key, error = %e, "Failed to write cache metadata");
            return None;
        }

        self.hot.insert(key.to_string(), Arc::new(audio.to_vec())).await;

        tracing::debug!(
            cache_key = %key,
            backend_id = %backend_id,
            size = audio.len(),
            "Audio cached"
        );

        Some(key.audio_ref())
    }

    /// Drop entries past retention, then oldest-first down to 80% of the budget
    /// when the budget is exceeded.
    pub async fn evict_expired(&self) -> EvictionReport {
        let mut entries = self.metadata.entries().await;
        let cutoff = Utc::now()
            - ChronoDuration::from_std(self.settings.retention)
                .unwrap_or_else(|_| ChronoDuration::days(365 * 100));

        let mut report = EvictionReport::default();

        let (expired, mut live): (Vec<_>, Vec<_>) = entries
            .drain(..)
            .partition(|(_, entry)| entry.timestamp < cutoff);
        for (key, _) in &expired {
            self.remove_entry(key).await;
        }
        report.expired = expired.len();

        let mut total: u64 = live.iter().map(|(_, e)| e.size_bytes).sum();
        if total > self.settings.max_bytes {
            let target = self.settings.max_bytes.saturating_mul(8) / 10;
            live.sort_by(|(_, a), (_, b)| a.timestamp.cmp(&b.timestamp));

            let mut kept = Vec::with_capacity(live.len());
            for (key, entry) in live {
                if total > target {
                    self.remove_entry(&key).await;
                    total = total.saturating_sub(entry.size_bytes);
                    report.over_budget += 1;
                } else {
                    kept.push((key, entry));
                }
            }
            live = kept;
        }

        report.remaining_entries = live.len();
        report.remaining_bytes = total;

        tracing::info!(
            expired = report.expired,
            over_budget = report.over_budget,
            remaining_entries = report.remaining_entries,
            remaining_bytes = report.remaining_bytes,
            "Cache eviction completed"
        );

        report
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.metadata.entries().await;
        self.hot.run_pending_tasks().await;
        CacheStats {
            entries: entries.len(),
            total_bytes: entries.iter().map(|(_, e)| e.size_bytes).sum(),
            max_bytes: self.settings.max_bytes,
            hot_entries: self.hot.entry_count(),
        }
    }

    async fn remove_entry(&self, key: &str) {
        if let Err(e) = self.metadata.remove(key).await {
            tracing::warn!(cache_key = %key, error = %e, "Failed to remove cache metadata");
        }
        self.hot.invalidate(key).await;

        let path = self.blob_dir.join(format!("{}.{}", key, BLOB_EXTENSION));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Failed to remove cache blob");
            }
        }
    }

    fn blob_path(&self, key: &CacheKey) -> PathBuf {
        self.blob_dir.join(key.audio_ref())
    }
}
