use super::{PlaybackPosition, PositionRecord};
use crate::infrastructure::storage::{JsonFileStore, KeyValueStore};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

pub struct PlaybackPositionStore {
    store: Arc<dyn KeyValueStore<PositionRecord>>,
}

impl PlaybackPositionStore {
    pub fn new(store: Arc<dyn KeyValueStore<PositionRecord>>) -> Self {
        Self { store }
    }

    /// Positions persisted to a JSON file at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let store = JsonFileStore::<PositionRecord>::open(path).await;
        Self::new(Arc::new(store))
    }

    /// Record progress for `document_key`. Last write wins.
    pub async fn update(
        &self,
        document_key: &str,
        offset: usize,
        audio_ref: Option<String>,
    ) -> PlaybackPosition {
        let record = PositionRecord {
            offset,
            timestamp: Utc::now(),
            audio_ref,
        };

        if let Err(e) = self.store.set(document_key, record.clone()).await {
            tracing::warn!(
                document_key = %document_key,
                offset = offset,
                error = %e,
                "Failed to persist playback position"
            );
        }

        tracing::debug!(document_key = %document_key, offset = offset, "Playback position updated");

        PlaybackPosition::from_record(document_key, record)
    }

    /// Stored offset, 0 when the document was never played
    pub async fn get(&self, document_key: &str) -> usize {
        self.store
            .get(document_key)
            .await
            .map(|record| record.offset)
            .unwrap_or(0)
    }

    pub async fn position(&self, document_key: &str) -> Option<PlaybackPosition> {
        self.store
            .get(document_key)
            .await
            .map(|record| PlaybackPosition::from_record(document_key, record))
    }
}
