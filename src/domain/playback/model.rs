use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resumable cursor for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackPosition {
    pub document_key: String,
    /// Offset into the cleaned document text, in characters
    pub character_offset: usize,
    pub timestamp: DateTime<Utc>,
    pub audio_ref: Option<String>,
}

/// Persisted form, keyed by document key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub offset: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub audio_ref: Option<String>,
}

impl PlaybackPosition {
    pub fn from_record(document_key: &str, record: PositionRecord) -> Self {
        Self {
            document_key: document_key.to_string(),
            character_offset: record.offset,
            timestamp: record.timestamp,
            audio_ref: record.audio_ref,
        }
    }
}
