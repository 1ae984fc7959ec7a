use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    domain::playback::{PlaybackPosition, PlaybackPositionStore},
    error::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
pub struct PlaybackQuery {
    pub document_key: String,
}

/// Body for PUT /api/playback
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePlaybackRequest {
    pub document_key: String,
    pub character_offset: usize,
    #[serde(default)]
    pub audio_ref: Option<String>,
}

/// Position of a document; unknown documents report offset 0
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaybackResponse {
    pub document_key: String,
    pub character_offset: usize,
    pub timestamp: Option<DateTime<Utc>>,
    pub audio_ref: Option<String>,
}

impl From<PlaybackPosition> for PlaybackResponse {
    fn from(position: PlaybackPosition) -> Self {
        Self {
            document_key: position.document_key,
            character_offset: position.character_offset,
            timestamp: Some(position.timestamp),
            audio_ref: position.audio_ref,
        }
    }
}

pub struct PlaybackController {
    positions: Arc<PlaybackPositionStore>,
}

impl PlaybackController {
    pub fn new(positions: Arc<PlaybackPositionStore>) -> Self {
        Self { positions }
    }

    /// GET /api/playback?document_key=... - Stored position
    pub async fn get_position(
        State(controller): State<Arc<PlaybackController>>,
        Query(query): Query<PlaybackQuery>,
    ) -> AppResult<Json<PlaybackResponse>> {
        validate_key(&query.document_key)?;

        let response = match controller.positions.position(&query.document_key).await {
            Some(position) => position.into(),
            None => PlaybackResponse {
                document_key: query.document_key,
                character_offset: 0,
                timestamp: None,
                audio_ref: None,
            },
        };
        Ok(Json(response))
    }

    /// PUT /api/playback - Overwrite the position of a document
    pub async fn update_position(
        State(controller): State<Arc<PlaybackController>>,
        payload: Result<Json<UpdatePlaybackRequest>, JsonRejection>,
    ) -> AppResult<Json<PlaybackResponse>> {
        let Json(request) = payload?;
        validate_key(&request.document_key)?;

        let position = controller
            .positions
            .update(
                &request.document_key,
                request.character_offset,
                request.audio_ref,
            )
            .await;
        Ok(Json(position.into()))
    }
}

fn validate_key(document_key: &str) -> AppResult<()> {
    if document_key.trim().is_empty() {
        return Err(AppError::BadRequest(
            "document_key cannot be empty".to_string(),
        ));
    }
    Ok(())
}
