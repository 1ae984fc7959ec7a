use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    domain::{
        backend::{BackendDescriptor, BackendRegistry},
        tts::{
            CancellationFlag, Language, Narration, NarrationRequest, NarrationService, Speed,
            TextFormat,
        },
    },
    error::{AppError, AppResult},
};

/// Request for POST /api/tts/synthesize
#[derive(Debug, Serialize, Deserialize)]
pub struct TtsRequest {
    pub document_key: String,
    pub text: String,
    #[serde(default)]
    pub format: TextFormat,
    /// Detected from the text when absent
    pub language: Option<String>,
    /// Preferred backend id
    pub backend: Option<String>,
    /// Playback speed, 0.5 to 2.0
    pub speed: Option<f32>,
    #[serde(default)]
    pub resume: bool,
    pub max_chunks: Option<usize>,
}

pub struct TtsController {
    narration_service: Arc<NarrationService>,
    registry: Arc<BackendRegistry>,
}

impl TtsController {
    pub fn new(narration_service: Arc<NarrationService>, registry: Arc<BackendRegistry>) -> Self {
        Self {
            narration_service,
            registry,
        }
    }

    /// POST /api/tts/synthesize - Narrate a document
    pub async fn synthesize(
        State(controller): State<Arc<TtsController>>,
        payload: Result<Json<TtsRequest>, JsonRejection>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let Json(request) = payload?;

        if request.document_key.trim().is_empty() {
            return Err(AppError::BadRequest(
                "document_key cannot be empty".to_string(),
            ));
        }

        let language = request
            .language
            .as_deref()
            .map(str::parse::<Language>)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let speed = request
            .speed
            .map(Speed::new)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?
            .unwrap_or_default();

        let narration = controller
            .narration_service
            .narrate(
                NarrationRequest {
                    document_key: request.document_key,
                    text: request.text,
                    format: request.format,
                    language,
                    backend_hint: request.backend,
                    speed,
                    resume: request.resume,
                    max_chunks: request.max_chunks,
                },
                &CancellationFlag::new(),
            )
            .await?;

        let headers = narration_headers(&narration);
        let audio = narration.audio.ok_or_else(|| {
            AppError::ServiceUnavailable("narration produced no audio".to_string())
        })?;

        Ok((StatusCode::OK, headers, Body::from(audio.data)))
    }

    /// GET /api/backends - Backends detected at start-up, in priority order
    pub async fn list_backends(
        State(controller): State<Arc<TtsController>>,
    ) -> Json<Vec<BackendDescriptor>> {
        Json(controller.registry.descriptors())
    }
}

fn narration_headers(narration: &Narration) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(audio) = &narration.audio {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(audio.format.mime_type()),
        );
        if let Some(warning) = &audio.warning {
            insert(&mut headers, "x-audio-warning", warning);
        }
    }

    insert(&mut headers, "x-chunk-count", &narration.chunks_total.to_string());
    insert(
        &mut headers,
        "x-chunks-completed",
        &narration.chunks_completed.to_string(),
    );
    insert(&mut headers, "x-language", narration.language.as_str());
    insert(&mut headers, "x-backends-used", &narration.backends_used.join(","));
    insert(&mut headers, "x-cache-hits", &narration.cache_hits.to_string());
    insert(&mut headers, "x-start-offset", &narration.start_offset.to_string());
    insert(&mut headers, "x-end-offset", &narration.end_offset.to_string());

    if !narration.is_complete() {
        insert(&mut headers, "x-synthesis-incomplete", "true");
    }
    if let Some(failure) = &narration.failure {
        insert(&mut headers, "x-failed-chunk", &failure.index.to_string());
    }

    headers
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => {
            tracing::warn!(header = name, "Dropping header with non-visible characters");
        }
    }
}
