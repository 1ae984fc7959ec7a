use crate::domain::backend::{BackendDescriptor, SpeechBackend};
use crate::domain::text::TextChunker;
use crate::domain::tts::{BackendError, Language, Speed};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

pub const GOOGLE_BACKEND_ID: &str = "google";

const DEFAULT_BASE_URL: &str = "https://translate.google.com";
/// `ttsspeed` the endpoint uses for its slow voice
const SLOW_TTS_SPEED: &str = "0.24";
/// The endpoint rejects longer `q` values
const MAX_PIECE_CHARS: usize = 200;
const MAX_CHARS: usize = 5000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Translate speech endpoint (the engine behind gTTS), MP3 output
pub struct GoogleTranslateBackend {
    http: reqwest::Client,
    base_url: String,
    enabled: bool,
    piece_chunker: TextChunker,
    descriptor: BackendDescriptor,
}

impl GoogleTranslateBackend {
    pub fn new(enabled: bool) -> Self {
        Self::with_base_url(enabled, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(enabled: bool, base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Mozilla/5.0 (compatible; readaloud-backend)")
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            enabled,
            piece_chunker: TextChunker::new(MAX_PIECE_CHARS),
            descriptor: BackendDescriptor::new(GOOGLE_BACKEND_ID, "Google Translate TTS", 30)
                .with_max_chars(MAX_CHARS),
        }
    }

    async fn fetch_piece(
        &self,
        piece: &str,
        language: &Language,
        speed: Speed,
    ) -> Result<Vec<u8>, BackendError> {
        // Only two paces exist: normal, or slow for anything below 1.0
        let tts_speed = if speed.is_slow() { SLOW_TTS_SPEED } else { "1" };
        let url = format!("{}/translate_tts", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("q", piece),
                ("tl", language.as_str()),
                ("ttsspeed", tts_speed),
                ("client", "tw-ob"),
            ])
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("Google TTS request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("Google TTS returned {}", status);
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited(message),
                StatusCode::BAD_REQUEST => BackendError::InvalidInput(message),
                _ => BackendError::Unavailable(message),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            BackendError::Unavailable(format!("Failed to read Google TTS audio: {}", e))
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for GoogleTranslateBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn is_available(&self) -> bool {
        self.enabled
    }

    async fn synthesize(
        &self,
        text: &str,
        language: &Language,
        speed: Speed,
    ) -> Result<Vec<u8>, BackendError> {
        let start_time = std::time::Instant::now();
        let pieces = self.piece_chunker.chunk(text);

        tracing::info!(
            language = %language,
            text_length = text.chars().count(),
            piece_count = pieces.len(),
            "Calling Google Translate TTS"
        );

        // MP3 frames concatenate into a playable stream
        let mut audio = Vec::new();
        for piece in &pieces {
            let bytes = self.fetch_piece(piece.speakable(), language, speed).await?;
            audio.extend(bytes);
        }

        tracing::info!(
            provider = GOOGLE_BACKEND_ID,
            latency_ms = start_time.elapsed().as_millis() as u64,
            characters_count = text.chars().count(),
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio)
    }
}
