use crate::domain::backend::{BackendDescriptor, SpeechBackend};
use crate::domain::tts::{BackendError, Language, Speed};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;

pub const OPENAI_BACKEND_ID: &str = "openai";

/// OpenAI has a limit of 4096 characters per request
const MAX_CHARS: usize = 4096;

/// OpenAI speech endpoint backend (MP3 output)
pub struct OpenAiBackend {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    /// Overrides the per-language voice when set
    default_voice: Option<String>,
    has_api_key: bool,
    descriptor: BackendDescriptor,
}

impl OpenAiBackend {
    pub fn new(api_key: Option<String>, model: String, default_voice: Option<String>) -> Self {
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        let has_api_key = api_key.is_some();
        let config = OpenAIConfig::new().with_api_key(api_key.unwrap_or_default());

        let descriptor = BackendDescriptor::new(OPENAI_BACKEND_ID, "OpenAI TTS", 20)
            .with_max_chars(MAX_CHARS);

        Self {
            client: Arc::new(Client::with_config(config)),
            model,
            default_voice: default_voice.filter(|voice| !voice.trim().is_empty()),
            has_api_key,
            descriptor,
        }
    }

    /// Select the appropriate OpenAI voice for a language
    fn voice_for_language(language: &Language) -> &'static str {
        match language.primary() {
            "es" => "echo",
            "fr" => "nova",
            "de" => "onyx",
            "it" => "fable",
            "pt" => "shimmer",
            _ => "alloy",
        }
    }

    fn speech_model(&self) -> SpeechModel {
        match self.model.as_str() {
            "tts-1" => SpeechModel::Tts1,
            "tts-1-hd" => SpeechModel::Tts1Hd,
            other => SpeechModel::Other(other.to_string()),
        }
    }
}

fn parse_voice(voice: &str) -> Voice {
    match voice.to_lowercase().as_str() {
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        _ => Voice::Alloy,
    }
}

/// Map an API error type onto a backend error kind
fn classify_api_error(error_type: Option<&str>, message: String) -> BackendError {
    match error_type {
        Some("requests" | "tokens" | "rate_limit_exceeded") => BackendError::RateLimited(message),
        Some("invalid_request_error") => BackendError::InvalidInput(message),
        Some(_) => BackendError::Unavailable(message),
        None => BackendError::from_message(message),
    }
}

fn classify(error: OpenAIError) -> BackendError {
    match error {
        OpenAIError::ApiError(api) => {
            let message = format!("OpenAI TTS error: {}", api.message);
            classify_api_error(api.r#type.as_deref(), message)
        }
        OpenAIError::Reqwest(e) => {
            let message = format!("OpenAI TTS request failed: {}", e);
            match e.status().map(|status| status.as_u16()) {
                Some(429) => BackendError::RateLimited(message),
                Some(400) => BackendError::InvalidInput(message),
                _ => BackendError::Unavailable(message),
            }
        }
        OpenAIError::InvalidArgument(message) => BackendError::InvalidInput(message),
        other => BackendError::from_message(format!("OpenAI TTS error: {}", other)),
    }
}

#[async_trait]
impl SpeechBackend for OpenAiBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn is_available(&self) -> bool {
        self.has_api_key
    }

    async fn synthesize(
        &self,
        text: &str,
        language: &Language,
        speed: Speed,
    ) -> Result<Vec<u8>, BackendError> {
        let start_time = std::time::Instant::now();

        let voice = self
            .default_voice
            .clone()
            .unwrap_or_else(|| Self::voice_for_language(language).to_string());

        tracing::info!(
            model = %self.model,
            voice = %voice,
            language = %language,
            speed = %speed,
            text_length = text.chars().count(),
            "Calling OpenAI TTS API"
        );

        let request = CreateSpeechRequest {
            model: self.speech_model(),
            input: text.to_string(),
            voice: parse_voice(&voice),
            response_format: None, // Defaults to MP3
            speed: (!speed.is_normal()).then(|| speed.value()),
        };

        let response = self.client.audio().speech(request).await.map_err(|e| {
            tracing::error!(
                error = %e,
                model = %self.model,
                voice = %voice,
                "OpenAI TTS API call failed"
            );
            classify(e)
        })?;

        let audio_bytes = response.bytes.to_vec();

        tracing::info!(
            provider = OPENAI_BACKEND_ID,
            model = %self.model,
            latency_ms = start_time.elapsed().as_millis() as u64,
            characters_count = text.chars().count(),
            audio_size_bytes = audio_bytes.len(),
            "TTS synthesis completed"
        );

        Ok(audio_bytes)
    }
}
