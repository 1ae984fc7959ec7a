use crate::domain::backend::{BackendDescriptor, SpeechBackend};
use crate::domain::tts::{BackendError, Language, Speed};
use async_trait::async_trait;
use aws_sdk_polly::{
    error::{DisplayErrorContext, ProvideErrorMetadata},
    types::{Engine, OutputFormat, TextType, VoiceId},
    Client as PollyClient,
};
use std::sync::Arc;

pub const POLLY_BACKEND_ID: &str = "polly";

/// AWS Polly has a limit of 3000 characters per request
const MAX_CHARS: usize = 3000;

/// AWS Polly speech backend (neural voices, MP3 output)
pub struct PollyBackend {
    polly_client: Arc<PollyClient>,
    descriptor: BackendDescriptor,
}

impl PollyBackend {
    pub fn new(polly_client: Arc<PollyClient>) -> Self {
        let descriptor = BackendDescriptor::new(POLLY_BACKEND_ID, "AWS Polly", 10)
            .with_languages(["en", "es", "fr", "de", "it", "pt", "zh", "ja"])
            .with_max_chars(MAX_CHARS);

        Self {
            polly_client,
            descriptor,
        }
    }

    /// Select the appropriate Polly voice for a language
    fn voice_for_language(language: &Language) -> &'static str {
        match language.primary() {
            "es" => "Lupe",
            "fr" => "Lea",
            "de" => "Vicki",
            "it" => "Bianca",
            "pt" => "Ines",
            "zh" => "Zhiyu",
            "ja" => "Takumi",
            _ => "Joanna",
        }
    }
}

/// Plain text at normal speed, otherwise SSML with a prosody rate
fn speech_markup(text: &str, speed: Speed) -> (String, TextType) {
    if speed.is_normal() {
        return (text.to_string(), TextType::Text);
    }

    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;");
    let rate = (speed.value() * 100.0).round() as u32;
    (
        format!("<speak><prosody rate=\"{}%\">{}</prosody></speak>", rate, escaped),
        TextType::Ssml,
    )
}

/// Map a Polly error code onto a backend error kind
fn classify(code: Option<&str>, message: String) -> BackendError {
    match code {
        Some(
            "ThrottlingException"
            | "Throttling"
            | "TooManyRequestsException"
            | "RequestLimitExceeded",
        ) => BackendError::RateLimited(message),
        Some(
            "TextLengthExceededException"
            | "InvalidSsmlException"
            | "InvalidSampleRateException"
            | "LanguageNotSupportedException"
            | "SsmlMarksNotSupportedForTextTypeException",
        ) => BackendError::InvalidInput(message),
        Some(_) => BackendError::Unavailable(message),
        None => BackendError::from_message(message),
    }
}

#[async_trait]
impl SpeechBackend for PollyBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn is_available(&self) -> bool {
        let has_access_key = std::env::var("AWS_ACCESS_KEY_ID").is_ok();
        let has_secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").is_ok();
        let has_profile = std::env::var("AWS_PROFILE").is_ok();

        tracing::info!(
            has_access_key_id = has_access_key,
            has_secret_access_key = has_secret_key,
            has_profile = has_profile,
            "AWS credentials environment check"
        );

        (has_access_key && has_secret_key) || has_profile
    }

    async fn synthesize(
        &self,
        text: &str,
        language: &Language,
        speed: Speed,
    ) -> Result<Vec<u8>, BackendError> {
        let start_time = std::time::Instant::now();

        // Select voice based on language (always use neural)
        let voice_name = Self::voice_for_language(language);
        let voice_id = VoiceId::from(voice_name);
        let engine = Engine::Neural;
        let (markup, text_type) = speech_markup(text, speed);

        tracing::info!(
            language = %language,
            voice = voice_name,
            engine = ?engine,
            speed = %speed,
            output_format = "Mp3",
            text_length = text.chars().count(),
            "Calling AWS Polly synthesize_speech"
        );

        let result = self
            .polly_client
            .synthesize_speech()
            .text(markup)
            .text_type(text_type)
            .voice_id(voice_id)
            .output_format(OutputFormat::Mp3)
            .engine(engine.clone())
            .send()
            .await
            .map_err(|e| {
                let code = e.code().map(str::to_string);
                let message = format!("AWS Polly error: {}", DisplayErrorContext(&e));
                tracing::error!(
                    error = %message,
                    error_code = ?code,
                    language = %language,
                    voice = voice_name,
                    engine = ?engine,
                    "AWS Polly synthesize_speech failed"
                );
                classify(code.as_deref(), message)
            })?;

        let audio_stream = result.audio_stream.collect().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to collect audio stream from Polly response");
            BackendError::Unavailable(format!("Failed to read audio stream: {}", e))
        })?;

        let audio_bytes = audio_stream.into_bytes().to_vec();

        tracing::info!(
            provider = POLLY_BACKEND_ID,
            latency_ms = start_time.elapsed().as_millis() as u64,
            characters_count = text.chars().count(),
            audio_size_bytes = audio_bytes.len(),
            "TTS synthesis completed"
        );

        Ok(audio_bytes)
    }
}
