use crate::domain::backend::{BackendDescriptor, SpeechBackend};
use crate::domain::tts::{BackendError, Language, Speed};
use async_trait::async_trait;
use msedge_tts::tts::{client::connect, SpeechConfig};

pub const EDGE_BACKEND_ID: &str = "edge";

const MAX_CHARS: usize = 3000;
const AUDIO_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Microsoft Edge read-aloud voices (neural, MP3 output)
pub struct EdgeBackend {
    enabled: bool,
    /// Overrides the per-language voice when set
    default_voice: Option<String>,
    descriptor: BackendDescriptor,
}

impl EdgeBackend {
    pub fn new(enabled: bool, default_voice: Option<String>) -> Self {
        Self {
            enabled,
            default_voice: default_voice.filter(|voice| !voice.trim().is_empty()),
            descriptor: BackendDescriptor::new(EDGE_BACKEND_ID, "Microsoft Edge TTS", 40)
                .with_max_chars(MAX_CHARS),
        }
    }

    fn voice_for_language(language: &Language) -> &'static str {
        match language.as_str() {
            "zh-TW" => "zh-TW-HsiaoChenNeural",
            "en-GB" => "en-GB-SoniaNeural",
            "pt-PT" => "pt-PT-RaquelNeural",
            _ => match language.primary() {
                "zh" => "zh-CN-XiaoxiaoNeural",
                "es" => "es-ES-ElviraNeural",
                "fr" => "fr-FR-DeniseNeural",
                "de" => "de-DE-KatjaNeural",
                "it" => "it-IT-ElsaNeural",
                "pt" => "pt-BR-FranciscaNeural",
                "ja" => "ja-JP-NanamiNeural",
                _ => "en-US-AriaNeural",
            },
        }
    }

    fn voice(&self, language: &Language) -> String {
        self.default_voice
            .clone()
            .unwrap_or_else(|| Self::voice_for_language(language).to_string())
    }

    fn speech_config(voice: String, speed: Speed) -> SpeechConfig {
        SpeechConfig {
            voice_name: voice,
            audio_format: AUDIO_FORMAT.to_string(),
            pitch: 0,
            rate: speed.percent_change(),
            volume: 0,
        }
    }
}

#[async_trait]
impl SpeechBackend for EdgeBackend {
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
        let voice = self.voice(language);

        tracing::info!(
            voice = %voice,
            speed = %speed,
            text_length = text.chars().count(),
            "Calling Edge TTS"
        );

        let config = Self::speech_config(voice, speed);
        let owned_text = text.to_string();
        // The websocket client is blocking
        let audio = tokio::task::spawn_blocking(move || {
            let mut client = connect().map_err(|e| {
                BackendError::Unavailable(format!("Edge TTS connection failed: {}", e))
            })?;
            client
                .synthesize(&owned_text, &config)
                .map_err(|e| BackendError::from_message(format!("Edge TTS error: {}", e)))
        })
        .await
        .map_err(|e| BackendError::Unavailable(format!("Edge TTS task failed: {}", e)))??;

        if audio.audio_bytes.is_empty() {
            return Err(BackendError::Unavailable(
                "Edge TTS returned no audio".to_string(),
            ));
        }

        tracing::info!(
            provider = EDGE_BACKEND_ID,
            latency_ms = start_time.elapsed().as_millis() as u64,
            characters_count = text.chars().count(),
            audio_size_bytes = audio.audio_bytes.len(),
            "TTS synthesis completed"
        );

        Ok(audio.audio_bytes)
    }
}
