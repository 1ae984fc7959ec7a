use crate::domain::backend::{BackendDescriptor, SpeechBackend};
use crate::domain::tts::{BackendError, Language, Speed};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const ESPEAK_BACKEND_ID: &str = "espeak";

const MAX_CHARS: usize = 10_000;
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(120);
/// Words per minute at normal speed
const BASE_WORDS_PER_MINUTE: f32 = 150.0;
/// 0 to 200, engine default is 100
const AMPLITUDE: u32 = 90;

/// Local `espeak-ng` process, WAV output. Works offline.
pub struct EspeakBackend {
    binary: String,
    descriptor: BackendDescriptor,
}

impl EspeakBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            descriptor: BackendDescriptor::new(ESPEAK_BACKEND_ID, "eSpeak NG", 90)
                .with_max_chars(MAX_CHARS)
                .offline(),
        }
    }

    /// espeak-ng voice name for a language
    fn voice_for_language(language: &Language) -> String {
        match language.as_str() {
            "zh-CN" | "zh-SG" | "zh" => "cmn".to_string(),
            "zh-TW" => "cmn-latn-pinyin".to_string(),
            "pt-BR" => "pt-br".to_string(),
            other if language.primary() == "en" && other != "en" => other.to_ascii_lowercase(),
            _ => language.primary().to_string(),
        }
    }

    fn args(voice: &str, speed: Speed) -> Vec<String> {
        let words_per_minute = (BASE_WORDS_PER_MINUTE * speed.value()).round() as u32;
        vec![
            "--stdout".to_string(),
            "-v".to_string(),
            voice.to_string(),
            "-s".to_string(),
            words_per_minute.to_string(),
            "-a".to_string(),
            AMPLITUDE.to_string(),
        ]
    }

    async fn run(&self, text: &str, voice: &str, speed: Speed) -> Result<Vec<u8>, BackendError> {
        let mut child = Command::new(&self.binary)
            .args(Self::args(voice, speed))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::Unavailable(format!("failed to start {}: {}", self.binary, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| BackendError::Unavailable(format!("failed to write text: {}", e)))?;
            // Dropping stdin closes it so the engine starts speaking
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BackendError::Unavailable(format!("{} failed: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BackendError::Unavailable(format!(
                "{} exited with {}: {}",
                self.binary, output.status, stderr
            )));
        }
        if output.stdout.is_empty() {
            return Err(BackendError::Unavailable(format!(
                "{} produced no audio",
                self.binary
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl SpeechBackend for EspeakBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn is_available(&self) -> bool {
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::debug!(binary = %self.binary, error = %e, "espeak-ng not found");
                false
            }
        }
    }

    async fn synthesize(
        &self,
        text: &str,
        language: &Language,
        speed: Speed,
    ) -> Result<Vec<u8>, BackendError> {
        let start_time = std::time::Instant::now();
        let voice = Self::voice_for_language(language);

        tracing::info!(
            binary = %self.binary,
            voice = %voice,
            speed = %speed,
            text_length = text.chars().count(),
            "Running espeak-ng"
        );

        let audio = tokio::time::timeout(SYNTHESIS_TIMEOUT, self.run(text, &voice, speed))
            .await
            .map_err(|_| {
                BackendError::Unavailable(format!(
                    "{} timed out after {}s",
                    self.binary,
                    SYNTHESIS_TIMEOUT.as_secs()
                ))
            })??;

        tracing::info!(
            provider = ESPEAK_BACKEND_ID,
            latency_ms = start_time.elapsed().as_millis() as u64,
            characters_count = text.chars().count(),
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio)
    }
}
