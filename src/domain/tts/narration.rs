use super::error::SynthesisError;
use super::language::{build_detector, detect_language, Language};
use super::request::{Speed, SynthesisRequest};
use super::service::SynthesisApi;
use crate::domain::audio::{AssembledAudio, AudioAssembler, AudioError};
use crate::domain::playback::PlaybackPositionStore;
use crate::domain::text::{clean_text, html_to_speech_text, TextChunk, TextChunker};
use crate::error::AppError;
use futures::StreamExt;
use lingua::LanguageDetector;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    #[default]
    Text,
    Html,
}

#[derive(Debug, Clone)]
pub struct NarrationRequest {
    pub document_key: String,
    pub text: String,
    pub format: TextFormat,
    /// Detected from the text when absent
    pub language: Option<Language>,
    pub backend_hint: Option<String>,
    pub speed: Speed,
    /// Start at the stored playback position instead of the beginning
    pub resume: bool,
    pub max_chunks: Option<usize>,
}

/// Shared flag checked between chunks
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub index: usize,
    pub reason: String,
}

/// Outcome of a narration run. May be partial.
#[derive(Debug, Clone)]
pub struct Narration {
    pub audio: Option<AssembledAudio>,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    /// Character offsets into the cleaned text covered by the audio
    pub start_offset: usize,
    pub end_offset: usize,
    pub language: Language,
    pub failure: Option<ChunkFailure>,
    pub backends_used: Vec<String>,
    pub cache_hits: usize,
    pub cancelled: bool,
}

impl Narration {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && !self.cancelled && self.chunks_completed == self.chunks_total
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("text has {chars} characters, limit is {max}")]
    TextTooLarge { chars: usize, max: usize },
    #[error("synthesis failed at chunk {index}: {source}")]
    ChunkFailed {
        index: usize,
        #[source]
        source: SynthesisError,
    },
    #[error("audio assembly failed: {0}")]
    Assembly(#[from] AudioError),
    #[error("{0}")]
    Internal(String),
}

impl From<NarrationError> for AppError {
    fn from(err: NarrationError) -> Self {
        match err {
            NarrationError::InvalidInput(msg) => AppError::BadRequest(msg),
            e @ NarrationError::TextTooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
            e @ NarrationError::ChunkFailed {
                source: SynthesisError::InvalidInput(_),
                ..
            } => AppError::BadRequest(e.to_string()),
            e @ NarrationError::ChunkFailed { .. } => AppError::SynthesisFailed(e.to_string()),
            e @ NarrationError::Assembly(_) => AppError::Internal(e.to_string()),
            NarrationError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NarrationSettings {
    pub max_chunk_chars: usize,
    pub max_text_chars: usize,
    /// Chunks synthesized at once; defaults to the number of registered backends
    pub concurrency: Option<usize>,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1000,
            max_text_chars: 100_000,
            concurrency: None,
        }
    }
}

pub struct NarrationService {
    synthesis: Arc<dyn SynthesisApi>,
    assembler: AudioAssembler,
    positions: Arc<PlaybackPositionStore>,
    settings: NarrationSettings,
    language_detector: LanguageDetector,
}

impl NarrationService {
    pub fn new(
        synthesis: Arc<dyn SynthesisApi>,
        assembler: AudioAssembler,
        positions: Arc<PlaybackPositionStore>,
        settings: NarrationSettings,
    ) -> Self {
        Self {
            synthesis,
            assembler,
            positions,
            settings,
            language_detector: build_detector(),
        }
    }

    /// Narrate a document: clean, detect language, chunk, synthesize in
    /// order, assemble and record the playback position.
    ///
    /// A failing chunk stops the run. Audio produced before it is still
    /// returned, with the failure attached; only a failure on the very first
    /// chunk is an error. The playback position advances as each chunk
    /// completes, so progress survives the future being dropped.
    pub async fn narrate(
        &self,
        request: NarrationRequest,
        cancellation: &CancellationFlag,
    ) -> Result<Narration, NarrationError> {
        // 1. Clean the text (remove HTML, URLs, normalize whitespace)
        let cleaned = match request.format {
            TextFormat::Html => html_to_speech_text(&request.text),
            TextFormat::Text => clean_text(&request.text),
        };
        let total_chars = cleaned.chars().count();

        if total_chars == 0 {
            return Err(NarrationError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }
        if total_chars > self.settings.max_text_chars {
            return Err(NarrationError::TextTooLarge {
                chars: total_chars,
                max: self.settings.max_text_chars,
            });
        }

        // 2. Language: explicit, else detected
        let language = match request.language.clone() {
            Some(language) => language,
            None => detect_language(&self.language_detector, &cleaned),
        };

        // 3. Where to start
        let start_offset = self.start_offset(&request, total_chars).await;
        let remaining = slice_from_char(&cleaned, start_offset);

        // 4. Chunk within the tightest limit among the backends we may use
        let candidates = self
            .synthesis
            .candidates(&language, request.backend_hint.as_deref());
        let chunk_limit = candidates
            .iter()
            .map(|backend| backend.descriptor().max_chars)
            .min()
            .unwrap_or(usize::MAX)
            .min(self.settings.max_chunk_chars);

        let mut chunks: Vec<TextChunk> = TextChunker::new(chunk_limit)
            .chunk(remaining)
            .into_iter()
            .map(|chunk| chunk.offset_by(start_offset))
            .collect();
        if let Some(max_chunks) = request.max_chunks {
            chunks.truncate(max_chunks.max(1));
        }

        tracing::info!(
            document_key = %request.document_key,
            language = %language,
            speed = %request.speed,
            total_chars = total_chars,
            start_offset = start_offset,
            chunk_count = chunks.len(),
            chunk_limit = chunk_limit,
            candidates = candidates.len(),
            "Narration started"
        );

        let requests = chunks
            .iter()
            .map(|chunk| {
                SynthesisRequest::new(
                    chunk.speakable(),
                    language.clone(),
                    request.backend_hint.clone(),
                )
                .map(|synthesis_request| synthesis_request.with_speed(request.speed))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| NarrationError::InvalidInput(e.to_string()))?;

        // 5. Synthesize through a bounded pool, consumed in chunk order
        let concurrency = self
            .settings
            .concurrency
            .unwrap_or_else(|| self.synthesis.backend_count())
            .max(1);
        let synthesis = &self.synthesis;
        let mut results = futures::stream::iter(requests.into_iter().enumerate())
            .map(|(index, chunk_request)| async move {
                (index, synthesis.synthesize(&chunk_request).await)
            })
            .buffered(concurrency);

        let mut blobs = Vec::with_capacity(chunks.len());
        let mut backends_used: Vec<String> = Vec::new();
        let mut cache_hits = 0;
        let mut end_offset = start_offset;
        let mut failure = None;
        let mut cancelled = false;

        loop {
            if cancellation.is_cancelled() {
                tracing::info!(
                    document_key = %request.document_key,
                    completed = blobs.len(),
                    "Narration cancelled"
                );
                cancelled = true;
                break;
            }

            let Some((index, result)) = results.next().await else {
                break;
            };
            let chunk = &chunks[index];

            match result {
                Ok(audio) => {
                    if !backends_used.contains(&audio.backend_id) {
                        backends_used.push(audio.backend_id.clone());
                    }
                    if audio.cache_hit {
                        cache_hits += 1;
                    }
                    end_offset = chunk.char_offset_end;
                    self.positions
                        .update(&request.document_key, end_offset, audio.audio_ref)
                        .await;
                    blobs.push(audio.data);
                }
                Err(e) => {
                    tracing::error!(
                        document_key = %request.document_key,
                        chunk_index = chunk.index,
                        error = %e,
                        "Chunk synthesis failed, stopping narration"
                    );
                    failure = Some((chunk.index, e));
                    break;
                }
            }
        }
        drop(results);

        // 6. Nothing produced: surface the failure
        if blobs.is_empty() {
            if let Some((index, source)) = failure {
                return Err(NarrationError::ChunkFailed { index, source });
            }
        }

        // 7. Assemble off the async threads
        let audio = if blobs.is_empty() {
            None
        } else {
            let assembler = self.assembler;
            let assembled = tokio::task::spawn_blocking(move || assembler.assemble(&blobs))
                .await
                .map_err(|e| NarrationError::Internal(format!("assembly task failed: {}", e)))??;
            Some(assembled)
        };

        let chunks_completed = audio.as_ref().map(|a| a.chunk_count).unwrap_or(0);
        let failure = failure.map(|(index, e)| ChunkFailure {
            index,
            reason: e.to_string(),
        });

        tracing::info!(
            document_key = %request.document_key,
            chunks_total = chunks.len(),
            chunks_completed = chunks_completed,
            cache_hits = cache_hits,
            end_offset = end_offset,
            incomplete = failure.is_some(),
            cancelled = cancelled,
            "Narration finished"
        );

        Ok(Narration {
            audio,
            chunks_total: chunks.len(),
            chunks_completed,
            start_offset,
            end_offset,
            language,
            failure,
            backends_used,
            cache_hits,
            cancelled,
        })
    }

    /// Stored offset when resuming, restarting from 0 once the end was reached
    async fn start_offset(&self, request: &NarrationRequest, total_chars: usize) -> usize {
        if !request.resume {
            return 0;
        }

        let stored = self.positions.get(&request.document_key).await;
        if stored >= total_chars {
            tracing::info!(
                document_key = %request.document_key,
                stored_offset = stored,
                total_chars = total_chars,
                "Stored position at or past end of text, restarting"
            );
            return 0;
        }
        stored
    }
}

fn slice_from_char(text: &str, offset: usize) -> &str {
    match text.char_indices().nth(offset) {
        Some((byte_index, _)) => &text[byte_index..],
        None => "",
    }
}
