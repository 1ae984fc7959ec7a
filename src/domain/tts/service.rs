use super::error::{BackendAttempt, BackendError, SynthesisError};
use super::language::Language;
use super::request::SynthesisRequest;
use crate::domain::backend::{BackendRegistry, SpeechBackend};
use crate::infrastructure::cache::CacheStore;
use crate::infrastructure::rate_limit::RateLimiter;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Audio for one chunk and where it came from
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub data: Vec<u8>,
    pub backend_id: String,
    pub cache_hit: bool,
    /// Cache blob name, when the audio is (now) cached
    pub audio_ref: Option<String>,
}

/// Retry schedule for throttled calls on a single backend
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th throttled call (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub struct SynthesisOrchestrator {
    registry: Arc<BackendRegistry>,
    rate_limiter: Arc<RateLimiter>,
    cache: Option<Arc<CacheStore>>,
    retry: RetryPolicy,
}

impl SynthesisOrchestrator {
    pub fn new(
        registry: Arc<BackendRegistry>,
        rate_limiter: Arc<RateLimiter>,
        cache: Option<Arc<CacheStore>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            rate_limiter,
            cache,
            retry,
        }
    }
}

#[async_trait]
pub trait SynthesisApi: Send + Sync {
    /// Convert one chunk of text to audio
    ///
    /// This operation:
    /// - Serves the audio from cache when present
    /// - Tries each candidate backend in order, spacing calls through the rate limiter
    /// - Retries throttled calls with exponential backoff, fails over on anything else
    /// - Caches the first successful result under the backend that produced it
    async fn synthesize(&self, request: &SynthesisRequest)
        -> Result<SynthesizedAudio, SynthesisError>;

    /// Backends a request would try, in order: the preferred backend first
    /// (when registered), then every backend supporting `language` by
    /// priority, without duplicates
    fn candidates(&self, language: &Language, preferred: Option<&str>)
        -> Vec<Arc<dyn SpeechBackend>>;

    /// Backends currently registered
    fn backend_count(&self) -> usize;
}

#[async_trait]
impl SynthesisApi for SynthesisOrchestrator {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let language = request.language();
        let text = request.text();
        let speed = request.speed();
        let candidates = self.candidates(language, request.backend_hint());

        // 1. Cache lookup, in candidate order, so audio produced by a
        //    fallback backend is found without calling the primary again
        if let Some(cache) = &self.cache {
            for backend in &candidates {
                let Some(cached) = cache.lookup(text, backend.id(), language, speed).await else {
                    continue;
                };
                tracing::info!(
                    backend_id = %backend.id(),
                    language = %language,
                    char_count = request.char_count(),
                    audio_size = cached.data.len(),
                    "TTS cache hit - returning cached audio"
                );
                return Ok(SynthesizedAudio {
                    data: cached.data,
                    backend_id: backend.id().to_string(),
                    cache_hit: true,
                    audio_ref: Some(cached.audio_ref),
                });
            }
        }

        // 2. Walk the candidates
        let mut attempts = Vec::new();
        for backend in &candidates {
            let descriptor = backend.descriptor();
            if request.char_count() > descriptor.max_chars {
                tracing::debug!(
                    backend_id = %descriptor.id,
                    char_count = request.char_count(),
                    max_chars = descriptor.max_chars,
                    "Text exceeds backend limit, skipping"
                );
                attempts.push(BackendAttempt {
                    backend_id: descriptor.id.clone(),
                    reason: format!(
                        "text of {} characters exceeds limit of {}",
                        request.char_count(),
                        descriptor.max_chars
                    ),
                });
                continue;
            }

            match self.call_with_retry(backend.as_ref(), request).await {
                Ok(data) => {
                    // 3. Cache under the backend that actually produced the audio
                    let audio_ref = match &self.cache {
                        Some(cache) => {
                            cache
                                .store(text, backend.id(), language, speed, &data)
                                .await
                        }
                        None => None,
                    };

                    tracing::info!(
                        backend_id = %backend.id(),
                        language = %language,
                        char_count = request.char_count(),
                        audio_size = data.len(),
                        failed_backends = attempts.len(),
                        "Chunk synthesized"
                    );

                    return Ok(SynthesizedAudio {
                        data,
                        backend_id: backend.id().to_string(),
                        cache_hit: false,
                        audio_ref,
                    });
                }
                Err(BackendError::InvalidInput(reason)) => {
                    tracing::warn!(
                        backend_id = %backend.id(),
                        reason = %reason,
                        "Backend rejected input"
                    );
                    return Err(SynthesisError::InvalidInput(reason));
                }
                Err(e) => {
                    tracing::warn!(
                        backend_id = %backend.id(),
                        error = %e,
                        "Backend failed, trying next candidate"
                    );
                    attempts.push(BackendAttempt {
                        backend_id: backend.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::error!(
            language = %language,
            char_count = request.char_count(),
            candidates = candidates.len(),
            "All backends exhausted"
        );

        Err(SynthesisError::AllBackendsExhausted { attempts })
    }

    fn candidates(
        &self,
        language: &Language,
        preferred: Option<&str>,
    ) -> Vec<Arc<dyn SpeechBackend>> {
        let preferred = preferred.and_then(|id| {
            let backend = self.registry.get(id);
            if backend.is_none() {
                tracing::warn!(backend_id = %id, "Preferred backend is not registered, ignoring");
            }
            backend
        });

        let mut seen = HashSet::new();
        preferred
            .into_iter()
            .chain(self.registry.resolve(language))
            .filter(|backend| seen.insert(backend.id().to_string()))
            .collect()
    }

    fn backend_count(&self) -> usize {
        self.registry.len()
    }
}

impl SynthesisOrchestrator {
    /// Up to `max_attempts` calls; only `RateLimited` is retried
    async fn call_with_retry(
        &self,
        backend: &dyn SpeechBackend,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, BackendError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.rate_limiter.acquire(backend.id()).await;

            let result = backend
                .synthesize(request.text(), request.language(), request.speed())
                .await;
            match result {
                Err(reason) if reason.is_rate_limited() && attempt < max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    let spacing = self.rate_limiter.current_floor(backend.id());
                    tracing::warn!(
                        backend_id = %backend.id(),
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        spacing_ms = spacing.as_millis() as u64,
                        reason = %reason,
                        "Backend rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
