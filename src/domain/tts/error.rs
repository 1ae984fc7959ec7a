use crate::error::AppError;

/// Error reported by a single speech backend for a single call.
///
/// Adapters classify provider failures into one of these kinds; the
/// orchestrator dispatches retry/failover on the kind alone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Provider throttled us. Retried on the same backend with backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Provider unreachable, misconfigured or failing. Next backend is tried.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The text itself was rejected. Not retried anywhere.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl BackendError {
    /// Legacy classifier for providers that only give us a message.
    ///
    /// Only used when an adapter has no structured status or error code.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("429")
            || lowered.contains("too many requests")
            || lowered.contains("rate limit")
            || lowered.contains("throttl")
        {
            BackendError::RateLimited(message)
        } else {
            BackendError::Unavailable(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, BackendError::RateLimited(_))
    }
}

/// Terminal outcome of synthesizing one chunk
#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("all backends exhausted: {}", format_attempts(.attempts))]
    AllBackendsExhausted { attempts: Vec<BackendAttempt> },
}

/// Why a particular backend did not produce audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAttempt {
    pub backend_id: String,
    pub reason: String,
}

fn format_attempts(attempts: &[BackendAttempt]) -> String {
    if attempts.is_empty() {
        return "no backend available for this request".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{} ({})", a.backend_id, a.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<SynthesisError> for AppError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::InvalidInput(msg) => AppError::BadRequest(msg),
            other @ SynthesisError::AllBackendsExhausted { .. } => {
                AppError::SynthesisFailed(other.to_string())
            }
        }
    }
}
