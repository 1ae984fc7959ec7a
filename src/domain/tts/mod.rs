pub mod error;
pub mod language;
pub mod narration;
pub mod request;
pub mod service;

pub use error::{BackendAttempt, BackendError, SynthesisError};
pub use language::{build_detector, detect_language, Language, DEFAULT_LANGUAGE};
pub use narration::{
    CancellationFlag, ChunkFailure, Narration, NarrationError, NarrationRequest, NarrationService,
    NarrationSettings, TextFormat,
};
pub use request::{Speed, SynthesisRequest};
pub use service::{RetryPolicy, SynthesisApi, SynthesisOrchestrator, SynthesizedAudio};
