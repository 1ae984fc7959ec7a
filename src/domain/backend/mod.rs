pub mod registry;


use crate::domain::tts::{BackendError, Language, Speed};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

pub use registry::BackendRegistry;

/// Static capabilities of a speech backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendDescriptor {
    pub id: String,
    pub display_name: String,
    /// Lower values are tried first
    pub priority: u32,
    /// Primary language subtags (`en`, `zh`). Empty means any language.
    pub supported_languages: BTreeSet<String>,
    pub requires_network: bool,
    /// Longest text, in characters, accepted by a single call
    pub max_chars: usize,
}

impl BackendDescriptor {
    pub fn new(id: &str, display_name: &str, priority: u32) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            priority,
            supported_languages: BTreeSet::new(),
            requires_network: true,
            max_chars: usize::MAX,
        }
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.supported_languages = languages
            .into_iter()
            .map(|l| l.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn offline(mut self) -> Self {
        self.requires_network = false;
        self
    }

    pub fn supports(&self, language: &Language) -> bool {
        self.supported_languages.is_empty()
            || self.supported_languages.contains(language.primary())
            || self
                .supported_languages
                .contains(&language.as_str().to_ascii_lowercase())
    }
}

/// A concrete synthesis capability (cloud API, local engine, test stub).
///
/// Implementations are responsible for:
/// - Selecting a provider voice for the language
/// - Reporting failures as a structured `BackendError`
/// - Bridging whatever I/O model the provider uses into a single awaited call
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn descriptor(&self) -> &BackendDescriptor;

    /// Cheap presence check run at detection time. `false` omits the backend.
    async fn is_available(&self) -> bool;

    /// Synthesize `text` (at most `descriptor().max_chars` characters) at
    /// `speed`, as closely as the provider allows
    ///
    /// Returns encoded audio (MP3 or WAV)
    async fn synthesize(
        &self,
        text: &str,
        language: &Language,
        speed: Speed,
    ) -> Result<Vec<u8>, BackendError>;

    fn id(&self) -> &str {
        &self.descriptor().id
    }
}
