use super::error::SynthesisError;
use super::language::Language;
use serde::Serialize;

/// Speaking rate relative to a backend's normal pace
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Speed(f32);

impl Speed {
    pub const NORMAL: Speed = Speed(1.0);
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 2.0;

    pub fn new(value: f32) -> Result<Self, SynthesisError> {
        if !value.is_finite() || !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(SynthesisError::InvalidInput(format!(
                "speed must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn is_normal(self) -> bool {
        (self.0 - 1.0).abs() < f32::EPSILON
    }

    pub fn is_slow(self) -> bool {
        self.0 < 1.0
    }

    /// Signed percentage change from the normal rate (`0.8` is `-20`)
    pub fn percent_change(self) -> i32 {
        ((self.0 - 1.0) * 100.0).round() as i32
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl std::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of work for the orchestrator. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    language: Language,
    backend_hint: Option<String>,
    speed: Speed,
}

impl SynthesisRequest {
    pub fn new(
        text: impl Into<String>,
        language: Language,
        backend_hint: Option<String>,
    ) -> Result<Self, SynthesisError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SynthesisError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            text,
            language,
            backend_hint: backend_hint.filter(|hint| !hint.trim().is_empty()),
            speed: Speed::NORMAL,
        })
    }

    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn backend_hint(&self) -> Option<&str> {
        self.backend_hint.as_deref()
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Length in characters, the unit every backend limit is expressed in
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
