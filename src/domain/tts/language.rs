use lingua::{Language as LinguaLanguage, LanguageDetector, LanguageDetectorBuilder};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Language used when neither the caller nor detection provides one
pub const DEFAULT_LANGUAGE: &str = "en";

/// Normalized language code (`en`, `zh-CN`, `pt-BR`).
///
/// The primary subtag is lowercased and the region subtag uppercased, so
/// `ZH-cn`, `zh_cn` and `zh-CN` all compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid language code: {0:?}")]
pub struct InvalidLanguage(pub String);

impl Language {
    pub fn new(code: &str) -> Result<Self, InvalidLanguage> {
        let code = code.trim().replace('_', "-");
        let mut parts = code.split('-');
        let primary = parts.next().unwrap_or_default();

        if primary.len() < 2
            || primary.len() > 3
            || !primary.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(InvalidLanguage(code.clone()));
        }

        let mut normalized = primary.to_ascii_lowercase();
        for subtag in parts {
            if subtag.is_empty() || !subtag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(InvalidLanguage(code.clone()));
            }
            normalized.push('-');
            if subtag.len() == 2 {
                normalized.push_str(&subtag.to_ascii_uppercase());
            } else {
                normalized.push_str(&subtag.to_ascii_lowercase());
            }
        }

        Ok(Self(normalized))
    }

    pub fn default_language() -> Self {
        Self(DEFAULT_LANGUAGE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary subtag, e.g. `zh` for `zh-CN`
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// Convert lingua Language to our code
    pub fn from_lingua(language: LinguaLanguage) -> Self {
        let code = match language {
            LinguaLanguage::English => "en",
            LinguaLanguage::Spanish => "es",
            LinguaLanguage::French => "fr",
            LinguaLanguage::German => "de",
            LinguaLanguage::Italian => "it",
            LinguaLanguage::Portuguese => "pt",
            LinguaLanguage::Chinese => "zh-CN",
            LinguaLanguage::Japanese => "ja",
            #[allow(unreachable_patterns)]
            _ => DEFAULT_LANGUAGE,
        };
        Self(code.to_string())
    }
}

impl FromStr for Language {
    type Err = InvalidLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Language {
    type Error = InvalidLanguage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.0
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build a detector restricted to the languages compiled into lingua
pub fn build_detector() -> LanguageDetector {
    LanguageDetectorBuilder::from_languages(&[
        LinguaLanguage::English,
        LinguaLanguage::Spanish,
        LinguaLanguage::French,
        LinguaLanguage::German,
        LinguaLanguage::Italian,
        LinguaLanguage::Portuguese,
        LinguaLanguage::Chinese,
        LinguaLanguage::Japanese,
    ])
    .build()
}

/// Detect the language of the given text, falling back to English
pub fn detect_language(detector: &LanguageDetector, text: &str) -> Language {
    match detector.detect_language_of(text) {
        Some(language) => Language::from_lingua(language),
        None => {
            tracing::warn!("Could not detect language, falling back to English");
            Language::default_language()
        }
    }
}
