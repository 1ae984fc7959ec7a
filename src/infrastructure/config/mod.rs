use crate::infrastructure::rate_limit::RateLimitScope;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Cache
    pub tts_cache_enabled: bool,
    pub cache_dir: PathBuf,
    pub cache_retention_days: u64,
    pub cache_max_mb: u64,
    pub cache_hot_max_mb: u64,
    pub cache_eviction_interval_secs: u64,
    // Playback
    pub playback_state_path: PathBuf,
    // Synthesis
    pub max_chunk_chars: usize,
    pub max_text_chars: usize,
    pub silence_gap_ms: u64,
    pub concurrency: Option<usize>,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub rate_limit_scope: RateLimitScope,
    // Backends
    pub aws_region: String,
    pub polly_enabled: bool,
    pub openai_api_key: Option<String>,
    pub openai_tts_model: String,
    pub openai_tts_voice: Option<String>,
    pub google_tts_enabled: bool,
    pub edge_tts_enabled: bool,
    /// Overrides the per-language Edge voice when set
    pub edge_tts_voice: Option<String>,
    pub espeak_binary: String,
    /// Re-detect backends this often; 0 disables
    pub backend_redetect_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::Development,
            log_format: LogFormat::Pretty,
            tts_cache_enabled: true,
            cache_dir: PathBuf::from(".cache/audio"),
            cache_retention_days: 7,
            cache_max_mb: 500,
            cache_hot_max_mb: 32,
            cache_eviction_interval_secs: 3600,
            playback_state_path: PathBuf::from("data/playback_positions.json"),
            max_chunk_chars: 1000,
            max_text_chars: 100_000,
            silence_gap_ms: 150,
            concurrency: None,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            rate_limit_scope: RateLimitScope::PerBackend,
            aws_region: "eu-west-1".to_string(),
            polly_enabled: true,
            openai_api_key: None,
            openai_tts_model: "tts-1".to_string(),
            openai_tts_voice: None,
            google_tts_enabled: true,
            edge_tts_enabled: true,
            edge_tts_voice: None,
            espeak_binary: "espeak-ng".to_string(),
            backend_redetect_interval_secs: 300,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                })?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
            tts_cache_enabled: parse_flag("TTS_CACHE_ENABLED", defaults.tts_cache_enabled),
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_retention_days: parse_or("CACHE_RETENTION_DAYS", defaults.cache_retention_days)?,
            cache_max_mb: parse_or("CACHE_MAX_MB", defaults.cache_max_mb)?,
            cache_hot_max_mb: parse_or("CACHE_HOT_MAX_MB", defaults.cache_hot_max_mb)?,
            cache_eviction_interval_secs: parse_or(
                "CACHE_EVICTION_INTERVAL_SECS",
                defaults.cache_eviction_interval_secs,
            )?,
            playback_state_path: env::var("PLAYBACK_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.playback_state_path),
            max_chunk_chars: parse_or("TTS_MAX_CHUNK_CHARS", defaults.max_chunk_chars)?,
            max_text_chars: parse_or("TTS_MAX_TEXT_CHARS", defaults.max_text_chars)?,
            silence_gap_ms: parse_or("TTS_SILENCE_GAP_MS", defaults.silence_gap_ms)?,
            concurrency: match non_empty_var("TTS_CONCURRENCY") {
                Some(value) => Some(value.parse()?),
                None => None,
            },
            retry_attempts: parse_or("TTS_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_base_delay_ms: parse_or("TTS_RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms)?,
            rate_limit_scope: env::var("RATE_LIMIT_SCOPE")
                .unwrap_or_else(|_| "backend".to_string())
                .parse::<RateLimitScope>()?,
            aws_region: env::var("AWS_REGION").unwrap_or(defaults.aws_region),
            polly_enabled: parse_flag("POLLY_ENABLED", defaults.polly_enabled),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_tts_model: env::var("OPENAI_TTS_MODEL").unwrap_or(defaults.openai_tts_model),
            openai_tts_voice: non_empty_var("OPENAI_TTS_VOICE"),
            google_tts_enabled: parse_flag("GOOGLE_TTS_ENABLED", defaults.google_tts_enabled),
            edge_tts_enabled: parse_flag("EDGE_TTS_ENABLED", defaults.edge_tts_enabled),
            edge_tts_voice: non_empty_var("EDGE_TTS_VOICE"),
            espeak_binary: env::var("ESPEAK_BINARY").unwrap_or(defaults.espeak_binary),
            backend_redetect_interval_secs: parse_or(
                "BACKEND_REDETECT_INTERVAL_SECS",
                defaults.backend_redetect_interval_secs,
            )?,
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache_retention_days * 24 * 60 * 60)
    }

    pub fn cache_max_bytes(&self) -> u64 {
        self.cache_max_mb * 1024 * 1024
    }

    pub fn cache_hot_max_bytes(&self) -> u64 {
        self.cache_hot_max_mb * 1024 * 1024
    }

    pub fn silence_gap(&self) -> Duration {
        Duration::from_millis(self.silence_gap_ms)
    }

    pub fn backend_redetect_interval(&self) -> Option<Duration> {
        (self.backend_redetect_interval_secs > 0)
            .then(|| Duration::from_secs(self.backend_redetect_interval_secs))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|s| s.trim().to_lowercase() == "true")
        .unwrap_or(default)
}

fn parse_or<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + 'static,
{
    match non_empty_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| format!("invalid {}: {}", key, e).into()),
        None => Ok(default),
    }
}
