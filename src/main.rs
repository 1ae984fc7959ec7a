use readaloud_backend::controllers::{
    cache::CacheController, health::HealthController, playback::PlaybackController,
    tts::TtsController,
};
use readaloud_backend::domain::audio::AudioAssembler;
use readaloud_backend::domain::backend::{BackendRegistry, SpeechBackend};
use readaloud_backend::domain::playback::PlaybackPositionStore;
use readaloud_backend::domain::tts::{
    NarrationService, NarrationSettings, RetryPolicy, SynthesisApi, SynthesisOrchestrator,
};
use readaloud_backend::infrastructure::backends::build_candidates;
use readaloud_backend::infrastructure::cache::{CacheSettings, CacheStore};
use readaloud_backend::infrastructure::config::{Config, LogFormat};
use readaloud_backend::infrastructure::http::{start_http_server, Controllers};
use readaloud_backend::infrastructure::rate_limit::{RateLimitPolicy, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        environment = ?config.environment,
        "Starting ReadAloud Backend on {}:{}",
        config.host,
        config.port
    );

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Detect speech backends
    tracing::info!("Detecting speech backends...");
    let candidates = build_candidates(&config).await;
    let registry = Arc::new(BackendRegistry::detect_available(candidates.clone()).await);
    if registry.is_empty() {
        tracing::warn!("No speech backend available, synthesis requests will fail");
    }
    if config.is_development() {
        for descriptor in registry.descriptors() {
            tracing::debug!(
                backend = %descriptor.id,
                priority = descriptor.priority,
                max_chars = descriptor.max_chars,
                requires_network = descriptor.requires_network,
                "Backend registered"
            );
        }
    }

    // 2. Shared infrastructure
    tracing::info!(scope = ?config.rate_limit_scope, "Configuring rate limiter");
    let rate_limiter = Arc::new(RateLimiter::new(
        RateLimitPolicy::default(),
        config.rate_limit_scope,
    ));

    let cache = if config.tts_cache_enabled {
        let settings = CacheSettings {
            retention: config.cache_retention(),
            max_bytes: config.cache_max_bytes(),
            hot_max_bytes: config.cache_hot_max_bytes(),
        };
        tracing::info!(dir = %config.cache_dir.display(), "Opening audio cache");
        Some(Arc::new(CacheStore::open(config.cache_dir.clone(), settings).await))
    } else {
        tracing::info!("Audio cache disabled");
        None
    };

    let positions = Arc::new(PlaybackPositionStore::open(config.playback_state_path.clone()).await);

    // 3. Services
    tracing::info!("Instantiating services...");
    let retry = RetryPolicy {
        max_attempts: config.retry_attempts.max(1),
        base_delay: Duration::from_millis(config.retry_base_delay_ms),
        ..RetryPolicy::default()
    };
    let synthesis: Arc<dyn SynthesisApi> = Arc::new(SynthesisOrchestrator::new(
        registry.clone(),
        rate_limiter,
        cache.clone(),
        retry,
    ));
    let narration_service = Arc::new(NarrationService::new(
        synthesis,
        AudioAssembler::new(config.silence_gap()),
        positions.clone(),
        NarrationSettings {
            max_chunk_chars: config.max_chunk_chars,
            max_text_chars: config.max_text_chars,
            concurrency: config.concurrency,
        },
    ));

    // 4. Background jobs
    if let Some(cache) = cache.clone() {
        let interval = Duration::from_secs(config.cache_eviction_interval_secs.max(1));
        spawn_cache_eviction(cache, interval);
    }
    if let Some(interval) = config.backend_redetect_interval() {
        spawn_backend_redetection(registry.clone(), candidates, interval);
    }

    // 5. Controllers
    tracing::info!("Instantiating controllers...");
    let controllers = Controllers {
        health: Arc::new(HealthController::new(registry.clone(), cache.clone())),
        tts: Arc::new(TtsController::new(narration_service, registry)),
        playback: Arc::new(PlaybackController::new(positions)),
        cache: Arc::new(CacheController::new(cache)),
    };

    // Start HTTP server with all routes
    start_http_server(Arc::new(config), controllers).await?;

    Ok(())
}

/// Evict at start-up, then on every tick
fn spawn_cache_eviction(cache: Arc<CacheStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let report = cache.evict_expired().await;
            tracing::info!(
                expired = report.expired,
                over_budget = report.over_budget,
                remaining_entries = report.remaining_entries,
                remaining_bytes = report.remaining_bytes,
                "Cache eviction pass finished"
            );
        }
    });
}

/// Backends come and go (API keys rotate, espeak gets installed); re-check
/// them periodically and swap the registry snapshot.
fn spawn_backend_redetection(
    registry: Arc<BackendRegistry>,
    candidates: Vec<Arc<dyn SpeechBackend>>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately and detection just ran
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let before = registry.len();
            registry.redetect(candidates.clone()).await;
            tracing::info!(
                before = before,
                available = registry.len(),
                "Backend re-detection finished"
            );
        }
    });
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "readaloud_backend=debug,tower_http=debug".into());

    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
