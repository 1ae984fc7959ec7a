use anyhow::Result;
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
use readaloud_backend::infrastructure::cache::{CacheSettings, CacheStore};
use readaloud_backend::infrastructure::http::{build_router, Controllers};
use readaloud_backend::infrastructure::rate_limit::{RateLimitPolicy, RateLimitScope, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;

pub mod api_client;
pub mod assertions;
pub mod stub_backend;

use api_client::TestClient;
use stub_backend::StubBackend;

/// Three sentences that chunk into three pieces at `CHUNK_LIMIT`
pub const THREE_SENTENCES: &str =
    "The first sentence is here. The second one follows. A third one ends it.";
pub const CHUNK_LIMIT: usize = 30;

pub struct TestOptions {
    pub backends: Vec<Arc<StubBackend>>,
    pub cache_enabled: bool,
    pub settings: NarrationSettings,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            backends: vec![
                Arc::new(StubBackend::speaking("stub-primary", 10)),
                Arc::new(StubBackend::speaking("stub-fallback", 20)),
            ],
            cache_enabled: true,
            settings: NarrationSettings {
                max_chunk_chars: CHUNK_LIMIT,
                max_text_chars: 2000,
                concurrency: None,
            },
        }
    }
}

pub struct TestContext {
    pub client: TestClient,
    pub backends: Vec<Arc<StubBackend>>,
    pub positions: Arc<PlaybackPositionStore>,
    _dir: TempDir,
}

impl TestContext {
    /// Start a server on an ephemeral port
    pub async fn start(options: TestOptions) -> Result<Self> {
        let dir = tempfile::tempdir()?;

        let candidates: Vec<Arc<dyn SpeechBackend>> = options
            .backends
            .iter()
            .map(|backend| Arc::clone(backend) as Arc<dyn SpeechBackend>)
            .collect();
        let registry = Arc::new(BackendRegistry::detect_available(candidates).await);

        // No spacing between calls, millisecond backoff
        let rate_limiter = Arc::new(RateLimiter::new(
            RateLimitPolicy {
                floor: Duration::ZERO,
                steps: Vec::new(),
                idle_reset: Duration::from_secs(60),
            },
            RateLimitScope::PerBackend,
        ));
        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };

        let cache = if options.cache_enabled {
            Some(Arc::new(
                CacheStore::open(dir.path().join("cache"), CacheSettings::default()).await,
            ))
        } else {
            None
        };
        let positions =
            Arc::new(PlaybackPositionStore::open(dir.path().join("positions.json")).await);

        let synthesis: Arc<dyn SynthesisApi> = Arc::new(SynthesisOrchestrator::new(
            registry.clone(),
            rate_limiter,
            cache.clone(),
            retry,
        ));
        let narration_service = Arc::new(NarrationService::new(
            synthesis,
            AudioAssembler::new(Duration::from_millis(100)),
            positions.clone(),
            options.settings,
        ));

        let app = build_router(Controllers {
            health: Arc::new(HealthController::new(registry.clone(), cache.clone())),
            tts: Arc::new(TtsController::new(narration_service, registry)),
            playback: Arc::new(PlaybackController::new(positions.clone())),
            cache: Arc::new(CacheController::new(cache)),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Ok(Self {
            client: TestClient::new(&format!("http://{}", addr)),
            backends: options.backends,
            positions,
            _dir: dir,
        })
    }

    pub fn backend(&self, id: &str) -> &Arc<StubBackend> {
        self.backends
            .iter()
            .find(|backend| backend.id() == id)
            .unwrap_or_else(|| panic!("no stub backend {}", id))
    }
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            TestContext::start(TestOptions::default())
                .await
                .expect("Failed to start test server")
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {
            // Temporary directory is removed on drop
        }
    }
}
