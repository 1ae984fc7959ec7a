use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::infrastructure::config::Config;
use crate::{
    controllers::{
        cache::CacheController, health::HealthController, playback::PlaybackController,
        tts::TtsController,
    },
    infrastructure::middleware::request_id_middleware,
};

/// Controllers wired into the router
#[derive(Clone)]
pub struct Controllers {
    pub health: Arc<HealthController>,
    pub tts: Arc<TtsController>,
    pub playback: Arc<PlaybackController>,
    pub cache: Arc<CacheController>,
}

/// Build the application router with all routes configured
pub fn build_router(controllers: Controllers) -> Router {
    let health_routes = Router::new()
        .route("/health", get(HealthController::health))
        .route("/health/ready", get(HealthController::health_ready))
        .with_state(controllers.health);

    let tts_routes = Router::new()
        .route("/api/tts/synthesize", post(TtsController::synthesize))
        .route("/api/backends", get(TtsController::list_backends))
        .with_state(controllers.tts);

    let playback_routes = Router::new()
        .route(
            "/api/playback",
            get(PlaybackController::get_position).put(PlaybackController::update_position),
        )
        .with_state(controllers.playback);

    let cache_routes = Router::new()
        .route("/api/cache/stats", get(CacheController::stats))
        .route("/api/cache/evict", post(CacheController::evict))
        .with_state(controllers.cache);

    Router::new()
        .merge(health_routes)
        .merge(tts_routes)
        .merge(playback_routes)
        .merge(cache_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server and serve until the process exits
pub async fn start_http_server(
    config: Arc<Config>,
    controllers: Controllers,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(controllers);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
