use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::domain::backend::BackendRegistry;
use crate::infrastructure::cache::CacheStore;

pub struct HealthController {
    registry: Arc<BackendRegistry>,
    cache: Option<Arc<CacheStore>>,
}

impl HealthController {
    pub fn new(registry: Arc<BackendRegistry>, cache: Option<Arc<CacheStore>>) -> Self {
        Self { registry, cache }
    }

    /// GET /health - Liveness
    pub async fn health() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// GET /health/ready - Ready once at least one backend was detected
    pub async fn health_ready(
        State(controller): State<Arc<HealthController>>,
    ) -> impl IntoResponse {
        let backends = controller.registry.len();
        let cache = if controller.cache.is_some() {
            "enabled"
        } else {
            "disabled"
        };

        if backends == 0 {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "backends": 0,
                    "cache": cache
                })),
            );
        }

        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "backends": backends,
                "cache": cache
            })),
        )
    }
}
