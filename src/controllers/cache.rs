use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    infrastructure::cache::{CacheStats, CacheStore, EvictionReport},
};

pub struct CacheController {
    cache: Option<Arc<CacheStore>>,
}

impl CacheController {
    pub fn new(cache: Option<Arc<CacheStore>>) -> Self {
        Self { cache }
    }

    fn store(&self) -> AppResult<&Arc<CacheStore>> {
        self.cache
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("audio cache is disabled".to_string()))
    }

    /// GET /api/cache/stats
    pub async fn stats(
        State(controller): State<Arc<CacheController>>,
    ) -> AppResult<Json<CacheStats>> {
        let cache = controller.store()?;
        Ok(Json(cache.stats().await))
    }

    /// POST /api/cache/evict - Run an eviction pass now
    pub async fn evict(
        State(controller): State<Arc<CacheController>>,
    ) -> AppResult<Json<EvictionReport>> {
        let cache = controller.store()?;
        Ok(Json(cache.evict_expired().await))
    }
}
