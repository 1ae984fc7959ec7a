use super::{BackendDescriptor, SpeechBackend};
use crate::domain::tts::Language;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered, deduplicated set of backends that reported themselves available.
///
/// The set is replaced wholesale by `redetect`; readers always see either the
/// old or the new snapshot, never a mix.
pub struct BackendRegistry {
    backends: RwLock<Arc<Vec<Arc<dyn SpeechBackend>>>>,
}

impl BackendRegistry {
    /// Check every candidate and keep the ones that report present
    pub async fn detect_available(candidates: Vec<Arc<dyn SpeechBackend>>) -> Self {
        let backends = detect_all(candidates).await;
        Self {
            backends: RwLock::new(Arc::new(backends)),
        }
    }

    /// Build a registry without probing (backends are assumed present)
    pub fn from_backends(backends: Vec<Arc<dyn SpeechBackend>>) -> Self {
        Self {
            backends: RwLock::new(Arc::new(order_and_dedup(backends))),
        }
    }

    /// Re-run detection and swap in the new set
    pub async fn redetect(&self, candidates: Vec<Arc<dyn SpeechBackend>>) {
        let backends = detect_all(candidates).await;
        *self.backends.write() = Arc::new(backends);
    }

    fn snapshot(&self) -> Arc<Vec<Arc<dyn SpeechBackend>>> {
        self.backends.read().clone()
    }

    /// Backends declaring support for `language`, ascending priority
    pub fn resolve(&self, language: &Language) -> Vec<Arc<dyn SpeechBackend>> {
        self.snapshot()
            .iter()
            .filter(|backend| backend.descriptor().supports(language))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn SpeechBackend>> {
        self.snapshot()
            .iter()
            .find(|backend| backend.id() == id)
            .cloned()
    }

    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        self.snapshot()
            .iter()
            .map(|backend| backend.descriptor().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn detect_all(candidates: Vec<Arc<dyn SpeechBackend>>) -> Vec<Arc<dyn SpeechBackend>> {
    let results = join_all(candidates.iter().map(|backend| backend.is_available())).await;

    let present = candidates
        .into_iter()
        .zip(results)
        .filter_map(|(backend, present)| {
            tracing::info!(
                backend = backend.id(),
                present = present,
                requires_network = backend.descriptor().requires_network,
                "Backend checked"
            );
            present.then_some(backend)
        })
        .collect();

    order_and_dedup(present)
}

fn order_and_dedup(backends: Vec<Arc<dyn SpeechBackend>>) -> Vec<Arc<dyn SpeechBackend>> {
    let mut seen = HashSet::new();
    let mut unique: Vec<_> = backends
        .into_iter()
        .filter(|backend| seen.insert(backend.id().to_string()))
        .collect();
    unique.sort_by_key(|backend| backend.descriptor().priority);
    unique
}
