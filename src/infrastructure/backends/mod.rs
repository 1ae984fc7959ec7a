pub mod edge;
pub mod espeak;
pub mod google_translate;
pub mod openai;
pub mod polly;

pub use edge::EdgeBackend;
pub use espeak::EspeakBackend;
pub use google_translate::GoogleTranslateBackend;
pub use openai::OpenAiBackend;
pub use polly::PollyBackend;

use crate::domain::backend::SpeechBackend;
use crate::infrastructure::config::Config;
use std::sync::Arc;

/// Every backend this build knows about, ready for detection
pub async fn build_candidates(config: &Config) -> Vec<Arc<dyn SpeechBackend>> {
    let mut candidates: Vec<Arc<dyn SpeechBackend>> = Vec::new();

    if config.polly_enabled {
        tracing::info!("Initializing AWS Polly client with region: {}", config.aws_region);

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;

        tracing::info!(region = ?aws_config.region(), "AWS configuration loaded");

        let polly_client = Arc::new(aws_sdk_polly::Client::new(&aws_config));
        candidates.push(Arc::new(PollyBackend::new(polly_client)));
    }

    candidates.push(Arc::new(OpenAiBackend::new(
        config.openai_api_key.clone(),
        config.openai_tts_model.clone(),
        config.openai_tts_voice.clone(),
    )));
    candidates.push(Arc::new(GoogleTranslateBackend::new(config.google_tts_enabled)));
    candidates.push(Arc::new(EdgeBackend::new(
        config.edge_tts_enabled,
        config.edge_tts_voice.clone(),
    )));
    candidates.push(Arc::new(EspeakBackend::new(config.espeak_binary.clone())));

    candidates
}
