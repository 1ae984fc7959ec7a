use crate::e2e::helpers;

use helpers::assertions::{assert_mp3, assert_narration_headers};
use helpers::stub_backend::StubBackend;
use helpers::{TestContext, TestOptions, THREE_SENTENCES};
use hyper::StatusCode;
use readaloud_backend::domain::audio::decode;
use readaloud_backend::domain::tts::{BackendError, NarrationSettings, Speed};
use serde_json::json;
use std::sync::Arc;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_synthesize_text_to_speech(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "doc-1",
                "text": THREE_SENTENCES,
                "language": "en"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_narration_headers(&response.headers);
    response.assert_header("content-type", "audio/mpeg");
    response.assert_header("x-backends-used", "stub-primary");
    response.assert_header("x-language", "en");
    assert_eq!(response.header_usize("x-chunk-count"), 3);
    assert_eq!(response.header_usize("x-chunks-completed"), 3);
    assert_eq!(response.header_usize("x-start-offset"), 0);
    assert_eq!(
        response.header_usize("x-end-offset"),
        THREE_SENTENCES.chars().count()
    );
    assert!(response.header("x-synthesis-incomplete").is_none());
    assert_mp3(&response.body_bytes);

    assert_eq!(ctx.backend("stub-primary").calls(), 3);
    assert_eq!(ctx.backend("stub-fallback").calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_deliver_single_chunk_wav_as_mp3(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "short",
                "text": "Just one line.",
                "language": "en"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.header_usize("x-chunk-count"), 1);
    response.assert_header("content-type", "audio/mpeg");
    assert_mp3(&response.body_bytes);
    // The stub speaks 16 kHz mono, which the encoder keeps
    assert_eq!(decode(&response.body_bytes).unwrap().sample_rate, 16000);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_pass_the_speed_to_the_backend(ctx: &TestContext) {
    let slow = json!({
        "document_key": "slow",
        "text": THREE_SENTENCES,
        "language": "en",
        "speed": 0.75
    });

    let response = ctx.client.post("/api/tts/synthesize", &slow).await.unwrap();
    response.assert_status(StatusCode::OK);
    let speeds = ctx.backend("stub-primary").speeds();
    assert_eq!(speeds, vec![Speed::new(0.75).unwrap(); 3]);

    // Audio at another speed is not reused
    let normal = json!({
        "document_key": "slow",
        "text": THREE_SENTENCES,
        "language": "en"
    });
    let response = ctx.client.post("/api/tts/synthesize", &normal).await.unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.header_usize("x-cache-hits"), 0);
    assert_eq!(ctx.backend("stub-primary").speeds().len(), 6);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_a_speed_out_of_range(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "fast",
                "text": "Hello there.",
                "speed": 3.0
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error("invalid_input", "speed must be between 0.5 and 2");
    assert_eq!(ctx.backend("stub-primary").calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_auto_detect_language(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "detect",
                "text": "Este es un mensaje de prueba en español."
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    response.assert_header("x-language", "es");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_strip_html_before_narrating(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "html",
                "text": "<p>Hello <a href=\"https://example.com\">there</a>.</p>",
                "format": "html",
                "language": "en"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert!(response.header_usize("x-end-offset") > 0);
    assert_eq!(ctx.backend("stub-primary").calls(), response.header_usize("x-chunk-count"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_honor_the_backend_hint(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "hinted",
                "text": THREE_SENTENCES,
                "language": "en",
                "backend": "stub-fallback"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    response.assert_header("x-backends-used", "stub-fallback");
    assert_eq!(ctx.backend("stub-primary").calls(), 0);
}

#[tokio::test]
async fn it_should_fail_over_to_the_next_backend() {
    let ctx = TestContext::start(TestOptions {
        backends: vec![
            Arc::new(StubBackend::failing(
                "stub-primary",
                10,
                BackendError::Unavailable("offline".to_string()),
            )),
            Arc::new(StubBackend::speaking("stub-fallback", 20)),
        ],
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "failover",
                "text": THREE_SENTENCES,
                "language": "en"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    response.assert_header("x-backends-used", "stub-fallback");
    assert_eq!(response.header_usize("x-chunks-completed"), 3);
    assert_eq!(ctx.backend("stub-fallback").calls(), 3);
}

#[tokio::test]
async fn it_should_return_bad_gateway_when_every_backend_fails() {
    let ctx = TestContext::start(TestOptions {
        backends: vec![
            Arc::new(StubBackend::failing(
                "stub-primary",
                10,
                BackendError::Unavailable("offline".to_string()),
            )),
            Arc::new(StubBackend::failing(
                "stub-fallback",
                20,
                BackendError::RateLimited("slow down".to_string()),
            )),
        ],
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "doomed",
                "text": THREE_SENTENCES,
                "language": "en"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_GATEWAY);
    response.assert_error("synthesis_failed", "all backends exhausted");
    // Unavailable moves on at once, rate limited is retried
    assert!(ctx.backend("stub-primary").calls() >= 1);
    assert!(ctx.backend("stub-fallback").calls() >= 2);
}

#[tokio::test]
async fn it_should_return_partial_audio_when_a_later_chunk_fails() {
    let ctx = TestContext::start(TestOptions {
        backends: vec![Arc::new(
            StubBackend::speaking("stub-primary", 10).failing_after(1),
        )],
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "partial",
                "text": THREE_SENTENCES,
                "language": "en"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    response.assert_header("x-synthesis-incomplete", "true");
    assert_eq!(response.header_usize("x-failed-chunk"), 1);
    assert_eq!(response.header_usize("x-chunk-count"), 3);
    assert_eq!(response.header_usize("x-chunks-completed"), 1);
    assert_eq!(response.header_usize("x-end-offset"), 28);

    // Progress only covers the audio that was produced
    assert_eq!(ctx.positions.get("partial").await, 28);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_resume_from_the_stored_position(ctx: &TestContext) {
    let first = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "article",
                "text": THREE_SENTENCES,
                "language": "en",
                "max_chunks": 1
            }),
        )
        .await
        .unwrap();
    first.assert_status(StatusCode::OK);
    assert_eq!(first.header_usize("x-chunk-count"), 1);
    let stopped_at = first.header_usize("x-end-offset");
    assert_eq!(stopped_at, 28);

    let resumed = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "article",
                "text": THREE_SENTENCES,
                "language": "en",
                "resume": true
            }),
        )
        .await
        .unwrap();
    resumed.assert_status(StatusCode::OK);
    assert_eq!(resumed.header_usize("x-start-offset"), stopped_at);
    assert_eq!(resumed.header_usize("x-chunk-count"), 2);

    // Finished documents start over
    let restarted = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "article",
                "text": THREE_SENTENCES,
                "language": "en",
                "resume": true
            }),
        )
        .await
        .unwrap();
    restarted.assert_status(StatusCode::OK);
    assert_eq!(restarted.header_usize("x-start-offset"), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_serve_repeated_text_from_cache(ctx: &TestContext) {
    let body = json!({
        "document_key": "cached",
        "text": THREE_SENTENCES,
        "language": "en"
    });

    let first = ctx.client.post("/api/tts/synthesize", &body).await.unwrap();
    first.assert_status(StatusCode::OK);
    assert_eq!(first.header_usize("x-cache-hits"), 0);

    let second = ctx.client.post("/api/tts/synthesize", &body).await.unwrap();
    second.assert_status(StatusCode::OK);
    assert_eq!(second.header_usize("x-cache-hits"), 3);
    assert_eq!(second.body_bytes, first.body_bytes);
    assert_eq!(ctx.backend("stub-primary").calls(), 3);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({ "document_key": "empty", "text": "   \n\n  " }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error("invalid_input", "empty");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_a_missing_document_key(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({ "document_key": " ", "text": "Hello there." }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error_message("document_key");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_an_invalid_language(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "lang",
                "text": "Hello there.",
                "language": "not a language"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error_message("invalid language code");
}

#[tokio::test]
async fn it_should_reject_text_over_the_limit() {
    let ctx = TestContext::start(TestOptions {
        settings: NarrationSettings {
            max_chunk_chars: 30,
            max_text_chars: 50,
            concurrency: None,
        },
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let response = ctx
        .client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "huge",
                "text": THREE_SENTENCES,
                "language": "en"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    response.assert_error("text_too_large", "limit is 50");
    assert_eq!(ctx.backend("stub-primary").calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_malformed_json(ctx: &TestContext) {
    let response = ctx
        .client
        .post_raw("/api/tts/synthesize", "{\"text\": ")
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error("invalid_input", "");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_a_request_without_text(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/tts/synthesize", &json!({ "document_key": "doc" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error("invalid_input", "text");
}
