use crate::e2e::helpers;

use helpers::{TestContext, TestOptions, THREE_SENTENCES};
use hyper::StatusCode;
use serde_json::json;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_start_with_an_empty_cache(ctx: &TestContext) {
    let response = ctx.client.get("/api/cache/stats").await.unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body.get("entries").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(body.get("total_bytes").and_then(|v| v.as_u64()), Some(0));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_count_synthesized_chunks(ctx: &TestContext) {
    ctx.client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "doc",
                "text": THREE_SENTENCES,
                "language": "en"
            }),
        )
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = ctx.client.get("/api/cache/stats").await.unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body.get("entries").and_then(|v| v.as_u64()), Some(3));
    assert!(body.get("total_bytes").and_then(|v| v.as_u64()).unwrap() > 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_keep_fresh_entries_on_eviction(ctx: &TestContext) {
    ctx.client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "doc",
                "text": "Keep me around.",
                "language": "en"
            }),
        )
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = ctx.client.post_empty("/api/cache/evict").await.unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body.get("expired").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(body.get("over_budget").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(body.get("remaining_entries").and_then(|v| v.as_u64()), Some(1));
}

#[tokio::test]
async fn it_should_report_a_disabled_cache() {
    let ctx = TestContext::start(TestOptions {
        cache_enabled: false,
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let response = ctx.client.get("/api/cache/stats").await.unwrap();
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    response.assert_error_message("disabled");

    let response = ctx.client.post_empty("/api/cache/evict").await.unwrap();
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
