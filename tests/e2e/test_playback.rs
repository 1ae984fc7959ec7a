use crate::e2e::helpers;

use helpers::{TestContext, THREE_SENTENCES};
use hyper::StatusCode;
use serde_json::json;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_offset_zero_for_unknown_documents(ctx: &TestContext) {
    let response = ctx
        .client
        .get("/api/playback?document_key=never-seen")
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(
        body.get("document_key").and_then(|v| v.as_str()),
        Some("never-seen")
    );
    assert_eq!(body.get("character_offset").and_then(|v| v.as_u64()), Some(0));
    assert!(body.get("timestamp").unwrap().is_null());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_store_and_return_a_position(ctx: &TestContext) {
    let response = ctx
        .client
        .put(
            "/api/playback",
            &json!({
                "document_key": "book",
                "character_offset": 1234,
                "audio_ref": "abc.mp3"
            }),
        )
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    let response = ctx.client.get("/api/playback?document_key=book").await.unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body.get("character_offset").and_then(|v| v.as_u64()), Some(1234));
    assert_eq!(body.get("audio_ref").and_then(|v| v.as_str()), Some("abc.mp3"));
    assert!(body.get("timestamp").and_then(|v| v.as_str()).is_some());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_keep_the_last_write(ctx: &TestContext) {
    for offset in [10, 500, 42] {
        ctx.client
            .put(
                "/api/playback",
                &json!({ "document_key": "book", "character_offset": offset }),
            )
            .await
            .unwrap()
            .assert_status(StatusCode::OK);
    }

    assert_eq!(ctx.positions.get("book").await, 42);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_record_progress_after_narration(ctx: &TestContext) {
    ctx.client
        .post(
            "/api/tts/synthesize",
            &json!({
                "document_key": "narrated",
                "text": THREE_SENTENCES,
                "language": "en"
            }),
        )
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = ctx
        .client
        .get("/api/playback?document_key=narrated")
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(
        body.get("character_offset").and_then(|v| v.as_u64()),
        Some(THREE_SENTENCES.chars().count() as u64)
    );
    let audio_ref = body.get("audio_ref").and_then(|v| v.as_str()).unwrap();
    assert!(audio_ref.ends_with(".mp3"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_an_empty_document_key(ctx: &TestContext) {
    let response = ctx
        .client
        .put(
            "/api/playback",
            &json!({ "document_key": "", "character_offset": 3 }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error_message("document_key");
}
