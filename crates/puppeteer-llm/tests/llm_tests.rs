//! Tests for puppeteer-llm: request types and the scripted mock provider

use puppeteer_llm::*;
use std::time::Duration;

// ===========================================================================
// LlmRequest
// ===========================================================================

#[test]
fn llm_request_default() {
    let req = LlmRequest::default();
    assert!(req.model.contains("claude"));
    assert!(req.messages.is_empty());
    assert!(req.system.is_none());
    assert_eq!(req.max_tokens, Some(4096));
}

#[test]
fn llm_request_prompt_builds_single_turn() {
    let req = LlmRequest::prompt("m", Some("be brief".into()), "hello");
    assert_eq!(req.model, "m");
    assert_eq!(req.messages.len(), 1);
    assert_eq!(req.messages[0].role, Role::User);
    assert_eq!(req.user_text(), "hello");
    assert_eq!(req.system.as_deref(), Some("be brief"));
}

#[test]
fn llm_request_skips_empty_optionals() {
    let req = LlmRequest { max_tokens: None, ..LlmRequest::prompt("m", None, "hi") };
    let json = serde_json::to_string(&req).unwrap();
    assert!(!json.contains("system"));
    assert!(!json.contains("max_tokens"));
    assert!(json.contains(r#""role":"user""#));
}

// ===========================================================================
// MockProvider
// ===========================================================================

#[tokio::test]
async fn mock_text_response() {
    let mock = MockProvider::text("hello world");
    let resp = mock.complete(LlmRequest::default()).await.unwrap();
    assert_eq!(resp.text, "hello world");
    assert_eq!(mock.call_count().await, 1);
}

#[tokio::test]
async fn mock_sequence_exhaustion() {
    let mock = MockProvider::sequence(vec![
        MockBehavior::Text("first".into()),
        MockBehavior::Error("boom".into()),
    ]);
    assert_eq!(mock.complete(LlmRequest::default()).await.unwrap().text, "first");
    let err = mock.complete(LlmRequest::default()).await.unwrap_err();
    assert!(err.to_string().contains("boom"));
    let third = mock.complete(LlmRequest::default()).await.unwrap();
    assert!(third.text.contains("sequence exhausted"));
    assert_eq!(mock.call_count().await, 3);
}

#[tokio::test]
async fn mock_records_requests() {
    let mock = MockProvider::text("ok");
    mock.complete(LlmRequest::prompt("m", None, "question one")).await.unwrap();
    let requests = mock.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].user_text(), "question one");
}

#[tokio::test(start_paused = true)]
async fn mock_delayed_then_text() {
    let mock = MockProvider::constant(MockBehavior::Delayed(
        Duration::from_secs(5),
        Box::new(MockBehavior::Text("late".into())),
    ));
    let resp = mock.complete(LlmRequest::default()).await.unwrap();
    assert_eq!(resp.text, "late");
}

#[tokio::test(start_paused = true)]
async fn mock_hang_never_completes() {
    let mock = MockProvider::constant(MockBehavior::Hang);
    let pending = mock.complete(LlmRequest::default());
    let result = tokio::time::timeout(Duration::from_secs(1), pending).await;
    assert!(result.is_err());
}
