//! Azure OpenAI adapter against a local mock deployment
//!
//! The mock serves scripted replies in order (the last one repeats) and
//! records what the client sent.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use dqv_common::config::ReasoningConfig;
use dqv_validator::contextual::{
    AzureOpenAiValidator, ContextualError, ContextualRequest, ContextualValidator,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct MockDeployment {
    replies: Vec<(StatusCode, Value)>,
    hits: AtomicUsize,
    seen_keys: Mutex<Vec<String>>,
    seen_versions: Mutex<Vec<String>>,
    seen_bodies: Mutex<Vec<Value>>,
}

async fn completions(
    State(mock): State<Arc<MockDeployment>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let hit = mock.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(key) = headers.get("api-key").and_then(|v| v.to_str().ok()) {
        mock.seen_keys.lock().unwrap().push(key.to_string());
    }
    if let Some(version) = query.get("api-version") {
        mock.seen_versions.lock().unwrap().push(version.clone());
    }
    mock.seen_bodies.lock().unwrap().push(body);

    let (status, reply) = mock.replies[hit.min(mock.replies.len() - 1)].clone();
    (status, Json(reply))
}

async fn spawn_mock(replies: Vec<(StatusCode, Value)>) -> (String, Arc<MockDeployment>) {
    let mock = Arc::new(MockDeployment {
        replies,
        hits: AtomicUsize::new(0),
        seen_keys: Mutex::new(Vec::new()),
        seen_versions: Mutex::new(Vec::new()),
        seen_bodies: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route(
            "/openai/deployments/gpt-4o/chat/completions",
            post(completions),
        )
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), mock)
}

fn chat_reply(content: &str) -> Value {
    json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

fn validator(endpoint: String) -> AzureOpenAiValidator {
    let config = ReasoningConfig {
        requests_per_second: 100,
        ..ReasoningConfig::default()
    };
    AzureOpenAiValidator::new(endpoint, "test-key".to_string(), &config, Duration::from_secs(5))
        .unwrap()
        .with_backoff(Duration::from_millis(10))
}

fn request() -> ContextualRequest<'static> {
    ContextualRequest {
        document_text: "Weight of cargo discharged: 1,234.56 MT",
        declared_quantity: Decimal::from_str("1234.56").unwrap(),
        candidates: &[],
        labeled_value: Some(Decimal::from_str("1234.56").unwrap()),
    }
}

const VALID_JUDGMENT: &str =
    r#"{"is_valid": true, "matched_value": 1234.56, "confidence": 92, "reasoning": "Labeled field matches", "field_location": "header table"}"#;

#[tokio::test]
async fn test_judgment_parsed_from_completion() {
    let (endpoint, mock) = spawn_mock(vec![(StatusCode::OK, chat_reply(VALID_JUDGMENT))]).await;

    let judgment = validator(endpoint).validate(&request()).await.unwrap();

    assert!(judgment.is_valid);
    assert_eq!(judgment.confidence, 92);
    assert_eq!(judgment.matched_value, Some(Decimal::from_str("1234.56").unwrap()));
    assert_eq!(judgment.field_location.as_deref(), Some("header table"));

    assert_eq!(mock.seen_keys.lock().unwrap().as_slice(), ["test-key"]);
    assert_eq!(mock.seen_versions.lock().unwrap().as_slice(), ["2024-10-21"]);
    let body = mock.seen_bodies.lock().unwrap()[0].clone();
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["max_tokens"], 500);
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("DECLARED QUANTITY: 1234.56"));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let (endpoint, mock) = spawn_mock(vec![
        (StatusCode::TOO_MANY_REQUESTS, json!({"error": {"code": "429"}})),
        (StatusCode::OK, chat_reply(VALID_JUDGMENT)),
    ])
    .await;

    let judgment = validator(endpoint).validate(&request()).await.unwrap();

    assert!(judgment.is_valid);
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_retries_are_bounded() {
    let (endpoint, mock) = spawn_mock(vec![(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": "429"}}),
    )])
    .await;

    let err = validator(endpoint).validate(&request()).await.unwrap_err();

    assert!(matches!(err, ContextualError::RateLimited(2)));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_server_error_is_reported_with_status() {
    let (endpoint, mock) = spawn_mock(vec![(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "boom"}),
    )])
    .await;

    let err = validator(endpoint).validate(&request()).await.unwrap_err();

    assert!(matches!(err, ContextualError::Api { status: 500, .. }));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prose_reply_is_unparsable() {
    let (endpoint, _mock) = spawn_mock(vec![(
        StatusCode::OK,
        chat_reply("The quantity looks right to me."),
    )])
    .await;

    let err = validator(endpoint).validate(&request()).await.unwrap_err();
    assert!(matches!(err, ContextualError::UnparsableResponse(_)));
}

#[tokio::test]
async fn test_structure_description_passes_through() {
    let (endpoint, mock) = spawn_mock(vec![(
        StatusCode::OK,
        chat_reply(r#"{"document_type": "bill of lading", "tables": 2}"#),
    )])
    .await;

    let structure = validator(endpoint)
        .describe_structure("BILL OF LADING\nQty 5")
        .await
        .unwrap();

    assert_eq!(structure["document_type"], "bill of lading");
    assert_eq!(structure["tables"], 2);
    assert_eq!(mock.seen_bodies.lock().unwrap()[0]["max_tokens"], 800);
}
