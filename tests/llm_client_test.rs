use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use aipal_backend::services::llm_provider::{
    CompletionError, CompletionRequest, CompletionService, LLMConfig, LLMProvider,
};

struct Upstream {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl Upstream {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serves `/v1/chat/completions` with a fixed status and body on an ephemeral port.
async fn spawn_upstream(status: StatusCode, body: serde_json::Value) -> Upstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, Json(payload): Json<serde_json::Value>| {
            let body = body.clone();
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer test-key");
                if !authorized || payload["model"] != "test-model" {
                    return (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad request" })));
                }
                (status, Json(body))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Upstream { addr, hits }
}

fn provider_for(addr: SocketAddr) -> LLMProvider {
    LLMProvider::new(LLMConfig {
        api_key: Some("test-key".to_string()),
        model: "test-model".to_string(),
        api_endpoint: format!("http://{addr}/v1"),
        timeout: Duration::from_secs(5),
    })
}

fn request() -> CompletionRequest {
    CompletionRequest::new("system", "user")
}

#[tokio::test]
async fn success_returns_first_choice() {
    let upstream = spawn_upstream(
        StatusCode::OK,
        json!({ "choices": [{ "message": { "role": "assistant", "content": "Clarity: 90" } }] }),
    )
    .await;

    let response = provider_for(upstream.addr).complete(request()).await.unwrap();
    assert_eq!(response.first_content(), Some("Clarity: 90"));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let upstream =
        spawn_upstream(StatusCode::TOO_MANY_REQUESTS, json!({ "error": "slow down" })).await;

    let err = provider_for(upstream.addr).complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::RateLimited));
    assert_eq!(upstream.hits(), 1, "rate limits are not retried");
    assert_eq!(err.user_message(), "Rate limit exceeded. Please try again later.");
}

#[tokio::test]
async fn status_402_is_credits_exhausted() {
    let upstream = spawn_upstream(StatusCode::PAYMENT_REQUIRED, json!({ "error": "pay up" })).await;

    let err = provider_for(upstream.addr).complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::CreditsExhausted));
    assert_eq!(upstream.hits(), 1);
    assert_eq!(
        err.user_message(),
        "AI credits exhausted. Please add credits to your workspace."
    );
}

#[tokio::test]
async fn other_failures_are_generic() {
    let upstream = spawn_upstream(StatusCode::BAD_GATEWAY, json!({ "error": "down" })).await;

    let err = provider_for(upstream.addr).complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Upstream { status, .. } if status == StatusCode::BAD_GATEWAY));
    assert_eq!(upstream.hits(), 1, "server errors are not retried");
    assert_eq!(err.user_message(), "AI analysis failed");
}

#[tokio::test]
async fn missing_api_key_fails_without_a_request() {
    let provider = LLMProvider::new(LLMConfig {
        api_key: None,
        model: "test-model".to_string(),
        api_endpoint: "http://127.0.0.1:9/v1".to_string(),
        timeout: Duration::from_secs(1),
    });

    let err = provider.complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::NotConfigured(_)));
}
