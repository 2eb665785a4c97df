#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tower::ServiceExt;

use aipal_backend::auth::sign_token;
use aipal_backend::db::memory::MemoryStore;
use aipal_backend::db::models::{AppRole, Profile};
use aipal_backend::db::store::Store;
use aipal_backend::services::llm_provider::{
    ChatResponse, CompletionError, CompletionRequest, CompletionService,
};
use aipal_backend::state::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Tool(serde_json::Value),
    NoToolCall,
    RateLimited,
    CreditsExhausted,
}

impl Reply {
    fn into_result(self) -> Result<ChatResponse, CompletionError> {
        let body = match self {
            Reply::Text(text) => serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": text } }]
            }),
            Reply::Tool(arguments) => serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": null, "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "create_learning_path", "arguments": arguments.to_string() }
                }]}}]
            }),
            Reply::NoToolCall => serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "no structure" } }]
            }),
            Reply::RateLimited => return Err(CompletionError::RateLimited),
            Reply::CreditsExhausted => return Err(CompletionError::CreditsExhausted),
        };
        Ok(serde_json::from_value(body).expect("scripted reply is a valid response"))
    }
}

/// Completion double that replays queued replies; the last one repeats.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatResponse, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);

        let reply = {
            let mut replies = self.replies.lock();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };
        reply
            .unwrap_or(Reply::Text(String::new()))
            .into_result()
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub completion: Arc<ScriptedCompletion>,
}

pub fn create_test_app(replies: Vec<Reply>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let completion = Arc::new(ScriptedCompletion::new(replies));
    let state = AppState::new(
        store.clone() as Arc<dyn Store>,
        completion.clone() as Arc<dyn CompletionService>,
        Some(JWT_SECRET.to_string()),
    );

    TestApp {
        router: aipal_backend::create_app(state),
        store,
        completion,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn add_user(&self, id: &str, name: &str, role: AppRole) -> String {
        self.store.put_profile(Profile {
            id: id.to_string(),
            full_name: Some(name.to_string()),
            student_number: None,
        });
        self.store.replace_role(id, role).await.unwrap();
        token_for(id)
    }
}

pub fn token_for(user_id: &str) -> String {
    sign_token(user_id, JWT_SECRET, 3600).unwrap()
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
