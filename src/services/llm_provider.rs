use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{env_string, env_u64};

const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
const DEFAULT_API_ENDPOINT: &str = "https://ai.gateway.lovable.dev/v1";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
pub const CREDITS_EXHAUSTED_MESSAGE: &str =
    "AI credits exhausted. Please add credits to your workspace.";
pub const GENERIC_FAILURE_MESSAGE: &str = "AI analysis failed";

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_endpoint: String,
    pub timeout: Duration,
}

impl LLMConfig {
    pub fn from_env() -> Self {
        let api_key = env_string("LLM_API_KEY").or_else(|| env_string("LOVABLE_API_KEY"));
        let model = env_string("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_endpoint = normalize_endpoint(
            env_string("LLM_API_ENDPOINT").unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
        );
        let timeout = Duration::from_millis(env_u64("LLM_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));
        Self { api_key, model, api_endpoint, timeout }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    fn user(content: &str) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

/// A function the model is forced to call instead of answering in prose.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
    pub tool: Option<ToolSpec>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self { system: system.into(), user: user.into(), temperature: None, tool: None }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tool = Some(tool);
        self
    }

    fn payload(&self, model: &str) -> serde_json::Value {
        let messages = [ChatMessage::system(&self.system), ChatMessage::user(&self.user)];
        let mut payload = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false
        });

        if let Some(temperature) = self.temperature {
            payload["temperature"] = serde_json::json!(temperature);
        }
        if let Some(tool) = &self.tool {
            payload["tools"] = serde_json::json!([{
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters
                }
            }]);
            payload["tool_choice"] = serde_json::json!({
                "type": "function",
                "function": { "name": tool.name }
            });
        }
        payload
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.content.as_deref())
    }

    pub fn first_tool_calls(&self) -> &[ToolCall] {
        self.choices
            .first()
            .and_then(|c| c.message.tool_calls.as_deref())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("LLM not configured: {0}")]
    NotConfigured(&'static str),
    #[error("upstream rate limit")]
    RateLimited,
    #[error("upstream credits exhausted")]
    CreditsExhausted,
    #[error("HTTP {status}: {body}")]
    Upstream { status: reqwest::StatusCode, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompletionError {
    /// The text shown to callers; internal detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            CompletionError::RateLimited => RATE_LIMIT_MESSAGE,
            CompletionError::CreditsExhausted => CREDITS_EXHAUSTED_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatResponse, CompletionError>;
}

#[derive(Clone)]
pub struct LLMProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl LLMProvider {
    pub fn from_env() -> Self {
        Self::new(LLMConfig::from_env())
    }

    pub fn new(config: LLMConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|v| !v.trim().is_empty())
            && !self.config.model.trim().is_empty()
            && !self.config.api_endpoint.trim().is_empty()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl CompletionService for LLMProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatResponse, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(CompletionError::NotConfigured("LLM_API_KEY"))?;

        let url = format!("{}/chat/completions", self.config.api_endpoint.trim_end_matches('/'));
        let payload = request.payload(&self.config.model);

        let resp = self.client.post(&url).bearer_auth(api_key).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "completion request rejected");
            return Err(match status {
                reqwest::StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited,
                reqwest::StatusCode::PAYMENT_REQUIRED => CompletionError::CreditsExhausted,
                _ => CompletionError::Upstream { status, body },
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            let body_str = String::from_utf8_lossy(&bytes);
            tracing::error!("Failed to parse LLM response JSON: {}. Body: {}", e, body_str);
            CompletionError::Json(e)
        })
    }
}

fn normalize_endpoint(endpoint: String) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") || trimmed.contains("/v1/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_gets_version_suffix() {
        assert_eq!(normalize_endpoint("http://localhost:9000/".into()), "http://localhost:9000/v1");
        assert_eq!(
            normalize_endpoint("https://ai.gateway.lovable.dev/v1".into()),
            "https://ai.gateway.lovable.dev/v1"
        );
    }

    #[test]
    fn tool_payload_forces_the_named_function() {
        let request = CompletionRequest::new("sys", "usr").with_tool(ToolSpec {
            name: "create_learning_path",
            description: "desc",
            parameters: serde_json::json!({"type": "object"}),
        });
        let payload = request.payload("m");

        assert_eq!(payload["tools"][0]["function"]["name"], "create_learning_path");
        assert_eq!(payload["tool_choice"]["function"]["name"], "create_learning_path");
        assert!(payload.get("temperature").is_none());
        assert_eq!(payload["messages"][1]["content"], "usr");
    }

    #[test]
    fn tool_call_response_parses_without_content() {
        let body = r#"{"model":"m","choices":[{"message":{"role":"assistant","content":null,
            "tool_calls":[{"id":"c1","type":"function","function":{"name":"f","arguments":"{}"}}]}}],
            "usage":{"prompt_tokens":3,"completion_tokens":5,"total_tokens":8}}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(response.first_content().is_none());
        assert_eq!(response.first_tool_calls().len(), 1);
    }

    #[test]
    fn status_errors_map_to_literal_messages() {
        assert_eq!(CompletionError::RateLimited.user_message(), RATE_LIMIT_MESSAGE);
        assert_eq!(CompletionError::CreditsExhausted.user_message(), CREDITS_EXHAUSTED_MESSAGE);
        assert_eq!(
            CompletionError::NotConfigured("LLM_API_KEY").user_message(),
            GENERIC_FAILURE_MESSAGE
        );
    }
}
