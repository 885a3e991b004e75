//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! - OpenRouter (https://openrouter.ai/api)
//! - vLLM (http://localhost:8000)
//! - LocalAI (http://localhost:8080)
//! - llama-server / llama.cpp (http://localhost:8080)
//!
//! # Configuration
//!
//! Environment variables:
//! - `DOMPET_AI_BASE_URL`: Server URL (default: https://openrouter.ai/api)
//! - `DOMPET_AI_API_KEY`: Bearer token if required (optional)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{AIConfig, RetryPolicy};
use crate::error::{Error, Result};

use super::types::{CompletionRequest, UserContent};
use super::ChatBackend;

/// Backend for any server implementing the OpenAI `/v1/chat/completions` API
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    /// Per-attempt cap on the HTTP call
    timeout: Duration,
}

impl OpenAICompatibleBackend {
    /// Create a new backend against a base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            timeout: RetryPolicy::default().timeout,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create from gateway configuration
    pub fn from_config(config: &AIConfig) -> Self {
        Self {
            http_client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.retry.timeout,
        }
    }

    /// Create from environment variables
    ///
    /// Optional: `DOMPET_AI_BASE_URL` (default: https://openrouter.ai/api)
    /// Optional: `DOMPET_AI_API_KEY`
    pub fn from_env() -> Self {
        let base_url = std::env::var("DOMPET_AI_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "https://openrouter.ai/api".to_string());
        let api_key = std::env::var("DOMPET_AI_API_KEY")
            .ok()
            .filter(|v| !v.is_empty());

        let mut backend = Self::new(&base_url);
        backend.api_key = api_key;
        backend
    }

    fn wire_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: ChatContent::Text(request.system.clone()),
        });
        for turn in &request.history {
            messages.push(ChatMessage {
                role: turn.role.as_str().to_string(),
                content: ChatContent::Text(turn.content.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: match &request.user {
                UserContent::Text(text) => ChatContent::Text(text.clone()),
                UserContent::TextWithImage { text, image_base64 } => ChatContent::Parts(vec![
                    ContentPart::Text { text: text.clone() },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", image_base64),
                        },
                    },
                ]),
            },
        });
        messages
    }
}

#[async_trait]
impl ChatBackend for OpenAICompatibleBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let wire = ChatCompletionRequest {
            model: request.model.clone(),
            messages: Self::wire_messages(request),
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .timeout(self.timeout)
            .json(&wire);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(api_error_message(status, &body)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Api("completion response had no choices".into()))
    }

    async fn health_check(&self) -> bool {
        // Try the models endpoint first, fall back to the root URL
        let models_url = format!("{}/v1/models", self.base_url);
        if let Ok(response) = self
            .http_client
            .get(&models_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            if response.status().is_success() {
                return true;
            }
        }

        match self
            .http_client
            .get(&self.base_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

/// Extract a useful message from an error response body
///
/// OpenAI-style servers put the human-readable reason at `error.message`;
/// anything else degrades to the status code alone.
fn api_error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| Some(v.get("error")?.get("message")?.as_str()?.to_string()));

    match detail {
        Some(message) => format!("HTTP {}: {}", status, message),
        None => format!("HTTP {}", status),
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

/// Chat message
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

/// Chat message content (text or multimodal)
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Content part for multimodal messages
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

/// Image URL for vision requests
#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// Chat completion choice
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

/// Chat response message
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{ChatTurn, TaskKind};

    fn request(user: UserContent) -> CompletionRequest {
        CompletionRequest {
            model: "test-model".to_string(),
            temperature: TaskKind::Extraction.temperature(),
            max_tokens: 2000,
            system: "sistem".to_string(),
            history: vec![ChatTurn::user("halo"), ChatTurn::assistant("hai")],
            user,
        }
    }

    #[test]
    fn test_wire_messages_order_and_roles() {
        let req = request(UserContent::Text("beli kopi 25rb".to_string()));
        let messages = OpenAICompatibleBackend::wire_messages(&req);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[test]
    fn test_wire_serialization_text() {
        let req = request(UserContent::Text("halo".to_string()));
        let wire = ChatCompletionRequest {
            model: req.model.clone(),
            messages: OpenAICompatibleBackend::wire_messages(&req),
            temperature: Some(req.temperature),
            max_tokens: Some(req.max_tokens),
            stream: false,
        };
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sistem");
        assert_eq!(json["max_tokens"], 2000);
    }

    #[test]
    fn test_wire_serialization_multimodal() {
        let req = request(UserContent::with_image("scan struk", b"fakeimg"));
        let messages = OpenAICompatibleBackend::wire_messages(&req);
        let json = serde_json::to_value(messages.last().unwrap()).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "scan struk");
        assert_eq!(json["content"][1]["type"], "image_url");
        let url = json["content"][1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_api_error_message_extraction() {
        let body = r#"{"error": {"message": "Invalid API key", "code": 401}}"#;
        assert_eq!(api_error_message(401, body), "HTTP 401: Invalid API key");
        assert_eq!(api_error_message(502, "<html>bad gateway</html>"), "HTTP 502");
        assert_eq!(api_error_message(500, ""), "HTTP 500");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8080/");
        assert_eq!(backend.host(), "http://localhost:8080");
    }
}
