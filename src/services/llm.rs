// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat completion client for OpenAI-compatible endpoints.
//!
//! OpenAI and Cerebras both speak the `/chat/completions` wire format, so a
//! single client covers them; [`Provider`] only supplies the base URL and
//! default models.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::models::Role;

/// Completion providers the coach can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Cerebras,
}

impl Provider {
    pub fn name(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Cerebras => "cerebras",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Cerebras => "https://api.cerebras.ai/v1",
        }
    }

    pub fn default_chat_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Cerebras => "llama3.3-70b",
        }
    }

    /// Model for short structured calls (classification, estimates).
    pub fn default_analysis_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Cerebras => "llama3.1-8b",
        }
    }
}

/// One message of a completion prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
    /// `data:` URL of an attached image (user messages only)
    pub image_url: Option<String>,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            image_url: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// User message carrying an inline image.
    pub fn user_with_image(content: impl Into<String>, image: &[u8], content_type: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        Self {
            role: Role::User,
            content: content.into(),
            image_url: Some(format!("data:{};base64,{}", content_type, encoded)),
        }
    }

    fn to_wire(&self) -> Value {
        match &self.image_url {
            None => json!({ "role": self.role.as_str(), "content": self.content }),
            Some(url) => json!({
                "role": self.role.as_str(),
                "content": [
                    { "type": "text", "text": self.content },
                    { "type": "image_url", "image_url": { "url": url } },
                ],
            }),
        }
    }
}

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask for a JSON object response
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<PromptMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// The assistant message returned by a completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub model: String,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

impl From<&CompletionRequest> for OpenAiRequest {
    fn from(request: &CompletionRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: request.messages.iter().map(PromptMessage::to_wire).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_mode
                .then(|| json!({ "type": "json_object" })),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    provider_name: &'static str,
}

impl OpenAiCompatibleClient {
    pub fn new(provider: Provider, api_key: String) -> Self {
        Self::with_base_url(provider.base_url().to_string(), api_key, provider.name())
    }

    pub fn openai(api_key: String) -> Self {
        Self::new(Provider::OpenAi, api_key)
    }

    pub fn cerebras(api_key: String) -> Self {
        Self::new(Provider::Cerebras, api_key)
    }

    pub fn with_base_url(base_url: String, api_key: String, provider_name: &'static str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            provider_name,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = OpenAiRequest::from(request);
        tracing::debug!(
            provider = self.provider_name,
            model = %request.model,
            messages = request.messages.len(),
            json_mode = request.json_mode,
            "Sending completion request"
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::RemoteUnavailable(format!("{} request failed: {}", self.provider_name, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error_response(self.provider_name, status.as_u16(), &text));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Completion(format!("JSON parse error: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::Completion(format!("{} returned no content", self.provider_name)))?;

        Ok(Completion {
            content,
            model: if parsed.model.is_empty() {
                request.model.clone()
            } else {
                parsed.model
            },
        })
    }
}

fn parse_error_response(provider: &str, status: u16, body: &str) -> AppError {
    let message = serde_json::from_str::<OpenAiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status {
        429 => {
            tracing::warn!(provider, "Completion rate limit hit (429)");
            AppError::Completion(AppError::COMPLETION_RATE_LIMIT.to_string())
        }
        401 => AppError::Completion(AppError::COMPLETION_KEY_ERROR.to_string()),
        _ => AppError::Completion(format!("{} HTTP {}: {}", provider, status, message)),
    }
}

/// Strip a Markdown code fence some models wrap around JSON output.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mode_sets_response_format() {
        let request = CompletionRequest::new("gpt-4o", vec![PromptMessage::user("hi")])
            .with_temperature(0.7)
            .with_max_tokens(500)
            .json();
        let wire = serde_json::to_value(OpenAiRequest::from(&request)).unwrap();
        assert_eq!(wire["response_format"]["type"], "json_object");
        assert_eq!(wire["max_tokens"], 500);
        assert_eq!(wire["messages"][0]["role"], "user");
        assert_eq!(wire["messages"][0]["content"], "hi");
    }

    #[test]
    fn image_message_uses_content_parts() {
        let msg = PromptMessage::user_with_image("what is this?", &[0xff, 0xd8], "image/jpeg");
        let wire = msg.to_wire();
        assert_eq!(wire["content"][0]["type"], "text");
        assert_eq!(wire["content"][1]["type"], "image_url");
        assert_eq!(wire["content"][1]["image_url"]["url"], "data:image/jpeg;base64,/9g=");
    }

    #[test]
    fn plain_request_omits_optional_fields() {
        let request = CompletionRequest::new("llama3.3-70b", vec![PromptMessage::system("s")]);
        let wire = serde_json::to_value(OpenAiRequest::from(&request)).unwrap();
        assert!(wire.get("response_format").is_none());
        assert!(wire.get("temperature").is_none());
    }

    #[test]
    fn error_statuses_are_distinguished() {
        let err = parse_error_response("openai", 429, "{}");
        assert!(matches!(err, AppError::Completion(ref m) if m == AppError::COMPLETION_RATE_LIMIT));
        assert!(err.is_transient());

        let err = parse_error_response("openai", 401, r#"{"error":{"message":"bad key"}}"#);
        assert!(!err.is_transient());

        let err = parse_error_response("openai", 500, r#"{"error":{"message":"boom"}}"#);
        assert!(matches!(err, AppError::Completion(ref m) if m.contains("boom")));
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
