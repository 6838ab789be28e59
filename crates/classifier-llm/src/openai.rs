//! OpenAI-compatible Provider Implementation
//!
//! Talks to any service exposing the `/chat/completions` API shape (OpenAI,
//! Gemini's OpenAI endpoint, LiteLLM proxies, vLLM, Ollama's `/v1`).
//!
//! # Features
//!
//! - Async HTTP communication via `reqwest`
//! - Multi-part user messages (text followed by image URLs)
//! - Constrained JSON output through `response_format`
//! - HTTP 429 surfaced as [`LlmError::RateLimitExceeded`]
//! - Request timeout from [`ProviderConfig`]
//!
//! This provider makes exactly one HTTP call per [`LlmProvider::complete`];
//! retrying is left to the caller.
//!
//! # Examples
//!
//! ```no_run
//! use classifier_llm::{OpenAiProvider, ProviderConfig};
//!
//! let config = ProviderConfig {
//!     api_key: Some("sk-...".to_string()),
//!     ..ProviderConfig::default()
//! };
//! let provider = OpenAiProvider::new(config).unwrap();
//! ```

use crate::{ChatRequest, LlmError, LlmProvider, MessagePart};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Default timeout for LLM requests (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL, without the trailing `/chat/completions`
    pub endpoint: String,

    /// Bearer token, if the endpoint needs one
    pub api_key: Option<String>,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Content<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Content<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Other`] if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            client,
        })
    }

    fn build_body<'a>(request: &'a ChatRequest) -> CompletionBody<'a> {
        // Text-only messages go out as a plain string, not a one-element array.
        let content = match request.parts.as_slice() {
            [MessagePart::Text(text)] => Content::Text(text),
            parts => Content::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        MessagePart::Text(text) => ContentPart::Text { text },
                        MessagePart::ImageUrl(url) => ContentPart::ImageUrl {
                            image_url: ImageUrl { url },
                        },
                    })
                    .collect(),
            ),
        };

        CompletionBody {
            model: &request.model,
            messages: vec![Message {
                role: "user",
                content,
            }],
            response_format: request.response_schema.as_ref().map(|rs| ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &rs.name,
                    schema: &rs.schema,
                },
            }),
        }
    }

    fn extract_content(response: CompletionResponse) -> Result<String, LlmError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Response has no message content".to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = Self::build_body(request);

        let mut http = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        debug!(%status, model = %request.model, "Provider responded");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(request.model.clone()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Communication(format!("HTTP {}: {}", status, error_text)));
        }

        let parsed = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Self::extract_content(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResponseSchema;
    use serde_json::json;

    #[test]
    fn test_provider_creation_trims_endpoint() {
        let provider = OpenAiProvider::new(ProviderConfig {
            endpoint: "http://localhost:4000/v1/".to_string(),
            ..ProviderConfig::default()
        })
        .unwrap();
        assert_eq!(provider.endpoint, "http://localhost:4000/v1");
        assert!(provider.api_key.is_none());
    }

    #[test]
    fn test_text_only_body_uses_plain_content() {
        let request = ChatRequest::text("gpt-test", "classify this");
        let body = serde_json::to_value(OpenAiProvider::build_body(&request)).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "gpt-test",
                "messages": [{"role": "user", "content": "classify this"}]
            })
        );
    }

    #[test]
    fn test_body_with_images_and_schema() {
        let request = ChatRequest {
            model: "gpt-test".to_string(),
            parts: vec![
                MessagePart::Text("describe".to_string()),
                MessagePart::ImageUrl("data:image/png;base64,AAAA".to_string()),
                MessagePart::ImageUrl("data:image/jpeg;base64,BBBB".to_string()),
            ],
            response_schema: Some(ResponseSchema {
                name: "classification".to_string(),
                schema: json!({"type": "object"}),
            }),
        };
        let body = serde_json::to_value(OpenAiProvider::build_body(&request)).unwrap();

        assert_eq!(
            body["messages"][0]["content"],
            json!([
                {"type": "text", "text": "describe"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
                {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,BBBB"}}
            ])
        );
        assert_eq!(
            body["response_format"],
            json!({
                "type": "json_schema",
                "json_schema": {"name": "classification", "schema": {"type": "object"}}
            })
        );
    }

    #[test]
    fn test_extract_content_takes_first_choice() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "choices": [
                {"message": {"content": "{\"a\": 1}"}},
                {"message": {"content": "ignored"}}
            ]
        }))
        .unwrap();
        assert_eq!(OpenAiProvider::extract_content(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_content_without_choices() {
        let response: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            OpenAiProvider::extract_content(response),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_error_handling() {
        // Use invalid endpoint to trigger error
        let provider = OpenAiProvider::new(ProviderConfig {
            endpoint: "http://localhost:99999".to_string(),
            ..ProviderConfig::default()
        })
        .unwrap();

        let result = provider.complete(&ChatRequest::text("m", "test")).await;
        match result {
            Err(LlmError::Communication(_)) => {} // Expected
            _ => panic!("Expected Communication error"),
        }
    }
}
