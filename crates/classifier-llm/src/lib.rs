//! Classifier LLM Provider Layer
//!
//! Pluggable LLM provider implementations behind a common async interface.
//!
//! # Architecture
//!
//! The pipeline builds a [`ChatRequest`] (one user message made of ordered
//! parts plus an optional JSON schema for constrained output) and hands it to
//! an [`LlmProvider`]. Providers return the raw message content; parsing is
//! the caller's job.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OpenAiProvider`: OpenAI-compatible chat completions API
//!
//! # Examples
//!
//! ```
//! use classifier_llm::{ChatRequest, LlmProvider, MockProvider};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let provider = MockProvider::new("Hello from LLM!");
//! let result = provider.complete(&ChatRequest::text("model", "test prompt")).await.unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! # });
//! ```

#![warn(missing_docs)]

pub mod openai;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub use openai::{OpenAiProvider, ProviderConfig};

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl LlmError {
    /// Whether this error is the provider's transient capacity signal
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimitExceeded)
    }
}

/// One part of a user message
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    /// Plain text
    Text(String),
    /// Image or other media, as a URL or `data:` URL
    ImageUrl(String),
}

/// JSON schema the provider must constrain its output to
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Schema name reported to the provider
    pub name: String,
    /// JSON schema object
    pub schema: serde_json::Value,
}

/// A single-turn chat request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,

    /// Parts of the single user message, in order
    pub parts: Vec<MessagePart>,

    /// Constrained-output schema, if any
    pub response_schema: Option<ResponseSchema>,
}

impl ChatRequest {
    /// A request with a single text part and free-form output
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            parts: vec![MessagePart::Text(prompt.into())],
            response_schema: None,
        }
    }

    /// Text of the first text part
    pub fn prompt(&self) -> &str {
        self.parts
            .iter()
            .find_map(|p| match p {
                MessagePart::Text(text) => Some(text.as_str()),
                MessagePart::ImageUrl(_) => None,
            })
            .unwrap_or("")
    }

    /// Returns true if the message carries only text
    pub fn is_text_only(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, MessagePart::Text(_)))
    }
}

/// Trait for LLM provider operations
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one request and return the first choice's message content
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl<P: LlmProvider + ?Sized> LlmProvider for Arc<P> {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}

/// Mock LLM provider for deterministic testing
///
/// This provider returns pre-configured responses without making any network calls.
/// Scripted outcomes are consumed first, in order; then per-prompt responses;
/// then the default response.
///
/// # Examples
///
/// ```
/// use classifier_llm::{ChatRequest, LlmError, LlmProvider, MockProvider};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut provider = MockProvider::new("fallback");
/// provider.add_response("prompt1", "response1");
/// provider.push_error(LlmError::RateLimitExceeded);
///
/// let first = provider.complete(&ChatRequest::text("m", "prompt1")).await;
/// assert!(matches!(first, Err(LlmError::RateLimitExceeded)));
///
/// let second = provider.complete(&ChatRequest::text("m", "prompt1")).await.unwrap();
/// assert_eq!(second, "response1");
/// assert_eq!(provider.call_count(), 2);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    responses: Arc<Mutex<HashMap<String, Result<String, LlmError>>>>,
    script: Arc<Mutex<VecDeque<Result<String, LlmError>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    call_count: Arc<Mutex<usize>>,
    latency: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(HashMap::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
            latency: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep for `latency` inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add a specific response for a given prompt
    pub fn add_response(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(prompt.into(), Ok(response.into()));
    }

    /// Return `error` for every call with the given prompt
    pub fn add_error(&mut self, prompt: impl Into<String>, error: LlmError) {
        self.responses
            .lock()
            .unwrap()
            .insert(prompt.into(), Err(error));
    }

    /// Queue a response for the next unscripted call
    pub fn push_response(&self, response: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(response.into()));
    }

    /// Queue an error for the next unscripted call
    pub fn push_error(&self, error: LlmError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Get the number of times complete was called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of calls observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, prompt: &str) -> Result<String, LlmError> {
        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }

        self.responses
            .lock()
            .unwrap()
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| Ok(self.default_response.clone()))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        *self.call_count.lock().unwrap() += 1;
        self.requests.lock().unwrap().push(request.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self.next_outcome(request.prompt());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest::text("test-model", prompt)
    }

    #[tokio::test]
    async fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        let result = provider.complete(&request("any prompt")).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "Test response");
    }

    #[tokio::test]
    async fn test_mock_provider_specific_responses() {
        let mut provider = MockProvider::default();
        provider.add_response("hello", "world");
        provider.add_response("foo", "bar");

        assert_eq!(provider.complete(&request("hello")).await.unwrap(), "world");
        assert_eq!(provider.complete(&request("foo")).await.unwrap(), "bar");
        assert_eq!(
            provider.complete(&request("unknown")).await.unwrap(),
            "Default mock response"
        );
    }

    #[tokio::test]
    async fn test_mock_provider_call_count() {
        let provider = MockProvider::new("test");

        assert_eq!(provider.call_count(), 0);

        provider.complete(&request("prompt1")).await.unwrap();
        assert_eq!(provider.call_count(), 1);

        provider.complete(&request("prompt2")).await.unwrap();
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_provider_error() {
        let mut provider = MockProvider::default();
        provider.add_error("bad prompt", LlmError::RateLimitExceeded);
        provider.add_error("gone", LlmError::ModelNotAvailable("m".to_string()));

        let result = provider.complete(&request("bad prompt")).await;
        assert_eq!(result.unwrap_err(), LlmError::RateLimitExceeded);
        assert!(matches!(
            provider.complete(&request("gone")).await,
            Err(LlmError::ModelNotAvailable(ref m)) if m == "m"
        ));
        assert_eq!(provider.complete(&request("fine")).await.unwrap(), "Default mock response");
    }

    #[tokio::test]
    async fn test_mock_provider_keyed_response_that_reads_error() {
        let mut provider = MockProvider::default();
        provider.add_response("p", "ERROR");

        assert_eq!(provider.complete(&request("p")).await.unwrap(), "ERROR");
    }

    #[tokio::test]
    async fn test_mock_provider_script_runs_before_fallbacks() {
        let provider = MockProvider::new("default");
        provider.push_error(LlmError::RateLimitExceeded);
        provider.push_response("scripted");

        assert!(provider.complete(&request("p")).await.unwrap_err().is_rate_limit());
        assert_eq!(provider.complete(&request("p")).await.unwrap(), "scripted");
        assert_eq!(provider.complete(&request("p")).await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_mock_provider_records_requests() {
        let provider = MockProvider::new("ok");
        let mut req = request("look at this");
        req.parts.push(MessagePart::ImageUrl("data:image/png;base64,AA==".to_string()));

        provider.complete(&req).await.unwrap();

        let seen = provider.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], req);
        assert!(!seen[0].is_text_only());
    }

    #[tokio::test]
    async fn test_mock_provider_clone() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();

        provider1.complete(&request("test")).await.unwrap();

        // Both should share the same call count due to Arc
        assert_eq!(provider1.call_count(), 1);
        assert_eq!(provider2.call_count(), 1);
    }

    #[test]
    fn test_prompt_skips_image_parts() {
        let req = ChatRequest {
            model: "m".to_string(),
            parts: vec![
                MessagePart::ImageUrl("data:x".to_string()),
                MessagePart::Text("the text".to_string()),
            ],
            response_schema: None,
        };
        assert_eq!(req.prompt(), "the text");
    }
}
