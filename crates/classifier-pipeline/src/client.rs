//! Bounded, retried classification requests

use crate::config::PipelineConfig;
use crate::error::ClassificationError;
use crate::prompt::Attachment;
use crate::schema::{parse_response, to_provider_schema};
use classifier_domain::{ClassificationResult, ResultSchema};
use classifier_llm::{ChatRequest, LlmError, LlmProvider, MessagePart, ResponseSchema};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Sends one rendered prompt to the provider and parses the answer
///
/// Every client built from the same limiter shares its permits, so the
/// number of provider calls in flight never exceeds the configured
/// concurrency limit. A permit is held for the provider call only; parsing
/// and backoff sleeps happen without one.
pub struct ClassificationClient<P> {
    provider: P,
    limiter: Arc<Semaphore>,
    config: PipelineConfig,
}

impl<P: LlmProvider> ClassificationClient<P> {
    /// Create a client around a provider and a shared limiter
    pub fn new(provider: P, limiter: Arc<Semaphore>, config: PipelineConfig) -> Self {
        Self {
            provider,
            limiter,
            config,
        }
    }

    /// The wrapped provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Pipeline settings in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn build_request(&self, prompt: &str, attachments: &[Attachment], schema: &ResultSchema) -> ChatRequest {
        let mut parts = Vec::with_capacity(attachments.len() + 1);
        parts.push(MessagePart::Text(prompt.to_string()));
        parts.extend(attachments.iter().map(|a| MessagePart::ImageUrl(a.data_url())));

        ChatRequest {
            model: self.config.model.clone(),
            parts,
            response_schema: Some(ResponseSchema {
                name: self.config.schema_name.clone(),
                schema: to_provider_schema(schema),
            }),
        }
    }

    async fn call_once(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| LlmError::Other("Concurrency limiter was closed".to_string()))?;
        self.provider.complete(request).await
    }

    /// Classify one prompt
    ///
    /// Only rate limiting is retried, up to `max_attempts` attempts in total
    /// with capped exponential backoff between them.
    ///
    /// # Errors
    ///
    /// - [`ClassificationError::Provider`] for any other provider failure
    /// - [`ClassificationError::Parse`] if the output does not fit `schema`
    /// - [`ClassificationError::RetriesExhausted`] if every attempt was rate limited
    pub async fn classify(
        &self,
        prompt: &str,
        attachments: &[Attachment],
        schema: &ResultSchema,
    ) -> Result<ClassificationResult, ClassificationError> {
        let request = self.build_request(prompt, attachments, schema);
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.call_once(&request).await {
                Ok(raw) => {
                    debug!(attempt, bytes = raw.len(), "Provider returned content");
                    return parse_response(&raw, schema).map_err(|e| {
                        warn!(error = %e, "Provider output did not match result schema");
                        ClassificationError::Parse(e)
                    });
                }
                Err(e) if e.is_rate_limit() => {
                    if attempt < max_attempts {
                        let delay = self.config.backoff_delay(attempt);
                        warn!(attempt, delay_ms = delay.as_millis() as u64, "Rate limited, backing off");
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(attempt, "Rate limited, no attempts left");
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Classification request failed");
                    return Err(ClassificationError::Provider(e));
                }
            }
        }

        Err(ClassificationError::RetriesExhausted {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classifier_domain::{FieldType, FieldValue};
    use classifier_llm::MockProvider;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            model: "test-model".to_string(),
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            ..PipelineConfig::default()
        }
    }

    fn client(provider: MockProvider) -> ClassificationClient<MockProvider> {
        let config = fast_config();
        ClassificationClient::new(provider, config.limiter(), config)
    }

    fn schema() -> ResultSchema {
        ResultSchema::new("Sentiment").with_required("label", FieldType::String)
    }

    #[tokio::test]
    async fn test_classify_success() {
        let client = client(MockProvider::new(r#"{"label": "positive"}"#));
        let result = client.classify("How is it?", &[], &schema()).await.unwrap();

        assert_eq!(result.get("label"), Some(&FieldValue::from("positive")));
        assert_eq!(client.provider().call_count(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_model_schema_and_parts() {
        let client = client(MockProvider::new(r#"{"label": "x"}"#));
        let attachments = vec![
            Attachment::new("front", &[0xFF, 0xD8, 0xFF, 0x00]),
            Attachment::new("back", b"%PDF-1.7"),
        ];
        client.classify("Describe", &attachments, &schema()).await.unwrap();

        let request = &client.provider().requests()[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(
            request.parts,
            vec![
                MessagePart::Text("Describe".to_string()),
                MessagePart::ImageUrl(attachments[0].data_url()),
                MessagePart::ImageUrl(attachments[1].data_url()),
            ]
        );
        let response_schema = request.response_schema.as_ref().unwrap();
        assert_eq!(response_schema.name, "classification");
        assert_eq!(response_schema.schema, to_provider_schema(&schema()));
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() {
        let provider = MockProvider::new(r#"{"label": "ok"}"#);
        provider.push_error(LlmError::RateLimitExceeded);
        provider.push_error(LlmError::RateLimitExceeded);

        let client = client(provider);
        let result = client.classify("p", &[], &schema()).await;

        assert!(result.is_ok());
        assert_eq!(client.provider().call_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let provider = MockProvider::new(r#"{"label": "never"}"#);
        for _ in 0..3 {
            provider.push_error(LlmError::RateLimitExceeded);
        }

        let client = client(provider);
        let err = client.classify("p", &[], &schema()).await.unwrap_err();

        assert!(matches!(err, ClassificationError::RetriesExhausted { attempts: 3 }));
        assert_eq!(client.provider().call_count(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let provider = MockProvider::new(r#"{"label": "never"}"#);
        provider.push_error(LlmError::Communication("connection reset".to_string()));

        let client = client(provider);
        let err = client.classify("p", &[], &schema()).await.unwrap_err();

        assert!(matches!(err, ClassificationError::Provider(LlmError::Communication(_))));
        assert_eq!(client.provider().call_count(), 1);
    }

    #[tokio::test]
    async fn test_parse_errors_not_retried() {
        let client = client(MockProvider::new("I think it is positive."));
        let err = client.classify("p", &[], &schema()).await.unwrap_err();

        assert!(matches!(err, ClassificationError::Parse(_)));
        assert_eq!(client.provider().call_count(), 1);
    }

    #[tokio::test]
    async fn test_permit_released_after_call() {
        let config = PipelineConfig {
            concurrency_limit: 2,
            ..fast_config()
        };
        let limiter = config.limiter();
        let client = ClassificationClient::new(MockProvider::new("oops"), limiter.clone(), config);

        let _ = client.classify("p", &[], &schema()).await;
        assert_eq!(limiter.available_permits(), 2);
    }
}
