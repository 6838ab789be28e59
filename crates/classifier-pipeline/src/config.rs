//! Configuration for the classification pipeline

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gemini/gemini-2.0-flash-exp";

/// Configuration for the classification pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model identifier sent with every request
    pub model: String,

    /// Maximum number of provider calls in flight across the process
    pub concurrency_limit: usize,

    /// Total attempts per record when the provider is rate limiting
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_backoff_ms: u64,

    /// Upper bound on any single retry delay (milliseconds)
    pub max_backoff_ms: u64,

    /// Name reported to the provider alongside the output schema
    pub schema_name: String,
}

impl PipelineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if self.concurrency_limit == 0 {
            return Err("concurrency_limit must be greater than 0".to_string());
        }
        if self.concurrency_limit > Semaphore::MAX_PERMITS {
            return Err(format!(
                "concurrency_limit cannot exceed {}",
                Semaphore::MAX_PERMITS
            ));
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err("max_backoff_ms cannot be less than initial_backoff_ms".to_string());
        }
        Ok(())
    }

    /// Build the process-wide limiter for provider calls
    ///
    /// Create it once and hand clones of the `Arc` to every client.
    pub fn limiter(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.concurrency_limit.max(1)))
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// Doubles from `initial_backoff_ms` and is capped at `max_backoff_ms`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            concurrency_limit: 1,
            max_attempts: 3,
            initial_backoff_ms: 4_000,
            max_backoff_ms: 10_000,
            schema_name: "classification".to_string(),
        }
    }
}
