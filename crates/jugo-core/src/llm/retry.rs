//! Bounded retry with exponential backoff for provider calls.
//!
//! Only errors classified as transient by [`LlmError::is_transient`] are
//! retried. A rate-limit response that names a retry-after delay is honored
//! instead of the computed backoff, up to `max_backoff`: a job keeps its
//! worker slot while it sleeps.

use std::time::Duration;

use jugo_types::config::DispatcherConfig;
use jugo_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::box_provider::BoxLlmProvider;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatcherConfig::default())
    }
}

impl From<&DispatcherConfig> for RetryPolicy {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based) after `error`.
    pub fn delay_for(&self, attempt: u32, error: &LlmError) -> Duration {
        if let LlmError::RateLimited {
            retry_after_ms: Some(ms),
        } = error
        {
            return Duration::from_millis(*ms).min(self.max_backoff);
        }
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Call `provider.complete`, retrying transient failures per `policy`.
pub async fn complete_with_retry(
    provider: &BoxLlmProvider,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<CompletionResponse, LlmError> {
    let mut attempt = 0;
    loop {
        match provider.complete(request).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt, &err);
                tracing::warn!(
                    provider = provider.name(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
