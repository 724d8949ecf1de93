//! Per-call retry options.

use std::time::Duration;

use crate::config::RetryConfig;

/// How `execute_with_policy` retries one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Total attempts including the first; 0 is treated as 1.
    pub attempts: u32,
    /// Backoff base: waits are `base_delay * 2^(attempt-1)`.
    pub base_delay: Duration,
    /// Cap on a single wait; `None` lets delays keep doubling.
    pub max_delay: Option<Duration>,
    pub jitter_ratio: f64,
    /// Label attached to telemetry; "unknown" when unset.
    pub context: Option<String>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryOptions {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: config.max_delay_ms.map(Duration::from_millis),
            jitter_ratio: config.jitter_ratio,
            context: None,
        }
    }
}

impl RetryOptions {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub(crate) fn effective_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    pub(crate) fn context_label(&self) -> &str {
        self.context.as_deref().unwrap_or("unknown")
    }
}
