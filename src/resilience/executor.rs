//! Resilient call execution: breaker admission plus retries with backoff.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{ResilienceConfig, RetryConfig};
use crate::error::ExecutionError;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::{CircuitRegistry, CircuitSnapshot};
use crate::resilience::events::{BreakerEvent, BreakerObserver};
use crate::resilience::retries::RetryOptions;
use crate::telemetry::{ErrorCategory, ErrorRecord, ErrorReporter, Severity, TelemetrySink};

/// Runs operations against named endpoints through their circuit breakers.
///
/// Cheap to clone; clones share one registry.
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    registry: Arc<CircuitRegistry>,
    defaults: RetryOptions,
}

impl ResilientExecutor {
    pub fn new(registry: Arc<CircuitRegistry>, retry: &RetryConfig) -> Self {
        Self {
            registry,
            defaults: RetryOptions::from(retry),
        }
    }

    /// Wire a registry from configuration and pre-register its endpoints.
    pub fn from_config(
        config: &ResilienceConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn TelemetrySink>,
        observers: Vec<Arc<dyn BreakerObserver>>,
    ) -> Self {
        let reporter = ErrorReporter::new(sink, clock.clone());
        let registry = observers.into_iter().fold(
            CircuitRegistry::new(config.breaker.clone(), clock, reporter),
            CircuitRegistry::with_observer,
        );
        for endpoint in &config.endpoints {
            registry.register(&endpoint.name);
        }
        Self::new(Arc::new(registry), &config.retry)
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        &self.registry
    }

    /// Options derived from configuration, to be customised per call.
    pub fn default_options(&self) -> RetryOptions {
        self.defaults.clone()
    }

    pub fn record_outcome(&self, endpoint: &str, success: bool) {
        self.registry.record_outcome(endpoint, success);
    }

    pub fn is_open(&self, endpoint: &str) -> bool {
        self.registry.is_open(endpoint)
    }

    pub fn get_state(&self, endpoint: &str) -> CircuitSnapshot {
        self.registry.get_state(endpoint)
    }

    /// `execute_with_policy` with the configured defaults.
    pub async fn execute<T, E, F, Fut>(
        &self,
        endpoint: &str,
        operation: F,
    ) -> Result<T, ExecutionError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with_policy(endpoint, operation, self.default_options())
            .await
    }

    /// Run `operation` for `endpoint`, retrying failures with exponential backoff.
    ///
    /// Fails fast with `CircuitOpen` when the breaker rejects the call. Each
    /// failed attempt is recorded against the breaker; if that opens it, no
    /// further attempts are made. Otherwise attempt `n` is followed by a wait
    /// of `base_delay * 2^(n-1)`. When attempts run out a high-severity
    /// telemetry record is emitted and its id returned in `RetriesExhausted`.
    pub async fn execute_with_policy<T, E, F, Fut>(
        &self,
        endpoint: &str,
        mut operation: F,
        options: RetryOptions,
    ) -> Result<T, ExecutionError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if self.registry.is_open(endpoint) {
            tracing::debug!(endpoint = %endpoint, "Call rejected by open circuit");
            metrics::record_call(endpoint, "rejected");
            self.registry.notify(&BreakerEvent::Rejected {
                endpoint: endpoint.to_string(),
            });
            return Err(ExecutionError::CircuitOpen {
                endpoint: endpoint.to_string(),
            });
        }

        let max_attempts = options.effective_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(value) => {
                    self.registry.record_outcome(endpoint, true);
                    metrics::record_call(endpoint, "success");
                    if attempt > 1 {
                        tracing::info!(endpoint = %endpoint, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            self.registry.record_outcome(endpoint, false);
            tracing::warn!(endpoint = %endpoint, attempt, error = %error, "Attempt failed");

            let breaker_opened = self.registry.is_open(endpoint);
            if breaker_opened || attempt >= max_attempts {
                if breaker_opened && attempt < max_attempts {
                    tracing::warn!(
                        endpoint = %endpoint,
                        attempt,
                        remaining = max_attempts - attempt,
                        "Circuit opened mid-call, abandoning remaining attempts"
                    );
                }
                return Err(self.exhausted(endpoint, attempt, error, &options));
            }

            let delay = calculate_backoff(
                attempt,
                options.base_delay,
                options.max_delay,
                options.jitter_ratio,
            );
            tracing::debug!(endpoint = %endpoint, attempt, delay = ?delay, "Retrying after backoff");
            metrics::record_retry(endpoint);
            self.registry.notify(&BreakerEvent::RetryScheduled {
                endpoint: endpoint.to_string(),
                attempt,
                delay,
            });
            tokio::time::sleep(delay).await;
        }
    }

    fn exhausted<E: Display>(
        &self,
        endpoint: &str,
        attempts: u32,
        last_error: E,
        options: &RetryOptions,
    ) -> ExecutionError<E> {
        let error_id = self.registry.reporter().report(
            ErrorRecord::new(
                ErrorCategory::Api,
                Severity::High,
                format!("{endpoint} failed after {attempts} attempt(s): {last_error}"),
                options.context_label(),
            )
            .with_endpoint(endpoint),
        );

        tracing::error!(
            endpoint = %endpoint,
            attempts,
            error_id = %error_id,
            context = options.context_label(),
            "All attempts failed"
        );
        metrics::record_call(endpoint, "failure");
        self.registry.notify(&BreakerEvent::Exhausted {
            endpoint: endpoint.to_string(),
            attempts,
            error_id: error_id.clone(),
        });

        ExecutionError::RetriesExhausted {
            endpoint: endpoint.to_string(),
            attempts,
            last_error,
            error_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BreakerConfig;
    use crate::telemetry::{TelemetryError, TelemetryQueue};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn executor(failure_threshold: u32) -> (ResilientExecutor, Arc<TelemetryQueue>) {
        let clock = Arc::new(ManualClock::new(0));
        let queue = Arc::new(TelemetryQueue::new(100));
        let registry = CircuitRegistry::new(
            BreakerConfig {
                failure_threshold,
                cooldown_ms: 60_000,
            },
            clock.clone(),
            ErrorReporter::new(queue.clone(), clock),
        );
        (
            ResilientExecutor::new(Arc::new(registry), &RetryConfig::default()),
            queue,
        )
    }

    fn fast() -> RetryOptions {
        RetryOptions::default().with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let (executor, queue) = executor(5);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<_, ExecutionError<String>> = executor
            .execute_with_policy(
                "stats",
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(7)
                    }
                },
                fast(),
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_reports_api_record_with_matching_id() {
        let (executor, queue) = executor(10);

        let err = executor
            .execute_with_policy(
                "stats",
                || async { Err::<(), _>("HTTP 503".to_string()) },
                fast().with_context("leaderboard"),
            )
            .await
            .unwrap_err();

        let records = queue.drain(10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, ErrorCategory::Api);
        assert_eq!(records[0].severity, Severity::High);
        assert_eq!(records[0].context, "leaderboard");
        assert!(records[0].message.contains("HTTP 503"));
        assert_eq!(err.error_id(), Some(records[0].id.as_str()));
        assert!(err.to_string().contains(&records[0].id));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let (executor, _queue) = executor(10);
        let calls = Arc::new(AtomicU32::new(0));

        let err = executor
            .execute_with_policy(
                "stats",
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>("nope")
                    }
                },
                fast().with_attempts(0),
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts(), 1);
    }

    struct BrokenSink;

    impl TelemetrySink for BrokenSink {
        fn enqueue(&self, _record: ErrorRecord) -> Result<(), TelemetryError> {
            Err(TelemetryError::Unavailable("collector down".into()))
        }
    }

    #[tokio::test]
    async fn test_broken_sink_does_not_change_result() {
        let clock = Arc::new(ManualClock::new(0));
        let registry = CircuitRegistry::new(
            BreakerConfig {
                failure_threshold: 1,
                cooldown_ms: 60_000,
            },
            clock.clone(),
            ErrorReporter::new(Arc::new(BrokenSink), clock),
        );
        let executor = ResilientExecutor::new(Arc::new(registry), &RetryConfig::default());

        let err = executor
            .execute_with_policy("stats", || async { Err::<(), _>("HTTP 500") }, fast())
            .await
            .unwrap_err();

        assert!(!err.is_circuit_open());
        assert_eq!(err.attempts(), 1);
        assert!(err.error_id().is_some_and(|id| !id.is_empty()));
        assert_eq!(err.into_last_error(), Some("HTTP 500"));

        let ok: Result<_, ExecutionError<String>> = executor
            .execute_with_policy("other", || async { Ok(5) }, fast())
            .await;
        assert_eq!(ok.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_context_defaults_to_unknown() {
        let (executor, queue) = executor(10);
        let _ = executor
            .execute_with_policy("stats", || async { Err::<(), _>("x") }, fast().with_attempts(1))
            .await;
        assert_eq!(queue.drain(1)[0].context, "unknown");
    }
}
