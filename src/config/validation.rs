//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, jitter within [0, 1])
//! - Check endpoint names are unique and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ResilienceConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("breaker.failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("retry.attempts must be at least 1")]
    ZeroAttempts,

    #[error("retry.max_delay_ms ({max}) is smaller than retry.base_delay_ms ({base})")]
    MaxDelayBelowBase { base: u64, max: u64 },

    #[error("retry.jitter_ratio must be within [0, 1], got {0}")]
    JitterOutOfRange(f64),

    #[error("telemetry.batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("telemetry.batch_size ({batch}) exceeds telemetry.capacity ({capacity})")]
    BatchExceedsCapacity { batch: usize, capacity: usize },

    #[error("telemetry.flush_interval_ms must be at least 1")]
    ZeroFlushInterval,

    #[error("invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    #[error("duplicate endpoint name '{0}'")]
    DuplicateEndpoint(String),

    #[error("endpoint name must not be empty")]
    EmptyEndpointName,

    #[error("invalid observability.metrics_address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }

    let retry = &config.retry;
    if retry.attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if let Some(max) = retry.max_delay_ms.filter(|max| *max < retry.base_delay_ms) {
        errors.push(ValidationError::MaxDelayBelowBase {
            base: retry.base_delay_ms,
            max,
        });
    }
    if !(0.0..=1.0).contains(&retry.jitter_ratio) {
        errors.push(ValidationError::JitterOutOfRange(retry.jitter_ratio));
    }

    let telemetry = &config.telemetry;
    if telemetry.batch_size == 0 {
        errors.push(ValidationError::ZeroBatchSize);
    } else if telemetry.batch_size > telemetry.capacity {
        errors.push(ValidationError::BatchExceedsCapacity {
            batch: telemetry.batch_size,
            capacity: telemetry.capacity,
        });
    }
    if telemetry.flush_interval_ms == 0 {
        errors.push(ValidationError::ZeroFlushInterval);
    }
    if let Some(collector) = &telemetry.collector_url {
        check_url("telemetry.collector_url", collector, &mut errors);
    }

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        if endpoint.name.trim().is_empty() {
            errors.push(ValidationError::EmptyEndpointName);
            continue;
        }
        if !seen.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.name.clone()));
        }
        check_url(&format!("endpoints.{}", endpoint.name), &endpoint.url, &mut errors);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &str, raw: &str, errors: &mut Vec<ValidationError>) {
    if let Err(e) = Url::parse(raw) {
        errors.push(ValidationError::InvalidUrl {
            field: field.to_string(),
            reason: e.to_string(),
        });
    }
}
