//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every section falls back to its defaults so a minimal file is valid.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Circuit breaker thresholds.
    pub breaker: BreakerConfig,

    /// Retry defaults for `execute_with_policy`.
    pub retry: RetryConfig,

    /// Error telemetry queue and flushing.
    pub telemetry: TelemetryConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Endpoints known up front (pre-registered, probed by the CLI).
    pub endpoints: Vec<EndpointConfig>,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 60_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Optional upper bound for a single backoff delay in milliseconds.
    /// Unset means delays keep doubling.
    pub max_delay_ms: Option<u64>,

    /// Random extra delay as a fraction of the computed delay (0.0 - 1.0).
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: None,
            jitter_ratio: 0.0,
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Enable the background flusher.
    pub enabled: bool,

    /// Maximum queued records; the oldest is dropped beyond this.
    pub capacity: usize,

    /// Records sent per flush.
    pub batch_size: usize,

    /// Flush interval in milliseconds.
    pub flush_interval_ms: u64,

    /// Collector URL; records are only logged when unset.
    pub collector_url: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1_000,
            batch_size: 50,
            flush_interval_ms: 30_000,
            collector_url: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A named endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EndpointConfig {
    /// Breaker key.
    pub name: String,

    /// URL probed by `resilience-probe`.
    pub url: String,

    /// Context label attached to telemetry for this endpoint.
    #[serde(default)]
    pub context: Option<String>,
}
