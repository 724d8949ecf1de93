//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! execute_with_policy(endpoint, operation, options):
//!     → circuit_breaker.rs (is_open: reject fast, or admit / probe)
//!     → operation()
//!     → circuit_breaker.rs (record_outcome: count failures, open/close)
//!     → On failure: backoff.rs (exponential delay), then retry
//!     → On exhaustion: telemetry record + RetriesExhausted
//! ```
//!
//! # Design Decisions
//! - Per-endpoint circuit breaker, not global
//! - Retries stop as soon as the breaker opens
//! - No built-in timeout; timeouts.rs lets callers add one
//! - State lives in an explicit registry, never a global

pub mod backoff;
pub mod circuit_breaker;
pub mod events;
pub mod executor;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitRegistry, CircuitSnapshot, CircuitState};
pub use events::{BreakerEvent, BreakerObserver};
pub use executor::ResilientExecutor;
pub use retries::RetryOptions;
pub use timeouts::{with_deadline, DeadlineError};
