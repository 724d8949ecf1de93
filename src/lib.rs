//! Per-endpoint circuit breaking and retries for async calls.
//!
//! ```text
//!   caller ──▶ ResilientExecutor::execute_with_policy(endpoint, op, options)
//!                 │
//!                 ├─▶ CircuitRegistry::is_open ──▶ CircuitOpen (fail fast)
//!                 ├─▶ op() ──▶ record_outcome ──▶ backoff ──▶ op() ...
//!                 └─▶ RetriesExhausted { error_id } ◀── ErrorReporter ──▶ TelemetrySink
//!
//!   observers ◀── BreakerEvent (opened / half-opened / closed / retry / exhausted)
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::ResilienceConfig;
pub use error::ExecutionError;
pub use resilience::{
    BreakerEvent, BreakerObserver, CircuitRegistry, CircuitSnapshot, CircuitState,
    ResilientExecutor, RetryOptions,
};
pub use telemetry::{ErrorRecord, TelemetryQueue, TelemetrySink};
