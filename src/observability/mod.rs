//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker transitions, retries, telemetry:
//!     → tracing events (logging.rs installs the subscriber)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape (optional)
//! ```

pub mod logging;
pub mod metrics;
