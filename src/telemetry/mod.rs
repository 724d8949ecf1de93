//! Error telemetry subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker opens / retries exhausted:
//!     → ErrorReporter::report (stamps id, session, time)
//!     → TelemetrySink::enqueue (best-effort, never fails the caller)
//!
//! Periodically (flusher.rs) or on demand:
//!     TelemetryQueue::drain(batch_size)
//!     → TelemetryExporter::export
//!     → on failure: requeue at the front
//! ```
//!
//! # Design Decisions
//! - Enqueue is synchronous and non-blocking
//! - Sink errors are logged and dropped, never propagated
//! - Flush timing is owned by whoever runs the flusher

pub mod exporter;
pub mod flusher;
pub mod queue;
pub mod record;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;

pub use exporter::{HttpExporter, LogExporter, TelemetryExporter};
pub use flusher::TelemetryFlusher;
pub use queue::TelemetryQueue;
pub use record::{new_error_id, ErrorCategory, ErrorRecord, Severity};

/// Errors raised by telemetry sinks and exporters.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),

    #[error("export request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector rejected batch with status {0}")]
    Rejected(u16),
}

/// Destination for error records.
pub trait TelemetrySink: Send + Sync {
    fn enqueue(&self, record: ErrorRecord) -> Result<(), TelemetryError>;
}

/// Stamps records with session, time and id, and hands them to a sink.
#[derive(Clone)]
pub struct ErrorReporter {
    sink: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
    session_id: String,
}

impl ErrorReporter {
    pub fn new(sink: Arc<dyn TelemetrySink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sink,
            clock,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Enqueue a record, returning its id. Sink failures are swallowed.
    pub fn report(&self, mut record: ErrorRecord) -> String {
        record.session_id = self.session_id.clone();
        record.timestamp = self.clock.now_millis();
        let id = record.id.clone();

        if let Err(e) = self.sink.enqueue(record) {
            tracing::debug!(error = %e, record_id = %id, "Dropping telemetry record");
        }
        id
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("session_id", &self.session_id)
            .finish()
    }
}
