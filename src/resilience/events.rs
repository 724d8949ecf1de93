//! Breaker and retry events for observers.

use std::time::Duration;

use serde::Serialize;

/// Something an observer may want to react to (e.g. show a notification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BreakerEvent {
    /// Circuit opened; calls are rejected until `next_attempt_at`.
    Opened {
        endpoint: String,
        failure_count: u32,
        next_attempt_at: u64,
    },
    /// Cooldown elapsed; the next call is a probe.
    HalfOpened { endpoint: String },
    /// A success closed a circuit that was open or half-open.
    Closed { endpoint: String },
    /// A call was refused without running.
    Rejected { endpoint: String },
    /// Attempt `attempt` failed; waiting `delay` before the next one.
    RetryScheduled {
        endpoint: String,
        attempt: u32,
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// Every attempt failed.
    Exhausted {
        endpoint: String,
        attempts: u32,
        error_id: String,
    },
}

impl BreakerEvent {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Opened { endpoint, .. }
            | Self::HalfOpened { endpoint }
            | Self::Closed { endpoint }
            | Self::Rejected { endpoint }
            | Self::RetryScheduled { endpoint, .. }
            | Self::Exhausted { endpoint, .. } => endpoint,
        }
    }
}

/// Receives events synchronously, after the state change is applied and its
/// lock released. Implementations must return quickly.
pub trait BreakerObserver: Send + Sync {
    fn on_event(&self, event: &BreakerEvent);
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(crate::clock::millis(*value))
    }
}
