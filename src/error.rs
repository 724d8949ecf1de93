//! Errors returned to callers of the executor.

use thiserror::Error;

/// Why `execute_with_policy` gave up.
///
/// `E` is the wrapped operation's own error type, preserved unchanged.
#[derive(Debug, Error)]
pub enum ExecutionError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker is open for {endpoint}")]
    CircuitOpen { endpoint: String },

    /// Every attempt failed, or the circuit opened between attempts.
    #[error("{endpoint} failed after {attempts} attempt(s) [error id {error_id}]: {last_error}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        last_error: E,
        error_id: String,
    },
}

impl<E> ExecutionError<E> {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::CircuitOpen { endpoint } | Self::RetriesExhausted { endpoint, .. } => endpoint,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Telemetry reference, present when retries were exhausted.
    pub fn error_id(&self) -> Option<&str> {
        match self {
            Self::RetriesExhausted { error_id, .. } => Some(error_id),
            Self::CircuitOpen { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. } => *attempts,
            Self::CircuitOpen { .. } => 0,
        }
    }

    /// The operation's last error, if it ran at all.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::RetriesExhausted { last_error, .. } => Some(last_error),
            Self::CircuitOpen { .. } => None,
        }
    }
}
