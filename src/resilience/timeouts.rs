//! Deadlines for wrapped operations.
//!
//! The executor never times out an operation by itself. Callers that need an
//! upper bound wrap the operation with `with_deadline`; an expired deadline
//! then counts as an ordinary failure for retries and the breaker.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Outcome of an operation run under a deadline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeadlineError<E> {
    #[error("operation timed out after {0:?}")]
    Elapsed(Duration),

    #[error("{0}")]
    Inner(E),
}

/// Run `future`, failing with `DeadlineError::Elapsed` if it outlives `limit`.
pub async fn with_deadline<T, E, F>(limit: Duration, future: F) -> Result<T, DeadlineError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(DeadlineError::Inner),
        Err(_) => Err(DeadlineError::Elapsed(limit)),
    }
}
