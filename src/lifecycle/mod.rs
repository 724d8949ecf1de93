//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → probe loop stops → flusher drains telemetry → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
