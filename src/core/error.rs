//! Error types for café operations.

use thiserror::Error;

/// Errors produced by the café coordinator and its primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CafeError {
    /// All seats taken and the line at the door is full.
    #[error("rejected: cafe full and {waiting} customers already waiting")]
    Rejected {
        /// Customers queued at the door when the arrival was turned away.
        waiting: usize,
    },
    /// The customer gave up before being paired with a barista.
    #[error("arrival timed out")]
    ArrivalTimeout,
    /// The café is shutting down or has shut down.
    #[error("cafe closed")]
    Closed,
    /// A rendezvous signal was used out of protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No async runtime available to host the café's tasks.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
