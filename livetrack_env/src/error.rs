//! Error types for the LiveTrack environment abstraction.

use thiserror::Error;

/// Errors that can occur while talking to the outside world.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Transport failed before a response arrived (DNS, connect, reset...)
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The endpoint answered with a non-success status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Response body could not be read
    #[error("Body error: {0}")]
    BodyError(String),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Creates a body error.
    pub fn body(msg: impl Into<String>) -> Self {
        Self::BodyError(msg.into())
    }

    /// True when the endpoint was reached but refused the request.
    pub fn is_status(&self) -> bool {
        matches!(self, Self::HttpStatus(_))
    }
}
