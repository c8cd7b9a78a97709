//! Error types for lock-lease operations.

use thiserror::Error;

/// Result type for lock-lease operations.
pub type Result<T> = std::result::Result<T, LocksmithError>;

/// Errors surfaced by the lock-lease client.
///
/// Losing a contended acquisition or operating on an unknown/expired lease
/// are *not* errors; those come back as `Ok(None)` / `Ok(false)` from the
/// client methods. The variants here cover the cases where no answer from
/// the authority was obtained at all, or the answer was unusable.
#[derive(Debug, Error)]
pub enum LocksmithError {
    /// Invalid construction-time configuration. Raised synchronously when
    /// the client is built, never during calls, and never retried.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level failure reaching the authority (timeout, connection
    /// refused, socket error). The client performs no automatic retry.
    #[error("network error: {0}")]
    Network(String),

    /// Application-level fault reported by the authority (malformed call,
    /// internal error).
    #[error("remote error: {0}")]
    Remote(String),

    /// The authority's reply violated the call-surface contract (empty
    /// reply, malformed result tuple).
    #[error("bad reply from authority: {0}")]
    BadReply(String),
}

impl LocksmithError {
    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a transport-level error.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Check if this is a fault reported by the authority itself.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::BadReply(_))
    }
}
