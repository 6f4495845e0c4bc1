//! Connection-level error types.
//!
//! Everything here is `Clone`: lifecycle results are broadcast to every
//! task waiting on the first start, so errors must be shareable after the
//! fact. Transport failures are detached from [`std::io::Error`] into
//! plain text at the boundary.

use std::io;

use thiserror::Error;

use crate::normalize::NormalizeError;
use crate::outgoing::DeliveryState;
use crate::schema::SchemaError;

/// Convenience alias for fallible connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Errors raised by the connection lifecycle and the outgoing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The transport did not come up within the configured window.
    #[error("connection attempt timed out")]
    ConnectTimeout,

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A delivery-state transition the message state machine forbids.
    #[error("invalid delivery transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// State the message was in.
        from: DeliveryState,
        /// State the transition asked for.
        to: DeliveryState,
    },

    /// Call rewriting rejected the call.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Serialization failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        ConnectionError::Transport(err.to_string())
    }
}
