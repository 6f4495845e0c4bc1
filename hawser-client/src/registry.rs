//! Shared per-datacenter registry seam.

use async_trait::async_trait;
use hawser_core::ConnId;

use crate::error::ConnectionError;

/// Shared registry arbitrating the parallel connections of a datacenter.
///
/// One registry instance is shared by every sibling connection to the same
/// datacenter. It tracks read/write activity for cross-connection fairness
/// decisions, receives disconnect notifications, and owns the connect
/// routine that a reconnecting slot delegates to (context construction and
/// retry policy live there, not in the connection).
#[async_trait(?Send)]
pub trait DcRegistry {
    /// Record whether `id` is currently busy writing.
    fn writing(&self, busy: bool, id: ConnId);

    /// Record whether `id` is currently busy reading.
    fn reading(&self, busy: bool, id: ConnId);

    /// Note that `id` disconnected for good, not as part of a reconnect.
    fn on_disconnect(&self, id: ConnId);

    /// Rebuild the connection for `id` from a fresh context.
    async fn connect(&self, id: ConnId) -> Result<(), ConnectionError>;
}
