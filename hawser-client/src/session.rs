//! Cryptographic session seam.

/// Per-connection session layer.
///
/// The session/handshake machinery lives outside this crate; the
/// connection only needs to request fresh per-connection session material
/// whenever a transport comes up.
pub trait Session {
    /// Initialize per-connection session material for a new transport.
    fn create_session(&self);
}
