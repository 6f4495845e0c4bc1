//! Core types for naming datacenter connections.
//!
//! This module provides the identity types the connection layer is keyed by:
//! - [`DcId`]: datacenter identifier
//! - [`ConnId`]: datacenter + slot index, naming one connection
//! - [`TransportKind`]: the flavor of transport a context describes

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a remote datacenter.
///
/// # Examples
///
/// ```
/// use hawser_core::DcId;
///
/// let dc = DcId::new(2);
/// assert_eq!(dc.to_string(), "dc2");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct DcId(pub i32);

impl DcId {
    /// Create a datacenter id from its numeric value.
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Numeric value of this datacenter id.
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for DcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dc{}", self.0)
    }
}

/// Identity of one connection: datacenter plus slot index.
///
/// A datacenter may be served by several parallel connections; the slot
/// index distinguishes siblings. The pair is fixed for the lifetime of the
/// connection object and is how the shared registry addresses it.
///
/// # Examples
///
/// ```
/// use hawser_core::{ConnId, DcId};
///
/// let id = ConnId::new(DcId::new(2), 0);
/// assert_eq!(id.to_string(), "dc2.0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId {
    /// Datacenter this connection belongs to.
    pub dc: DcId,
    /// Slot index among parallel connections to the same datacenter.
    pub slot: u16,
}

impl ConnId {
    /// Create a connection id from a datacenter and slot index.
    pub const fn new(dc: DcId, slot: u16) -> Self {
        Self { dc, slot }
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dc, self.slot)
    }
}

/// Transport flavor described by a connection context.
///
/// The connection core only cares whether a transport is stream-shaped or
/// request-response-shaped (HTTP family); the actual framing lives in the
/// external transport implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Plain TCP stream framing.
    Tcp,
    /// HTTP long-poll style request-response transport.
    Http,
    /// HTTPS request-response transport.
    Https,
    /// WebSocket stream framing.
    WebSocket,
}

impl TransportKind {
    /// Whether this transport is request-response shaped.
    ///
    /// HTTP-family transports need per-request bookkeeping and a long-poll
    /// wait loop; stream transports do not.
    pub const fn is_http(&self) -> bool {
        matches!(self, TransportKind::Http | TransportKind::Https)
    }
}
