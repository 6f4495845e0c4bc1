//! Immutable descriptor of a connect attempt.
//!
//! A [`ConnectionContext`] is produced externally once per connect attempt
//! and consumed by the [`NetworkProvider`](crate::NetworkProvider) to open
//! the transport. It carries the datacenter id, the transport flavor, the
//! target address, and the media/CDN classification of the endpoint.
//!
//! The only mutable part is the received-data callback slot: the connection
//! installs a callback when it adopts the context, and transport read paths
//! report every received chunk through [`ConnectionContext::notify_read`].

use std::cell::RefCell;
use std::fmt;

use crate::types::{DcId, TransportKind};

/// Callback invoked with the byte count of every received chunk.
pub type ReadCallback = Box<dyn Fn(usize)>;

/// Immutable descriptor of a connection target.
pub struct ConnectionContext {
    dc: DcId,
    kind: TransportKind,
    address: String,
    media: bool,
    cdn: bool,
    read_callback: RefCell<Option<ReadCallback>>,
}

impl ConnectionContext {
    /// Create a context for the given datacenter, transport kind, and address.
    pub fn new(dc: DcId, kind: TransportKind, address: impl Into<String>) -> Self {
        Self {
            dc,
            kind,
            address: address.into(),
            media: false,
            cdn: false,
            read_callback: RefCell::new(None),
        }
    }

    /// Mark this context as targeting a media-only endpoint.
    pub fn with_media(mut self) -> Self {
        self.media = true;
        self
    }

    /// Mark this context as targeting a CDN endpoint.
    pub fn with_cdn(mut self) -> Self {
        self.cdn = true;
        self
    }

    /// Datacenter this context points at.
    pub fn dc(&self) -> DcId {
        self.dc
    }

    /// Transport flavor to open.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Target address, in whatever form the network provider expects.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the endpoint serves media transfers only.
    pub fn is_media(&self) -> bool {
        self.media
    }

    /// Whether the endpoint is a CDN node.
    pub fn is_cdn(&self) -> bool {
        self.cdn
    }

    /// Install the received-data callback, replacing any previous one.
    pub fn set_read_callback(&self, callback: ReadCallback) {
        *self.read_callback.borrow_mut() = Some(callback);
    }

    /// Report `amount` received bytes to the installed callback.
    ///
    /// Transport read paths call this once per chunk. A context without a
    /// callback ignores the report.
    pub fn notify_read(&self, amount: usize) {
        if let Some(callback) = self.read_callback.borrow().as_ref() {
            callback(amount);
        }
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("dc", &self.dc)
            .field("kind", &self.kind)
            .field("address", &self.address)
            .field("media", &self.media)
            .field("cdn", &self.cdn)
            .finish_non_exhaustive()
    }
}
