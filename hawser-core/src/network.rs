//! Network provider abstraction for opening transports.
//!
//! This module provides trait-based transport creation so the connection
//! layer can run against real Tokio networking in production and against
//! in-memory doubles in tests.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::context::ConnectionContext;

/// Provider trait for opening a transport from a connection context.
///
/// Single-core design - no Send bounds needed.
/// Clone allows sharing providers across multiple connections efficiently.
#[async_trait(?Send)]
pub trait NetworkProvider: Clone {
    /// The transport stream type this provider produces.
    type Stream: AsyncRead + AsyncWrite + Unpin + 'static;

    /// Open a connected transport for the given context.
    async fn open(&self, ctx: &ConnectionContext) -> io::Result<Self::Stream>;
}

/// Real Tokio networking implementation.
///
/// Every transport kind rides a plain TCP socket at this level; HTTP or
/// WebSocket framing is layered on by the external transport
/// implementations.
#[derive(Debug, Clone)]
pub struct TokioNetworkProvider;

impl TokioNetworkProvider {
    /// Create a new Tokio network provider.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioNetworkProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl NetworkProvider for TokioNetworkProvider {
    type Stream = tokio::net::TcpStream;

    async fn open(&self, ctx: &ConnectionContext) -> io::Result<Self::Stream> {
        tokio::net::TcpStream::connect(ctx.address()).await
    }
}
