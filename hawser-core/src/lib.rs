//! # hawser-core
//!
//! Runtime plumbing for the hawser connection core.
//!
//! This crate provides the provider traits and value types that the
//! connection layer is written against:
//!
//! - **Provider traits**: Abstractions for time, tasks, and transport
//!   creation, with production Tokio implementations
//! - **Core types**: [`DcId`], [`ConnId`], [`TransportKind`] for naming
//!   datacenter connections
//! - **[`ConnectionContext`]**: the immutable per-attempt descriptor a
//!   transport is opened from
//!
//! ## Provider Traits
//!
//! Providers allow the connection layer to run unchanged against real
//! networking or against test doubles:
//!
//! - [`TimeProvider`]: Sleep, timeout, and time queries
//! - [`TaskProvider`]: Task spawning for single-threaded environments
//! - [`NetworkProvider`]: Opening a transport for a connection context
//!
//! The [`Providers`] bundle collapses the three into one type parameter.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod context;
mod network;
mod providers;
mod task;
mod time;
mod types;

// Context exports
pub use context::{ConnectionContext, ReadCallback};

// Provider trait exports
pub use network::{NetworkProvider, TokioNetworkProvider};
pub use providers::{Providers, TokioProviders};
pub use task::{TaskProvider, TokioTaskProvider};
pub use time::{TimeError, TimeProvider, TokioTimeProvider};

// Core type exports
pub use types::{ConnId, DcId, TransportKind};
