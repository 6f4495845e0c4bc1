//! # Hawser Client
//!
//! Per-connection lifecycle core for a multi-datacenter binary RPC
//! client.
//!
//! This crate provides:
//! - **Connection**: One transport slot to one datacenter, with
//!   connect/disconnect/reconnect that keeps service-loop identity stable
//! - **Normalization**: An ordered, data-driven table of call rewrite
//!   rules applied before serialization
//! - **Outgoing pipeline**: Serialization with cached bodies and
//!   reference-refresh bracketing, sequence-ordered queues, coalesced
//!   write wakes
//! - **Reply primitives**: Broadcast promise/future pairs where every
//!   subscriber observes the same outcome

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// Re-export core types for convenience
pub use hawser_core::{
    ConnId, ConnectionContext, DcId, NetworkProvider, Providers, ReadCallback, TaskProvider,
    TimeError, TimeProvider, TokioNetworkProvider, TokioProviders, TokioTaskProvider,
    TokioTimeProvider, TransportKind,
};

// =============================================================================
// Modules
// =============================================================================

/// Connection lifecycle, service loops, queues, and bookkeeping.
pub mod connection;

/// Connection-level error types.
pub mod error;

/// Call rewriting ahead of serialization.
pub mod normalize;

/// Outgoing message model and delivery states.
pub mod outgoing;

/// Reference store seam and refresh bracketing.
pub mod refs;

/// Shared per-datacenter registry seam.
pub mod registry;

/// Broadcast reply promise/future primitives.
pub mod reply;

/// Wire schema seam and the JSON-backed implementation.
pub mod schema;

/// Cryptographic session seam.
pub mod session;

/// Broadcast-once coordination cell.
pub mod sync;

// =============================================================================
// Public API Re-exports
// =============================================================================

// Connection exports
pub use connection::{
    ConnState, Connection, ConnectionConfig, ConnectionStats, LoopHandle, LoopRole, LoopSet,
    LoopSignal, LoopWake, PendingQueues, SendTicket, Services,
};

// Error exports
pub use error::{ConnectionError, ConnectionResult};

// Normalization exports
pub use normalize::{
    classify_link, standard_rules, Args, LinkKind, Method, MethodCall, Normalized, NormalizeEnv,
    NormalizeError, Normalizer, PeerKind, ResolvedPeer, RewriteRule,
};

// Outgoing pipeline exports
pub use outgoing::{DeliveryState, MessagePayload, MsgSeq, OutgoingMessage};

// Seam exports
pub use refs::{ReferenceStore, RefreshGuard};
pub use registry::DcRegistry;
pub use schema::{ConstructorSpec, JsonSchema, SchemaError, WireSchema};
pub use session::Session;

// Reply exports
pub use reply::{reply_pair, ReplyError, ReplyFuture, ReplyPromise};
pub use sync::StartCell;
