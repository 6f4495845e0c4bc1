//! Outgoing message model and delivery states.
//!
//! An [`OutgoingMessage`] owns everything the pipeline tracks per send:
//! the payload, the cached serialized body, the assigned queue sequence,
//! and the broadcast reply slot. Delivery progress is a closed state
//! machine ([`DeliveryState`]) with validated transitions; the only
//! backward edge is `Sent -> Queued`, taken when a send must be repeated
//! after reconnection.

use std::cell::{Cell, RefCell};
use std::fmt;

use crate::error::{ConnectionError, ConnectionResult};
use crate::normalize::{Args, MethodCall};
use crate::reply::{reply_pair, ReplyError, ReplyFuture, ReplyPromise};

/// Monotonic sequence number assigned on first queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MsgSeq(pub u64);

impl MsgSeq {
    /// Wrap a raw sequence value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw sequence value.
    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for MsgSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an outgoing message carries.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    /// A method call awaiting a server reply.
    Method(MethodCall),
    /// A bare schema object, framed by its constructor tag.
    Object {
        /// Constructor predicate naming the object type.
        constructor: String,
        /// Object body.
        body: Args,
    },
}

/// Delivery progress of an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Waiting in a queue, not yet on the wire.
    Queued,
    /// Written to the transport, awaiting a reply.
    Sent,
    /// Reply received; terminal.
    Replied,
    /// Rejected or interrupted; terminal.
    Failed,
}

impl DeliveryState {
    /// Whether the state machine allows `self -> to`.
    pub fn can_advance(self, to: DeliveryState) -> bool {
        use DeliveryState::{Failed, Queued, Replied, Sent};
        matches!(
            (self, to),
            (Queued, Sent) | (Queued, Failed) | (Sent, Replied) | (Sent, Failed) | (Sent, Queued)
        )
    }

    /// Whether this state is terminal.
    pub fn is_settled(self) -> bool {
        matches!(self, DeliveryState::Replied | DeliveryState::Failed)
    }
}

/// One message moving through the outgoing pipeline.
///
/// Held behind `Rc` and mutated through interior cells; the pipeline is
/// single-threaded, so borrows never cross an await.
pub struct OutgoingMessage {
    payload: RefCell<MessagePayload>,
    serialized: RefCell<Option<Vec<u8>>>,
    state: Cell<DeliveryState>,
    seq: Cell<Option<MsgSeq>>,
    unencrypted: bool,
    refresh_references: Cell<bool>,
    promise: RefCell<Option<ReplyPromise<Vec<u8>>>>,
    reply: ReplyFuture<Vec<u8>>,
}

impl OutgoingMessage {
    /// Message carrying a method call.
    pub fn method(call: MethodCall) -> Self {
        Self::with_payload(MessagePayload::Method(call))
    }

    /// Message carrying a bare object.
    pub fn object(constructor: impl Into<String>, body: Args) -> Self {
        Self::with_payload(MessagePayload::Object {
            constructor: constructor.into(),
            body,
        })
    }

    fn with_payload(payload: MessagePayload) -> Self {
        let (promise, reply) = reply_pair();
        Self {
            payload: RefCell::new(payload),
            serialized: RefCell::new(None),
            state: Cell::new(DeliveryState::Queued),
            seq: Cell::new(None),
            unencrypted: false,
            refresh_references: Cell::new(false),
            promise: RefCell::new(Some(promise)),
            reply,
        }
    }

    /// Mark this message as traveling outside the encrypted session.
    ///
    /// Unencrypted messages cannot survive a session change; pending ones
    /// are failed on reconnect.
    pub fn with_unencrypted(mut self) -> Self {
        self.unencrypted = true;
        self
    }

    /// Whether this message travels outside the encrypted session.
    pub fn unencrypted(&self) -> bool {
        self.unencrypted
    }

    /// Whether the payload is a method call.
    pub fn is_method(&self) -> bool {
        matches!(&*self.payload.borrow(), MessagePayload::Method(_))
    }

    /// Current payload, cloned.
    pub fn payload(&self) -> MessagePayload {
        self.payload.borrow().clone()
    }

    /// Replace the method call after rewriting. No-op for object payloads.
    pub fn set_method_call(&self, call: MethodCall) {
        let mut payload = self.payload.borrow_mut();
        if matches!(&*payload, MessagePayload::Method(_)) {
            *payload = MessagePayload::Method(call);
        }
    }

    /// Flag the next serialization to refresh file references.
    pub fn mark_for_reference_refresh(&self) {
        self.refresh_references.set(true);
    }

    /// Whether the next serialization must refresh file references.
    pub fn needs_reference_refresh(&self) -> bool {
        self.refresh_references.get()
    }

    pub(crate) fn clear_reference_refresh(&self) {
        self.refresh_references.set(false);
    }

    /// Whether a serialized body is cached.
    pub fn has_serialized_body(&self) -> bool {
        self.serialized.borrow().is_some()
    }

    /// Cached serialized body, cloned for the write path.
    pub fn serialized_bytes(&self) -> Option<Vec<u8>> {
        self.serialized.borrow().clone()
    }

    pub(crate) fn set_serialized(&self, bytes: Vec<u8>) {
        *self.serialized.borrow_mut() = Some(bytes);
    }

    /// Queue sequence, once assigned.
    pub fn seq(&self) -> Option<MsgSeq> {
        self.seq.get()
    }

    pub(crate) fn assign_seq(&self, seq: MsgSeq) {
        if self.seq.get().is_none() {
            self.seq.set(Some(seq));
        }
    }

    /// Current delivery state.
    pub fn state(&self) -> DeliveryState {
        self.state.get()
    }

    /// Whether delivery has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.state.get().is_settled()
    }

    /// Reply handle; every clone resolves to the same outcome.
    pub fn reply_handle(&self) -> ReplyFuture<Vec<u8>> {
        self.reply.clone()
    }

    fn advance(&self, to: DeliveryState) -> ConnectionResult<()> {
        let from = self.state.get();
        if !from.can_advance(to) {
            return Err(ConnectionError::InvalidTransition { from, to });
        }
        self.state.set(to);
        Ok(())
    }

    /// Record that the body went out on the wire.
    pub fn mark_sent(&self) -> ConnectionResult<()> {
        self.advance(DeliveryState::Sent)
    }

    /// Put a sent-but-unanswered message back in line for another send.
    pub fn requeue(&self) -> ConnectionResult<()> {
        self.advance(DeliveryState::Queued)
    }

    /// Settle with a reply body, waking every reply handle.
    pub fn succeed(&self, body: Vec<u8>) -> ConnectionResult<()> {
        self.advance(DeliveryState::Replied)?;
        if let Some(promise) = self.promise.borrow_mut().take() {
            promise.send(body);
        }
        Ok(())
    }

    /// Settle with an error, waking every reply handle.
    pub fn fail(&self, error: ReplyError) -> ConnectionResult<()> {
        self.advance(DeliveryState::Failed)?;
        if let Some(promise) = self.promise.borrow_mut().take() {
            promise.fail(error);
        }
        Ok(())
    }
}

impl fmt::Debug for OutgoingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingMessage")
            .field("state", &self.state.get())
            .field("seq", &self.seq.get())
            .field("unencrypted", &self.unencrypted)
            .field("serialized", &self.has_serialized_body())
            .finish_non_exhaustive()
    }
}
