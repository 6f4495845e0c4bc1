//! Per-connection lifecycle management.
//!
//! A [`Connection`] owns one transport slot to one datacenter. It brings
//! the socket up, seeds the session, starts or resumes the per-role
//! service loops, moves outgoing messages through rewriting and
//! serialization into the pending queue, and tears everything down on
//! disconnect while keeping loop identity stable for the next connect.
//!
//! ## Design
//!
//! The connection is driven on a single thread. All mutable state lives
//! behind interior cells and no borrow is held across an await; the
//! transport halves are taken out of their cells for the duration of a
//! read or write and restored afterwards. The outcome of the first
//! connect attempt is recorded in a broadcast cell so concurrent callers
//! of [`Connection::connect`] observe exactly one attempt.

mod config;
mod loops;
mod queues;
mod stats;

pub use config::ConnectionConfig;
pub use loops::{LoopHandle, LoopRole, LoopSet, LoopSignal, LoopWake};
pub use queues::PendingQueues;
pub use stats::ConnectionStats;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::io::{split, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use hawser_core::{
    ConnId, ConnectionContext, DcId, NetworkProvider, Providers, TimeError, TimeProvider,
};

use crate::error::{ConnectionError, ConnectionResult};
use crate::normalize::{NormalizeEnv, Normalizer};
use crate::outgoing::{MessagePayload, MsgSeq, OutgoingMessage};
use crate::refs::{ReferenceStore, RefreshGuard};
use crate::registry::DcRegistry;
use crate::reply::{ReplyError, ReplyFuture, ReplyPromise};
use crate::schema::WireSchema;
use crate::session::Session;
use crate::sync::StartCell;

type Transport<P> = <<P as Providers>::Network as NetworkProvider>::Stream;

/// Lifecycle phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No live transport.
    Disconnected,
    /// Transport being established.
    Connecting,
    /// Transport up, loops running.
    Connected,
}

/// External collaborators a connection delegates to.
///
/// One set is shared by every connection of a client; the connection
/// never owns session, schema, or registry state itself.
pub struct Services {
    /// Registry arbitrating the datacenter's connection slots.
    pub registry: Rc<dyn DcRegistry>,
    /// Session material seeding.
    pub session: Rc<dyn Session>,
    /// Wire serializer.
    pub schema: Rc<dyn WireSchema>,
    /// Store of refreshable file/media references.
    pub references: Rc<dyn ReferenceStore>,
    /// Environment the rewrite rules run against.
    pub env: Rc<dyn NormalizeEnv>,
}

/// Handle returned by [`Connection::send_message`].
pub struct SendTicket {
    /// Sequence assigned in the pending queue.
    pub seq: MsgSeq,
    /// Resolves when the reply or a failure arrives.
    pub reply: ReplyFuture<Vec<u8>>,
    /// Resolves when the message is accepted into the pipeline.
    ///
    /// Present only for the encrypted-send family.
    pub queued: Option<ReplyFuture<()>>,
}

/// One transport slot to one datacenter.
pub struct Connection<P: Providers> {
    id: ConnId,
    providers: P,
    config: ConnectionConfig,
    services: Services,
    engine: Normalizer,
    state: Cell<ConnState>,
    ctx: RefCell<Option<Rc<ConnectionContext>>>,
    reader: RefCell<Option<ReadHalf<Transport<P>>>>,
    writer: RefCell<Option<WriteHalf<Transport<P>>>>,
    needs_reconnect: Cell<bool>,
    stats: Rc<RefCell<ConnectionStats>>,
    queues: RefCell<PendingQueues>,
    loops: LoopSet,
    first_start: StartCell<Result<(), ConnectionError>>,
    start_gate: Mutex<()>,
}

impl<P: Providers> Connection<P> {
    /// Create a disconnected connection for the given slot.
    pub fn new(id: ConnId, providers: P, config: ConnectionConfig, services: Services) -> Self {
        Self {
            id,
            providers,
            config,
            services,
            engine: Normalizer::new(),
            state: Cell::new(ConnState::Disconnected),
            ctx: RefCell::new(None),
            reader: RefCell::new(None),
            writer: RefCell::new(None),
            needs_reconnect: Cell::new(false),
            stats: Rc::new(RefCell::new(ConnectionStats::new())),
            queues: RefCell::new(PendingQueues::new()),
            loops: LoopSet::default(),
            first_start: StartCell::new(),
            start_gate: Mutex::new(()),
        }
    }

    /// Slot identity.
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> ConnState {
        self.state.get()
    }

    /// Whether a disconnect has flagged this slot for reconnection.
    pub fn needs_reconnect(&self) -> bool {
        self.needs_reconnect.get()
    }

    /// Tuning knobs, for loop bodies that schedule off them.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Provider bundle this connection runs on.
    pub fn providers(&self) -> &P {
        &self.providers
    }

    /// Context of the current (or last) transport.
    pub fn ctx(&self) -> Option<Rc<ConnectionContext>> {
        self.ctx.borrow().clone()
    }

    /// Datacenter this slot belongs to.
    pub fn dc(&self) -> DcId {
        self.id.dc
    }

    /// Whether the current transport is HTTP-flavored.
    pub fn is_http(&self) -> bool {
        self.ctx
            .borrow()
            .as_ref()
            .map_or(false, |ctx| ctx.kind().is_http())
    }

    /// Whether this connection serves media transfers only.
    pub fn is_media(&self) -> bool {
        self.ctx.borrow().as_ref().map_or(false, |ctx| ctx.is_media())
    }

    /// Whether this connection points at a CDN endpoint.
    pub fn is_cdn(&self) -> bool {
        self.ctx.borrow().as_ref().map_or(false, |ctx| ctx.is_cdn())
    }

    /// Whether a transport is currently installed.
    pub fn has_transport(&self) -> bool {
        self.reader.borrow().is_some() || self.writer.borrow().is_some()
    }

    /// Bring the transport up and start the service loops.
    ///
    /// The first call (across all concurrent callers) performs the one
    /// attempt and records its outcome; callers racing with it adopt that
    /// outcome instead of dialing again. Later calls reconnect freely.
    pub async fn connect(&self, ctx: ConnectionContext) -> ConnectionResult<()> {
        if self.first_start.is_set() {
            return self.connect_inner(ctx).await;
        }

        let _gate = self.start_gate.lock().await;
        if let Some(result) = self.first_start.get() {
            return result;
        }
        let result = self.connect_inner(ctx).await;
        self.first_start.set(result.clone());
        result
    }

    /// Wait until the first connect attempt settles and return its
    /// outcome.
    pub async fn wait_started(&self) -> ConnectionResult<()> {
        self.first_start.wait().await
    }

    async fn connect_inner(&self, ctx: ConnectionContext) -> ConnectionResult<()> {
        self.state.set(ConnState::Connecting);
        tracing::debug!(conn = %self.id, addr = ctx.address(), "connecting");

        let opened = self
            .providers
            .time()
            .timeout(
                self.config.connect_timeout,
                self.providers.network().open(&ctx),
            )
            .await;
        let stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                self.state.set(ConnState::Disconnected);
                tracing::warn!(conn = %self.id, error = %err, "connect failed");
                return Err(ConnectionError::from(err));
            }
            Err(TimeError::Elapsed) => {
                self.state.set(ConnState::Disconnected);
                tracing::warn!(conn = %self.id, "connect timed out");
                return Err(ConnectionError::ConnectTimeout);
            }
        };

        // Route received-chunk reports into the stats cell.
        let stats = Rc::clone(&self.stats);
        let time = self.providers.time().clone();
        ctx.set_read_callback(Box::new(move |amount| {
            stats.borrow_mut().record_chunk(time.now(), amount);
        }));

        self.close_transport().await;

        self.services.session.create_session();
        {
            let mut stats = self.stats.borrow_mut();
            stats.record_connect();
            stats.reset_http();
        }

        let ctx = Rc::new(ctx);
        let (reader, writer) = split(stream);
        *self.ctx.borrow_mut() = Some(Rc::clone(&ctx));
        *self.reader.borrow_mut() = Some(reader);
        *self.writer.borrow_mut() = Some(writer);
        self.needs_reconnect.set(false);

        let interrupted = self.queues.borrow_mut().take_unencrypted();
        for message in interrupted {
            tracing::debug!(
                conn = %self.id,
                seq = ?message.seq(),
                "failing unencrypted message across reconnect"
            );
            if let Err(err) = message.fail(ReplyError::Interrupted) {
                tracing::warn!(conn = %self.id, error = %err, "unencrypted message already settled");
            }
        }
        let restored = self.queues.borrow_mut().restore_unsent();
        if restored > 0 {
            tracing::debug!(conn = %self.id, restored, "requeued parked messages");
        }

        self.start_loops(&ctx);
        self.state.set(ConnState::Connected);
        tracing::info!(conn = %self.id, addr = ctx.address(), "connected");
        Ok(())
    }

    fn start_loops(&self, ctx: &ConnectionContext) {
        let http = ctx.kind().is_http();
        for role in LoopRole::ALL {
            if !role.eligible(http, ctx.is_media(), ctx.is_cdn()) {
                continue;
            }
            let handle = self.loops.ensure(role);
            if handle.start() {
                tracing::debug!(conn = %self.id, loop_role = %role, "loop started");
            } else {
                handle.revive();
                tracing::trace!(conn = %self.id, loop_role = %role, "loop resumed");
            }
        }
    }

    /// Tear the transport down.
    ///
    /// Signals every existing loop (the read loop learns the socket is
    /// empty, the rest get a plain stop), closes the transport swallowing
    /// close errors, and, for a permanent disconnect, notifies the
    /// registry. A temporary disconnect is the first half of a reconnect.
    pub async fn disconnect(&self, temporary: bool) {
        tracing::debug!(conn = %self.id, temporary, "disconnecting");
        self.needs_reconnect.set(true);
        self.state.set(ConnState::Disconnected);

        for role in LoopRole::ALL {
            if let Some(handle) = self.loops.get(role) {
                let signal = if role == LoopRole::Read {
                    LoopSignal::SocketEmpty
                } else {
                    LoopSignal::Stop
                };
                handle.signal(signal);
            }
        }

        self.close_transport().await;

        if !temporary {
            self.services.registry.on_disconnect(self.id);
        }
    }

    /// Reconnect the same slot: temporary disconnect, then ask the
    /// registry to rebuild the connection from a fresh context.
    pub async fn reconnect(&self) -> ConnectionResult<()> {
        tracing::debug!(conn = %self.id, "reconnecting");
        self.disconnect(true).await;
        self.services.registry.connect(self.id).await
    }

    async fn close_transport(&self) {
        let reader = self.reader.borrow_mut().take();
        drop(reader);
        let writer = self.writer.borrow_mut().take();
        if let Some(mut writer) = writer {
            if let Err(err) = writer.shutdown().await {
                tracing::debug!(conn = %self.id, error = %err, "transport close failed");
            }
        }
    }

    /// Serialize (if needed), enqueue, and optionally flush a message.
    ///
    /// A cached serialized body is reused unless the message is flagged
    /// for reference refresh; refreshed serialization is bracketed so the
    /// reference store always leaves refresh mode, even on error. Method
    /// payloads pass through the rewrite engine before serialization and
    /// keep the rewritten call.
    pub async fn send_message(
        &self,
        message: Rc<OutgoingMessage>,
        flush: bool,
    ) -> ConnectionResult<SendTicket> {
        let mut accepted: Option<ReplyPromise<()>> = None;
        let mut queued: Option<ReplyFuture<()>> = None;

        if !message.has_serialized_body() || message.needs_reference_refresh() {
            let refreshing = message.needs_reference_refresh();
            let _bracket = if refreshing {
                Some(RefreshGuard::begin(self.services.references.as_ref()))
            } else {
                None
            };

            match message.payload() {
                MessagePayload::Method(call) => {
                    let outcome = self
                        .engine
                        .normalize(self.services.env.as_ref(), call)
                        .await?;
                    let bytes = self
                        .services
                        .schema
                        .serialize_method(&outcome.call.method, &outcome.call.args)?;
                    message.set_method_call(outcome.call);
                    message.set_serialized(bytes);
                    accepted = outcome.queue_promise;
                    queued = outcome.queued;
                }
                MessagePayload::Object { constructor, body } => {
                    let bytes = self.services.schema.serialize_object(&constructor, &body)?;
                    message.set_serialized(bytes);
                }
            }
            if refreshing {
                message.clear_reference_refresh();
            }
        }

        let seq = self.queues.borrow_mut().push(Rc::clone(&message));
        tracing::trace!(conn = %self.id, %seq, "message queued");
        if let Some(promise) = accepted {
            promise.send(());
        }
        if flush {
            self.flush();
        }

        Ok(SendTicket {
            seq,
            reply: message.reply_handle(),
            queued,
        })
    }

    /// Wake the write loop. Flushes between two loop runs coalesce into
    /// one wake.
    pub fn flush(&self) {
        self.loops.ensure(LoopRole::Write).resume();
    }

    /// Wake the keepalive-check loop out of its wait.
    pub fn wake_keepalive(&self) {
        self.loops.ensure(LoopRole::Check).resume();
    }

    /// Wake the long-poll loop so it re-arms the HTTP wait.
    pub fn resume_http_wait(&self) {
        self.loops.ensure(LoopRole::HttpWait).resume();
    }

    /// Handle for `role`, creating it if absent. The handle stays the
    /// same object across disconnect/reconnect cycles.
    pub fn loop_handle(&self, role: LoopRole) -> Rc<LoopHandle> {
        self.loops.ensure(role)
    }

    /// Next pending message for the write loop.
    pub fn pop_pending(&self) -> Option<Rc<OutgoingMessage>> {
        self.queues.borrow_mut().pop_pending()
    }

    /// Park a message whose send attempt did not complete.
    pub fn park_unsent(&self, message: Rc<OutgoingMessage>) {
        self.queues.borrow_mut().park_unsent(message);
    }

    /// Remove and return every parked message, oldest first.
    pub fn take_unsent(&self) -> Vec<Rc<OutgoingMessage>> {
        self.queues.borrow_mut().take_unsent()
    }

    /// Drop settled messages from the queues. Returns how many dropped.
    pub fn prune_settled(&self) -> usize {
        let pruned = self.queues.borrow_mut().prune_settled();
        if pruned > 0 {
            tracing::trace!(conn = %self.id, pruned, "dropped settled messages");
        }
        pruned
    }

    /// Messages waiting to be sent.
    pub fn pending_len(&self) -> usize {
        self.queues.borrow().pending_len()
    }

    /// Messages parked after an interrupted send.
    pub fn unsent_len(&self) -> usize {
        self.queues.borrow().unsent_len()
    }

    /// Write `bytes` to the transport.
    ///
    /// The write half is taken for the duration of the write, so a
    /// concurrent disconnect closes it only after the write settles.
    pub async fn write_all(&self, bytes: &[u8]) -> ConnectionResult<()> {
        let mut writer = self
            .writer
            .borrow_mut()
            .take()
            .ok_or_else(|| ConnectionError::Transport("not connected".to_string()))?;
        let result = writer.write_all(bytes).await;
        match result {
            Ok(()) => {
                if !self.restore_writer(writer) {
                    tracing::debug!(conn = %self.id, "transport went away during write");
                }
                Ok(())
            }
            Err(err) => Err(ConnectionError::from(err)),
        }
    }

    /// Read into `buf`, reporting any received chunk to the context's
    /// read callback. Returns the number of bytes read; zero means the
    /// peer closed the stream.
    pub async fn read_some(&self, buf: &mut [u8]) -> ConnectionResult<usize> {
        let mut reader = self
            .reader
            .borrow_mut()
            .take()
            .ok_or_else(|| ConnectionError::Transport("not connected".to_string()))?;
        let result = reader.read(buf).await;
        match result {
            Ok(amount) => {
                if !self.restore_reader(reader) {
                    tracing::debug!(conn = %self.id, "transport went away during read");
                }
                if amount > 0 {
                    let ctx = self.ctx.borrow().clone();
                    if let Some(ctx) = ctx {
                        ctx.notify_read(amount);
                    }
                }
                Ok(amount)
            }
            Err(err) => Err(ConnectionError::from(err)),
        }
    }

    fn restore_writer(&self, writer: WriteHalf<Transport<P>>) -> bool {
        if self.state.get() != ConnState::Connected {
            return false;
        }
        let mut slot = self.writer.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(writer);
        true
    }

    fn restore_reader(&self, reader: ReadHalf<Transport<P>>) -> bool {
        if self.state.get() != ConnState::Connected {
            return false;
        }
        let mut slot = self.reader.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reader);
        true
    }

    /// Forward write-activity accounting to the registry.
    pub fn writing(&self, busy: bool) {
        self.services.registry.writing(busy, self.id);
    }

    /// Forward read-activity accounting to the registry.
    pub fn reading(&self, busy: bool) {
        self.services.registry.reading(busy, self.id);
    }

    /// Record an HTTP request going out.
    pub fn note_http_request(&self) {
        self.stats.borrow_mut().record_http_request();
    }

    /// Record an HTTP response coming in.
    pub fn note_http_response(&self) {
        self.stats.borrow_mut().record_http_response();
    }

    /// HTTP requests still awaiting a response.
    pub fn pending_http(&self) -> u64 {
        self.stats.borrow().pending_http()
    }

    /// Snapshot of the connection counters.
    pub fn stats(&self) -> ConnectionStats {
        self.stats.borrow().clone()
    }

    /// How long the read side has been silent, if it ever spoke.
    pub fn time_since_last_chunk(&self) -> Option<Duration> {
        let now = self.providers.time().now();
        self.stats.borrow().time_since_last_chunk(now)
    }
}

impl<P: Providers> fmt::Debug for Connection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("needs_reconnect", &self.needs_reconnect.get())
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}
