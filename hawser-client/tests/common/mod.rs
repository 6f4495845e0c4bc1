//! Shared doubles for the integration suites.
//!
//! Everything here stays single-threaded: streams are in-memory duplex
//! pipes, collaborators record their calls into cells, and tests drive
//! the whole arrangement on a current-thread runtime via [`run_local`].

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::io;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::DuplexStream;

use hawser_client::{
    Args, ConnId, Connection, ConnectionConfig, ConnectionContext, ConnectionError,
    ConstructorSpec, DcId, DcRegistry, JsonSchema, Method, NetworkProvider, NormalizeEnv,
    NormalizeError, Providers, ReferenceStore, ResolvedPeer, SchemaError, Services, Session,
    TokioTaskProvider, TokioTimeProvider, TransportKind, WireSchema,
};

/// Current-thread runtime plus a `LocalSet`, mirroring how production
/// drives connections.
pub fn run_local<F: Future>(future: F) -> F::Output {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .expect("failed to build runtime");
    tokio::task::LocalSet::new().block_on(&runtime, future)
}

/// In-memory network: every open hands out one half of a duplex pipe
/// and parks the peer half for the test to read or feed.
#[derive(Clone, Default)]
pub struct MemNetwork {
    opens: Rc<Cell<usize>>,
    fail_next: Rc<Cell<bool>>,
    hang_next: Rc<Cell<bool>>,
    peers: Rc<RefCell<Vec<DuplexStream>>>,
}

impl MemNetwork {
    /// Number of successfully opened transports.
    pub fn opens(&self) -> usize {
        self.opens.get()
    }

    /// Make the next open fail with `ConnectionRefused`.
    pub fn fail_next(&self) {
        self.fail_next.set(true);
    }

    /// Make the next open hang forever.
    pub fn hang_next(&self) {
        self.hang_next.set(true);
    }

    /// Peer half of the most recent open.
    pub fn take_peer(&self) -> Option<DuplexStream> {
        self.peers.borrow_mut().pop()
    }
}

#[async_trait(?Send)]
impl NetworkProvider for MemNetwork {
    type Stream = DuplexStream;

    async fn open(&self, _ctx: &ConnectionContext) -> io::Result<DuplexStream> {
        // Yield once so concurrent callers can observe the in-flight dial.
        tokio::task::yield_now().await;
        if self.hang_next.replace(false) {
            std::future::pending::<()>().await;
        }
        if self.fail_next.replace(false) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        }
        self.opens.set(self.opens.get() + 1);
        let (client, server) = tokio::io::duplex(4096);
        self.peers.borrow_mut().push(server);
        Ok(client)
    }
}

/// Provider bundle wiring [`MemNetwork`] to the real time and task
/// providers.
#[derive(Clone)]
pub struct FakeProviders {
    network: MemNetwork,
    time: TokioTimeProvider,
    task: TokioTaskProvider,
}

impl FakeProviders {
    pub fn new(network: MemNetwork) -> Self {
        Self {
            network,
            time: TokioTimeProvider::new(),
            task: TokioTaskProvider,
        }
    }
}

impl Providers for FakeProviders {
    type Network = MemNetwork;
    type Time = TokioTimeProvider;
    type Task = TokioTaskProvider;

    fn network(&self) -> &MemNetwork {
        &self.network
    }

    fn time(&self) -> &TokioTimeProvider {
        &self.time
    }

    fn task(&self) -> &TokioTaskProvider {
        &self.task
    }
}

/// Registry double recording every notification it receives.
#[derive(Default)]
pub struct RecordingRegistry {
    pub writes: RefCell<Vec<(bool, ConnId)>>,
    pub reads: RefCell<Vec<(bool, ConnId)>>,
    pub disconnects: RefCell<Vec<ConnId>>,
    pub connects: RefCell<Vec<ConnId>>,
}

#[async_trait(?Send)]
impl DcRegistry for RecordingRegistry {
    fn writing(&self, busy: bool, id: ConnId) {
        self.writes.borrow_mut().push((busy, id));
    }

    fn reading(&self, busy: bool, id: ConnId) {
        self.reads.borrow_mut().push((busy, id));
    }

    fn on_disconnect(&self, id: ConnId) {
        self.disconnects.borrow_mut().push(id);
    }

    async fn connect(&self, id: ConnId) -> Result<(), ConnectionError> {
        self.connects.borrow_mut().push(id);
        Ok(())
    }
}

/// Session double counting how many times a fresh session was seeded.
#[derive(Default)]
pub struct RecordingSession {
    pub created: Cell<usize>,
}

impl Session for RecordingSession {
    fn create_session(&self) {
        self.created.set(self.created.get() + 1);
    }
}

/// Reference store double recording refresh-mode toggles in order.
#[derive(Default)]
pub struct RecordingRefs {
    pub toggles: RefCell<Vec<bool>>,
}

impl ReferenceStore for RecordingRefs {
    fn refresh_next(&self, enable: bool) {
        self.toggles.borrow_mut().push(enable);
    }
}

/// Wire schema wrapping [`JsonSchema`], counting successful encodes and
/// able to fail the next one on demand.
pub struct CountingSchema {
    inner: JsonSchema,
    pub method_calls: Cell<usize>,
    pub object_calls: Cell<usize>,
    pub fail_next: Cell<bool>,
}

impl Default for CountingSchema {
    fn default() -> Self {
        Self {
            inner: JsonSchema::new(),
            method_calls: Cell::new(0),
            object_calls: Cell::new(0),
            fail_next: Cell::new(false),
        }
    }
}

impl WireSchema for CountingSchema {
    fn serialize_method(&self, method: &Method, args: &Args) -> Result<Vec<u8>, SchemaError> {
        if self.fail_next.replace(false) {
            return Err(SchemaError::Encode {
                message: "forced failure".to_string(),
            });
        }
        let bytes = self.inner.serialize_method(method, args)?;
        self.method_calls.set(self.method_calls.get() + 1);
        Ok(bytes)
    }

    fn serialize_object(&self, constructor: &str, body: &Args) -> Result<Vec<u8>, SchemaError> {
        if self.fail_next.replace(false) {
            return Err(SchemaError::Encode {
                message: "forced failure".to_string(),
            });
        }
        let bytes = self.inner.serialize_object(constructor, body)?;
        self.object_calls.set(self.object_calls.get() + 1);
        Ok(bytes)
    }

    fn constructor(&self, predicate: &str) -> Option<ConstructorSpec> {
        self.inner.constructor(predicate)
    }
}

/// Environment for calls that never need resolution or uploads.
pub struct PassiveEnv;

#[async_trait(?Send)]
impl NormalizeEnv for PassiveEnv {
    fn is_bot(&self) -> bool {
        false
    }

    fn auto_upload(&self) -> bool {
        false
    }

    async fn resolve_chat(&self, _id: &Value) -> Result<ResolvedPeer, NormalizeError> {
        Err(NormalizeError::Resolve {
            message: "no resolver in this test".to_string(),
        })
    }

    async fn upload_media(
        &self,
        _peer: Option<&Value>,
        _media: &Value,
    ) -> Result<Value, NormalizeError> {
        Err(NormalizeError::Upload {
            message: "no uploader in this test".to_string(),
        })
    }

    async fn upload_encrypted(&self, _file: &Value) -> Result<Value, NormalizeError> {
        Err(NormalizeError::Upload {
            message: "no uploader in this test".to_string(),
        })
    }
}

/// Everything a connection test needs, pre-wired.
pub struct Harness {
    pub network: MemNetwork,
    pub providers: FakeProviders,
    pub registry: Rc<RecordingRegistry>,
    pub session: Rc<RecordingSession>,
    pub schema: Rc<CountingSchema>,
    pub references: Rc<RecordingRefs>,
    pub connection: Rc<Connection<FakeProviders>>,
}

pub fn harness() -> Harness {
    harness_with_config(ConnectionConfig::default())
}

pub fn harness_with_config(config: ConnectionConfig) -> Harness {
    let network = MemNetwork::default();
    let providers = FakeProviders::new(network.clone());
    let registry = Rc::new(RecordingRegistry::default());
    let session = Rc::new(RecordingSession::default());
    let schema = Rc::new(CountingSchema::default());
    let references = Rc::new(RecordingRefs::default());
    let services = Services {
        registry: registry.clone(),
        session: session.clone(),
        schema: schema.clone(),
        references: references.clone(),
        env: Rc::new(PassiveEnv),
    };
    let connection = Rc::new(Connection::new(conn_id(), providers.clone(), config, services));
    Harness {
        network,
        providers,
        registry,
        session,
        schema,
        references,
        connection,
    }
}

pub fn conn_id() -> ConnId {
    ConnId::new(DcId::new(2), 0)
}

pub fn ctx() -> ConnectionContext {
    ConnectionContext::new(DcId::new(2), TransportKind::Tcp, "dc2.example.net:443")
}

pub fn http_ctx() -> ConnectionContext {
    ConnectionContext::new(DcId::new(2), TransportKind::Http, "dc2.example.net:80")
}
