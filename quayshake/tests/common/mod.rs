//! Shared fixtures: a scripted engine and a counting owner callback.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

use quayshake::{
    Action, AppTokenValidator, AsyncActions, Connection, EncryptionLevel, EngineError,
    HandshakeCallback, HandshakeConfig, Secret, SecretKind, ServerEngine, ServerHandshake,
    ServerTransportParameters, WriteContent, WriteNewSessionTicket,
};

pub type Actions = Vec<Action<ScriptedEngine>>;

/// What the engine answers with for one unit of work.
pub enum Reply {
    Ready(Actions),
    Deferred(oneshot::Receiver<Actions>),
}

/// A reply that completes when the returned sender fires.
pub fn deferred() -> (Reply, oneshot::Sender<Actions>) {
    let (tx, rx) = oneshot::channel();
    (Reply::Deferred(rx), tx)
}

#[derive(Default)]
struct ScriptState {
    accept_replies: VecDeque<Reply>,
    data_replies: VecDeque<Reply>,
    ticket_replies: VecDeque<Reply>,
    reads: Vec<(EncryptionLevel, Bytes)>,
    accepts: usize,
    tickets: Vec<Bytes>,
    validator: Option<Box<dyn AppTokenValidator>>,
}

/// Test-side handle onto the engine's script and log.
#[derive(Clone, Default)]
pub struct Script(Arc<Mutex<ScriptState>>);

impl Script {
    pub fn on_accept(&self, reply: Reply) {
        self.0.lock().accept_replies.push_back(reply);
    }

    pub fn on_data(&self, reply: Reply) {
        self.0.lock().data_replies.push_back(reply);
    }

    pub fn on_ticket(&self, reply: Reply) {
        self.0.lock().ticket_replies.push_back(reply);
    }

    /// Every chunk the engine consumed, in order.
    pub fn reads(&self) -> Vec<(EncryptionLevel, Bytes)> {
        self.0.lock().reads.clone()
    }

    pub fn accepts(&self) -> usize {
        self.0.lock().accepts
    }

    pub fn tickets(&self) -> Vec<Bytes> {
        self.0.lock().tickets.clone()
    }

    /// Run the validator the driver installed, if any.
    pub fn validate(&self, token: &[u8]) -> Option<bool> {
        self.0.lock().validator.as_ref().map(|v| v.validate(token))
    }
}

/// Engine that consumes whatever is buffered and answers from a script.
/// With nothing buffered, or nothing scripted, it waits for data.
pub struct ScriptedEngine {
    pub level: EncryptionLevel,
    pub alpn: Option<String>,
    script: Script,
}

impl ScriptedEngine {
    pub fn new() -> (Self, Script) {
        let script = Script::default();
        let engine = Self {
            level: EncryptionLevel::Initial,
            alpn: None,
            script: script.clone(),
        };
        (engine, script)
    }

    fn resolve(reply: Option<Reply>, fallback: Actions) -> AsyncActions<Self> {
        match reply {
            Some(Reply::Ready(actions)) => AsyncActions::Ready(actions),
            Some(Reply::Deferred(rx)) => AsyncActions::Pending(Box::pin(async move {
                rx.await.unwrap_or_else(|_| {
                    vec![Action::ReportError(EngineError {
                        message: "script dropped".into(),
                        alert: None,
                    })]
                })
            })),
            None => AsyncActions::Ready(fallback),
        }
    }
}

impl ServerEngine for ScriptedEngine {
    fn initialize(&mut self, validator: Box<dyn AppTokenValidator>) {
        self.script.0.lock().validator = Some(validator);
    }

    fn read_level(&self) -> EncryptionLevel {
        self.level
    }

    fn accept(&mut self, _params: Arc<ServerTransportParameters>) -> AsyncActions<Self> {
        let reply = {
            let mut state = self.script.0.lock();
            state.accepts += 1;
            state.accept_replies.pop_front()
        };
        Self::resolve(reply, Vec::new())
    }

    fn process_socket_data(&mut self, data: &mut BytesMut) -> AsyncActions<Self> {
        if data.is_empty() {
            return AsyncActions::wait_for_data();
        }
        let chunk = data.split().freeze();
        let reply = {
            let mut state = self.script.0.lock();
            state.reads.push((self.level, chunk));
            state.data_replies.pop_front()
        };
        Self::resolve(reply, vec![Action::WaitForData])
    }

    fn write_new_session_ticket(&mut self, ticket: WriteNewSessionTicket) -> AsyncActions<Self> {
        let reply = {
            let mut state = self.script.0.lock();
            state.tickets.push(ticket.app_token.clone());
            state.ticket_replies.pop_front()
        };
        let flight = vec![Action::WriteToSocket(vec![WriteContent::handshake(
            EncryptionLevel::AppData,
            ticket.app_token,
        )])];
        Self::resolve(reply, flight)
    }

    fn application_protocol(&self) -> Option<&str> {
        self.alpn.as_deref()
    }
}

/// Switch the engine's read level once the actions are applied.
pub fn advance_to(level: EncryptionLevel) -> Action<ScriptedEngine> {
    Action::MutateState(Box::new(move |engine: &mut ScriptedEngine| engine.level = level))
}

pub fn secret(kind: SecretKind, seed: u8) -> Action<ScriptedEngine> {
    Action::SecretAvailable(Secret::new(kind, vec![seed; 32]))
}

pub fn flight(level: EncryptionLevel, data: &'static [u8]) -> Action<ScriptedEngine> {
    Action::WriteToSocket(vec![WriteContent::handshake(level, data)])
}

/// Owner callback that counts notifications.
#[derive(Default)]
pub struct CountingCallback {
    count: AtomicUsize,
    notify: Notify,
}

impl CountingCallback {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

impl HandshakeCallback for CountingCallback {
    fn on_crypto_event_available(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

pub struct Harness {
    pub conn: Arc<Connection>,
    pub handshake: ServerHandshake<ScriptedEngine>,
    pub callback: Arc<CountingCallback>,
    pub script: Script,
}

pub fn harness() -> Harness {
    harness_with(HandshakeConfig::default())
}

/// An initialized driver over a fresh connection.
pub fn harness_with(config: HandshakeConfig) -> Harness {
    let (engine, script) = ScriptedEngine::new();
    let conn = Connection::new();
    let handshake = ServerHandshake::new(&conn, engine, config);
    let callback = Arc::new(CountingCallback::default());
    handshake.initialize(callback.clone(), None);
    Harness {
        conn,
        handshake,
        callback,
        script,
    }
}

pub fn params() -> Arc<ServerTransportParameters> {
    Arc::new(ServerTransportParameters::new(Vec::new()))
}

/// Bytes written so far to the connection's crypto stream at `level`.
pub fn written(conn: &Connection, level: EncryptionLevel) -> Vec<Bytes> {
    let mut state = conn.lock();
    match state.crypto.stream_mut(level) {
        Some(stream) => stream.drain_frames().into_iter().map(|f| f.data).collect(),
        None => Vec::new(),
    }
}
