//! The interface to the TLS 1.3 engine the driver feeds.
//!
//! The engine decides what the handshake means; the driver only moves
//! bytes in, applies the [`Action`]s the engine hands back, and installs
//! ciphers. A unit of engine work either completes inline
//! ([`AsyncActions::Ready`]) or hands back a future the driver resumes on
//! once it resolves ([`AsyncActions::Pending`]).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use quaytrust::{derive_cipher_pair, CipherPair, CipherSuite};
use zeroize::Zeroizing;

use crate::level::{EncryptionLevel, SecretKind};
use crate::transport_params::ServerTransportParameters;

/// Closure applied to the engine when its work completes.
pub type StateMutation<E> = Box<dyn FnOnce(&mut E) + Send>;

/// Future resolving to the actions of a deferred unit of work.
pub type ActionFuture<E> = Pin<Box<dyn Future<Output = Vec<Action<E>>> + Send + 'static>>;

/// Outcome of submitting a unit of work to the engine.
pub enum AsyncActions<E> {
    /// Completed inline.
    Ready(Vec<Action<E>>),
    /// Completes later, on whatever runtime polls the future.
    Pending(ActionFuture<E>),
}

impl<E> AsyncActions<E> {
    /// Convenience for engines that finished without doing anything visible.
    pub fn wait_for_data() -> Self {
        AsyncActions::Ready(vec![Action::WaitForData])
    }
}

impl<E> fmt::Debug for AsyncActions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsyncActions::Ready(actions) => f.debug_tuple("Ready").field(actions).finish(),
            AsyncActions::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// TLS record content type of an outbound write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
}

/// One chunk of an outbound flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteContent {
    pub level: EncryptionLevel,
    pub content_type: ContentType,
    pub data: Bytes,
}

impl WriteContent {
    /// A handshake-content chunk at `level`.
    pub fn handshake(level: EncryptionLevel, data: impl Into<Bytes>) -> Self {
        Self {
            level,
            content_type: ContentType::Handshake,
            data: data.into(),
        }
    }
}

/// Failure reported by the engine, with the alert it would have sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub message: String,
    pub alert: Option<u8>,
}

/// A traffic secret made available by the key schedule.
pub struct Secret {
    pub kind: SecretKind,
    pub secret: Zeroizing<Vec<u8>>,
}

impl Secret {
    pub fn new(kind: SecretKind, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            secret: Zeroizing::new(secret.into()),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("kind", &self.kind)
            .field("len", &self.secret.len())
            .finish()
    }
}

/// Request to issue a NewSessionTicket carrying an application token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteNewSessionTicket {
    pub app_token: Bytes,
}

/// A completed action handed back by the engine.
pub enum Action<E> {
    /// Application data on the crypto stream; never valid in QUIC.
    DeliverAppData(Bytes),
    WriteToSocket(Vec<WriteContent>),
    ReportEarlyHandshakeSuccess,
    ReportHandshakeSuccess,
    ReportError(EngineError),
    /// The engine cannot progress without more bytes from the peer.
    WaitForData,
    MutateState(StateMutation<E>),
    /// TLS version fallback; never valid in QUIC.
    AttemptVersionFallback,
    /// close_notify; never valid in QUIC.
    EndOfData,
    SecretAvailable(Secret),
}

impl<E> fmt::Debug for Action<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::DeliverAppData(data) => f.debug_tuple("DeliverAppData").field(&data.len()).finish(),
            Action::WriteToSocket(contents) => f.debug_tuple("WriteToSocket").field(contents).finish(),
            Action::ReportEarlyHandshakeSuccess => f.write_str("ReportEarlyHandshakeSuccess"),
            Action::ReportHandshakeSuccess => f.write_str("ReportHandshakeSuccess"),
            Action::ReportError(err) => f.debug_tuple("ReportError").field(err).finish(),
            Action::WaitForData => f.write_str("WaitForData"),
            Action::MutateState(_) => f.write_str("MutateState"),
            Action::AttemptVersionFallback => f.write_str("AttemptVersionFallback"),
            Action::EndOfData => f.write_str("EndOfData"),
            Action::SecretAvailable(secret) => f.debug_tuple("SecretAvailable").field(secret).finish(),
        }
    }
}

/// Decides whether a resumption ticket's application token is acceptable.
pub trait AppTokenValidator: Send + Sync {
    fn validate(&self, app_token: &[u8]) -> bool;
}

/// Installed when the owner supplies no validator: every token is refused,
/// so resumed handshakes fall back to a full one and 0-RTT is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectAllTokens;

impl AppTokenValidator for RejectAllTokens {
    fn validate(&self, _app_token: &[u8]) -> bool {
        false
    }
}

/// A server-side TLS 1.3 state machine.
///
/// Engines must return [`Action::WaitForData`] whenever they cannot make
/// progress with the bytes available; the driver keeps feeding the current
/// read level until they do.
pub trait ServerEngine: Send + Sized + 'static {
    /// One-time setup before the handshake starts.
    fn initialize(&mut self, validator: Box<dyn AppTokenValidator>);

    /// Encryption level the engine's read record layer currently expects.
    fn read_level(&self) -> EncryptionLevel;

    /// Start the handshake as a responder.
    fn accept(&mut self, params: Arc<ServerTransportParameters>) -> AsyncActions<Self>;

    /// Consume complete handshake messages from the front of `data`.
    /// Incomplete trailing bytes must be left in place.
    fn process_socket_data(&mut self, data: &mut BytesMut) -> AsyncActions<Self>;

    /// Encode and send a NewSessionTicket.
    fn write_new_session_ticket(&mut self, ticket: WriteNewSessionTicket) -> AsyncActions<Self>;

    /// Negotiated (or, before negotiation, preferred) cipher suite.
    fn cipher_suite(&self) -> CipherSuite {
        CipherSuite::Aes128GcmSha256
    }

    /// Derive the packet protection pair for a traffic secret.
    fn build_ciphers(&self, secret: &[u8]) -> quaytrust::Result<CipherPair> {
        derive_cipher_pair(self.cipher_suite(), secret)
    }

    /// Negotiated ALPN protocol, once known.
    fn application_protocol(&self) -> Option<&str> {
        None
    }
}
