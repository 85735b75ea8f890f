//! QuayShake -- server-side QUIC handshake driver.
//!
//! Bridges a QUIC connection to a TLS 1.3 engine:
//! - **Read buffers**: inbound crypto data accumulated per encryption level
//! - **Driver**: feeds the engine, applies its actions, one unit of work in flight
//! - **Cipher store**: packet and header ciphers installed as secrets arrive, taken once
//! - **Notifications**: the owner is called back when new output or keys are ready

pub mod buffers;
pub mod cipher_store;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod level;
pub mod transport_params;

// Re-export key public types at crate root.
pub use buffers::ReadBuffers;
pub use cipher_store::CipherStore;
pub use config::HandshakeConfig;
pub use connection::{Connection, ConnectionState, CryptoFrame, CryptoStream, KeepAlive};
pub use engine::{
    Action, ActionFuture, AppTokenValidator, AsyncActions, ContentType, EngineError,
    RejectAllTokens, Secret, ServerEngine, StateMutation, WriteContent, WriteNewSessionTicket,
};
pub use error::{HandshakeError, Result, TransportErrorCode};
pub use handshake::{HandshakeCallback, ServerHandshake};
pub use level::{CipherKind, EncryptionLevel, Phase, SecretKind};
pub use transport_params::{ClientTransportParameters, ServerTransportParameters, TransportParameter};
