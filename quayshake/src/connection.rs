//! The connection object the handshake driver writes into.
//!
//! The driver only needs two things from a connection: the slots for the
//! handshake write cipher pair, which the packet send path reads before
//! any retrieval call could happen, and the outbound crypto stream of each
//! encryption level. Both sit behind one lock since the connection is
//! shared with the transport.

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use quaytrust::{Aead, CipherPair, PacketNumberCipher};

use crate::level::EncryptionLevel;

/// Outbound handshake bytes at a stream offset, ready to go into a CRYPTO frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoFrame {
    pub offset: u64,
    pub data: Bytes,
}

/// One outbound crypto stream.
#[derive(Debug, Default)]
pub struct CryptoStream {
    /// Offset the next write starts at.
    write_offset: u64,
    /// Written but not yet handed to the packet builder.
    pending: Vec<CryptoFrame>,
}

impl CryptoStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` at the current write offset.
    pub fn write(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        let len = data.len() as u64;
        self.pending.push(CryptoFrame {
            offset: self.write_offset,
            data,
        });
        self.write_offset += len;
    }

    /// Offset the next write starts at (total bytes ever written).
    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    /// Bytes written but not yet drained.
    pub fn pending_len(&self) -> usize {
        self.pending.iter().map(|f| f.data.len()).sum()
    }

    /// Hand all pending frames to the packet builder.
    pub fn drain_frames(&mut self) -> Vec<CryptoFrame> {
        std::mem::take(&mut self.pending)
    }
}

/// Crypto streams of a connection, one per packet number space.
#[derive(Debug, Default)]
pub struct CryptoState {
    pub initial: CryptoStream,
    pub handshake: CryptoStream,
    pub one_rtt: CryptoStream,
}

impl CryptoState {
    /// Stream for `level`. There is no early-data crypto stream.
    pub fn stream_mut(&mut self, level: EncryptionLevel) -> Option<&mut CryptoStream> {
        match level {
            EncryptionLevel::Initial => Some(&mut self.initial),
            EncryptionLevel::Handshake => Some(&mut self.handshake),
            EncryptionLevel::AppData => Some(&mut self.one_rtt),
            EncryptionLevel::EarlyData => None,
        }
    }
}

/// Mutable connection state touched by the handshake driver.
#[derive(Default)]
pub struct ConnectionState {
    pub handshake_write_cipher: Option<Box<dyn Aead>>,
    pub handshake_write_header_cipher: Option<Box<dyn PacketNumberCipher>>,
    pub crypto: CryptoState,
}

impl ConnectionState {
    /// Install both members of the handshake write pair.
    pub fn install_handshake_write(&mut self, pair: CipherPair) {
        let (aead, header_cipher) = pair.into_parts();
        self.handshake_write_cipher = Some(aead);
        self.handshake_write_header_cipher = Some(header_cipher);
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("handshake_write_cipher", &self.handshake_write_cipher.is_some())
            .field(
                "handshake_write_header_cipher",
                &self.handshake_write_header_cipher.is_some(),
            )
            .field("crypto", &self.crypto)
            .finish()
    }
}

/// A QUIC connection as seen by the handshake driver.
#[derive(Debug, Default)]
pub struct Connection {
    state: Mutex<ConnectionState>,
}

impl Connection {
    /// Create a connection, shared with the transport.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lock the connection state.
    ///
    /// The handshake driver takes this lock while holding its own, so it
    /// must not be held across a call into `ServerHandshake`. Not reentrant.
    pub fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock()
    }
}

/// An owning reference that keeps the connection alive while handshake
/// work referencing it is outstanding. Released by dropping it.
pub struct KeepAlive(Arc<Connection>);

impl KeepAlive {
    /// Upgrade the driver's weak reference; `None` once the owner has let go.
    pub(crate) fn acquire(conn: &Weak<Connection>) -> Option<Self> {
        conn.upgrade().map(Self)
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.0
    }
}

impl fmt::Debug for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeepAlive").finish()
    }
}
