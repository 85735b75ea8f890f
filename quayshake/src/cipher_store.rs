//! Cipher material held by the driver until the transport takes it.
//!
//! Each slot holds at most one AEAD and one header cipher. Taking either
//! empties that half of the slot; a second take returns `None`.

use std::fmt;

use quaytrust::{Aead, CipherPair, PacketNumberCipher};

use crate::level::CipherKind;

#[derive(Default)]
struct CipherSlot {
    aead: Option<Box<dyn Aead>>,
    header_cipher: Option<Box<dyn PacketNumberCipher>>,
}

impl CipherSlot {
    fn fill(&mut self, pair: CipherPair) {
        let (aead, header_cipher) = pair.into_parts();
        self.aead = Some(aead);
        self.header_cipher = Some(header_cipher);
    }
}

impl fmt::Debug for CipherSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSlot")
            .field("aead", &self.aead.is_some())
            .field("header_cipher", &self.header_cipher.is_some())
            .finish()
    }
}

/// Read/write cipher pairs awaiting retrieval.
#[derive(Debug, Default)]
pub struct CipherStore {
    handshake_read: CipherSlot,
    one_rtt_read: CipherSlot,
    one_rtt_write: CipherSlot,
    zero_rtt_read: CipherSlot,
}

impl CipherStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, kind: CipherKind) -> Option<&mut CipherSlot> {
        match kind {
            CipherKind::HandshakeRead => Some(&mut self.handshake_read),
            CipherKind::OneRttRead => Some(&mut self.one_rtt_read),
            CipherKind::OneRttWrite => Some(&mut self.one_rtt_write),
            CipherKind::ZeroRttRead => Some(&mut self.zero_rtt_read),
            // Lives in the connection, see `ConnectionState::install_handshake_write`.
            CipherKind::HandshakeWrite => None,
        }
    }

    /// Store `pair` under `kind`, replacing anything not yet taken.
    ///
    /// Hands the pair back untouched for kinds this store has no slot for.
    pub fn install(&mut self, kind: CipherKind, pair: CipherPair) -> Option<CipherPair> {
        match self.slot_mut(kind) {
            Some(slot) => {
                slot.fill(pair);
                None
            }
            None => Some(pair),
        }
    }

    /// Take the AEAD stored under `kind`.
    pub fn take_aead(&mut self, kind: CipherKind) -> Option<Box<dyn Aead>> {
        self.slot_mut(kind).and_then(|slot| slot.aead.take())
    }

    /// Take the header cipher stored under `kind`.
    pub fn take_header_cipher(&mut self, kind: CipherKind) -> Option<Box<dyn PacketNumberCipher>> {
        self.slot_mut(kind).and_then(|slot| slot.header_cipher.take())
    }
}
