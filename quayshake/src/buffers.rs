//! Per-level accumulators for inbound handshake bytes.
//!
//! Bytes are appended by the transport and drained front-to-back by the
//! engine, only while the engine reads at that level. Early data and
//! application data share one accumulator.

use bytes::{Bytes, BytesMut};

use crate::error::{HandshakeError, Result};
use crate::level::EncryptionLevel;

/// Inbound handshake bytes not yet consumed by the engine.
#[derive(Debug)]
pub struct ReadBuffers {
    initial: BytesMut,
    handshake: BytesMut,
    app_data: BytesMut,
    /// Per-level bound on buffered bytes.
    limit: usize,
}

impl ReadBuffers {
    /// Create empty buffers holding at most `limit` bytes per level.
    pub fn new(limit: usize) -> Self {
        Self {
            initial: BytesMut::new(),
            handshake: BytesMut::new(),
            app_data: BytesMut::new(),
            limit,
        }
    }

    /// Append `data` behind whatever is already queued for `level`.
    ///
    /// Nothing is appended if the result would exceed the limit.
    pub fn append(&mut self, level: EncryptionLevel, data: Bytes) -> Result<()> {
        let limit = self.limit;
        let buf = self.get_mut(level);
        let buffered = buf.len() + data.len();
        if buffered > limit {
            return Err(HandshakeError::CryptoBufferExceeded {
                level,
                buffered,
                limit,
            });
        }
        buf.extend_from_slice(&data);
        Ok(())
    }

    /// The accumulator for `level`, for the engine to consume from.
    pub fn get_mut(&mut self, level: EncryptionLevel) -> &mut BytesMut {
        match level {
            EncryptionLevel::Initial => &mut self.initial,
            EncryptionLevel::Handshake => &mut self.handshake,
            EncryptionLevel::EarlyData | EncryptionLevel::AppData => &mut self.app_data,
        }
    }

    /// Number of bytes queued for `level`.
    pub fn len(&self, level: EncryptionLevel) -> usize {
        match level {
            EncryptionLevel::Initial => self.initial.len(),
            EncryptionLevel::Handshake => self.handshake.len(),
            EncryptionLevel::EarlyData | EncryptionLevel::AppData => self.app_data.len(),
        }
    }

    /// Whether every level is drained.
    pub fn is_empty(&self) -> bool {
        self.initial.is_empty() && self.handshake.is_empty() && self.app_data.is_empty()
    }
}
