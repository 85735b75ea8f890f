use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::level::EncryptionLevel;

/// TLS `internal_error` alert, used when the engine reports a failure without one.
pub const ALERT_INTERNAL_ERROR: u8 = 80;

/// QUIC transport error code (RFC 9000 section 20.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportErrorCode(pub u64);

impl TransportErrorCode {
    pub const NO_ERROR: Self = Self(0x00);
    pub const INTERNAL_ERROR: Self = Self(0x01);
    pub const PROTOCOL_VIOLATION: Self = Self(0x0a);
    pub const CRYPTO_BUFFER_EXCEEDED: Self = Self(0x0d);
    /// Base of the CRYPTO_ERROR range; the low byte carries the TLS alert.
    pub const CRYPTO_ERROR: Self = Self(0x100);

    /// CRYPTO_ERROR carrying the given TLS alert.
    pub fn crypto_error(alert: u8) -> Self {
        Self(Self::CRYPTO_ERROR.0 + u64::from(alert))
    }

    /// The TLS alert carried by a CRYPTO_ERROR code.
    pub fn tls_alert(self) -> Option<u8> {
        if (0x100..=0x1ff).contains(&self.0) {
            Some((self.0 - Self::CRYPTO_ERROR.0) as u8)
        } else {
            None
        }
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NO_ERROR => write!(f, "NO_ERROR"),
            Self::INTERNAL_ERROR => write!(f, "INTERNAL_ERROR"),
            Self::PROTOCOL_VIOLATION => write!(f, "PROTOCOL_VIOLATION"),
            Self::CRYPTO_BUFFER_EXCEEDED => write!(f, "CRYPTO_BUFFER_EXCEEDED"),
            code => match code.tls_alert() {
                Some(alert) => write!(f, "CRYPTO_ERROR(alert {alert})"),
                None => write!(f, "0x{:x}", code.0),
            },
        }
    }
}

/// All errors produced by the QuayShake handshake driver.
///
/// Every variant maps to a transport error code via [`HandshakeError::code`].
/// Once latched by the driver the same value is returned verbatim from every
/// later entry point, hence `Clone` and `PartialEq`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// Reported by the engine (malformed or rejected handshake messages).
    #[error("{message}")]
    Protocol {
        message: String,
        code: TransportErrorCode,
    },

    #[error("processing action while pending")]
    ActionPending,

    #[error("server cannot write early data")]
    EarlyDataWrite,

    #[error("crypto buffer exceeded at {level}: {buffered} bytes buffered, limit {limit}")]
    CryptoBufferExceeded {
        level: EncryptionLevel,
        buffered: usize,
        limit: usize,
    },

    #[error("connection released while handshake work was outstanding")]
    ConnectionReleased,

    #[error("{0}")]
    Internal(String),
}

impl HandshakeError {
    /// The transport error code the connection should close with.
    pub fn code(&self) -> TransportErrorCode {
        match self {
            HandshakeError::Protocol { code, .. } => *code,
            HandshakeError::CryptoBufferExceeded { .. } => TransportErrorCode::CRYPTO_BUFFER_EXCEEDED,
            HandshakeError::ActionPending
            | HandshakeError::EarlyDataWrite
            | HandshakeError::ConnectionReleased
            | HandshakeError::Internal(_) => TransportErrorCode::INTERNAL_ERROR,
        }
    }

    /// The human-readable half of the (message, code) pair.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, HandshakeError>;
