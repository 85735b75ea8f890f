// QuayTrust error types

use thiserror::Error;

/// Top-level error type for the QuayTrust crate.
#[derive(Debug, Error)]
pub enum QuayTrustError {
    // ── Key material ────────────────────────────────────────────────────
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("unsupported cipher suite: 0x{0:04x}")]
    UnsupportedSuite(u16),

    // ── Packet protection ───────────────────────────────────────────────
    #[error("AEAD encryption failed: {0}")]
    Encryption(String),

    #[error("AEAD decryption failed: {0}")]
    Decryption(String),

    #[error("header protection sample too short: need {need}, have {have}")]
    SampleTooShort { need: usize, have: usize },

    #[error("invalid packet number length: {0}")]
    InvalidPacketNumberLength(usize),
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, QuayTrustError>;
