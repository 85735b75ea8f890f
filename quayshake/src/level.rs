//! Encryption levels, cipher destinations and handshake phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Encryption level a range of handshake bytes belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionLevel {
    Initial,
    Handshake,
    EarlyData,
    AppData,
}

impl fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionLevel::Initial => write!(f, "Initial"),
            EncryptionLevel::Handshake => write!(f, "Handshake"),
            EncryptionLevel::EarlyData => write!(f, "EarlyData"),
            EncryptionLevel::AppData => write!(f, "AppData"),
        }
    }
}

/// Destination of a derived cipher pair.
///
/// `HandshakeWrite` goes straight into the connection because the packet
/// send path needs it before anyone could ask for it; every other kind is
/// held by the driver until taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherKind {
    HandshakeRead,
    HandshakeWrite,
    OneRttRead,
    OneRttWrite,
    ZeroRttRead,
}

/// Where the TLS exchange stands, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Server flight not yet complete.
    #[default]
    Handshake,
    /// 1-RTT write keys (and 0-RTT read keys, if any) are available.
    KeysDerived,
    /// Client Finished received and verified.
    Established,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Handshake => write!(f, "Handshake"),
            Phase::KeysDerived => write!(f, "KeysDerived"),
            Phase::Established => write!(f, "Established"),
        }
    }
}

/// TLS 1.3 secret announced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    ClientEarlyTraffic,
    EarlyExporterMaster,
    ClientHandshakeTraffic,
    ServerHandshakeTraffic,
    ClientAppTraffic,
    ServerAppTraffic,
    ExporterMaster,
    ResumptionMaster,
}

impl SecretKind {
    /// The cipher a server derives from this secret, if any.
    pub fn cipher_kind(self) -> Option<CipherKind> {
        match self {
            SecretKind::ClientEarlyTraffic => Some(CipherKind::ZeroRttRead),
            SecretKind::ClientHandshakeTraffic => Some(CipherKind::HandshakeRead),
            SecretKind::ServerHandshakeTraffic => Some(CipherKind::HandshakeWrite),
            SecretKind::ClientAppTraffic => Some(CipherKind::OneRttRead),
            SecretKind::ServerAppTraffic => Some(CipherKind::OneRttWrite),
            SecretKind::EarlyExporterMaster
            | SecretKind::ExporterMaster
            | SecretKind::ResumptionMaster => None,
        }
    }
}
