// Packet payload protection (RFC 9001 section 5.3).
//
// Suite IDs are the TLS 1.3 cipher suite code points:
//   0x1301 TLS_AES_128_GCM_SHA256
//   0x1302 TLS_AES_256_GCM_SHA384
//   0x1303 TLS_CHACHA20_POLY1305_SHA256

// Both aes-gcm and chacha20poly1305 re-export the same `aead` traits.
// Import once from aes_gcm to avoid redundant imports.
use aes_gcm::aead::{Aead as RustCryptoAead, KeyInit, Nonce, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroizing;

use crate::error::{QuayTrustError, Result};

/// Length of the per-packet nonce and of the static IV it is derived from.
pub const IV_LEN: usize = 12;

/// Length of the authentication tag appended by every supported AEAD.
pub const TAG_LEN: usize = 16;

/// TLS 1.3 cipher suite negotiated by the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    /// TLS_AES_128_GCM_SHA256: suite ID 0x1301.
    Aes128GcmSha256,
    /// TLS_AES_256_GCM_SHA384: suite ID 0x1302.
    Aes256GcmSha384,
    /// TLS_CHACHA20_POLY1305_SHA256: suite ID 0x1303.
    ChaCha20Poly1305Sha256,
}

impl CipherSuite {
    /// Wire ID used during handshake negotiation.
    pub fn wire_id(self) -> u16 {
        match self {
            CipherSuite::Aes128GcmSha256 => 0x1301,
            CipherSuite::Aes256GcmSha384 => 0x1302,
            CipherSuite::ChaCha20Poly1305Sha256 => 0x1303,
        }
    }

    /// Resolve from a wire ID.
    pub fn from_wire_id(id: u16) -> Option<Self> {
        match id {
            0x1301 => Some(CipherSuite::Aes128GcmSha256),
            0x1302 => Some(CipherSuite::Aes256GcmSha384),
            0x1303 => Some(CipherSuite::ChaCha20Poly1305Sha256),
            _ => None,
        }
    }

    /// Length of the AEAD key and of the header protection key.
    pub fn key_len(self) -> usize {
        match self {
            CipherSuite::Aes128GcmSha256 => 16,
            CipherSuite::Aes256GcmSha384 | CipherSuite::ChaCha20Poly1305Sha256 => 32,
        }
    }

    /// Output length of the suite's hash, which is also the traffic secret length.
    pub fn hash_len(self) -> usize {
        match self {
            CipherSuite::Aes256GcmSha384 => 48,
            CipherSuite::Aes128GcmSha256 | CipherSuite::ChaCha20Poly1305Sha256 => 32,
        }
    }
}

/// Record protection for QUIC packet payloads.
///
/// The packet header is the associated data and the packet number selects
/// the nonce, so a sealed payload can only be opened under the same header.
pub trait Aead: Send + Sync {
    /// The suite this key was derived for.
    fn suite(&self) -> CipherSuite;

    /// Encrypt `plaintext`, returning ciphertext || tag.
    fn seal(&self, packet_number: u64, header: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt and authenticate `ciphertext` (which includes the tag).
    fn open(&self, packet_number: u64, header: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Number of bytes `seal` adds to the plaintext.
    fn tag_len(&self) -> usize {
        TAG_LEN
    }
}

/// Packet AEAD dispatching over the three supported suites.
pub struct PacketAead {
    suite: CipherSuite,
    key: Zeroizing<Vec<u8>>,
    iv: [u8; IV_LEN],
}

impl PacketAead {
    /// Create a packet AEAD from raw key and IV bytes.
    pub fn new(suite: CipherSuite, key: &[u8], iv: [u8; IV_LEN]) -> Result<Self> {
        if key.len() != suite.key_len() {
            return Err(QuayTrustError::InvalidKey(format!(
                "{suite:?} needs a {}-byte key, got {}",
                suite.key_len(),
                key.len()
            )));
        }
        Ok(Self {
            suite,
            key: Zeroizing::new(key.to_vec()),
            iv,
        })
    }

    /// The static IV the per-packet nonces are derived from.
    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    /// Nonce for `packet_number`: the IV XOR the left-padded big-endian number.
    pub fn nonce(&self, packet_number: u64) -> [u8; IV_LEN] {
        let mut nonce = self.iv;
        for (n, p) in nonce[IV_LEN - 8..].iter_mut().zip(packet_number.to_be_bytes()) {
            *n ^= p;
        }
        nonce
    }
}

impl Aead for PacketAead {
    fn suite(&self) -> CipherSuite {
        self.suite
    }

    fn seal(&self, packet_number: u64, header: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.nonce(packet_number);
        match self.suite {
            CipherSuite::Aes128GcmSha256 => seal_with::<Aes128Gcm>(&self.key, &nonce, header, plaintext),
            CipherSuite::Aes256GcmSha384 => seal_with::<Aes256Gcm>(&self.key, &nonce, header, plaintext),
            CipherSuite::ChaCha20Poly1305Sha256 => {
                seal_with::<ChaCha20Poly1305>(&self.key, &nonce, header, plaintext)
            }
        }
    }

    fn open(&self, packet_number: u64, header: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.nonce(packet_number);
        match self.suite {
            CipherSuite::Aes128GcmSha256 => open_with::<Aes128Gcm>(&self.key, &nonce, header, ciphertext),
            CipherSuite::Aes256GcmSha384 => open_with::<Aes256Gcm>(&self.key, &nonce, header, ciphertext),
            CipherSuite::ChaCha20Poly1305Sha256 => {
                open_with::<ChaCha20Poly1305>(&self.key, &nonce, header, ciphertext)
            }
        }
    }
}

fn seal_with<C>(key: &[u8], nonce: &[u8; IV_LEN], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>>
where
    C: RustCryptoAead + KeyInit,
{
    let cipher = C::new_from_slice(key)
        .map_err(|e| QuayTrustError::Encryption(format!("cipher init: {e}")))?;
    cipher
        .encrypt(Nonce::<C>::from_slice(nonce), Payload { msg, aad })
        .map_err(|e| QuayTrustError::Encryption(format!("{e}")))
}

fn open_with<C>(key: &[u8], nonce: &[u8; IV_LEN], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>>
where
    C: RustCryptoAead + KeyInit,
{
    if msg.len() < TAG_LEN {
        return Err(QuayTrustError::Decryption(format!(
            "ciphertext of {} bytes is shorter than the tag",
            msg.len()
        )));
    }
    let cipher = C::new_from_slice(key)
        .map_err(|e| QuayTrustError::Decryption(format!("cipher init: {e}")))?;
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), Payload { msg, aad })
        .map_err(|e| QuayTrustError::Decryption(format!("{e}")))
}
