// QuayTrust - QUIC packet protection material
//
// Crate root: module declarations and public re-exports.

pub mod crypto;
pub mod error;

// Re-export key types at crate root for convenience.
pub use crypto::aead::{Aead, CipherSuite, PacketAead};
pub use crypto::header::{AesHeaderCipher, ChaChaHeaderCipher, PacketNumberCipher};
pub use crypto::kdf::{derive_cipher_pair, derive_packet_keys, hkdf_expand_label, CipherPair, PacketKeys};
pub use error::{QuayTrustError, Result};
