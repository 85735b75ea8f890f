// Packet protection primitives: AEAD, header protection, key derivation.

pub mod aead;
pub mod header;
pub mod kdf;
