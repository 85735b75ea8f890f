// Header protection (RFC 9001 section 5.4).
//
// QUIC masks the low bits of the first header byte and the packet number
// bytes with a mask computed from a 16-byte sample of the protected
// payload. Long headers mask 4 bits of the first byte, short headers 5.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::ChaCha20;
use zeroize::Zeroizing;

use crate::error::{QuayTrustError, Result};

/// Number of payload bytes sampled to compute the mask.
pub const SAMPLE_LEN: usize = 16;

/// Number of mask bytes used: one for the first byte, four for the packet number.
pub const MASK_LEN: usize = 5;

const LONG_HEADER_FORM: u8 = 0x80;

/// Packet number / header protection cipher.
pub trait PacketNumberCipher: Send + Sync {
    /// Compute the 5-byte mask from a sample of at least 16 bytes.
    fn mask(&self, sample: &[u8]) -> Result<[u8; MASK_LEN]>;

    /// Length of the key this cipher was built from.
    fn key_len(&self) -> usize;

    /// Protect an outgoing header in place.
    ///
    /// `first_byte` must still be unprotected so the packet number length
    /// can be read from it; `packet_number` holds at least that many bytes.
    fn protect_header(
        &self,
        sample: &[u8],
        first_byte: &mut u8,
        packet_number: &mut [u8],
    ) -> Result<()> {
        let mask = self.mask(sample)?;
        let pn_len = packet_number_len(*first_byte);
        if packet_number.len() < pn_len {
            return Err(QuayTrustError::InvalidPacketNumberLength(packet_number.len()));
        }
        *first_byte ^= mask[0] & protected_bits(*first_byte);
        for (b, m) in packet_number[..pn_len].iter_mut().zip(&mask[1..]) {
            *b ^= m;
        }
        Ok(())
    }

    /// Remove protection from an incoming header in place.
    ///
    /// Returns the packet number length learned from the unmasked first
    /// byte. Only that many bytes of `packet_number` are unmasked.
    fn unprotect_header(
        &self,
        sample: &[u8],
        first_byte: &mut u8,
        packet_number: &mut [u8],
    ) -> Result<usize> {
        let mask = self.mask(sample)?;
        // The form bit is never masked, so the bit count is known up front.
        *first_byte ^= mask[0] & protected_bits(*first_byte);
        let pn_len = packet_number_len(*first_byte);
        if packet_number.len() < pn_len {
            return Err(QuayTrustError::InvalidPacketNumberLength(packet_number.len()));
        }
        for (b, m) in packet_number[..pn_len].iter_mut().zip(&mask[1..]) {
            *b ^= m;
        }
        Ok(pn_len)
    }
}

fn protected_bits(first_byte: u8) -> u8 {
    if first_byte & LONG_HEADER_FORM != 0 {
        0x0f
    } else {
        0x1f
    }
}

fn packet_number_len(first_byte: u8) -> usize {
    usize::from(first_byte & 0x03) + 1
}

fn check_sample(sample: &[u8]) -> Result<()> {
    if sample.len() < SAMPLE_LEN {
        return Err(QuayTrustError::SampleTooShort {
            need: SAMPLE_LEN,
            have: sample.len(),
        });
    }
    Ok(())
}

enum AesBlockCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

/// AES-ECB header protection, used by both AES-GCM suites.
pub struct AesHeaderCipher {
    cipher: AesBlockCipher,
    key_len: usize,
}

impl AesHeaderCipher {
    /// Build from a 16-byte (AES-128) or 32-byte (AES-256) key.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = match key.len() {
            16 => AesBlockCipher::Aes128(
                Aes128::new_from_slice(key)
                    .map_err(|e| QuayTrustError::InvalidKey(format!("aes-128 hp: {e}")))?,
            ),
            32 => AesBlockCipher::Aes256(
                Aes256::new_from_slice(key)
                    .map_err(|e| QuayTrustError::InvalidKey(format!("aes-256 hp: {e}")))?,
            ),
            other => {
                return Err(QuayTrustError::InvalidKey(format!(
                    "aes header protection key must be 16 or 32 bytes, got {other}"
                )))
            }
        };
        Ok(Self {
            cipher,
            key_len: key.len(),
        })
    }
}

impl PacketNumberCipher for AesHeaderCipher {
    fn mask(&self, sample: &[u8]) -> Result<[u8; MASK_LEN]> {
        check_sample(sample)?;
        let mut block = aes::Block::clone_from_slice(&sample[..SAMPLE_LEN]);
        match &self.cipher {
            AesBlockCipher::Aes128(c) => c.encrypt_block(&mut block),
            AesBlockCipher::Aes256(c) => c.encrypt_block(&mut block),
        }
        let mut mask = [0u8; MASK_LEN];
        mask.copy_from_slice(&block[..MASK_LEN]);
        Ok(mask)
    }

    fn key_len(&self) -> usize {
        self.key_len
    }
}

/// ChaCha20 header protection, used by the ChaCha20-Poly1305 suite.
pub struct ChaChaHeaderCipher {
    key: Zeroizing<[u8; 32]>,
}

impl ChaChaHeaderCipher {
    /// Build from a 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; 32] = key.try_into().map_err(|_| {
            QuayTrustError::InvalidKey(format!(
                "chacha20 header protection key must be 32 bytes, got {}",
                key.len()
            ))
        })?;
        Ok(Self {
            key: Zeroizing::new(key),
        })
    }
}

impl PacketNumberCipher for ChaChaHeaderCipher {
    fn mask(&self, sample: &[u8]) -> Result<[u8; MASK_LEN]> {
        check_sample(sample)?;
        let counter = u32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&sample[4..SAMPLE_LEN]);

        let key: &[u8; 32] = &self.key;
        let mut cipher = ChaCha20::new(key.into(), (&nonce).into());
        cipher.seek(u64::from(counter) * 64);

        let mut mask = [0u8; MASK_LEN];
        cipher.apply_keystream(&mut mask);
        Ok(mask)
    }

    fn key_len(&self) -> usize {
        32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sample_rejected() {
        let hp = AesHeaderCipher::new(&[1u8; 16]).unwrap();
        assert!(matches!(
            hp.mask(&[0u8; 8]),
            Err(QuayTrustError::SampleTooShort { need: 16, have: 8 })
        ));
    }

    #[test]
    fn aes_key_length_checked() {
        assert!(AesHeaderCipher::new(&[0u8; 24]).is_err());
        assert_eq!(AesHeaderCipher::new(&[0u8; 32]).unwrap().key_len(), 32);
    }

    #[test]
    fn long_header_roundtrip() {
        let hp = AesHeaderCipher::new(&[9u8; 16]).unwrap();
        let sample = [0x5au8; 16];
        let mut first = 0xc3u8; // long header, 4-byte packet number
        let mut pn = [1u8, 2, 3, 4];
        hp.protect_header(&sample, &mut first, &mut pn).unwrap();
        assert_eq!(first & 0xf0, 0xc0, "upper nibble is never masked");

        let len = hp.unprotect_header(&sample, &mut first, &mut pn).unwrap();
        assert_eq!(len, 4);
        assert_eq!(first, 0xc3);
        assert_eq!(pn, [1, 2, 3, 4]);
    }

    #[test]
    fn short_header_leaves_trailing_bytes() {
        let hp = ChaChaHeaderCipher::new(&[3u8; 32]).unwrap();
        let sample = [0x11u8; 16];
        let mut first = 0x40u8; // short header, 1-byte packet number
        let mut pn = [7u8, 8, 9, 10];
        hp.protect_header(&sample, &mut first, &mut pn).unwrap();
        assert_eq!(&pn[1..], &[8, 9, 10]);

        let len = hp.unprotect_header(&sample, &mut first, &mut pn).unwrap();
        assert_eq!(len, 1);
        assert_eq!(first, 0x40);
        assert_eq!(pn, [7, 8, 9, 10]);
    }

    #[test]
    fn packet_number_buffer_too_small() {
        let hp = AesHeaderCipher::new(&[9u8; 16]).unwrap();
        let mut first = 0xc3u8;
        let mut pn = [0u8; 2];
        assert!(hp.protect_header(&[0u8; 16], &mut first, &mut pn).is_err());
    }
}
