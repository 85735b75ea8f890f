// Packet protection key derivation (RFC 9001 section 5.1).
//
// ```text
// key = HKDF-Expand-Label(secret, "quic key", "", key_len)
// iv  = HKDF-Expand-Label(secret, "quic iv",  "", 12)
// hp  = HKDF-Expand-Label(secret, "quic hp",  "", key_len)
// ```

use std::fmt;

use hkdf::Hkdf;
use sha2::{Sha256, Sha384};
use zeroize::Zeroizing;

use crate::crypto::aead::{Aead, CipherSuite, PacketAead, IV_LEN};
use crate::crypto::header::{AesHeaderCipher, ChaChaHeaderCipher, PacketNumberCipher};
use crate::error::{QuayTrustError, Result};

const LABEL_PREFIX: &str = "tls13 ";

/// TLS 1.3 HKDF-Expand-Label using `secret` directly as the PRK.
///
/// The hash is selected by `suite`; `secret` must be at least one hash
/// output long.
pub fn hkdf_expand_label(
    suite: CipherSuite,
    secret: &[u8],
    label: &str,
    context: &[u8],
    out: &mut [u8],
) -> Result<()> {
    let info = expand_label_info(label, context, out.len())?;
    match suite {
        CipherSuite::Aes256GcmSha384 => Hkdf::<Sha384>::from_prk(secret)
            .map_err(|e| QuayTrustError::KeyDerivation(format!("{label}: {e}")))?
            .expand(&info, out)
            .map_err(|e| QuayTrustError::KeyDerivation(format!("{label}: {e}"))),
        CipherSuite::Aes128GcmSha256 | CipherSuite::ChaCha20Poly1305Sha256 => {
            Hkdf::<Sha256>::from_prk(secret)
                .map_err(|e| QuayTrustError::KeyDerivation(format!("{label}: {e}")))?
                .expand(&info, out)
                .map_err(|e| QuayTrustError::KeyDerivation(format!("{label}: {e}")))
        }
    }
}

/// Build the HkdfLabel structure: u16 length, prefixed label, prefixed context.
fn expand_label_info(label: &str, context: &[u8], length: usize) -> Result<Vec<u8>> {
    let full_label_len = LABEL_PREFIX.len() + label.len();
    let length = u16::try_from(length)
        .map_err(|_| QuayTrustError::KeyDerivation(format!("output length {length} too large")))?;
    let label_len = u8::try_from(full_label_len)
        .map_err(|_| QuayTrustError::KeyDerivation(format!("label {label:?} too long")))?;
    let context_len = u8::try_from(context.len())
        .map_err(|_| QuayTrustError::KeyDerivation("context too long".into()))?;

    let mut info = Vec::with_capacity(2 + 1 + full_label_len + 1 + context.len());
    info.extend_from_slice(&length.to_be_bytes());
    info.push(label_len);
    info.extend_from_slice(LABEL_PREFIX.as_bytes());
    info.extend_from_slice(label.as_bytes());
    info.push(context_len);
    info.extend_from_slice(context);
    Ok(info)
}

/// Raw packet protection keys expanded from one traffic secret.
pub struct PacketKeys {
    pub suite: CipherSuite,
    pub key: Zeroizing<Vec<u8>>,
    pub iv: [u8; IV_LEN],
    pub hp: Zeroizing<Vec<u8>>,
}

/// Expand the AEAD key, IV and header protection key from a traffic secret.
pub fn derive_packet_keys(suite: CipherSuite, secret: &[u8]) -> Result<PacketKeys> {
    let mut key = Zeroizing::new(vec![0u8; suite.key_len()]);
    hkdf_expand_label(suite, secret, "quic key", &[], &mut key)?;

    let mut iv = [0u8; IV_LEN];
    hkdf_expand_label(suite, secret, "quic iv", &[], &mut iv)?;

    let mut hp = Zeroizing::new(vec![0u8; suite.key_len()]);
    hkdf_expand_label(suite, secret, "quic hp", &[], &mut hp)?;

    Ok(PacketKeys { suite, key, iv, hp })
}

/// An AEAD and its header protection cipher, derived together from one secret.
pub struct CipherPair {
    pub aead: Box<dyn Aead>,
    pub header_cipher: Box<dyn PacketNumberCipher>,
}

impl CipherPair {
    /// Split into the AEAD and the header cipher.
    pub fn into_parts(self) -> (Box<dyn Aead>, Box<dyn PacketNumberCipher>) {
        (self.aead, self.header_cipher)
    }
}

impl fmt::Debug for CipherPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherPair")
            .field("suite", &self.aead.suite())
            .field("hp_key_len", &self.header_cipher.key_len())
            .finish()
    }
}

/// Derive the (AEAD, header cipher) pair for `secret`.
pub fn derive_cipher_pair(suite: CipherSuite, secret: &[u8]) -> Result<CipherPair> {
    let keys = derive_packet_keys(suite, secret)?;
    let aead = PacketAead::new(suite, &keys.key, keys.iv)?;
    let header_cipher: Box<dyn PacketNumberCipher> = match suite {
        CipherSuite::ChaCha20Poly1305Sha256 => Box::new(ChaChaHeaderCipher::new(&keys.hp)?),
        CipherSuite::Aes128GcmSha256 | CipherSuite::Aes256GcmSha384 => {
            Box::new(AesHeaderCipher::new(&keys.hp)?)
        }
    };
    Ok(CipherPair {
        aead: Box::new(aead),
        header_cipher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_info_layout() {
        let info = expand_label_info("quic iv", &[], 12).unwrap();
        assert_eq!(&info[..2], &[0, 12]);
        assert_eq!(info[2] as usize, "tls13 quic iv".len());
        assert_eq!(&info[3..16], b"tls13 quic iv");
        assert_eq!(info[16], 0);
        assert_eq!(info.len(), 17);
    }

    #[test]
    fn short_secret_rejected() {
        let mut out = [0u8; 16];
        let err = hkdf_expand_label(CipherSuite::Aes128GcmSha256, &[0u8; 8], "quic key", &[], &mut out);
        assert!(matches!(err, Err(QuayTrustError::KeyDerivation(_))));
    }

    #[test]
    fn sha384_suite_needs_longer_secret() {
        assert!(derive_cipher_pair(CipherSuite::Aes256GcmSha384, &[1u8; 32]).is_err());
        let pair = derive_cipher_pair(CipherSuite::Aes256GcmSha384, &[1u8; 48]).unwrap();
        assert_eq!(pair.aead.suite(), CipherSuite::Aes256GcmSha384);
        assert_eq!(pair.header_cipher.key_len(), 32);
    }

    #[test]
    fn pair_members_share_a_secret() {
        let a = derive_packet_keys(CipherSuite::Aes128GcmSha256, &[5u8; 32]).unwrap();
        let b = derive_packet_keys(CipherSuite::Aes128GcmSha256, &[6u8; 32]).unwrap();
        assert_ne!(*a.key, *b.key);
        assert_ne!(*a.hp, *b.hp);
        assert_ne!(*a.key, *a.hp);
    }
}
