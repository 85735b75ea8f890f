// Packet protection derivation checked against the RFC 9001 Appendix A vectors.

use quaytrust::crypto::header::{AesHeaderCipher, ChaChaHeaderCipher, PacketNumberCipher};
use quaytrust::{derive_cipher_pair, derive_packet_keys, Aead, CipherSuite, PacketAead};

fn hex(s: &str) -> Vec<u8> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

// ── RFC 9001 A.1: Initial keys ───────────────────────────────────────────

#[test]
fn client_initial_keys() {
    let secret = hex("c00cf151ca5be075ed0ebfb5c80323c4 2d6b7db67881289af4008f1f6c357aea");
    let keys = derive_packet_keys(CipherSuite::Aes128GcmSha256, &secret).unwrap();
    assert_eq!(*keys.key, hex("1f369613dd76d5467730efcbe3b1a22d"));
    assert_eq!(keys.iv.to_vec(), hex("fa044b2f42a3fd3b46fb255c"));
    assert_eq!(*keys.hp, hex("9f50449e04a0e810283a1e9933adedd2"));
}

#[test]
fn server_initial_keys() {
    let secret = hex("3c199828fd139efd216c155ad844cc81 fb82fa8d7446fa7d78be803acdda951b");
    let keys = derive_packet_keys(CipherSuite::Aes128GcmSha256, &secret).unwrap();
    assert_eq!(*keys.key, hex("cf3a5331653c364c88f0f379b6067e37"));
    assert_eq!(keys.iv.to_vec(), hex("0ac1493ca1905853b0bba03e"));
    assert_eq!(*keys.hp, hex("c206b8d9b9f0f37644430b490eeaa314"));
}

// ── RFC 9001 A.2: client Initial header protection ──────────────────────

#[test]
fn client_initial_header_mask() {
    let hp = AesHeaderCipher::new(&hex("9f50449e04a0e810283a1e9933adedd2")).unwrap();
    let mask = hp.mask(&hex("d1b1c98dd7689fb8ec11d242b123dc9b")).unwrap();
    assert_eq!(mask.to_vec(), hex("437b9aec36"));
}

// ── RFC 9001 A.5: ChaCha20-Poly1305 short header packet ─────────────────

const CHACHA_SECRET: &str = "9ac312a7f877468ebe69422748ad00a1 5443f18203a07d6060f688f30f21632b";

#[test]
fn chacha_keys() {
    let keys = derive_packet_keys(CipherSuite::ChaCha20Poly1305Sha256, &hex(CHACHA_SECRET)).unwrap();
    assert_eq!(
        *keys.key,
        hex("c6d98ff3441c3fe1b2182094f69caa2e d4b716b65488960a7a984979fb23e1c8")
    );
    assert_eq!(keys.iv.to_vec(), hex("e0459b3474bdd0e44a41c144"));
    assert_eq!(
        *keys.hp,
        hex("25a282b9e82f06f21f488917a4fc8f1b 73573685608597d0efcb076b0ab7a7a4")
    );
}

#[test]
fn chacha_nonce_for_packet_number() {
    let keys = derive_packet_keys(CipherSuite::ChaCha20Poly1305Sha256, &hex(CHACHA_SECRET)).unwrap();
    let aead = PacketAead::new(keys.suite, &keys.key, keys.iv).unwrap();
    assert_eq!(aead.nonce(654_360_564).to_vec(), hex("e0459b3474bdd0e46d417eb0"));
}

#[test]
fn chacha_short_header_packet() {
    let pair = derive_cipher_pair(CipherSuite::ChaCha20Poly1305Sha256, &hex(CHACHA_SECRET)).unwrap();
    let header = hex("4200bff4");

    let payload = pair.aead.seal(654_360_564, &header, &hex("01")).unwrap();
    assert_eq!(payload, hex("655e5cd55c41f69080575d7999c25a5bfb"));

    // Sample starts four bytes past the packet number offset.
    let mut packet = header.clone();
    packet.extend_from_slice(&payload);
    let sample = packet[5..21].to_vec();
    assert_eq!(sample, hex("5e5cd55c41f69080575d7999c25a5bfb"));

    let mut first = packet[0];
    pair.header_cipher
        .protect_header(&sample, &mut first, &mut packet[1..4])
        .unwrap();
    packet[0] = first;
    assert_eq!(packet, hex("4cfe4189655e5cd55c41f69080575d7999c25a5bfb"));

    // And back again.
    let mut first = packet[0];
    let pn_len = pair
        .header_cipher
        .unprotect_header(&sample, &mut first, &mut packet[1..5])
        .unwrap();
    assert_eq!(pn_len, 3);
    assert_eq!(first, 0x42);
    assert_eq!(&packet[1..4], &hex("00bff4")[..]);
    assert_eq!(pair.aead.open(654_360_564, &header, &payload).unwrap(), hex("01"));
}

#[test]
fn chacha_header_mask() {
    let hp = ChaChaHeaderCipher::new(&hex(
        "25a282b9e82f06f21f488917a4fc8f1b 73573685608597d0efcb076b0ab7a7a4",
    ))
    .unwrap();
    let mask = hp.mask(&hex("5e5cd55c41f69080575d7999c25a5bfb")).unwrap();
    assert_eq!(mask.to_vec(), hex("aefefe7d03"));
}

// ── Pair behaviour ──────────────────────────────────────────────────────

#[test]
fn pair_from_same_secret_interoperates() {
    let secret = [0x33u8; 32];
    let sender = derive_cipher_pair(CipherSuite::Aes128GcmSha256, &secret).unwrap();
    let receiver = derive_cipher_pair(CipherSuite::Aes128GcmSha256, &secret).unwrap();

    let ct = sender.aead.seal(7, b"hdr", b"handshake flight").unwrap();
    assert_eq!(receiver.aead.open(7, b"hdr", &ct).unwrap(), b"handshake flight");

    let sample = [0xa5u8; 16];
    assert_eq!(
        sender.header_cipher.mask(&sample).unwrap(),
        receiver.header_cipher.mask(&sample).unwrap()
    );
}

#[test]
fn pair_from_different_secret_rejects() {
    let a = derive_cipher_pair(CipherSuite::ChaCha20Poly1305Sha256, &[1u8; 32]).unwrap();
    let b = derive_cipher_pair(CipherSuite::ChaCha20Poly1305Sha256, &[2u8; 32]).unwrap();
    let ct = a.aead.seal(0, b"", b"data").unwrap();
    assert!(b.aead.open(0, b"", &ct).is_err());
}
