//! Cryptographic primitives for the framed stream.
//!
//! This module provides:
//! - AES-128-GCM / AES-256-GCM / ChaCha20-Poly1305 AEAD with chunk framing
//! - The legacy password KDF and the per-session HKDF-SHA1 subkey derivation
//! - Counter nonces, one per stream direction
//! - Secure random number generation
//!
//! All secret material is zeroized on drop to prevent memory leakage.

mod cipher;
mod kdf;
mod nonce;
mod random;

pub use cipher::{CipherKind, CipherState, SessionKey, LENGTH_BLOCK_SIZE, TAG_SIZE};
pub use kdf::{derive_session_key, evp_bytes_to_key, generate_salt};
pub use nonce::NonceCounter;
pub use random::SecureRandom;

/// Size of AEAD nonces in bytes (96 bits for all supported suites)
pub const NONCE_SIZE: usize = 12;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key_schedule_and_framing() {
        // Password to pre-shared key (done once per config)
        let psk = evp_bytes_to_key("correct horse", CipherKind::Aes256Gcm.key_len());

        // Per-connection salt and session subkey
        let salt = generate_salt(CipherKind::Aes256Gcm.salt_len());
        let key = derive_session_key(&psk, &salt).unwrap();

        // One cipher state per direction; counters advance independently
        let mut seal = CipherState::new(CipherKind::Aes256Gcm, &key).unwrap();
        let mut open = CipherState::new(CipherKind::Aes256Gcm, &key).unwrap();

        let chunk = seal.seal_chunk(b"through the tunnel").unwrap();
        let len = open.open_length(&chunk[..LENGTH_BLOCK_SIZE]).unwrap();
        let payload = open.open_payload(&chunk[LENGTH_BLOCK_SIZE..]).unwrap();

        assert_eq!(len, payload.len());
        assert_eq!(payload, b"through the tunnel");
    }
}
