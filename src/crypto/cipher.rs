//! AEAD suites and chunk framing.
//!
//! Every chunk on the wire is two AEAD operations with empty associated
//! data:
//!
//! ```text
//! [ len_ct (2) | len_tag (16) | payload_ct (1..=16384) | payload_tag (16) ]
//! ```
//!
//! The length prefix is a big-endian `u16` capped at 0x4000; the nonce for
//! each operation comes from the direction's [`NonceCounter`]. A tag failure
//! on either block is fatal and never surfaces partial plaintext.

use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::{
    aead::{Aead as AeadTrait, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{NonceCounter, NONCE_SIZE};
use crate::error::{Error, Result};
use crate::MAX_CHUNK_PAYLOAD;

/// Size of AEAD authentication tags in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Bytes occupied on the wire by the encrypted length prefix.
pub const LENGTH_BLOCK_SIZE: usize = 2 + TAG_SIZE;

/// The AEAD suite protecting a framed stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherKind {
    /// AES-128 in Galois/Counter Mode
    Aes128Gcm,
    /// AES-256 in Galois/Counter Mode
    Aes256Gcm,
    /// ChaCha20-Poly1305 (IETF variant, 96-bit nonce)
    ChaCha20Poly1305,
}

impl CipherKind {
    /// Symmetric key length for this suite.
    pub const fn key_len(self) -> usize {
        match self {
            CipherKind::Aes128Gcm => 16,
            CipherKind::Aes256Gcm | CipherKind::ChaCha20Poly1305 => 32,
        }
    }

    /// Cleartext salt length for this suite (equals the key length).
    pub const fn salt_len(self) -> usize {
        self.key_len()
    }
}

/// Symmetric key material for one direction of a connection.
///
/// Derived exactly once per direction and zeroized on drop. Deliberately
/// not `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    /// Wrap raw key material.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Copy raw key material.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this is secret key material.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty (never true for a derived key).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Dispatch over the three supported AEAD implementations.
enum AeadCipher {
    Aes128Gcm(Box<Aes128Gcm>),
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

impl AeadCipher {
    fn new(kind: CipherKind, key: &SessionKey) -> Result<Self> {
        if key.len() != kind.key_len() {
            return Err(Error::config(format!(
                "{:?} requires a {}-byte key, got {}",
                kind,
                kind.key_len(),
                key.len()
            )));
        }

        Ok(match kind {
            CipherKind::Aes128Gcm => AeadCipher::Aes128Gcm(Box::new(
                Aes128Gcm::new_from_slice(key.as_bytes()).expect("length checked above"),
            )),
            CipherKind::Aes256Gcm => AeadCipher::Aes256Gcm(Box::new(
                Aes256Gcm::new_from_slice(key.as_bytes()).expect("length checked above"),
            )),
            CipherKind::ChaCha20Poly1305 => AeadCipher::ChaCha20Poly1305(Box::new(
                ChaCha20Poly1305::new_from_slice(key.as_bytes()).expect("length checked above"),
            )),
        })
    }

    fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            AeadCipher::Aes128Gcm(c) => c.encrypt(nonce, plaintext),
            AeadCipher::Aes256Gcm(c) => c.encrypt(nonce, plaintext),
            AeadCipher::ChaCha20Poly1305(c) => c.encrypt(nonce, plaintext),
        }
        .map_err(|_| Error::framing("chunk encryption failed"))
    }

    fn open(&self, nonce: &[u8; NONCE_SIZE], block: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            AeadCipher::Aes128Gcm(c) => c.decrypt(nonce, block),
            AeadCipher::Aes256Gcm(c) => c.decrypt(nonce, block),
            AeadCipher::ChaCha20Poly1305(c) => c.decrypt(nonce, block),
        }
        .map_err(|_| Error::framing("chunk tag verification failed"))
    }
}

/// One direction of a framed stream: an AEAD instance plus its nonce counter.
///
/// Sealing and opening sides each own one of these; the counters advance in
/// lockstep as long as the wire carries chunks in order, which is exactly
/// what authenticates ordering.
pub struct CipherState {
    cipher: AeadCipher,
    nonce: NonceCounter,
}

impl CipherState {
    /// Build a direction state from a suite and its session key.
    pub fn new(kind: CipherKind, key: &SessionKey) -> Result<Self> {
        Ok(Self {
            cipher: AeadCipher::new(kind, key)?,
            nonce: NonceCounter::new(),
        })
    }

    /// Seal one plaintext chunk into its wire form.
    ///
    /// The payload must be `1..=16384` bytes; callers feeding larger buffers
    /// pre-chunk them.
    pub fn seal_chunk(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() || plaintext.len() > MAX_CHUNK_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                len: plaintext.len(),
            });
        }

        let len_be = (plaintext.len() as u16).to_be_bytes();
        let nonce = self.nonce.next()?;
        let len_block = self.cipher.seal(&nonce, &len_be)?;
        let nonce = self.nonce.next()?;
        let payload_block = self.cipher.seal(&nonce, plaintext)?;

        let mut chunk = Vec::with_capacity(len_block.len() + payload_block.len());
        chunk.extend_from_slice(&len_block);
        chunk.extend_from_slice(&payload_block);
        Ok(chunk)
    }

    /// Open an encrypted length prefix and return the payload length.
    pub fn open_length(&mut self, block: &[u8]) -> Result<usize> {
        if block.len() != LENGTH_BLOCK_SIZE {
            return Err(Error::framing(format!(
                "length block must be {LENGTH_BLOCK_SIZE} bytes, got {}",
                block.len()
            )));
        }

        let nonce = self.nonce.next()?;
        let len_be = self.cipher.open(&nonce, block)?;
        let len = u16::from_be_bytes([len_be[0], len_be[1]]) as usize;

        if len == 0 || len > MAX_CHUNK_PAYLOAD {
            return Err(Error::framing(format!("chunk length {len} out of range")));
        }
        Ok(len)
    }

    /// Open one payload block (ciphertext plus tag).
    pub fn open_payload(&mut self, block: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.nonce.next()?;
        self.cipher.open(&nonce, block)
    }

    /// Operations performed so far (for diagnostics and tests).
    pub fn nonce_value(&self) -> u64 {
        self.nonce.value()
    }
}
