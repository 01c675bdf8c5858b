//! P-256 key material for the DarkStar handshake.
//!
//! Provides type-safe wrappers around P-256 operations with automatic
//! zeroization of secret material on drop.
//!
//! Public keys use a 32-byte compact encoding: the x coordinate alone, with
//! an even-y convention for recovery on decode. Not every P-256 point has an
//! even-y representative, so key generation re-draws until the public point
//! is compactly representable.

use p256::ecdh;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{FieldBytes, SecretKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Size of a compact P-256 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// SEC1 tag for a compressed point with even y.
const SEC1_TAG_EVEN_Y: u8 = 0x02;

fn compactly_representable(key: &p256::PublicKey) -> bool {
    key.to_encoded_point(true).as_bytes()[0] == SEC1_TAG_EVEN_Y
}

/// An ephemeral (single-use) P-256 secret key.
///
/// Generated fresh for each connection; provides forward secrecy. The inner
/// scalar is zeroized when dropped.
pub struct EphemeralSecret(SecretKey);

impl EphemeralSecret {
    /// Generate a new random ephemeral secret whose public point is
    /// compactly representable.
    pub fn random() -> Self {
        loop {
            let secret = SecretKey::random(&mut OsRng);
            if compactly_representable(&secret.public_key()) {
                return Self(secret);
            }
        }
    }

    /// Perform P-256 Diffie-Hellman key agreement.
    ///
    /// Borrows rather than consumes: the DarkStar client agrees against both
    /// the server's persistent and ephemeral keys with one secret.
    pub fn diffie_hellman(&self, their_public: &PublicKey) -> SharedSecret {
        SharedSecret::agree(&self.0, &their_public.0)
    }
}

impl From<&EphemeralSecret> for PublicKey {
    fn from(secret: &EphemeralSecret) -> Self {
        PublicKey(secret.0.public_key())
    }
}

/// A persistent (long-term) P-256 secret key.
///
/// Used by servers as their identity; the matching compact public key is
/// distributed to clients out-of-band. Zeroized when dropped.
#[derive(Clone)]
pub struct PersistentSecret(SecretKey);

impl PersistentSecret {
    /// Generate a new random persistent secret whose public point is
    /// compactly representable.
    pub fn random() -> Self {
        loop {
            let secret = SecretKey::random(&mut OsRng);
            if compactly_representable(&secret.public_key()) {
                return Self(secret);
            }
        }
    }

    /// Load a persistent secret from its big-endian scalar bytes.
    ///
    /// Rejects scalars outside the curve order and keys whose public point
    /// has no compact encoding (clients could never address such a server).
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secret = SecretKey::from_bytes(FieldBytes::from_slice(bytes))
            .map_err(|_| Error::config("invalid P-256 private scalar"))?;
        if !compactly_representable(&secret.public_key()) {
            return Err(Error::config(
                "persistent key has no compact public encoding; generate a new one",
            ));
        }
        Ok(Self(secret))
    }

    /// Export the secret scalar bytes.
    ///
    /// # Security
    ///
    /// Handle the returned bytes with care; the wrapper zeroizes them when
    /// dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes().into())
    }

    /// Perform P-256 Diffie-Hellman key agreement.
    pub fn diffie_hellman(&self, their_public: &PublicKey) -> SharedSecret {
        SharedSecret::agree(&self.0, &their_public.0)
    }
}

impl From<&PersistentSecret> for PublicKey {
    fn from(secret: &PersistentSecret) -> Self {
        PublicKey(secret.0.public_key())
    }
}

/// A P-256 public key. Safe to share; used for key exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(p256::PublicKey);

impl PublicKey {
    /// Decode a compact public key.
    ///
    /// Rejects x coordinates that do not name a curve point (the identity
    /// has no SEC1 encoding and is rejected by construction).
    pub fn from_compact_bytes(bytes: &[u8; PUBLIC_KEY_SIZE]) -> Result<Self> {
        let mut sec1 = [0u8; PUBLIC_KEY_SIZE + 1];
        sec1[0] = SEC1_TAG_EVEN_Y;
        sec1[1..].copy_from_slice(bytes);
        let key = p256::PublicKey::from_sec1_bytes(&sec1)
            .map_err(|_| Error::handshake("peer public key is not a valid curve point"))?;
        Ok(Self(key))
    }

    /// The 32-byte compact encoding (x coordinate).
    pub fn to_compact_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let point = self.0.to_encoded_point(true);
        debug_assert_eq!(point.as_bytes()[0], SEC1_TAG_EVEN_Y);
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        out.copy_from_slice(&point.as_bytes()[1..]);
        out
    }
}

/// The x coordinate of an ECDH agreement, zeroized on drop.
///
/// Fed into the SHA-256 derivations of the handshake; never used as a key
/// directly.
pub struct SharedSecret(Zeroizing<[u8; 32]>);

impl SharedSecret {
    fn agree(secret: &SecretKey, public: &p256::PublicKey) -> Self {
        let shared = ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
        Self(bytes)
    }

    /// Get the raw shared secret bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}
