//! DarkStar handshake.
//!
//! An ephemeral-ephemeral / ephemeral-static ECDH handshake over NIST P-256
//! that yields the session key and mutual authentication before any
//! application data flows. The dual ECDH binds the session to the server's
//! long-term identity (defeating man-in-the-middle without PKI) while the
//! ephemeral-ephemeral half provides forward secrecy.
//!
//! ## Protocol Flow
//!
//! ```text
//! Client                                    Server
//!   |                                         |
//!   |  cePub (32) || CC_client (32)           |
//!   |---------------------------------------->|
//!   |                                         |  [verify CC_client against
//!   |                                         |   persistent private key]
//!   |  sePub (32) || CC_server (32)           |
//!   |<----------------------------------------|
//!   |  [verify CC_server against              |
//!   |   derived session key]                  |
//!   |                                         |
//!   |====== framed AEAD stream (no salt) =====|
//! ```
//!
//! Public keys travel in a 32-byte compact encoding (x coordinate only,
//! even-y convention). The confirmation codes are one-directional proofs:
//! `CC_client` proves knowledge of the ECDH against the server's persistent
//! key, `CC_server` proves knowledge of the derived session key.

mod client;
mod handshake;
mod keys;
mod server;

pub use client::ClientHandshake;
pub use handshake::{
    client_confirmation_code, derive_shared_key, server_confirmation_code,
    verify_confirmation_code, ServerId, CONFIRMATION_CODE_SIZE,
};
pub use keys::{EphemeralSecret, PersistentSecret, PublicKey, SharedSecret, PUBLIC_KEY_SIZE};
pub use server::ServerHandshake;

use crate::crypto::SessionKey;
use crate::error::Error;

/// Key material emitted by a completed handshake: the Finished state.
///
/// The handshake types are consumed by running them, so a connection either
/// holds one of these or no key material at all; encrypting before the
/// handshake completes is structurally impossible.
pub struct SessionPair {
    /// Key sealing locally originated chunks.
    pub encrypt: SessionKey,
    /// Key opening peer originated chunks.
    pub decrypt: SessionKey,
}

impl SessionPair {
    /// Both directions keyed by the same shared key.
    ///
    /// This is the wire-compatible choice; a hardened revision would expand
    /// direction-labeled keys here and nowhere else.
    pub(crate) fn symmetric(shared: SessionKey) -> Self {
        Self {
            encrypt: shared.clone(),
            decrypt: shared,
        }
    }
}

/// Map transport EOF during the handshake onto a handshake error.
pub(crate) fn eof_as_handshake(err: std::io::Error, what: &str) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::handshake(format!("connection closed while reading {what}"))
    } else {
        Error::Network(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_pair_is_symmetric() {
        let shared = SessionKey::from_bytes(&[7u8; 32]);
        let pair = SessionPair::symmetric(shared);
        assert_eq!(pair.encrypt.as_bytes(), pair.decrypt.as_bytes());
    }
}
