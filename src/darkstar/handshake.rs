//! Confirmation codes and session-key derivation.
//!
//! Three derivations, all bound to the server's IP endpoint and to both
//! public keys so that a transcript replayed against a different listener or
//! keypair fails closed:
//!
//! - `CC_client`: SHA-256 over the ephemeral-static ECDH plus the handshake
//!   transcript. Proves the client ran ECDH against the real persistent key.
//! - shared key: SHA-256 over both ECDH outputs plus the transcript.
//! - `CC_server`: HMAC-SHA-256 keyed by the shared key. Proves the server
//!   derived the same session key.

use std::net::{IpAddr, SocketAddr};

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::crypto::SessionKey;
use crate::darkstar::keys::{PublicKey, SharedSecret};
use crate::error::{Error, Result};

/// Size of a confirmation code in bytes (SHA-256 / HMAC-SHA-256 output)
pub const CONFIRMATION_CODE_SIZE: usize = 32;

const PROTOCOL_LABEL: &[u8] = b"DarkStar";
const CLIENT_LABEL: &[u8] = b"client";
const SERVER_LABEL: &[u8] = b"server";

/// Deterministic byte encoding of the server's IP endpoint:
/// `ip_bytes || port_be` (6 bytes for IPv4, 18 for IPv6).
///
/// The handshake is undefined for hostnames; both sides must agree on the
/// literal listening address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerId(Vec<u8>);

impl ServerId {
    /// Build from a host string and port, rejecting non-IP hosts.
    pub fn from_endpoint(host: &str, port: u16) -> Result<Self> {
        let ip: IpAddr = host.parse().map_err(|_| {
            Error::config(format!(
                "darkstar endpoint must be a literal IP address, got {host:?}"
            ))
        })?;
        Ok(Self::from_ip(ip, port))
    }

    /// Build from an already-resolved socket address.
    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        Self::from_ip(addr.ip(), addr.port())
    }

    fn from_ip(ip: IpAddr, port: u16) -> Self {
        let mut bytes = match ip {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        bytes.extend_from_slice(&port.to_be_bytes());
        Self(bytes)
    }

    /// The encoded identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The client's proof of knowledge of the ephemeral-static ECDH.
///
/// `SHA-256(ecdh(cePriv, spPub) || serverId || spPub || cePub ||
/// "DarkStar" || "client")`. The server recomputes it from
/// `ecdh(spPriv, cePub)`, which agrees by ECDH symmetry.
pub fn client_confirmation_code(
    persistent_agreement: &SharedSecret,
    server_id: &ServerId,
    server_persistent: &PublicKey,
    client_ephemeral: &PublicKey,
) -> [u8; CONFIRMATION_CODE_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(persistent_agreement.as_bytes());
    hasher.update(server_id.as_bytes());
    hasher.update(server_persistent.to_compact_bytes());
    hasher.update(client_ephemeral.to_compact_bytes());
    hasher.update(PROTOCOL_LABEL);
    hasher.update(CLIENT_LABEL);
    hasher.finalize().into()
}

/// Derive the 32-byte session key from both ECDH outputs and the transcript.
pub fn derive_shared_key(
    ephemeral_agreement: &SharedSecret,
    persistent_agreement: &SharedSecret,
    server_id: &ServerId,
    client_ephemeral: &PublicKey,
    server_ephemeral: &PublicKey,
) -> SessionKey {
    let mut hasher = Sha256::new();
    hasher.update(ephemeral_agreement.as_bytes());
    hasher.update(persistent_agreement.as_bytes());
    hasher.update(server_id.as_bytes());
    hasher.update(client_ephemeral.to_compact_bytes());
    hasher.update(server_ephemeral.to_compact_bytes());
    hasher.update(PROTOCOL_LABEL);
    hasher.update(SERVER_LABEL);
    SessionKey::from_vec(hasher.finalize().to_vec())
}

/// The server's proof that it derived the same session key.
///
/// `HMAC-SHA-256(sharedKey, serverId || sePub || cePub || "DarkStar" ||
/// "server")`.
pub fn server_confirmation_code(
    shared_key: &SessionKey,
    server_id: &ServerId,
    server_ephemeral: &PublicKey,
    client_ephemeral: &PublicKey,
) -> [u8; CONFIRMATION_CODE_SIZE] {
    let mut mac = <Hmac<Sha256>>::new_from_slice(shared_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(server_id.as_bytes());
    mac.update(&server_ephemeral.to_compact_bytes());
    mac.update(&client_ephemeral.to_compact_bytes());
    mac.update(PROTOCOL_LABEL);
    mac.update(SERVER_LABEL);
    mac.finalize().into_bytes().into()
}

/// Constant-time comparison of confirmation codes.
pub fn verify_confirmation_code(
    expected: &[u8; CONFIRMATION_CODE_SIZE],
    observed: &[u8; CONFIRMATION_CODE_SIZE],
) -> bool {
    expected
        .iter()
        .zip(observed.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::darkstar::keys::{EphemeralSecret, PersistentSecret};

    // Known-answer keys: small scalars whose public points all have even y,
    // so the compact encoding is exact.
    fn scalar_key(k: u8) -> PersistentSecret {
        let mut bytes = [0u8; 32];
        bytes[31] = k;
        PersistentSecret::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_server_id_encodings() {
        let v4 = ServerId::from_endpoint("127.0.0.1", 1234).unwrap();
        assert_eq!(v4.as_bytes(), &[127, 0, 0, 1, 0x04, 0xd2]);

        let v6 = ServerId::from_endpoint("::1", 443).unwrap();
        assert_eq!(v6.as_bytes().len(), 18);
        assert_eq!(&v6.as_bytes()[16..], &[0x01, 0xbb]);

        assert!(ServerId::from_endpoint("example.com", 443).is_err());
    }

    #[test]
    fn test_known_answer_transcript() {
        // Scalars 3 / 4 / 5 as persistent, client-ephemeral, and
        // server-ephemeral keys over the 127.0.0.1:1234 endpoint.
        let sp = scalar_key(3);
        let ce = scalar_key(4);
        let se = scalar_key(5);

        let sp_pub = PublicKey::from(&sp);
        let ce_pub = PublicKey::from(&ce);
        let se_pub = PublicKey::from(&se);

        assert_eq!(
            hex::encode(sp_pub.to_compact_bytes()),
            "5ecbe4d1a6330a44c8f7ef951d4bf165e6c6b721efada985fb41661bc6e7fd6c"
        );
        assert_eq!(
            hex::encode(ce_pub.to_compact_bytes()),
            "e2534a3532d08fbba02dde659ee62bd0031fe2db785596ef509302446b030852"
        );
        assert_eq!(
            hex::encode(se_pub.to_compact_bytes()),
            "51590b7a515140d2d784c85608668fdfef8c82fd1f5be52421554a0dc3d033ed"
        );

        let server_id = ServerId::from_endpoint("127.0.0.1", 1234).unwrap();
        let persistent_agreement = ce.diffie_hellman(&sp_pub);
        let ephemeral_agreement = ce.diffie_hellman(&se_pub);

        let cc_client =
            client_confirmation_code(&persistent_agreement, &server_id, &sp_pub, &ce_pub);
        assert_eq!(
            hex::encode(cc_client),
            "7505b5617522140f6365db80e9c25cb4636a59c29f69caf200eb81e0cd7b9a6d"
        );

        let shared_key = derive_shared_key(
            &ephemeral_agreement,
            &persistent_agreement,
            &server_id,
            &ce_pub,
            &se_pub,
        );
        assert_eq!(
            hex::encode(shared_key.as_bytes()),
            "6cf634cf94de84cd100183c15eb59a5295c0846a46e4501c33f78390fae355ca"
        );

        let cc_server = server_confirmation_code(&shared_key, &server_id, &se_pub, &ce_pub);
        assert_eq!(
            hex::encode(cc_server),
            "3cd8ef69a9a527ffdd6b32120e519999a0217702a554d932cfe133823ac085c2"
        );
    }

    #[test]
    fn test_client_code_symmetry() {
        let server = PersistentSecret::random();
        let server_pub = PublicKey::from(&server);
        let client = EphemeralSecret::random();
        let client_pub = PublicKey::from(&client);
        let server_id = ServerId::from_endpoint("10.0.0.1", 8388).unwrap();

        // Client computes ecdh(cePriv, spPub); server computes
        // ecdh(spPriv, cePub).
        let client_side = client_confirmation_code(
            &client.diffie_hellman(&server_pub),
            &server_id,
            &server_pub,
            &client_pub,
        );
        let server_side = client_confirmation_code(
            &server.diffie_hellman(&client_pub),
            &server_id,
            &server_pub,
            &client_pub,
        );
        assert!(verify_confirmation_code(&client_side, &server_side));
    }

    #[test]
    fn test_endpoint_mismatch_changes_codes() {
        let server = PersistentSecret::random();
        let server_pub = PublicKey::from(&server);
        let client = EphemeralSecret::random();
        let client_pub = PublicKey::from(&client);
        let agreement = client.diffie_hellman(&server_pub);

        let a = ServerId::from_endpoint("127.0.0.1", 1234).unwrap();
        let b = ServerId::from_endpoint("127.0.0.1", 1235).unwrap();

        let code_a = client_confirmation_code(&agreement, &a, &server_pub, &client_pub);
        let code_b = client_confirmation_code(&agreement, &b, &server_pub, &client_pub);
        assert!(!verify_confirmation_code(&code_a, &code_b));
    }

    #[test]
    fn test_server_code_rejects_wrong_shared_key() {
        let client = EphemeralSecret::random();
        let client_pub = PublicKey::from(&client);
        let server = EphemeralSecret::random();
        let server_pub = PublicKey::from(&server);
        let server_id = ServerId::from_endpoint("127.0.0.1", 1234).unwrap();

        let right = SessionKey::from_bytes(&[0x11; 32]);
        let wrong = SessionKey::from_bytes(&[0x22; 32]);

        let expected = server_confirmation_code(&right, &server_id, &server_pub, &client_pub);
        let forged = server_confirmation_code(&wrong, &server_id, &server_pub, &client_pub);
        assert!(!verify_confirmation_code(&expected, &forged));
    }
}
