//! Key derivation for the framed stream.
//!
//! Two stages, kept for wire compatibility with upstream Shadowsocks:
//!
//! 1. Password → pre-shared key via the OpenSSL `EVP_BytesToKey` MD5
//!    iteration. Cryptographically weak; its only remaining role is turning
//!    a human password into fixed-size key material.
//! 2. Pre-shared key + per-connection salt → session subkey via HKDF-SHA1
//!    with the ASCII info string `"ss-subkey"` (RFC 5869 exact).
//!
//! Callers sensitive to offline dictionary attacks should prefer the
//! DarkStar handshake, which never touches stage 1.

use hkdf::Hkdf;
use md5::{Digest, Md5};
use sha1::Sha1;

use crate::crypto::{SecureRandom, SessionKey};
use crate::error::{Error, Result};

/// Info string binding HKDF output to the stream-subkey role.
const SUBKEY_INFO: &[u8] = b"ss-subkey";

/// Derive a pre-shared key from a password, `EVP_BytesToKey` style.
///
/// Iterates MD5 over `prev_block || password`, concatenating digests until
/// `key_len` bytes are available.
pub fn evp_bytes_to_key(password: &str, key_len: usize) -> SessionKey {
    let mut material = Vec::with_capacity(key_len + 16);
    let mut prev: Vec<u8> = Vec::new();

    while material.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(&prev);
        hasher.update(password.as_bytes());
        prev = hasher.finalize().to_vec();
        material.extend_from_slice(&prev);
    }

    material.truncate(key_len);
    SessionKey::from_vec(material)
}

/// Derive the per-session subkey from a pre-shared key and salt.
///
/// Output length equals the pre-shared key length (16 or 32 bytes).
pub fn derive_session_key(psk: &SessionKey, salt: &[u8]) -> Result<SessionKey> {
    let hk = Hkdf::<Sha1>::new(Some(salt), psk.as_bytes());
    let mut okm = vec![0u8; psk.len()];
    hk.expand(SUBKEY_INFO, &mut okm)
        .map_err(|_| Error::config("session key length unsupported by HKDF"))?;
    Ok(SessionKey::from_vec(okm))
}

/// Generate a fresh per-connection salt of the given length.
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    SecureRandom::fill(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evp_bytes_to_key_vectors() {
        // Reference outputs from upstream Shadowsocks implementations.
        assert_eq!(
            hex::encode(evp_bytes_to_key("test", 16).as_bytes()),
            "098f6bcd4621d373cade4e832627b4f6"
        );
        assert_eq!(
            hex::encode(evp_bytes_to_key("test", 32).as_bytes()),
            "098f6bcd4621d373cade4e832627b4f60a9172716ae6428409885b8b829ccb05"
        );
        assert_eq!(
            hex::encode(evp_bytes_to_key("foobar", 32).as_bytes()),
            "3858f62230ac3c915f300c664312c63f568378529614d22ddb49237d2f60bfdf"
        );
        assert_eq!(
            hex::encode(evp_bytes_to_key("password", 16).as_bytes()),
            "5f4dcc3b5aa765d61d8327deb882cf99"
        );
    }

    #[test]
    fn test_hkdf_sha1_rfc5869_case_4() {
        // RFC 5869 Test Case 4 (SHA-1, basic).
        let ikm = [0x0bu8; 11];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();

        let hk = Hkdf::<Sha1>::new(Some(&salt), &ikm);
        let mut okm = [0u8; 42];
        hk.expand(&info, &mut okm).unwrap();

        assert_eq!(
            hex::encode(okm),
            "085a01ea1b10f36933068b56efa5ad81a4f14b822f5b091568a9cdd4f155fda2c22e422478d305f3f896"
        );
    }

    #[test]
    fn test_hkdf_sha1_rfc5869_case_5() {
        // RFC 5869 Test Case 5 (SHA-1, longer inputs/outputs).
        let ikm: Vec<u8> = (0x00u8..=0x4f).collect();
        let salt: Vec<u8> = (0x60u8..=0xaf).collect();
        let info: Vec<u8> = (0xb0u8..=0xff).collect();

        let hk = Hkdf::<Sha1>::new(Some(&salt), &ikm);
        let mut okm = [0u8; 82];
        hk.expand(&info, &mut okm).unwrap();

        assert_eq!(
            hex::encode(okm),
            "0bd770a74d1160f7c9f12cd5912a06ebff6adcae899d92191fe4305673ba2ffe8fa3f1a4e5ad79f3f334b3b202b2173c486ea37ce3d397ed034c7f9dfeb15c5e927336d0441f4c4300e2cff0d0900b52d3b4"
        );
    }

    #[test]
    fn test_session_key_for_password_and_zero_salt() {
        let psk = evp_bytes_to_key("password", 16);
        let key = derive_session_key(&psk, &[0u8; 16]).unwrap();
        assert_eq!(hex::encode(key.as_bytes()), "501ffe6120d190cf3d925631a9e704e2");
    }

    #[test]
    fn test_session_key_is_salt_dependent() {
        let psk = evp_bytes_to_key("password", 32);
        let a = derive_session_key(&psk, &[0u8; 32]).unwrap();
        let b = derive_session_key(&psk, &[1u8; 32]).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_generate_salt() {
        let salt = generate_salt(32);
        assert_eq!(salt.len(), 32);
        assert!(!salt.iter().all(|&b| b == 0));
        assert_ne!(salt, generate_salt(32));
    }
}
