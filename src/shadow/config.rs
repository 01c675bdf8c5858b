//! Connection configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::{evp_bytes_to_key, CipherKind, SessionKey};
use crate::darkstar::{PersistentSecret, PublicKey, ServerId};
use crate::error::{Error, Result};

/// Cipher mode, agreed out-of-band between client and server.
///
/// The classic modes are wire-compatible with upstream Shadowsocks AEAD
/// peers; the DarkStar modes replace the salt exchange with an authenticated
/// P-256 handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherMode {
    /// Classic AEAD with AES-128-GCM
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,
    /// Classic AEAD with AES-256-GCM
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// Classic AEAD with ChaCha20-Poly1305 (IETF)
    #[serde(rename = "chacha20-ietf-poly1305")]
    ChaCha20IetfPoly1305,
    /// DarkStar handshake, initiating side
    #[serde(rename = "darkstar-client")]
    DarkStarClient,
    /// DarkStar handshake, responding side
    #[serde(rename = "darkstar-server")]
    DarkStarServer,
}

impl CipherMode {
    /// The AEAD suite framing chunks in this mode.
    ///
    /// DarkStar emits a 32-byte session key and frames with AES-256-GCM.
    pub fn cipher_kind(self) -> CipherKind {
        match self {
            CipherMode::Aes128Gcm => CipherKind::Aes128Gcm,
            CipherMode::Aes256Gcm => CipherKind::Aes256Gcm,
            CipherMode::ChaCha20IetfPoly1305 => CipherKind::ChaCha20Poly1305,
            CipherMode::DarkStarClient | CipherMode::DarkStarServer => CipherKind::Aes256Gcm,
        }
    }

    /// Whether the stream starts with a cleartext salt in each direction.
    pub fn uses_salt(self) -> bool {
        !self.is_darkstar()
    }

    /// Whether this mode runs the DarkStar handshake.
    pub fn is_darkstar(self) -> bool {
        matches!(self, CipherMode::DarkStarClient | CipherMode::DarkStarServer)
    }
}

impl FromStr for CipherMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "aes-128-gcm" | "aes128gcm" => Ok(CipherMode::Aes128Gcm),
            "aes-256-gcm" | "aes256gcm" => Ok(CipherMode::Aes256Gcm),
            "chacha20-ietf-poly1305" | "chacha20poly1305" => Ok(CipherMode::ChaCha20IetfPoly1305),
            "darkstar-client" => Ok(CipherMode::DarkStarClient),
            "darkstar-server" => Ok(CipherMode::DarkStarServer),
            other => Err(Error::config(format!("unsupported cipher mode {other:?}"))),
        }
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CipherMode::Aes128Gcm => "aes-128-gcm",
            CipherMode::Aes256Gcm => "aes-256-gcm",
            CipherMode::ChaCha20IetfPoly1305 => "chacha20-ietf-poly1305",
            CipherMode::DarkStarClient => "darkstar-client",
            CipherMode::DarkStarServer => "darkstar-server",
        };
        f.write_str(name)
    }
}

/// Client-side connection configuration. Immutable after creation.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Cipher mode.
    pub mode: CipherMode,

    /// Password for the classic AEAD modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Server persistent public key, hex-encoded compact point (DarkStar).
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hex_32")]
    pub server_public_key: Option<[u8; 32]>,

    /// Server host; must be a literal IP address in DarkStar mode.
    pub server_host: String,

    /// Server port.
    pub server_port: u16,
}

impl ShadowConfig {
    /// Validate the configuration against its mode's requirements.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            CipherMode::DarkStarServer => Err(Error::config(
                "darkstar-server mode belongs in a server configuration",
            )),
            CipherMode::DarkStarClient => {
                self.server_public_key()?;
                self.server_id()?;
                Ok(())
            }
            _ => {
                match self.password.as_deref() {
                    Some(p) if !p.is_empty() => Ok(()),
                    _ => Err(Error::config(format!("{} requires a password", self.mode))),
                }
            }
        }
    }

    /// Pre-shared key for the classic modes, derived from the password.
    pub fn pre_shared_key(&self) -> Result<SessionKey> {
        let password = self
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config(format!("{} requires a password", self.mode)))?;
        Ok(evp_bytes_to_key(password, self.mode.cipher_kind().key_len()))
    }

    /// The server's persistent public key (DarkStar).
    pub fn server_public_key(&self) -> Result<PublicKey> {
        let bytes = self
            .server_public_key
            .as_ref()
            .ok_or_else(|| Error::config("darkstar-client requires server_public_key"))?;
        PublicKey::from_compact_bytes(bytes)
            .map_err(|_| Error::config("server_public_key does not name a P-256 curve point"))
    }

    /// The server identifier binding the handshake to the endpoint.
    pub fn server_id(&self) -> Result<ServerId> {
        ServerId::from_endpoint(&self.server_host, self.server_port)
    }
}

/// Server-side configuration.
///
/// Holds the persistent private scalar in DarkStar mode; keep the file
/// private.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShadowServerConfig {
    /// Cipher mode; `darkstar-server` or one of the classic modes.
    pub mode: CipherMode,

    /// Password for the classic AEAD modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Persistent private scalar, hex-encoded (DarkStar).
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hex_32")]
    pub server_private_key: Option<[u8; 32]>,

    /// Listen host; must be a literal IP address.
    pub listen_host: String,

    /// Listen port.
    pub listen_port: u16,
}

impl ShadowServerConfig {
    /// Validate the configuration against its mode's requirements.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            CipherMode::DarkStarClient => Err(Error::config(
                "darkstar-client mode belongs in a client configuration",
            )),
            CipherMode::DarkStarServer => {
                self.persistent_secret()?;
                self.server_id()?;
                Ok(())
            }
            _ => match self.password.as_deref() {
                Some(p) if !p.is_empty() => Ok(()),
                _ => Err(Error::config(format!("{} requires a password", self.mode))),
            },
        }
    }

    /// Pre-shared key for the classic modes.
    pub fn pre_shared_key(&self) -> Result<SessionKey> {
        let password = self
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config(format!("{} requires a password", self.mode)))?;
        Ok(evp_bytes_to_key(password, self.mode.cipher_kind().key_len()))
    }

    /// The persistent identity key (DarkStar).
    pub fn persistent_secret(&self) -> Result<PersistentSecret> {
        let bytes = self
            .server_private_key
            .as_ref()
            .ok_or_else(|| Error::config("darkstar-server requires server_private_key"))?;
        PersistentSecret::from_bytes(bytes)
    }

    /// The server identifier clients must bind their handshakes to.
    pub fn server_id(&self) -> Result<ServerId> {
        ServerId::from_endpoint(&self.listen_host, self.listen_port)
    }
}

// Hex-encoded optional 32-byte values in config files.
mod opt_hex_32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) => {
                let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
                let bytes: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("expected 32 hex-encoded bytes"))?;
                Ok(Some(bytes))
            }
        }
    }
}
