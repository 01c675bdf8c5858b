//! Error types for the umbra transport.

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing or driving a connection.
///
/// Every error is fatal to its connection: there is no retry at this layer,
/// and a failed connection never surfaces partial plaintext.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unsupported configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Handshake failed: invalid peer point, confirmation code mismatch,
    /// or premature EOF
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Framed stream violation: length out of range, tag verification
    /// failure, mid-chunk EOF, or a bad address header
    #[error("framing error: {0}")]
    Framing(String),

    /// Underlying transport failure, surfaced transparently
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// A single chunk was handed a payload outside `1..=16384` bytes
    #[error("chunk payload of {len} bytes outside 1..={}", crate::MAX_CHUNK_PAYLOAD)]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
    },
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }

    /// Create a new framing error
    pub fn framing(msg: impl Into<String>) -> Self {
        Error::Framing(msg.into())
    }

    /// Check if this error indicates an authentication failure
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Handshake(_) | Error::Framing(_))
    }
}
