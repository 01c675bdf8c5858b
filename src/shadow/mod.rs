//! The obfuscated stream protocol: configuration, handshake orchestration,
//! and the framed connection itself.
//!
//! A connection is established in two steps. First the mode's handshake runs:
//! classic AEAD modes exchange cleartext salts and derive per-direction
//! subkeys from the password, while the DarkStar modes run the P-256
//! handshake in [`crate::darkstar`]. Then every application byte flows
//! through length-prefixed AEAD chunks; see [`stream::ShadowStream`].

pub mod client;
pub mod config;
pub mod server;
pub mod stream;

pub use client::ShadowClient;
pub use config::{CipherMode, ShadowConfig, ShadowServerConfig};
pub use server::ShadowServer;
pub use stream::{ShadowReadHalf, ShadowStream, ShadowWriteHalf};
