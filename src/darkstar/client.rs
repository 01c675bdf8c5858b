//! Client side of the DarkStar handshake.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::darkstar::handshake::{
    client_confirmation_code, derive_shared_key, server_confirmation_code,
    verify_confirmation_code, ServerId, CONFIRMATION_CODE_SIZE,
};
use crate::darkstar::keys::{EphemeralSecret, PublicKey, PUBLIC_KEY_SIZE};
use crate::darkstar::{eof_as_handshake, SessionPair};
use crate::error::{Error, Result};

/// A client handshake that has not yet run: the Start state.
///
/// Holds only the server's identity; consumed by [`run`](Self::run), which
/// either yields the session keys or fails and leaves nothing behind.
pub struct ClientHandshake {
    server_persistent: PublicKey,
    server_id: ServerId,
}

impl ClientHandshake {
    /// Bind a handshake to the server's persistent key and endpoint.
    pub fn new(server_persistent: PublicKey, server_id: ServerId) -> Self {
        Self {
            server_persistent,
            server_id,
        }
    }

    /// Run the handshake over `stream`.
    ///
    /// Sends `cePub || CC_client`, then verifies the server's
    /// `sePub || CC_server` reply in constant time. Any mismatch, invalid
    /// point, or early EOF is fatal.
    pub async fn run<S>(self, stream: &mut S) -> Result<SessionPair>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let ephemeral = EphemeralSecret::random();
        let ephemeral_public = PublicKey::from(&ephemeral);

        let persistent_agreement = ephemeral.diffie_hellman(&self.server_persistent);
        let client_code = client_confirmation_code(
            &persistent_agreement,
            &self.server_id,
            &self.server_persistent,
            &ephemeral_public,
        );

        let mut hello = [0u8; PUBLIC_KEY_SIZE + CONFIRMATION_CODE_SIZE];
        hello[..PUBLIC_KEY_SIZE].copy_from_slice(&ephemeral_public.to_compact_bytes());
        hello[PUBLIC_KEY_SIZE..].copy_from_slice(&client_code);
        stream.write_all(&hello).await?;
        stream.flush().await?;

        let mut reply = [0u8; PUBLIC_KEY_SIZE + CONFIRMATION_CODE_SIZE];
        stream
            .read_exact(&mut reply)
            .await
            .map_err(|e| eof_as_handshake(e, "server handshake reply"))?;

        let server_ephemeral = PublicKey::from_compact_bytes(
            reply[..PUBLIC_KEY_SIZE].try_into().expect("fixed split"),
        )?;

        let ephemeral_agreement = ephemeral.diffie_hellman(&server_ephemeral);
        let shared_key = derive_shared_key(
            &ephemeral_agreement,
            &persistent_agreement,
            &self.server_id,
            &ephemeral_public,
            &server_ephemeral,
        );

        let expected = server_confirmation_code(
            &shared_key,
            &self.server_id,
            &server_ephemeral,
            &ephemeral_public,
        );
        let observed: [u8; CONFIRMATION_CODE_SIZE] =
            reply[PUBLIC_KEY_SIZE..].try_into().expect("fixed split");
        if !verify_confirmation_code(&expected, &observed) {
            return Err(Error::handshake("server confirmation code mismatch"));
        }

        Ok(SessionPair::symmetric(shared_key))
    }
}
