//! Server side of the DarkStar handshake.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::darkstar::handshake::{
    client_confirmation_code, derive_shared_key, server_confirmation_code,
    verify_confirmation_code, ServerId, CONFIRMATION_CODE_SIZE,
};
use crate::darkstar::keys::{EphemeralSecret, PersistentSecret, PublicKey, PUBLIC_KEY_SIZE};
use crate::darkstar::{eof_as_handshake, SessionPair};
use crate::error::{Error, Result};

/// A server handshake that has not yet run: the Start state.
///
/// The client's confirmation code is verified against the persistent private
/// key before the server sends a single byte, so an active prober learns
/// nothing from a connection attempt.
pub struct ServerHandshake {
    persistent: PersistentSecret,
    server_id: ServerId,
}

impl ServerHandshake {
    /// Bind a handshake to the server's persistent key and listening
    /// endpoint.
    pub fn new(persistent: PersistentSecret, server_id: ServerId) -> Self {
        Self {
            persistent,
            server_id,
        }
    }

    /// Run the handshake over `stream`.
    pub async fn run<S>(self, stream: &mut S) -> Result<SessionPair>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut hello = [0u8; PUBLIC_KEY_SIZE + CONFIRMATION_CODE_SIZE];
        stream
            .read_exact(&mut hello)
            .await
            .map_err(|e| eof_as_handshake(e, "client handshake"))?;

        let client_ephemeral = PublicKey::from_compact_bytes(
            hello[..PUBLIC_KEY_SIZE].try_into().expect("fixed split"),
        )?;
        let observed: [u8; CONFIRMATION_CODE_SIZE] =
            hello[PUBLIC_KEY_SIZE..].try_into().expect("fixed split");

        let persistent_agreement = self.persistent.diffie_hellman(&client_ephemeral);
        let persistent_public = PublicKey::from(&self.persistent);
        let expected = client_confirmation_code(
            &persistent_agreement,
            &self.server_id,
            &persistent_public,
            &client_ephemeral,
        );
        if !verify_confirmation_code(&expected, &observed) {
            return Err(Error::handshake("client confirmation code mismatch"));
        }

        let ephemeral = EphemeralSecret::random();
        let ephemeral_public = PublicKey::from(&ephemeral);

        let ephemeral_agreement = ephemeral.diffie_hellman(&client_ephemeral);
        let shared_key = derive_shared_key(
            &ephemeral_agreement,
            &persistent_agreement,
            &self.server_id,
            &client_ephemeral,
            &ephemeral_public,
        );
        let server_code = server_confirmation_code(
            &shared_key,
            &self.server_id,
            &ephemeral_public,
            &client_ephemeral,
        );

        let mut reply = [0u8; PUBLIC_KEY_SIZE + CONFIRMATION_CODE_SIZE];
        reply[..PUBLIC_KEY_SIZE].copy_from_slice(&ephemeral_public.to_compact_bytes());
        reply[PUBLIC_KEY_SIZE..].copy_from_slice(&server_code);
        stream.write_all(&reply).await?;
        stream.flush().await?;

        Ok(SessionPair::symmetric(shared_key))
    }
}
