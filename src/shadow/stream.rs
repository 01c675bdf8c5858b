//! The framed connection wrapper.
//!
//! Wire layout for the classic modes:
//!
//! ```text
//! [ salt (16 or 32, cleartext) ] [ chunk ]*
//! chunk := len_ct(2) || len_tag(16) || payload_ct(1..=16384) || payload_tag(16)
//! ```
//!
//! DarkStar connections carry the same chunk stream with no salt prefix: the
//! handshake already established the keys.
//!
//! Each direction owns its key and nonce counter, so a connection splits into
//! completely independent read and write halves. The transport's EOF is the
//! only end-of-stream signal and is legal exactly on a chunk boundary;
//! anything else is a framing violation. Errors are fatal: the failing half
//! latches into a terminal state, and dropping the connection zeroizes its
//! key material.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::crypto::{
    derive_session_key, generate_salt, CipherKind, CipherState, SessionKey, LENGTH_BLOCK_SIZE,
    TAG_SIZE,
};
use crate::darkstar::{ClientHandshake, ServerHandshake, SessionPair};
use crate::error::{Error, Result};
use crate::shadow::config::{CipherMode, ShadowConfig, ShadowServerConfig};
use crate::MAX_CHUNK_PAYLOAD;

/// An established, framed connection over transport `S`.
///
/// Only constructible through a completed handshake, so a `ShadowStream` in
/// hand always carries live key material.
pub struct ShadowStream<S> {
    read_half: ShadowReadHalf<ReadHalf<S>>,
    write_half: ShadowWriteHalf<WriteHalf<S>>,
}

impl<S> ShadowStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Establish the client side of a connection over `stream`.
    ///
    /// Classic modes derive the send key immediately and send the salt with
    /// the first chunk; DarkStar runs its handshake here.
    pub async fn client(stream: S, config: &ShadowConfig) -> Result<Self> {
        match config.mode {
            CipherMode::DarkStarClient => {
                let mut stream = stream;
                let handshake =
                    ClientHandshake::new(config.server_public_key()?, config.server_id()?);
                let session = handshake.run(&mut stream).await?;
                Self::from_session(stream, config.mode.cipher_kind(), session)
            }
            CipherMode::DarkStarServer => Err(Error::config(
                "darkstar-server mode cannot initiate connections",
            )),
            _ => Self::with_salted_psk(stream, config.mode.cipher_kind(), config.pre_shared_key()?),
        }
    }

    /// Establish the server side of a connection over an accepted `stream`.
    pub async fn server(stream: S, config: &ShadowServerConfig) -> Result<Self> {
        match config.mode {
            CipherMode::DarkStarServer => {
                let mut stream = stream;
                let handshake =
                    ServerHandshake::new(config.persistent_secret()?, config.server_id()?);
                let session = handshake.run(&mut stream).await?;
                Self::from_session(stream, config.mode.cipher_kind(), session)
            }
            CipherMode::DarkStarClient => Err(Error::config(
                "darkstar-client mode cannot accept connections",
            )),
            _ => Self::with_salted_psk(stream, config.mode.cipher_kind(), config.pre_shared_key()?),
        }
    }

    // Classic modes: the send key is derived from a fresh local salt right
    // away; the receive key waits for the peer's salt on first read.
    fn with_salted_psk(stream: S, kind: CipherKind, psk: SessionKey) -> Result<Self> {
        let salt = generate_salt(kind.salt_len());
        let encrypt_key = derive_session_key(&psk, &salt)?;
        let (read_io, write_io) = tokio::io::split(stream);
        Ok(Self {
            read_half: ShadowReadHalf::pending(read_io, kind, psk),
            write_half: ShadowWriteHalf::new(
                write_io,
                CipherState::new(kind, &encrypt_key)?,
                Some(salt),
            ),
        })
    }

    // DarkStar modes: both keys exist the moment the handshake finishes.
    fn from_session(stream: S, kind: CipherKind, session: SessionPair) -> Result<Self> {
        let (read_io, write_io) = tokio::io::split(stream);
        Ok(Self {
            read_half: ShadowReadHalf::ready(read_io, CipherState::new(kind, &session.decrypt)?),
            write_half: ShadowWriteHalf::new(
                write_io,
                CipherState::new(kind, &session.encrypt)?,
                None,
            ),
        })
    }

    /// Read decrypted bytes into `out`, pulling chunks as needed.
    ///
    /// Returns 0 only at a clean end-of-stream.
    pub async fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        self.read_half.read(out).await
    }

    /// Fill `out` completely from the decrypted stream.
    pub async fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        self.read_half.read_exact(out).await
    }

    /// Encrypt and send `payload`, slicing it into chunks as needed.
    pub async fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.write_half.write(payload).await
    }

    /// Flush the underlying transport.
    pub async fn flush(&mut self) -> Result<()> {
        self.write_half.flush().await
    }

    /// Shut down the write direction of the transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.write_half.shutdown().await
    }

    /// Split into independent halves for concurrent reading and writing.
    ///
    /// The halves share nothing: each owns its transport half, key, and
    /// nonce counter.
    pub fn into_split(self) -> (ShadowReadHalf<ReadHalf<S>>, ShadowWriteHalf<WriteHalf<S>>) {
        (self.read_half, self.write_half)
    }
}

// Receive-direction cipher: classic connections cannot derive their receive
// key until the peer's salt arrives.
enum ReadCipher {
    Pending { kind: CipherKind, psk: SessionKey },
    Ready(CipherState),
}

/// The receiving half of a connection.
pub struct ShadowReadHalf<R> {
    transport: R,
    cipher: ReadCipher,
    // Decrypted bytes not yet handed to the caller.
    buffer: Vec<u8>,
    pos: usize,
    eof: bool,
    failed: bool,
}

impl<R> ShadowReadHalf<R>
where
    R: AsyncRead + Unpin,
{
    fn pending(transport: R, kind: CipherKind, psk: SessionKey) -> Self {
        Self {
            transport,
            cipher: ReadCipher::Pending { kind, psk },
            buffer: Vec::new(),
            pos: 0,
            eof: false,
            failed: false,
        }
    }

    fn ready(transport: R, cipher: CipherState) -> Self {
        Self {
            transport,
            cipher: ReadCipher::Ready(cipher),
            buffer: Vec::new(),
            pos: 0,
            eof: false,
            failed: false,
        }
    }

    /// Read decrypted bytes into `out`; 0 only at clean end-of-stream.
    ///
    /// The first error is terminal: every later call fails immediately.
    pub async fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.failed {
            return Err(Error::framing("connection previously failed"));
        }
        match self.read_inner(out).await {
            Ok(n) => Ok(n),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    async fn read_inner(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.pos == self.buffer.len() {
            if self.eof || !self.fill_chunk().await? {
                return Ok(0);
            }
        }

        let n = (self.buffer.len() - self.pos).min(out.len());
        out[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
        self.pos += n;
        if self.pos == self.buffer.len() {
            self.buffer.clear();
            self.pos = 0;
        }
        Ok(n)
    }

    /// Fill `out` completely; EOF before that is a framing violation.
    pub async fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            let n = self.read(&mut out[filled..]).await?;
            if n == 0 {
                return Err(Error::framing("stream ended inside an expected read"));
            }
            filled += n;
        }
        Ok(())
    }

    // Pull and verify the next chunk into the buffer. Returns false on a
    // clean EOF at a chunk boundary.
    async fn fill_chunk(&mut self) -> Result<bool> {
        if let ReadCipher::Pending { kind, psk } = &self.cipher {
            let kind = *kind;
            let psk = psk.clone();

            let mut salt = vec![0u8; kind.salt_len()];
            if !read_full(&mut self.transport, &mut salt).await? {
                // The peer never sent anything: an empty stream, not an error.
                self.eof = true;
                return Ok(false);
            }
            let key = derive_session_key(&psk, &salt)?;
            self.cipher = ReadCipher::Ready(CipherState::new(kind, &key)?);
        }

        let ReadCipher::Ready(cipher) = &mut self.cipher else {
            unreachable!("receive key installed above");
        };

        let mut len_block = [0u8; LENGTH_BLOCK_SIZE];
        if !read_full(&mut self.transport, &mut len_block).await? {
            self.eof = true;
            return Ok(false);
        }
        let len = cipher.open_length(&len_block)?;

        let mut payload_block = vec![0u8; len + TAG_SIZE];
        if !read_full(&mut self.transport, &mut payload_block).await? {
            return Err(Error::framing("stream ended mid-chunk"));
        }

        self.buffer = cipher.open_payload(&payload_block)?;
        self.pos = 0;
        Ok(true)
    }
}

/// The sending half of a connection.
pub struct ShadowWriteHalf<W> {
    transport: W,
    cipher: CipherState,
    // Cleartext salt riding in front of the first chunk (classic modes).
    pending_salt: Option<Vec<u8>>,
    failed: bool,
}

impl<W> ShadowWriteHalf<W>
where
    W: AsyncWrite + Unpin,
{
    fn new(transport: W, cipher: CipherState, pending_salt: Option<Vec<u8>>) -> Self {
        Self {
            transport,
            cipher,
            pending_salt,
            failed: false,
        }
    }

    /// Encrypt and send `payload`, slicing it into chunks as needed.
    ///
    /// An empty payload is a no-op: there is no zero-length chunk on the
    /// wire. The first error is terminal: a partially written chunk cannot
    /// be resumed without desynchronizing the nonce counters.
    pub async fn write(&mut self, payload: &[u8]) -> Result<()> {
        if self.failed {
            return Err(Error::framing("connection previously failed"));
        }
        match self.write_inner(payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    async fn write_inner(&mut self, mut payload: &[u8]) -> Result<()> {
        while !payload.is_empty() {
            let take = payload.len().min(MAX_CHUNK_PAYLOAD);
            let mut wire = self.cipher.seal_chunk(&payload[..take])?;

            if let Some(salt) = self.pending_salt.take() {
                let mut prefixed = salt;
                prefixed.extend_from_slice(&wire);
                wire = prefixed;
            }

            self.transport.write_all(&wire).await?;
            payload = &payload[take..];
        }
        Ok(())
    }

    /// Flush the underlying transport.
    pub async fn flush(&mut self) -> Result<()> {
        self.transport.flush().await?;
        Ok(())
    }

    /// Shut down the write direction; there is no close frame, the
    /// transport's EOF is the end-of-stream signal.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.transport.shutdown().await?;
        Ok(())
    }
}

// Fill `buf` exactly. Ok(false) when the stream ended before the first byte;
// EOF after partial data is a framing violation.
async fn read_full<R>(transport: &mut R, buf: &mut [u8]) -> Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = transport.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(Error::framing("stream ended inside a frame"));
        }
        filled += n;
    }
    Ok(true)
}
