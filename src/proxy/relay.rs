//! Server-side target relay.
//!
//! After the handshake, the first decrypted bytes name the target host and
//! port. The relay dials it and pumps bytes both ways until either side
//! closes.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::address::{Address, MAX_ENCODED_LEN};
use crate::error::{Error, Result};
use crate::shadow::ShadowStream;
use crate::MAX_CHUNK_PAYLOAD;

/// Relay one authenticated connection to the target it names.
pub async fn relay_connection(shadow: ShadowStream<TcpStream>, peer: SocketAddr) -> Result<()> {
    let (mut shadow_read, mut shadow_write) = shadow.into_split();

    // The header usually arrives whole in the first chunk, but nothing stops
    // a peer from splitting it; accumulate until it decodes or the size cap
    // rules it malformed.
    let mut header = Vec::with_capacity(64);
    let (target, consumed) = loop {
        if let Some(parsed) = Address::decode(&header) {
            break parsed;
        }
        if header.len() >= MAX_ENCODED_LEN {
            return Err(Error::framing("address header did not decode"));
        }

        let mut buf = [0u8; MAX_ENCODED_LEN];
        let n = shadow_read.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::framing("stream ended before the address header"));
        }
        header.extend_from_slice(&buf[..n]);
    };
    let initial = &header[consumed..];

    tracing::debug!("{} -> {}", peer, target);

    let target_stream = TcpStream::connect((target.host(), target.port())).await?;
    target_stream.set_nodelay(true)?;
    let (mut target_read, mut target_write) = target_stream.into_split();

    if !initial.is_empty() {
        target_write.write_all(initial).await?;
    }

    // Tunnel → target
    let upstream = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_CHUNK_PAYLOAD];
        loop {
            match shadow_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if target_write.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("tunnel read failed: {}", e);
                    break;
                }
            }
        }
        let _ = target_write.shutdown().await;
    });

    // Target → tunnel
    let downstream = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_CHUNK_PAYLOAD];
        loop {
            match target_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if shadow_write.write(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = shadow_write.shutdown().await;
    });

    let _ = tokio::join!(upstream, downstream);
    Ok(())
}
