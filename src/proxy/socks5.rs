//! Client-side SOCKS5 front-end.
//!
//! Listens on a local port, accepts SOCKS5 CONNECT requests, and tunnels
//! each one through its own encrypted connection to the server.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::address::Address;
use crate::error::{Error, Result};
use crate::shadow::ShadowClient;
use crate::MAX_CHUNK_PAYLOAD;

const SOCKS_VERSION: u8 = 0x05;
const CMD_CONNECT: u8 = 0x01;

// Reply bodies: version, code, reserved, then a zeroed IPv4 bind address.
const REPLY_SUCCESS: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
const REPLY_REFUSED: [u8; 10] = [0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
const REPLY_CMD_UNSUPPORTED: [u8; 10] = [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
const REPLY_ATYP_UNSUPPORTED: [u8; 10] = [0x05, 0x08, 0x00, 0x01, 0, 0, 0, 0, 0, 0];

/// Run the SOCKS5 proxy, tunneling every connection through the factory's
/// configured server.
pub async fn run_socks5_proxy(listen_addr: &str, client: ShadowClient) -> Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("SOCKS5 proxy listening on {}", listen_addr);

    let client = Arc::new(client);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    if let Err(e) = handle_socks5_client(stream, client).await {
                        tracing::debug!("SOCKS5 connection from {} failed: {}", peer, e);
                    }
                });
            }
            Err(e) => {
                tracing::warn!("accept error: {}", e);
            }
        }
    }
}

/// Handle a single SOCKS5 client connection.
async fn handle_socks5_client(
    mut stream: TcpStream,
    factory: Arc<ShadowClient>,
) -> Result<()> {
    // === Greeting ===
    let mut buf = [0u8; 258];
    let n = stream.read(&mut buf).await?;
    if n < 2 || buf[0] != SOCKS_VERSION {
        return Err(Error::framing("not a SOCKS5 greeting"));
    }

    // No authentication required
    stream.write_all(&[SOCKS_VERSION, 0x00]).await?;

    // === CONNECT request ===
    let mut req = [0u8; 4];
    stream.read_exact(&mut req).await?;
    if req[0] != SOCKS_VERSION || req[1] != CMD_CONNECT {
        stream.write_all(&REPLY_CMD_UNSUPPORTED).await?;
        return Err(Error::framing("only CONNECT is supported"));
    }

    let target = match read_target_address(&mut stream, req[3]).await? {
        Some(target) => target,
        None => {
            stream.write_all(&REPLY_ATYP_UNSUPPORTED).await?;
            return Err(Error::framing("unsupported SOCKS5 address type"));
        }
    };

    // === Open the tunnel ===
    let tunnel = match factory.connect().await {
        Ok(tunnel) => tunnel,
        Err(e) => {
            let _ = stream.write_all(&REPLY_REFUSED).await;
            return Err(e);
        }
    };

    stream.write_all(&REPLY_SUCCESS).await?;
    tracing::debug!("tunnel open to {}", target);

    let (mut tunnel_read, mut tunnel_write) = tunnel.into_split();

    // The target address opens the first chunk payload.
    tunnel_write.write(&target.encode()).await?;

    let (mut client_read, mut client_write) = stream.into_split();

    // Client → tunnel
    let upstream = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_CHUNK_PAYLOAD];
        loop {
            match client_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tunnel_write.write(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tunnel_write.shutdown().await;
    });

    // Tunnel → client
    let downstream = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_CHUNK_PAYLOAD];
        loop {
            match tunnel_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if client_write.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = client_write.shutdown().await;
    });

    let _ = tokio::join!(upstream, downstream);
    Ok(())
}

/// Read the request's target address; `None` for an unknown address type.
async fn read_target_address(stream: &mut TcpStream, atyp: u8) -> Result<Option<Address>> {
    let mut header = vec![atyp];
    match atyp {
        0x01 => {
            let mut rest = [0u8; 6];
            stream.read_exact(&mut rest).await?;
            header.extend_from_slice(&rest);
        }
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            let mut rest = vec![0u8; len[0] as usize + 2];
            stream.read_exact(&mut rest).await?;
            header.push(len[0]);
            header.extend_from_slice(&rest);
        }
        0x04 => {
            let mut rest = [0u8; 18];
            stream.read_exact(&mut rest).await?;
            header.extend_from_slice(&rest);
        }
        _ => return Ok(None),
    }

    match Address::decode(&header) {
        Some((address, _)) => Ok(Some(address)),
        None => Err(Error::framing("malformed SOCKS5 target address")),
    }
}
