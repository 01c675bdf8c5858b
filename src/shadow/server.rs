//! Server-side accept loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::proxy::relay;
use crate::shadow::config::ShadowServerConfig;
use crate::shadow::stream::ShadowStream;
use crate::HANDSHAKE_TIMEOUT_MS;

/// The proxy server: accepts connections, runs the mode's handshake, and
/// relays each authenticated stream to its target.
pub struct ShadowServer {
    config: Arc<ShadowServerConfig>,
}

impl ShadowServer {
    /// Create a server from a configuration, validating it up front.
    pub fn new(config: ShadowServerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Bind the listener and serve connections until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind((
            self.config.listen_host.as_str(),
            self.config.listen_port,
        ))
        .await?;

        tracing::info!(
            "listening on {}:{} ({})",
            self.config.listen_host,
            self.config.listen_port,
            self.config.mode
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(config, stream, peer).await {
                            tracing::debug!("connection from {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("accept error: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        config: Arc<ShadowServerConfig>,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<()> {
        stream.set_nodelay(true)?;

        let shadow = timeout(
            Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
            ShadowStream::server(stream, &config),
        )
        .await
        .map_err(|_| Error::handshake("handshake timed out"))??;

        relay::relay_connection(shadow, peer).await
    }
}
