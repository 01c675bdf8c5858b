//! Client-side connection factory.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::shadow::config::ShadowConfig;
use crate::shadow::stream::ShadowStream;
use crate::HANDSHAKE_TIMEOUT_MS;

/// Connection factory for the client side.
///
/// Owns a validated configuration and produces one [`ShadowStream`] per
/// call to [`connect`](Self::connect).
pub struct ShadowClient {
    config: ShadowConfig,
}

impl ShadowClient {
    /// Create a factory from a configuration, validating it up front.
    pub fn new(config: ShadowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this factory connects with.
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Dial the configured server and complete the handshake.
    pub async fn connect(&self) -> Result<ShadowStream<TcpStream>> {
        self.connect_with_timeout(Duration::from_millis(HANDSHAKE_TIMEOUT_MS))
            .await
    }

    /// Dial with a custom combined connect-and-handshake timeout.
    pub async fn connect_with_timeout(
        &self,
        limit: Duration,
    ) -> Result<ShadowStream<TcpStream>> {
        let endpoint = (self.config.server_host.as_str(), self.config.server_port);

        timeout(limit, async {
            let stream = TcpStream::connect(endpoint).await?;
            stream.set_nodelay(true)?;
            ShadowStream::client(stream, &self.config).await
        })
        .await
        .map_err(|_| {
            Error::Network(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!(
                    "connect to {}:{} timed out",
                    self.config.server_host, self.config.server_port
                ),
            ))
        })?
    }
}
