//! Opening byte streams to the server.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use super::config::{Config, Security};
use super::stream::ImapStream;
use crate::{Error, Result};

/// Opens a fresh byte stream to the server.
///
/// A reconnecting caller holds on to its transport and calls
/// [`connect`](Self::connect) again after a failure.
pub trait Transport: Send + Sync {
    /// The stream type produced.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Opens a new stream. The server greeting has not been read yet.
    fn connect(&self) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Network transport over TCP, with TLS unless [`Security::None`] is set.
#[derive(Debug, Clone)]
pub struct TlsTransport {
    config: Config,
}

impl TlsTransport {
    /// Creates a transport for the given configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the connection configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}

impl Transport for TlsTransport {
    type Stream = ImapStream;

    fn connect(&self) -> impl Future<Output = Result<ImapStream>> + Send {
        let Config {
            host,
            port,
            security,
            connect_timeout,
            ..
        } = self.config.clone();

        async move {
            tracing::debug!(%host, port, ?security, "connecting");
            let open = async {
                match security {
                    Security::Implicit => ImapStream::connect_tls(&host, port).await,
                    Security::None => ImapStream::connect_plain(&host, port).await,
                }
            };
            tokio::time::timeout(connect_timeout, open)
                .await
                .map_err(|_| Error::Timeout(connect_timeout))?
        }
    }
}
