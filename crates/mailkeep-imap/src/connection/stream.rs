//! The network stream under a connection.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::Result;

/// A TCP stream to the server, wrapped in TLS unless connecting to a local
/// plaintext test server.
pub enum ImapStream {
    /// Plain TCP.
    Plain(TcpStream),
    /// TLS over TCP.
    Tls(Box<TlsStream<TcpStream>>),
}

/// Client configuration trusting the Mozilla root set, built once.
static TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
});

impl ImapStream {
    /// Connects and completes the TLS handshake for `host`.
    ///
    /// # Errors
    ///
    /// Fails if the host name is invalid, the TCP connect fails, or the
    /// handshake (certificate check included) fails.
    pub async fn connect_tls(host: &str, port: u16) -> Result<Self> {
        let name = ServerName::try_from(host.to_string())?;
        let tcp = TcpStream::connect((host, port)).await?;
        let tls = TlsConnector::from(Arc::clone(&TLS_CONFIG))
            .connect(name, tcp)
            .await?;
        Ok(Self::Tls(Box::new(tls)))
    }

    /// Connects without encryption.
    ///
    /// # Errors
    ///
    /// Fails if the TCP connect fails.
    pub async fn connect_plain(host: &str, port: u16) -> Result<Self> {
        TcpStream::connect((host, port))
            .await
            .map(Self::Plain)
            .map_err(Into::into)
    }

    /// Whether the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

macro_rules! delegate {
    ($this:expr, $s:ident => $call:expr) => {
        match $this.get_mut() {
            ImapStream::Plain($s) => {
                let $s = Pin::new($s);
                $call
            }
            ImapStream::Tls($s) => {
                let $s = Pin::new($s.as_mut());
                $call
            }
        }
    };
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        delegate!(self, s => s.poll_read(cx, buf))
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        delegate!(self, s => s.poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        delegate!(self, s => s.poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        delegate!(self, s => s.poll_shutdown(cx))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[test]
    fn test_tls_config_is_shared() {
        let first = Arc::clone(&TLS_CONFIG);
        assert!(Arc::ptr_eq(&first, &TLS_CONFIG));
        assert!(first.alpn_protocols.is_empty());
    }

    #[tokio::test]
    async fn test_plain_stream_carries_bytes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"* OK ready\r\n").await.unwrap();
        });

        let mut stream = ImapStream::connect_plain("127.0.0.1", port).await.unwrap();
        assert!(!stream.is_tls());
        let mut greeting = Vec::new();
        stream.read_to_end(&mut greeting).await.unwrap();
        assert_eq!(greeting, b"* OK ready\r\n");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_plain_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = ImapStream::connect_plain("127.0.0.1", port)
            .await
            .err()
            .unwrap();
        assert!(err.is_transport());
    }
}
