//! IMAP client errors.

use std::time::Duration;

use thiserror::Error;

use crate::connection::Stalled;

/// Failure of a connection or of one command on it.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket read, write or connect failed, or the peer closed.
    #[error("connection I/O failed: {0}")]
    Io(#[source] std::io::Error),

    /// TLS handshake or record layer failed.
    #[error("TLS failed: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name unusable for certificate verification.
    #[error("not a valid TLS server name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server bytes that do not parse.
    #[error("unparsable response at byte {position}: {message}")]
    Parse {
        /// Offset into the response.
        position: usize,
        /// What was wrong.
        message: String,
    },

    /// LOGIN rejected by the server.
    #[error("login rejected: {0}")]
    Auth(String),

    /// Tagged `NO`; the text includes any response code.
    #[error("server said NO: {0}")]
    No(String),

    /// Tagged `BAD`.
    #[error("server said BAD: {0}")]
    Bad(String),

    /// `BYE` before the command completed.
    #[error("server hung up: {0}")]
    Bye(String),

    /// Connecting, or a single read or write, made no progress within the
    /// limit.
    #[error("stalled for {0:?}")]
    Timeout(Duration),

    /// Command not valid in the current session state.
    #[error("wrong session state: {0}")]
    InvalidState(String),

    /// Well-formed but unexpected server behaviour.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Mailbox name that is not valid modified UTF-7.
    #[error("bad mailbox name encoding: {0}")]
    MailboxEncoding(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.get_ref().and_then(|cause| cause.downcast_ref::<Stalled>()) {
            Some(Stalled(limit)) => Self::Timeout(*limit),
            None => Self::Io(err),
        }
    }
}

impl Error {
    /// Whether the connection itself failed, as opposed to the server
    /// answering NO or BAD. A reconnect may cure these.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::Bye(_) | Self::Timeout(_)
        )
    }

    /// Whether LOGIN was rejected.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

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
    use super::*;

    #[test]
    fn test_transport_classification() {
        let eof = Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed",
        ));
        assert!(eof.is_transport());
        assert!(Error::Bye("shutting down".into()).is_transport());
        assert!(Error::Timeout(Duration::from_secs(60)).is_transport());

        assert!(!Error::No("[NONEXISTENT] Unknown Mailbox".into()).is_transport());
        assert!(!Error::Bad("parse error".into()).is_transport());
        assert!(!Error::Auth("Invalid credentials".into()).is_transport());
    }

    #[test]
    fn test_auth_classification() {
        assert!(Error::Auth("Invalid credentials".into()).is_auth());
        assert!(!Error::No("nope".into()).is_auth());
    }
}
