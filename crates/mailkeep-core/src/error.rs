//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in backup, restore and clear operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailkeep_imap::Error),

    /// A stored or fetched message could not be decoded.
    #[error("Message error: {0}")]
    Mime(#[from] mailkeep_mime::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive error.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// None of the known folder-name profiles matches the account.
    #[error(
        "No known language profile matches this account's folders; \
         check that IMAP access to All Mail and Trash is enabled"
    )]
    NoMatchingProfile,

    /// An explicitly requested profile does not exist.
    #[error("Unknown language profile: {0}")]
    UnknownProfile(String),

    /// The host cancelled the operation.
    #[error("Operation interrupted")]
    Interrupted,
}

impl Error {
    /// Returns a short stable name for the error's category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Imap(e) if e.is_auth() => "auth",
            Self::Imap(mailkeep_imap::Error::Timeout(_)) => "timeout",
            Self::Imap(mailkeep_imap::Error::Bye(_)) => "aborted",
            Self::Imap(e) if e.is_transport() => "network",
            Self::Imap(_) => "imap",
            Self::Mime(_) => "message",
            Self::Io(_) => "io",
            Self::Archive(_) => "archive",
            Self::Config(_) | Self::NoMatchingProfile | Self::UnknownProfile(_) => "config",
            Self::Interrupted => "interrupted",
        }
    }

    /// Returns true if the error must stop a bulk operation rather than
    /// skip the current message.
    ///
    /// Transport failures reach the engines only after reconnection has
    /// been exhausted, so they end the run; a single rejected command or an
    /// unreadable message does not.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Imap(e) => e.is_transport() || e.is_auth(),
            Self::Config(_) | Self::NoMatchingProfile | Self::UnknownProfile(_) | Self::Interrupted => {
                true
            }
            Self::Mime(_) | Self::Io(_) | Self::Archive(_) => false,
        }
    }
}

/// Result type alias using our Error type.
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
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(Error::Interrupted.kind(), "interrupted");
        assert_eq!(Error::NoMatchingProfile.kind(), "config");
        assert_eq!(
            Error::Imap(mailkeep_imap::Error::Auth("Invalid credentials".into())).kind(),
            "auth"
        );
        assert_eq!(
            Error::Imap(mailkeep_imap::Error::Timeout(Duration::from_secs(60))).kind(),
            "timeout"
        );
        assert_eq!(
            Error::Imap(mailkeep_imap::Error::No("nope".into())).kind(),
            "imap"
        );
    }

    #[test]
    fn test_fatal_classification() {
        let dropped = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(Error::Imap(dropped.into()).is_fatal());
        assert!(Error::Interrupted.is_fatal());
        assert!(!Error::Imap(mailkeep_imap::Error::No("[TRYCREATE]".into())).is_fatal());
        assert!(!Error::Io(std::io::Error::other("disk full")).is_fatal());
        assert!(!Error::Mime(mailkeep_mime::Error::InvalidHeader("empty".into())).is_fatal());
    }
}
