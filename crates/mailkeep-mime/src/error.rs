//! Message decoding errors.

use std::string::FromUtf8Error;

/// Result with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Why a stored or fetched message could not be read.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header section that does not split into fields.
    #[error("malformed header: {0}")]
    InvalidHeader(String),

    /// Encoded word or transfer encoding that does not decode.
    #[error("undecodable text: {0}")]
    InvalidEncoding(String),

    /// Bad base64 in an encoded word.
    #[error("bad base64: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Decoded bytes are not UTF-8.
    #[error("decoded text is not UTF-8: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// A header the caller needs is absent.
    #[error("no {0} header")]
    MissingHeader(String),
}
