//! Response framing.
//!
//! A response is a CRLF-terminated line, unless the line ends by announcing
//! a `{n}` literal: then n raw bytes follow and the response continues with
//! the next line.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const BUFFER_SIZE: usize = 16 * 1024;

/// Longest line accepted, literals excluded.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted. Gmail caps messages at 25 MB plus encoding
/// overhead.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered stream that reads whole responses and writes whole commands.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    outgoing: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `stream`.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, stream),
            outgoing: BytesMut::with_capacity(BUFFER_SIZE),
        }
    }

    /// Reads one response with its literals inlined.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();
        loop {
            let line_start = response.len();
            self.read_line(&mut response).await?;
            let Some(size) = literal_size(&response[line_start..]) else {
                return Ok(response);
            };
            if size > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {size} bytes, limit {MAX_LITERAL_SIZE}"
                )));
            }
            let literal_start = response.len();
            response.resize(literal_start + size, 0);
            self.reader
                .read_exact(&mut response[literal_start..])
                .await?;
        }
    }

    /// Appends the next line, CRLF included, to `out`.
    async fn read_line(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        let limit = MAX_LINE_LENGTH as u64;
        (&mut self.reader).take(limit).read_until(b'\n', out).await?;
        let line = &out[start..];
        if line.ends_with(b"\r\n") {
            return Ok(());
        }
        if line.len() >= MAX_LINE_LENGTH {
            return Err(Error::Protocol("line too long".to_string()));
        }
        if line.ends_with(b"\n") {
            return Err(Error::Protocol("bare LF in response".to_string()));
        }
        Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "server closed the connection",
        )))
    }

    /// Sends a serialized command line.
    pub async fn write_command(&mut self, line: &[u8]) -> Result<()> {
        self.send(&[line]).await
    }

    /// Sends a literal followed by the CRLF that ends its command.
    pub async fn write_literal(&mut self, data: &[u8]) -> Result<()> {
        self.send(&[data, b"\r\n"]).await
    }

    async fn send(&mut self, parts: &[&[u8]]) -> Result<()> {
        self.outgoing.clear();
        for part in parts {
            self.outgoing.put_slice(part);
        }
        let stream = self.reader.get_mut();
        stream.write_all(&self.outgoing).await?;
        stream.flush().await?;
        // Don't hold on to the memory of one huge APPEND.
        if self.outgoing.capacity() > BUFFER_SIZE * 64 {
            self.outgoing = BytesMut::with_capacity(BUFFER_SIZE);
        }
        Ok(())
    }

    /// Reads responses up to and including the completion tagged `tag`.
    ///
    /// An untagged BYE in between is [`Error::Bye`]: the server will not
    /// complete the command after it.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            let done = response
                .strip_prefix(tag.as_bytes())
                .is_some_and(|rest| rest.first() == Some(&b' '));
            if !done && let Some(text) = bye_text(&response) {
                return Err(Error::Bye(text));
            }
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }
}

/// Size announced by a trailing `{n}` or `{n+}` on a CRLF-terminated line.
fn literal_size(line: &[u8]) -> Option<usize> {
    let inner = line.strip_suffix(b"}\r\n")?;
    let inner = inner.strip_suffix(b"+").unwrap_or(inner);
    let digits = &inner[inner.iter().rposition(|&b| b == b'{')? + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Text of an untagged BYE.
fn bye_text(response: &[u8]) -> Option<String> {
    let prefix = response.get(..6)?;
    prefix
        .eq_ignore_ascii_case(b"* BYE ")
        .then(|| String::from_utf8_lossy(&response[6..]).trim_end().to_string())
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
    use tokio_test::io::Builder;

    use super::*;

    #[test]
    fn test_literal_size() {
        assert_eq!(literal_size(b"* 1 FETCH (BODY[] {123}\r\n"), Some(123));
        assert_eq!(literal_size(b"X {45+}\r\n"), Some(45));
        assert_eq!(literal_size(b"{0}\r\n"), Some(0));
        assert_eq!(literal_size(b"no literal\r\n"), None);
        assert_eq!(literal_size(b"unterminated {123"), None);
        assert_eq!(literal_size(b"letters {abc}\r\n"), None);
        assert_eq!(literal_size(b"empty {}\r\n"), None);
    }

    #[tokio::test]
    async fn test_literal_spanning_reads() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {12}\r\n")
            .read(b"hello\r\n")
            .read(b"world)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* 1 FETCH (BODY[] {12}\r\nhello\r\nworld)\r\n"
        );
    }

    #[tokio::test]
    async fn test_crlf_split_between_reads() {
        let mock = Builder::new().read(b"* OK ready\r").read(b"\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_truncated_line_is_transport_error() {
        let mock = Builder::new().read(b"* OK trunc").build();
        let mut framed = FramedStream::new(mock);

        assert!(framed.read_response().await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_literal_gets_crlf() {
        let mock = Builder::new().write(b"Subject: x\r\n\r\nbody\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_literal(b"Subject: x\r\n\r\nbody").await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_at_own_tag() {
        let mock = Builder::new()
            .read(b"* SEARCH 1 2\r\n")
            .read(b"A00010 OK not ours\r\n")
            .read(b"A0001 OK SEARCH completed\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let responses = framed.read_until_tagged("A0001").await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2], b"A0001 OK SEARCH completed\r\n");
    }

    #[tokio::test]
    async fn test_untagged_bye_ends_exchange() {
        let mock = Builder::new().read(b"* BYE System error\r\n").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_until_tagged("A0002").await.unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "System error"));
    }

    #[tokio::test]
    async fn test_oversized_literal_rejected() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }
}
