//! The header block of a message.

use std::collections::HashMap;

use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};

/// Header fields of one message. Names compare without regard to case.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: HashMap<String, Vec<String>>,
}

impl Headers {
    /// No fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let mut name = name.into();
        name.make_ascii_lowercase();
        self.fields.entry(name).or_default().push(value.into());
    }

    fn values(&self, name: &str) -> &[String] {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// First occurrence of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    /// Every occurrence of `name`, in message order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.values(name).iter().map(String::as_str).collect()
    }

    /// Like [`Headers::get`], but absence is an error.
    ///
    /// # Errors
    ///
    /// [`Error::MissingHeader`] naming `name`.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::MissingHeader(name.to_string()))
    }

    /// Distinct field names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the message had no header fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reads the fields above the first empty line of `raw`.
    ///
    /// Continuation lines are unfolded with one space. Invalid UTF-8 is
    /// replaced, not rejected.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(header_section(raw));
        let mut headers = Self::new();
        let mut pending: Option<(&str, String)> = None;

        for line in text.lines() {
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = pending.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = pending.take() {
                headers.add(name, value);
            }
            // no colon: an mbox "From " line or junk
            pending = line
                .split_once(':')
                .map(|(name, value)| (name.trim(), value.trim().to_string()));
        }
        if let Some((name, value)) = pending {
            headers.add(name, value);
        }
        headers
    }

    /// `value` with any RFC 2047 encoded words decoded.
    ///
    /// # Errors
    ///
    /// Fails on a malformed encoded word.
    pub fn decode_value(value: &str) -> Result<String> {
        decode_rfc2047(value)
    }
}

/// `raw` up to the first empty line.
fn header_section(raw: &[u8]) -> &[u8] {
    let mut offset = 0;
    for line in raw.split_inclusive(|&b| b == b'\n') {
        if line == b"\n" || line == b"\r\n" {
            break;
        }
        offset += line.len();
    }
    &raw[..offset]
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
    use super::*;

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Message-ID", "<a@b>");
        assert_eq!(headers.get("message-id"), Some("<a@b>"));
        assert_eq!(headers.get("MESSAGE-ID"), Some("<a@b>"));
        assert!(headers.get("Subject").is_none());
    }

    #[test]
    fn test_require() {
        let headers = Headers::parse(b"From: a@b.c\r\n\r\n");
        assert_eq!(headers.require("from").unwrap(), "a@b.c");
        assert!(matches!(
            headers.require("Date"),
            Err(Error::MissingHeader(name)) if name == "Date"
        ));
    }

    #[test]
    fn test_parse_folded() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "Subject: A rather long\r\n",
            "\tsubject line\r\n",
            "Received: from a\r\n",
            "Received: from b\r\n",
            "\r\n",
            "Subject: not a header\r\n",
        );

        let headers = Headers::parse(raw.as_bytes());
        assert_eq!(headers.get("Subject"), Some("A rather long subject line"));
        assert_eq!(headers.get_all("received"), vec!["from a", "from b"]);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_parse_bare_newlines() {
        let headers = Headers::parse(b"From: x@y.z\nSubject: hi\n\nbody: no");
        assert_eq!(headers.get("subject"), Some("hi"));
        assert!(headers.get("body").is_none());
    }

    #[test]
    fn test_parse_skips_mbox_separator() {
        let headers = Headers::parse(b"From alice Fri May  1 10:00:00 2020\r\nFrom: a@b.c\r\n\r\n");
        assert_eq!(headers.get("from"), Some("a@b.c"));
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let headers = Headers::parse(b"Subject: caf\xe9\r\n\r\n");
        assert_eq!(headers.get("subject"), Some("caf\u{fffd}"));
    }

    #[test]
    fn test_parse_headers_only() {
        let headers = Headers::parse(b"Message-ID: <x@y>\r\n");
        assert_eq!(headers.get("message-id"), Some("<x@y>"));
        assert!(Headers::parse(b"").is_empty());
    }
}
