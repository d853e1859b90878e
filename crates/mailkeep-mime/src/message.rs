//! Raw messages and their derived attributes.

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::date;
use crate::error::{Error, Result};
use crate::header::Headers;

/// Shown in place of a sender or subject that cannot be decoded.
pub const UNPARSEABLE_HEADER: &str = "<unparseable header>";

#[allow(clippy::expect_used)]
static BRACKETED_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*<(.*@.*\..*)>.*$").expect("valid address regex")
});

/// A raw message plus its parsed header section.
///
/// The body is kept byte-for-byte; only the headers are interpreted.
#[derive(Debug, Clone)]
pub struct Message {
    raw: Vec<u8>,
    headers: Headers,
}

impl Message {
    /// Parses the header section of a raw message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for an empty message.
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::InvalidHeader("empty message".to_string()));
        }
        let headers = Headers::parse(&raw);
        Ok(Self { raw, headers })
    }

    /// Returns the raw message bytes.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Consumes the message, returning the raw bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    /// Returns the parsed headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the stable deduplication key for this message.
    ///
    /// This is the `Message-ID` with its angle brackets trimmed. Without one,
    /// the key is synthesized as `from.subject.sha256(raw)` from the raw
    /// header values. Either way non-ASCII and control characters become `?`.
    #[must_use]
    pub fn identity(&self) -> String {
        if let Some(id) = self.headers.get("message-id").map(normalize_identity)
            && !id.is_empty()
        {
            return id;
        }

        let digest = Sha256::digest(&self.raw);
        let hex = digest.iter().fold(String::with_capacity(64), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        });
        let synthesized = format!(
            "{}.{}.{}",
            self.headers.get("from").unwrap_or_default(),
            self.headers.get("subject").unwrap_or_default(),
            hex
        );
        only_ascii(&synthesized)
    }

    /// Returns the sent date from the `Date` header.
    #[must_use]
    pub fn sent_date(&self) -> NaiveDateTime {
        date::sent_date(self.headers.get("date"))
    }

    /// Returns the decoded sender, reduced to the bare address when the
    /// header has the `Name <address>` form.
    #[must_use]
    pub fn sender(&self) -> String {
        let from = self.decoded("from");
        BRACKETED_ADDRESS
            .captures(&from)
            .and_then(|caps| caps.get(1))
            .map_or_else(|| from.clone(), |m| m.as_str().to_string())
    }

    /// Returns the part of [`sender`](Self::sender) before the `@`.
    #[must_use]
    pub fn sender_local_part(&self) -> String {
        let sender = self.sender();
        match sender.split_once('@') {
            Some((local, _)) => local.to_string(),
            None => sender,
        }
    }

    /// Returns the decoded subject.
    #[must_use]
    pub fn subject(&self) -> String {
        self.decoded("subject")
    }

    fn decoded(&self, name: &str) -> String {
        self.headers
            .get(name)
            .and_then(|value| Headers::decode_value(value).ok())
            .unwrap_or_else(|| UNPARSEABLE_HEADER.to_string())
    }
}

/// Normalizes a raw `Message-ID` value into an identity.
#[must_use]
pub fn normalize_identity(value: &str) -> String {
    only_ascii(value.trim().trim_start_matches('<').trim_end_matches('>'))
}

/// Reads the identity out of a fetched header block, if it carries a
/// non-empty `Message-ID`.
#[must_use]
pub fn identity_from_header_block(block: &[u8]) -> Option<String> {
    Headers::parse(block)
        .get("message-id")
        .map(normalize_identity)
        .filter(|id| !id.is_empty())
}

fn only_ascii(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
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
    use chrono::NaiveDate;

    use super::*;

    fn message(raw: &str) -> Message {
        Message::parse(raw.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            Message::parse(b"\r\n".to_vec()),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_identity_from_message_id() {
        let msg = message("Message-ID: <CAF+x=1@mail.gmail.com>\r\n\r\nbody");
        assert_eq!(msg.identity(), "CAF+x=1@mail.gmail.com");
    }

    #[test]
    fn test_identity_replaces_non_ascii() {
        let msg = message("Message-Id:   <zprávа@example.com>  \r\n\r\n");
        assert_eq!(msg.identity(), "zpr?v?@example.com");
    }

    #[test]
    fn test_identity_synthesized() {
        let raw = "From: alice@example.com\r\nSubject: hi\r\n\r\nbody";
        let a = message(raw);
        let b = message(raw);

        let id = a.identity();
        assert!(id.starts_with("alice@example.com.hi."));
        assert_eq!(id.len(), "alice@example.com.hi.".len() + 64);
        assert_eq!(id, b.identity());

        let c = message("From: alice@example.com\r\nSubject: hi\r\n\r\nbody ");
        assert_ne!(id, c.identity());
    }

    #[test]
    fn test_identity_blank_message_id_synthesized() {
        let msg = message("Message-ID: <>\r\nSubject: x\r\n\r\n");
        assert!(msg.identity().starts_with(".x."));
    }

    #[test]
    fn test_identity_from_header_block() {
        assert_eq!(
            identity_from_header_block(b"Message-ID: <a@b.c>\r\n\r\n").as_deref(),
            Some("a@b.c")
        );
        assert_eq!(identity_from_header_block(b"\r\n"), None);
        assert_eq!(identity_from_header_block(b"Message-ID: \r\n\r\n"), None);
    }

    #[test]
    fn test_sender_and_subject() {
        let msg = message(concat!(
            "From: =?utf-8?Q?Zo=C3=AB?= <Zoe@Example.com>\r\n",
            "Subject: =?utf-8?B?w7xiZXI=?=\r\n",
            "\r\n",
        ));
        assert_eq!(msg.sender(), "Zoe@Example.com");
        assert_eq!(msg.sender_local_part(), "Zoe");
        assert_eq!(msg.subject(), "über");
    }

    #[test]
    fn test_sender_without_brackets() {
        let msg = message("From: bob@example.org\r\n\r\n");
        assert_eq!(msg.sender(), "bob@example.org");
        assert_eq!(msg.sender_local_part(), "bob");
    }

    #[test]
    fn test_unparseable_fallback() {
        let msg = message("Subject: =?utf-8?B?###?=\r\n\r\n");
        assert_eq!(msg.subject(), UNPARSEABLE_HEADER);
        assert_eq!(msg.sender(), UNPARSEABLE_HEADER);
    }

    #[test]
    fn test_sent_date() {
        let msg = message("Date: Fri, 1 May 2020 10:00:00 +0200\r\n\r\n");
        assert_eq!(
            msg.sent_date(),
            NaiveDate::from_ymd_opt(2020, 5, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
        assert_eq!(message("Subject: x\r\n\r\n").sent_date(), date::epoch());
    }

    #[test]
    fn test_raw_preserved() {
        let raw = b"Subject: x\r\n\r\n\xff\xfe binary".to_vec();
        let msg = Message::parse(raw.clone()).unwrap();
        assert_eq!(msg.raw(), raw.as_slice());
        assert_eq!(msg.into_raw(), raw);
    }
}
