//! Mailbox names, SELECT status and LIST entries.

use super::Flags;
use crate::{Result, utf7};

/// Mailbox name in its wire form (modified UTF-7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Wraps a name that is already in wire form.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Encodes a human-readable name into wire form.
    #[must_use]
    pub fn from_display(name: &str) -> Self {
        Self(utf7::encode(name))
    }

    /// `INBOX`.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// INBOX is matched without regard to case; `INBOX/x` is not INBOX.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0.eq_ignore_ascii_case("INBOX")
    }

    /// The wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a user sees it, e.g. `Práce` for `Pr&AOE-ce`.
    ///
    /// # Errors
    ///
    /// Fails on malformed modified UTF-7.
    pub fn display_name(&self) -> Result<String> {
        utf7::decode(&self.0)
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What SELECT reported about a mailbox.
#[derive(Debug, Clone, Default)]
pub struct MailboxStatus {
    /// Message count from `* n EXISTS`.
    pub exists: u32,
    /// `* n RECENT`; Gmail always sends 0.
    pub recent: u32,
    /// `[UIDVALIDITY n]`, if sent.
    pub uid_validity: Option<u32>,
    /// `* FLAGS (...)`.
    pub flags: Flags,
    /// Completion carried `[READ-ONLY]`.
    pub read_only: bool,
}

/// One `* LIST` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Attributes in the order sent.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy separator, `/` on Gmail; `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Wire name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// False for `\Noselect` containers such as `[Gmail]`.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.attributes.contains(&MailboxAttribute::NoSelect)
    }
}

/// A LIST attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\HasChildren`
    HasChildren,
    /// `\All`, Gmail's All Mail (RFC 6154).
    All,
    /// `\Trash` (RFC 6154).
    Trash,
    /// Anything else, verbatim, such as `\Important`.
    Unknown(String),
}

impl MailboxAttribute {
    /// Reads an attribute, ignoring case.
    #[must_use]
    pub fn parse(atom: &str) -> Self {
        const KNOWN: [(&str, MailboxAttribute); 5] = [
            ("\\Noselect", MailboxAttribute::NoSelect),
            ("\\HasNoChildren", MailboxAttribute::HasNoChildren),
            ("\\HasChildren", MailboxAttribute::HasChildren),
            ("\\All", MailboxAttribute::All),
            ("\\Trash", MailboxAttribute::Trash),
        ];
        KNOWN
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(atom))
            .map_or_else(|| Self::Unknown(atom.to_string()), |(_, attr)| attr)
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
    use super::*;

    #[test]
    fn test_from_display_encodes() {
        let mb = Mailbox::from_display("[Gmail]/Wysłane");
        assert_eq!(mb.as_str(), "[Gmail]/Wys&AUI-ane");
        assert_eq!(mb.display_name().unwrap(), "[Gmail]/Wysłane");
    }

    #[test]
    fn test_is_inbox() {
        assert!(Mailbox::inbox().is_inbox());
        assert!(Mailbox::new("Inbox").is_inbox());
        assert!(!Mailbox::new("INBOX/Receipts").is_inbox());
    }

    #[test]
    fn test_attribute_parse() {
        assert_eq!(
            MailboxAttribute::parse("\\Noselect"),
            MailboxAttribute::NoSelect
        );
        assert_eq!(MailboxAttribute::parse("\\All"), MailboxAttribute::All);
        assert_eq!(
            MailboxAttribute::parse("\\Important"),
            MailboxAttribute::Unknown("\\Important".to_string())
        );
    }

    #[test]
    fn test_selectable() {
        let list = ListResponse {
            attributes: vec![MailboxAttribute::NoSelect, MailboxAttribute::HasChildren],
            delimiter: Some('/'),
            mailbox: Mailbox::new("[Gmail]"),
        };
        assert!(!list.is_selectable());
    }
}
