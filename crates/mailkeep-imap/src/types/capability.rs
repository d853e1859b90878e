//! Completion status and advertised capabilities.

use std::fmt;

/// Status word of a tagged or untagged status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`
    Ok,
    /// `NO`: the server refused, for example a wrong password or a
    /// missing mailbox.
    No,
    /// `BAD`: the server did not understand the command.
    Bad,
    /// `PREAUTH`, greeting only.
    PreAuth,
    /// `BYE`: the server is about to hang up.
    Bye,
}

impl Status {
    /// `OK` and `PREAUTH` count as success.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// One entry of a CAPABILITY list.
///
/// Only the ones this client acts on get their own variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1`
    Imap4Rev1,
    /// `LOGINDISABLED`: LOGIN will be rejected.
    LoginDisabled,
    /// `AUTH=<mechanism>`
    Auth(String),
    /// `X-GM-EXT-1`: the peer is Gmail.
    GmailExt,
    /// Anything else, verbatim.
    Unknown(String),
}

impl Capability {
    /// Reads one capability atom, ignoring case.
    #[must_use]
    pub fn parse(atom: &str) -> Self {
        if atom.eq_ignore_ascii_case("IMAP4rev1") {
            Self::Imap4Rev1
        } else if atom.eq_ignore_ascii_case("LOGINDISABLED") {
            Self::LoginDisabled
        } else if atom.eq_ignore_ascii_case("X-GM-EXT-1") {
            Self::GmailExt
        } else if let Some(mechanism) = atom
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("AUTH="))
            .map(|_| &atom[5..])
        {
            Self::Auth(mechanism.to_string())
        } else {
            Self::Unknown(atom.to_string())
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imap4Rev1 => f.write_str("IMAP4rev1"),
            Self::LoginDisabled => f.write_str("LOGINDISABLED"),
            Self::GmailExt => f.write_str("X-GM-EXT-1"),
            Self::Auth(mechanism) => write!(f, "AUTH={mechanism}"),
            Self::Unknown(atom) => f.write_str(atom),
        }
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
    fn test_only_ok_and_preauth_succeed() {
        let ok: Vec<_> = [Status::Ok, Status::No, Status::Bad, Status::PreAuth, Status::Bye]
            .into_iter()
            .filter(|s| s.is_ok())
            .collect();
        assert_eq!(ok, [Status::Ok, Status::PreAuth]);
    }

    #[test]
    fn test_gmail_greeting_capabilities() {
        let caps: Vec<_> = "IMAP4rev1 UNSELECT IDLE X-GM-EXT-1 auth=XOAUTH2 AUTH=PLAIN"
            .split(' ')
            .map(Capability::parse)
            .collect();
        assert_eq!(
            caps,
            [
                Capability::Imap4Rev1,
                Capability::Unknown("UNSELECT".to_string()),
                Capability::Unknown("IDLE".to_string()),
                Capability::GmailExt,
                Capability::Auth("XOAUTH2".to_string()),
                Capability::Auth("PLAIN".to_string()),
            ]
        );
    }

    #[test]
    fn test_short_atoms_are_unknown() {
        assert_eq!(Capability::parse("AUTH"), Capability::Unknown("AUTH".to_string()));
    }

    #[test]
    fn test_display_is_wire_form() {
        assert_eq!(Capability::Auth("PLAIN".into()).to_string(), "AUTH=PLAIN");
        assert_eq!(Capability::GmailExt.to_string(), "X-GM-EXT-1");
    }
}
