//! Commands and their wire form.
//!
//! Only what a mailbox transfer needs is modelled. APPEND goes out in two
//! steps: [`Command::Append`] is the line announcing the literal, and the
//! client sends the message bytes once the server asks for them.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{Flag, Mailbox, SequenceSet};

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

use serialize::Line;

/// A command this client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `LOGIN user password`
    Login {
        /// Gmail address.
        username: String,
        /// App password.
        password: String,
    },
    /// `LOGOUT`
    Logout,
    /// `LIST reference pattern`
    List {
        /// Usually empty.
        reference: String,
        /// `*` for every mailbox.
        pattern: String,
    },
    /// `SELECT mailbox`
    Select {
        /// Mailbox to open read-write.
        mailbox: Mailbox,
    },
    /// `CREATE mailbox`
    Create {
        /// New mailbox, which Gmail shows as a label.
        mailbox: Mailbox,
    },
    /// `DELETE mailbox`
    Delete {
        /// Mailbox to remove.
        mailbox: Mailbox,
    },
    /// The APPEND line, ending with the `{n}` literal announcement.
    Append {
        /// Destination.
        mailbox: Mailbox,
        /// Left off the line when empty.
        flags: Vec<Flag>,
        /// `DD-Mon-YYYY HH:MM:SS +ZZZZ`
        internal_date: Option<String>,
        /// Message size in bytes.
        length: usize,
    },
    /// `SEARCH criteria`
    Search {
        /// What to match.
        criteria: SearchCriteria,
    },
    /// `FETCH set items`
    Fetch {
        /// Messages to fetch.
        sequence: SequenceSet,
        /// Parts to return.
        items: FetchItems,
    },
    /// `STORE set action`
    Store {
        /// Messages to change.
        sequence: SequenceSet,
        /// Flag change.
        action: StoreAction,
        /// Use `.SILENT` to suppress the FETCH echo.
        silent: bool,
    },
    /// `COPY set mailbox`
    Copy {
        /// Messages to copy.
        sequence: SequenceSet,
        /// Destination, which must exist.
        mailbox: Mailbox,
    },
    /// `EXPUNGE`
    Expunge,
}

impl Command {
    /// The complete line, CRLF included, carrying `tag`.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut line = Line::start(tag, self.name());
        match self {
            Self::Logout | Self::Expunge => {}
            Self::Login { username, password } => {
                line.arg(username.as_str()).arg(password.as_str());
            }
            Self::Select { mailbox } | Self::Create { mailbox } | Self::Delete { mailbox } => {
                line.arg(mailbox);
            }
            Self::List { reference, pattern } => {
                line.arg(reference.as_str()).arg(pattern.as_str());
            }
            Self::Append {
                mailbox,
                flags,
                internal_date,
                length,
            } => {
                line.arg(mailbox);
                if !flags.is_empty() {
                    line.arg(flags.as_slice());
                }
                if let Some(date) = internal_date {
                    line.word(&format!("\"{date}\""));
                }
                line.word(&format!("{{{length}}}"));
            }
            Self::Search { criteria } => {
                line.arg(criteria);
            }
            Self::Fetch { sequence, items } => {
                line.word(&sequence.to_string()).arg(items);
            }
            Self::Store {
                sequence,
                action,
                silent,
            } => {
                line.word(&sequence.to_string()).arg(&(action, *silent));
            }
            Self::Copy { sequence, mailbox } => {
                line.word(&sequence.to_string()).arg(mailbox);
            }
        }
        line.finish()
    }

    /// The command keyword.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::List { .. } => "LIST",
            Self::Append { .. } => "APPEND",
            Self::Expunge => "EXPUNGE",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
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
    fn test_login_quoted() {
        let cmd = Command::Login {
            username: "user@gmail.com".to_string(),
            password: "abcd efgh \"ij\"".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0001"),
            b"A0001 LOGIN user@gmail.com \"abcd efgh \\\"ij\\\"\"\r\n"
        );
    }

    #[test]
    fn test_select_gmail_folder() {
        let cmd = Command::Select {
            mailbox: Mailbox::new("[Gmail]/All Mail"),
        };
        assert_eq!(cmd.serialize("A0002"), b"A0002 SELECT \"[Gmail]/All Mail\"\r\n");

        let cmd = Command::Select {
            mailbox: Mailbox::new("[Gmail]/Trash"),
        };
        assert_eq!(cmd.serialize("A0003"), b"A0003 SELECT [Gmail]/Trash\r\n");
    }

    #[test]
    fn test_list_command() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(cmd.serialize("A0001"), b"A0001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn test_append_line() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("[Gmail]/All Mail"),
            flags: vec![Flag::Seen],
            internal_date: Some("05-Mar-2021 14:07:09 +0000".to_string()),
            length: 42,
        };
        assert_eq!(
            cmd.serialize("A0004"),
            b"A0004 APPEND \"[Gmail]/All Mail\" (\\Seen) \"05-Mar-2021 14:07:09 +0000\" {42}\r\n"
        );
    }

    #[test]
    fn test_append_bare() {
        let cmd = Command::Append {
            mailbox: Mailbox::inbox(),
            flags: Vec::new(),
            internal_date: None,
            length: 7,
        };
        assert_eq!(cmd.serialize("A0001"), b"A0001 APPEND INBOX {7}\r\n");
    }

    #[test]
    fn test_fetch_peek_header_fields() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::single(12).unwrap(),
            items: FetchItems::header_fields(&["MESSAGE-ID"]),
        };
        assert_eq!(
            cmd.serialize("A0005"),
            b"A0005 FETCH 12 BODY.PEEK[HEADER.FIELDS (MESSAGE-ID)]\r\n"
        );
    }

    #[test]
    fn test_fetch_full_body() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::single(3).unwrap(),
            items: FetchItems::full_body(),
        };
        assert_eq!(cmd.serialize("A0006"), b"A0006 FETCH 3 BODY.PEEK[]\r\n");
    }

    #[test]
    fn test_fetch_multiple_attributes() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::range(1, 10).unwrap(),
            items: FetchItems::Items(vec![FetchAttribute::Flags, FetchAttribute::InternalDate]),
        };
        assert_eq!(
            cmd.serialize("A0001"),
            b"A0001 FETCH 1:10 (FLAGS INTERNALDATE)\r\n"
        );
    }

    #[test]
    fn test_store_silent_deleted() {
        let cmd = Command::Store {
            sequence: SequenceSet::range(1, 4).unwrap(),
            action: StoreAction::SetFlags(vec![Flag::Deleted]),
            silent: true,
        };
        assert_eq!(
            cmd.serialize("A0007"),
            b"A0007 STORE 1:4 FLAGS.SILENT (\\Deleted)\r\n"
        );
    }

    #[test]
    fn test_search_date_window() {
        let cmd = Command::Search {
            criteria: SearchCriteria::And(vec![
                SearchCriteria::Since("01-Jan-2020".to_string()),
                SearchCriteria::Before("03-Feb-2020".to_string()),
            ]),
        };
        assert_eq!(
            cmd.serialize("A0008"),
            b"A0008 SEARCH SINCE 01-Jan-2020 BEFORE 03-Feb-2020\r\n"
        );
    }

    #[test]
    fn test_search_header() {
        let cmd = Command::Search {
            criteria: SearchCriteria::Header(
                "Message-ID".to_string(),
                "<abc@mail.gmail.com>".to_string(),
            ),
        };
        assert_eq!(
            cmd.serialize("A0009"),
            b"A0009 SEARCH HEADER Message-ID <abc@mail.gmail.com>\r\n"
        );
    }

    #[test]
    fn test_search_not_deleted() {
        let cmd = Command::Search {
            criteria: SearchCriteria::Not(Box::new(SearchCriteria::Deleted)),
        };
        assert_eq!(cmd.serialize("A0001"), b"A0001 SEARCH NOT DELETED\r\n");
    }

    #[test]
    fn test_copy_command() {
        let set = SequenceSet::from_numbers(&[
            crate::types::SeqNum::new(2).unwrap(),
            crate::types::SeqNum::new(3).unwrap(),
            crate::types::SeqNum::new(9).unwrap(),
        ])
        .unwrap();
        let cmd = Command::Copy {
            sequence: set,
            mailbox: Mailbox::from_display("Reçus"),
        };
        assert_eq!(cmd.serialize("A0010"), b"A0010 COPY 2:3,9 Re&AOc-us\r\n");
    }
}
