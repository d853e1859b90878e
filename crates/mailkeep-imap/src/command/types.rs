//! Arguments of SEARCH, FETCH and STORE.

use crate::types::Flag;

/// What a FETCH asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// The `FAST` macro: flags, internal date and size.
    Fast,
    /// An explicit attribute list; a single attribute goes out unparenthesized.
    Items(Vec<FetchAttribute>),
}

impl FetchItems {
    /// `BODY.PEEK[]`: the raw message, leaving `\Seen` alone.
    #[must_use]
    pub fn full_body() -> Self {
        Self::Items(vec![FetchAttribute::peek(None)])
    }

    /// `BODY.PEEK[HEADER.FIELDS (...)]` for the given field names.
    #[must_use]
    pub fn header_fields(fields: &[&str]) -> Self {
        let section = format!("HEADER.FIELDS ({})", fields.join(" "));
        Self::Items(vec![FetchAttribute::peek(Some(section))])
    }
}

/// One FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `BODY[section]` or `BODY.PEEK[section]`.
    Body {
        /// Text between the brackets; empty for the whole message.
        section: Option<String>,
        /// Use the `.PEEK` form.
        peek: bool,
    },
}

impl FetchAttribute {
    const fn peek(section: Option<String>) -> Self {
        Self::Body {
            section,
            peek: true,
        }
    }
}

/// How STORE changes the flag set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `FLAGS`: replace.
    SetFlags(Vec<Flag>),
    /// `+FLAGS`: add.
    AddFlags(Vec<Flag>),
    /// `-FLAGS`: remove.
    RemoveFlags(Vec<Flag>),
}

/// SEARCH keys. Dates are already in `DD-Mon-YYYY` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// `ALL`
    All,
    /// `SINCE date`, inclusive.
    Since(String),
    /// `BEFORE date`, exclusive.
    Before(String),
    /// `DELETED`
    Deleted,
    /// `HEADER field value`
    Header(String, String),
    /// Keys written side by side, which the server intersects.
    And(Vec<Self>),
    /// `NOT key`
    Not(Box<Self>),
}
