//! Parsed response data.

use crate::types::{Capability, Flags, ListResponse, ResponseCode, SeqNum};

/// A FETCH data item the transfer code reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `FLAGS (...)`
    Flags(Flags),
    /// `INTERNALDATE`, unparsed.
    InternalDate(String),
    /// `RFC822.SIZE`
    Rfc822Size(u32),
    /// `BODY[section]<origin>` or `RFC822`.
    Body {
        /// Section specifier as echoed by the server (`None` for the whole message).
        section: Option<String>,
        /// Partial fetch origin.
        origin: Option<u32>,
        /// Section bytes; `None` when the server sent NIL.
        data: Option<Vec<u8>>,
    },
}

/// What followed `* `.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// OK status.
    Ok {
        /// Bracketed code.
        code: Option<ResponseCode>,
        /// Rest of the line.
        text: String,
    },
    /// NO status.
    No {
        /// Bracketed code.
        code: Option<ResponseCode>,
        /// Rest of the line.
        text: String,
    },
    /// BAD status.
    Bad {
        /// Bracketed code.
        code: Option<ResponseCode>,
        /// Rest of the line.
        text: String,
    },
    /// Greeting for a pre-authenticated connection.
    PreAuth {
        /// Bracketed code.
        code: Option<ResponseCode>,
        /// Rest of the line.
        text: String,
    },
    /// Server is closing the connection.
    Bye {
        /// Bracketed code.
        code: Option<ResponseCode>,
        /// Rest of the line.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* LIST ...`
    List(ListResponse),
    /// Flags the selected mailbox knows.
    Flags(Flags),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`; later numbers shift down by one.
    Expunge(SeqNum),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// `* SEARCH ...` hits, possibly none.
    Search(Vec<SeqNum>),
}
