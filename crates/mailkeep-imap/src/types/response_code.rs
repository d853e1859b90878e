//! Bracketed codes on status lines, such as `[TRYCREATE]`.

use super::{Capability, Flag, SeqNum};

/// The code between brackets after a status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `ALERT`: text meant for the user.
    Alert,
    /// `CAPABILITY ...`, usually in the greeting or after LOGIN.
    Capability(Vec<Capability>),
    /// `PARSE`: the server could not parse a message.
    Parse,
    /// `PERMANENTFLAGS (...)` from SELECT.
    PermanentFlags(Vec<Flag>),
    /// `READ-ONLY` from SELECT.
    ReadOnly,
    /// `READ-WRITE` from SELECT.
    ReadWrite,
    /// `TRYCREATE`: the target of COPY or APPEND does not exist.
    TryCreate,
    /// `UIDNEXT n`
    UidNext(u32),
    /// `UIDVALIDITY n`
    UidValidity(u32),
    /// `UNSEEN n`: the first unseen message.
    Unseen(SeqNum),
    /// Any other code, such as Gmail's `AUTHENTICATIONFAILED`.
    Unknown(String),
}

