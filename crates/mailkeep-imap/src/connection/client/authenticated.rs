//! SELECT, from the authenticated state and shared with the selected one.

use tokio::io::{AsyncRead, AsyncWrite};

use std::fmt;

use super::Client;
use super::states::{Authenticated, Selected};
use crate::{Error, Result};
use crate::command::Command;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Mailbox, MailboxStatus, ResponseCode};

/// A failed SELECT.
///
/// When the server answered NO or BAD the session is still logged in, with
/// no mailbox selected, and [`SelectError::into_parts`] hands it back.
pub struct SelectError<S> {
    client: Option<Client<S, Authenticated>>,
    error: Error,
}

impl<S> SelectError<S> {
    pub(super) fn new<State>(client: Client<S, State>, error: Error) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let usable = matches!(error, Error::No(_) | Error::Bad(_));
        Self {
            client: usable.then(|| client.into_state(Authenticated)),
            error,
        }
    }

    /// What went wrong.
    #[must_use]
    pub const fn error(&self) -> &Error {
        &self.error
    }

    /// The still logged-in session, if the connection survived, and the
    /// error.
    #[must_use]
    pub fn into_parts(self) -> (Option<Client<S, Authenticated>>, Error) {
        (self.client, self.error)
    }
}

impl<S> From<SelectError<S>> for Error {
    fn from(failed: SelectError<S>) -> Self {
        failed.error
    }
}

impl<S> fmt::Debug for SelectError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectError")
            .field("error", &self.error)
            .field("session_kept", &self.client.is_some())
            .finish()
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens `mailbox` read-write.
    pub async fn select(
        mut self,
        mailbox: &Mailbox,
    ) -> std::result::Result<(Client<S, Selected>, MailboxStatus), SelectError<S>> {
        match select_mailbox(&mut self, mailbox).await {
            Ok(status) => {
                let selected = Selected::new(mailbox.clone(), status.clone());
                Ok((self.into_state(selected), status))
            }
            Err(error) => Err(SelectError::new(self, error)),
        }
    }
}

/// Sends SELECT and reads the status out of the replies.
pub(super) async fn select_mailbox<S, State>(
    client: &mut Client<S, State>,
    mailbox: &Mailbox,
) -> Result<MailboxStatus>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let responses = client
        .execute(&Command::Select {
            mailbox: mailbox.clone(),
        })
        .await?;
    Ok(parse_mailbox_status(&responses))
}

/// Folds EXISTS, RECENT, FLAGS, UIDVALIDITY and a READ-ONLY completion
/// into one status.
fn parse_mailbox_status(responses: &[Vec<u8>]) -> MailboxStatus {
    responses
        .iter()
        .filter_map(|raw| ResponseParser::parse(raw).ok())
        .fold(MailboxStatus::default(), |mut status, response| {
            match response {
                Response::Untagged(UntaggedResponse::Exists(n)) => status.exists = n,
                Response::Untagged(UntaggedResponse::Recent(n)) => status.recent = n,
                Response::Untagged(UntaggedResponse::Flags(flags)) => status.flags = flags,
                Response::Untagged(UntaggedResponse::Ok {
                    code: Some(ResponseCode::UidValidity(v)),
                    ..
                }) => status.uid_validity = Some(v),
                Response::Tagged {
                    code: Some(ResponseCode::ReadOnly),
                    ..
                } => status.read_only = true,
                _ => {}
            }
            status
        })
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
    use crate::types::Flag;

    #[test]
    fn test_parse_gmail_select() {
        let responses: Vec<Vec<u8>> = [
            &b"* FLAGS (\\Answered \\Flagged \\Draft \\Deleted \\Seen $NotPhishing $Phishing)\r\n"[..],
            b"* OK [PERMANENTFLAGS (\\Answered \\Flagged \\Draft \\Deleted \\Seen \\*)] Flags permitted.\r\n",
            b"* OK [UIDVALIDITY 11] UIDs valid.\r\n",
            b"* 1843 EXISTS\r\n",
            b"* 0 RECENT\r\n",
            b"* OK [UIDNEXT 1990] Predicted next UID.\r\n",
            b"A0002 OK [READ-WRITE] [Gmail]/All Mail selected. (Success)\r\n",
        ]
        .iter()
        .map(|line| line.to_vec())
        .collect();

        let status = parse_mailbox_status(&responses);
        assert_eq!(status.exists, 1843);
        assert_eq!(status.recent, 0);
        assert_eq!(status.uid_validity, Some(11));
        assert!(status.flags.contains(&Flag::Seen));
        assert!(!status.read_only);
    }

    #[test]
    fn test_parse_read_only() {
        let responses = vec![b"A0002 OK [READ-ONLY] done\r\n".to_vec()];
        assert!(parse_mailbox_status(&responses).read_only);
    }
}
