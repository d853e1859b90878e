//! IMAP session with its state tracked in the type.
//!
//! A session starts as [`NotAuthenticated`] when the greeting has been read,
//! becomes [`Authenticated`] after LOGIN and [`Selected`] after SELECT.
//! Methods only exist in the states where the command is legal; the ones
//! valid both with and without a selected mailbox hang off [`Ready`].

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod ready;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::authenticated::SelectError;
pub use self::states::{Authenticated, NotAuthenticated, Ready, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, Status};
use crate::{Error, Result};

/// A session over stream `S` in state `State`.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .field("tags_issued", &self.tag_gen.issued())
            .finish_non_exhaustive()
    }
}

/// Rejection carried by a tagged completion, if any.
fn rejection(status: Status, text: String) -> Option<Error> {
    match status {
        Status::Ok | Status::PreAuth => None,
        Status::No => Some(Error::No(text)),
        Status::Bad => Some(Error::Bad(text)),
        Status::Bye => Some(Error::Bye(text)),
    }
}

/// Picks data out of the untagged lines of one exchange, in arrival order.
/// Lines that fail to parse are skipped.
pub(crate) fn untagged<T>(
    responses: &[Vec<u8>],
    mut pick: impl FnMut(UntaggedResponse) -> Option<T>,
) -> Vec<T> {
    responses
        .iter()
        .filter_map(|raw| match ResponseParser::parse(raw) {
            Ok(Response::Untagged(data)) => pick(data),
            _ => None,
        })
        .collect()
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Whether the last CAPABILITY data listed `cap`.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Says goodbye and closes the session. Whatever the server answers is
    /// ignored.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        self.stream
            .write_command(&Command::Logout.serialize(&tag))
            .await?;
        let _ = self.read_until_tagged(&tag).await;
        Ok(())
    }

    /// Runs one command to its tagged completion. Anything but OK is an
    /// error; on success every response line is returned, completion last.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        let tag = self.tag_gen.next();
        self.stream.write_command(&command.serialize(&tag)).await?;
        let responses = self.read_until_tagged(&tag).await?;
        Self::check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    pub(crate) async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        self.stream.read_until_tagged(tag).await
    }

    /// Finds the completion for `tag`, searching from the end.
    pub(crate) fn completion(responses: &[Vec<u8>], tag: &str) -> Result<(Status, String)> {
        responses
            .iter()
            .rev()
            .find_map(|raw| match ResponseParser::parse(raw) {
                Ok(Response::Tagged {
                    tag: got,
                    status,
                    text,
                    ..
                }) if got.as_str() == tag => Some((status, text)),
                _ => None,
            })
            .ok_or_else(|| Error::Protocol(format!("no completion for {tag}")))
    }

    pub(crate) fn check_tagged_ok(responses: &[Vec<u8>], tag: &str) -> Result<()> {
        let (status, text) = Self::completion(responses, tag)?;
        rejection(status, text).map_or(Ok(()), Err)
    }

    /// Keeps the most recent untagged CAPABILITY list.
    pub(crate) fn absorb_capabilities(&mut self, responses: &[Vec<u8>]) {
        let lists = untagged(responses, |data| match data {
            UntaggedResponse::Capability(caps) => Some(caps),
            _ => None,
        });
        if let Some(caps) = lists.into_iter().last() {
            self.capabilities = caps;
        }
    }

    pub(crate) fn into_state<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }
}
