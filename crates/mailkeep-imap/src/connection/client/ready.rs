//! Commands valid once logged in, with or without a selected mailbox.

use tokio::io::{AsyncRead, AsyncWrite};

use super::states::Ready;
use super::{Client, rejection, untagged};
use crate::command::Command;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Flag, ListResponse, Mailbox};
use crate::{Error, Result};

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: Ready,
{
    /// Mailboxes matching `pattern` under `reference`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let responses = self.execute(&command).await?;
        Ok(untagged(&responses, |data| match data {
            UntaggedResponse::List(entry) => Some(entry),
            _ => None,
        }))
    }

    /// Creates `mailbox`.
    pub async fn create(&mut self, mailbox: &Mailbox) -> Result<()> {
        let command = Command::Create {
            mailbox: mailbox.clone(),
        };
        self.execute(&command).await.map(drop)
    }

    /// Deletes `mailbox`. Gmail keeps the messages, only the label goes.
    pub async fn delete(&mut self, mailbox: &Mailbox) -> Result<()> {
        let command = Command::Delete {
            mailbox: mailbox.clone(),
        };
        self.execute(&command).await.map(drop)
    }

    /// Uploads a raw message into `mailbox`.
    ///
    /// `internal_date` goes out verbatim and must already be in
    /// `DD-Mon-YYYY HH:MM:SS +ZZZZ` form.
    pub async fn append(
        &mut self,
        mailbox: &Mailbox,
        flags: &[Flag],
        internal_date: Option<&str>,
        message: &[u8],
    ) -> Result<()> {
        let tag = self.tag_gen.next();
        let line = Command::Append {
            mailbox: mailbox.clone(),
            flags: flags.to_vec(),
            internal_date: internal_date.map(str::to_string),
            length: message.len(),
        }
        .serialize(&tag);
        self.stream.write_command(&line).await?;

        // The server may refuse before asking for the literal.
        loop {
            let reply = self.stream.read_response().await?;
            if reply.first() == Some(&b'+') {
                break;
            }
            if let Ok(Response::Tagged {
                tag: got,
                status,
                text,
                ..
            }) = ResponseParser::parse(&reply)
                && got.as_str() == tag
            {
                return Err(rejection(status, text).unwrap_or_else(|| {
                    Error::Protocol("APPEND completed before the literal".to_string())
                }));
            }
        }

        self.stream.write_literal(message).await?;
        let responses = self.read_until_tagged(&tag).await?;
        Self::check_tagged_ok(&responses, &tag)
    }
}
