//! Commands on the selected mailbox.

use tokio::io::{AsyncRead, AsyncWrite};

use super::authenticated::{SelectError, select_mailbox};
use super::states::Selected;
use super::{Client, untagged};
use crate::Result;
use crate::command::{Command, FetchItems, SearchCriteria, StoreAction};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{Mailbox, MailboxStatus, SeqNum, SequenceSet};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// The mailbox currently open.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.state.mailbox
    }

    /// Switches to another mailbox. A refused SELECT closes the current
    /// one, so the session comes back authenticated.
    pub async fn select(
        mut self,
        mailbox: &Mailbox,
    ) -> std::result::Result<(Self, MailboxStatus), SelectError<S>> {
        match select_mailbox(&mut self, mailbox).await {
            Ok(status) => {
                self.state = Selected::new(mailbox.clone(), status.clone());
                Ok((self, status))
            }
            Err(error) => Err(SelectError::new(self, error)),
        }
    }

    /// Sequence numbers matching `criteria`, as the server listed them.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<SeqNum>> {
        let command = Command::Search {
            criteria: criteria.clone(),
        };
        let responses = self.execute(&command).await?;
        Ok(untagged(&responses, |data| match data {
            UntaggedResponse::Search(hits) => Some(hits),
            _ => None,
        })
        .concat())
    }

    /// One entry per FETCH line the server sent for `sequence`.
    pub async fn fetch(
        &mut self,
        sequence: &SequenceSet,
        items: FetchItems,
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        let command = Command::Fetch {
            sequence: sequence.clone(),
            items,
        };
        let responses = self.execute(&command).await?;
        Ok(untagged(&responses, |data| match data {
            UntaggedResponse::Fetch { seq, items } => Some((seq, items)),
            _ => None,
        }))
    }

    /// Changes flags with `.SILENT`, so no FETCH lines come back.
    pub async fn store_silent(&mut self, sequence: &SequenceSet, action: StoreAction) -> Result<()> {
        let command = Command::Store {
            sequence: sequence.clone(),
            action,
            silent: true,
        };
        self.execute(&command).await.map(drop)
    }

    /// Copies messages into `mailbox`. In Gmail this adds a label.
    pub async fn copy(&mut self, sequence: &SequenceSet, mailbox: &Mailbox) -> Result<()> {
        let command = Command::Copy {
            sequence: sequence.clone(),
            mailbox: mailbox.clone(),
        };
        self.execute(&command).await.map(drop)
    }

    /// Removes `\Deleted` messages and returns the EXPUNGE numbers in the
    /// order sent, each relative to the mailbox after the previous removal.
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        let responses = self.execute(&Command::Expunge).await?;
        Ok(untagged(&responses, |data| match data {
            UntaggedResponse::Expunge(seq) => Some(seq),
            _ => None,
        }))
    }
}
