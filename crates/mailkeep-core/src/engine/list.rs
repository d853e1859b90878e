//! Folder listing with message counts.

use std::sync::Arc;

use mailkeep_imap::{Mailbox, SearchCriteria, Transport};
use tracing::debug;

use super::report_fatal;
use crate::Result;
use crate::connection::Connection;
use crate::notifier::Notifier;

/// One folder of the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    /// Human-readable name.
    pub name: String,
    /// Wire name.
    pub mailbox: Mailbox,
    /// Number of messages, or `None` if the folder cannot be selected or
    /// searched.
    pub messages: Option<usize>,
}

async fn summarize<T: Transport>(connection: &mut Connection<T>) -> Result<Vec<FolderSummary>> {
    connection.connect(false).await?;
    let folders = connection.list_folders().await?;

    let mut summaries = Vec::with_capacity(folders.len());
    for folder in folders {
        connection.check_cancelled()?;
        let selectable = folder.is_selectable();
        let mailbox = folder.mailbox;
        let messages = if selectable {
            let counted = match connection.select(&mailbox).await {
                Ok(_) => connection.search(&SearchCriteria::All).await,
                Err(e) => Err(e),
            };
            match counted {
                Ok(nums) => Some(nums.len()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(%mailbox, error = %e, "Folder not countable");
                    None
                }
            }
        } else {
            None
        };

        summaries.push(FolderSummary {
            name: mailbox
                .display_name()
                .unwrap_or_else(|_| mailbox.to_string()),
            mailbox,
            messages,
        });
    }
    Ok(summaries)
}

/// Lists every folder of the account behind `connection` with its message
/// count. No folder profile is needed, which makes this the way to find
/// out what an unrecognised account calls its folders.
///
/// # Errors
///
/// Returns the error that stopped the listing, after reporting it.
pub async fn list_mailboxes_with<T: Transport>(
    mut connection: Connection<T>,
    notifier: Arc<dyn Notifier>,
) -> Result<Vec<FolderSummary>> {
    notifier.on_version_info();
    let result = summarize(&mut connection).await;
    connection.disconnect().await;
    result.map_err(|e| report_fatal(notifier.as_ref(), e))
}
