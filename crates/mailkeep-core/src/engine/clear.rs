//! Emptying an account.

use std::sync::Arc;

use mailkeep_imap::{Flag, Mailbox, SearchCriteria, SequenceSet, StoreAction, Transport};
use tracing::{debug, info};

use super::{label_folders, report_fatal};
use crate::Result;
use crate::connection::Connection;
use crate::notifier::Notifier;

/// Outcome counters of a clear run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Messages moved to the trash and expunged from All Mail.
    pub messages: usize,
    /// Messages expunged from the trash.
    pub trashed: usize,
    /// Label folders deleted.
    pub labels: usize,
}

/// Marks every message of the selected folder deleted and expunges.
/// Returns how many there were.
async fn purge<T: Transport>(
    connection: &mut Connection<T>,
    folder: &Mailbox,
    copy_to: Option<&Mailbox>,
) -> Result<usize> {
    connection.select(folder).await?;
    let nums = connection.search(&SearchCriteria::All).await?;
    let Some(set) = SequenceSet::from_numbers(&nums) else {
        debug!(%folder, "Already empty");
        return Ok(0);
    };

    if let Some(target) = copy_to {
        connection.copy(&set, target).await?;
    }
    connection.check_cancelled()?;
    connection
        .store(&set, &StoreAction::SetFlags(vec![Flag::Deleted]))
        .await?;
    connection.expunge().await?;
    Ok(nums.len())
}

async fn clear_account<T: Transport>(
    connection: &mut Connection<T>,
    notifier: &dyn Notifier,
    report: &mut ClearReport,
) -> Result<()> {
    connection.connect(true).await?;
    let profile = connection.profile()?.clone();

    report.messages = purge(connection, &profile.all_mail, Some(&profile.trash)).await?;
    connection.check_cancelled()?;
    report.trashed = purge(connection, &profile.trash, None).await?;

    let folders = connection.list_folders().await?;
    // children before parents
    for label in label_folders(&folders).iter().rev().filter(|l| !l.is_inbox()) {
        connection.check_cancelled()?;
        match connection.delete_folder(label).await {
            Ok(()) => report.labels += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let name = label.display_name().unwrap_or_else(|_| label.to_string());
                notifier.on_warning_or_recoverable_error(&format!(
                    "Cannot delete label {name}: {e}"
                ));
            }
        }
    }
    Ok(())
}

/// Deletes every message and user label of the account behind
/// `connection`. INBOX itself is kept.
///
/// # Errors
///
/// Returns the error that stopped the run, after reporting it.
pub async fn clear_with<T: Transport>(
    mut connection: Connection<T>,
    notifier: Arc<dyn Notifier>,
) -> Result<ClearReport> {
    let account = connection.account().username.clone();
    notifier.on_version_info();
    notifier.on_clear_started(&account);

    let mut report = ClearReport::default();
    let result = clear_account(&mut connection, notifier.as_ref(), &mut report).await;
    connection.disconnect().await;
    result.map_err(|e| report_fatal(notifier.as_ref(), e))?;

    info!(
        messages = report.messages,
        labels = report.labels,
        "Account cleared"
    );
    notifier.on_clear_ended(&account);
    Ok(report)
}
