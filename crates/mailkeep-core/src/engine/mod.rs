//! Backup, restore, clear and list operations.
//!
//! Each operation is available two ways: a `*_with` function taking a
//! ready [`Connection`] over any transport, and a convenience wrapper that
//! builds a TLS connection from an [`AccountConfig`]. Both report a fatal
//! outcome through [`Notifier::on_fatal_exception`] before returning it.

mod backup;
mod clear;
mod list;
mod restore;

use std::fmt::Write as _;
use std::sync::Arc;

use mailkeep_imap::{ListResponse, Mailbox};
use tokio_util::sync::CancellationToken;

pub use backup::{BackupEngine, BackupPhase, BackupReport, backup_with};
pub use clear::{ClearReport, clear_with};
pub use list::{FolderSummary, list_mailboxes_with};
pub use restore::{RestoreReport, restore_with};

use crate::config::{AccountConfig, BackupOptions, SearchWindow};
use crate::connection::Connection;
use crate::notifier::Notifier;
use crate::storage::StorageLocation;
use crate::{Error, Result};

/// Folders that carry user labels, plus INBOX.
///
/// Gmail's own folders live under a `[...]` prefix and are skipped, as is
/// anything flagged `\Noselect`. INBOX is always first, listed or not.
#[must_use]
pub fn label_folders(folders: &[ListResponse]) -> Vec<Mailbox> {
    let mut labels: Vec<Mailbox> = folders
        .iter()
        .filter(|f| f.is_selectable() && !f.mailbox.is_inbox() && !f.mailbox.as_str().starts_with('['))
        .map(|f| f.mailbox.clone())
        .collect();
    labels.sort();
    labels.dedup();
    labels.insert(0, Mailbox::inbox());
    labels
}

/// Sends a fatal error to the notifier, with its source chain as the
/// trace, and hands it back.
pub(crate) fn report_fatal(notifier: &dyn Notifier, error: Error) -> Error {
    let mut trace = String::new();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        let _ = writeln!(trace, "caused by: {cause}");
        source = cause.source();
    }
    notifier.on_fatal_exception(error.kind(), &error.to_string(), &trace);
    error
}

fn tls_connection(
    account: AccountConfig,
    notifier: &Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> Result<Connection> {
    Connection::tls(account, Arc::clone(notifier), cancel)
        .map_err(|e| report_fatal(notifier.as_ref(), e))
}

fn parse_location(location: &str, notifier: &dyn Notifier) -> Result<StorageLocation> {
    StorageLocation::parse(location).map_err(|e| report_fatal(notifier, e))
}

/// Backs up an account into `location` (`base#template`).
///
/// # Errors
///
/// Returns an error if the run stops early; per-message failures are
/// reported as warnings instead. Cancellation yields [`Error::Interrupted`].
pub async fn backup(
    account: AccountConfig,
    location: &str,
    options: BackupOptions,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> Result<BackupReport> {
    let location = parse_location(location, notifier.as_ref())?;
    let connection = tls_connection(account, &notifier, cancel)?;
    backup_with(connection, &location, options, notifier).await
}

/// Uploads the messages stored at `location` that fall inside `window`,
/// then restores their labels.
///
/// # Errors
///
/// Returns an error if the run stops early; per-message failures are
/// reported as warnings instead.
pub async fn restore(
    account: AccountConfig,
    location: &str,
    window: SearchWindow,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> Result<RestoreReport> {
    let location = parse_location(location, notifier.as_ref())?;
    let connection = tls_connection(account, &notifier, cancel)?;
    restore_with(connection, &location, window, notifier).await
}

/// Deletes every message and user label of an account. Irreversible.
///
/// # Errors
///
/// Returns an error if any step fails fatally.
pub async fn clear(
    account: AccountConfig,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> Result<ClearReport> {
    let connection = tls_connection(account, &notifier, cancel)?;
    clear_with(connection, notifier).await
}

/// Lists every folder with its message count.
///
/// # Errors
///
/// Returns an error if login or the listing fails.
pub async fn list_mailboxes(
    account: AccountConfig,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> Result<Vec<FolderSummary>> {
    let connection = tls_connection(account, &notifier, cancel)?;
    list_mailboxes_with(connection, notifier).await
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
    use std::sync::Mutex;

    use mailkeep_imap::MailboxAttribute;

    use super::*;

    fn folder(name: &str, attributes: Vec<MailboxAttribute>) -> ListResponse {
        ListResponse {
            attributes,
            delimiter: Some('/'),
            mailbox: Mailbox::new(name),
        }
    }

    #[test]
    fn test_label_folders() {
        let folders = vec![
            folder("Work", vec![MailboxAttribute::HasChildren]),
            folder("INBOX", vec![]),
            folder("[Gmail]", vec![MailboxAttribute::NoSelect]),
            folder("[Gmail]/All Mail", vec![MailboxAttribute::All]),
            folder("Work/Reports", vec![MailboxAttribute::HasNoChildren]),
            folder("Archive", vec![MailboxAttribute::NoSelect]),
            folder("Family", vec![]),
        ];

        let labels: Vec<_> = label_folders(&folders)
            .into_iter()
            .map(|m| m.0)
            .collect();
        assert_eq!(labels, ["INBOX", "Family", "Work", "Work/Reports"]);
    }

    #[test]
    fn test_label_folders_without_inbox_listed() {
        assert_eq!(label_folders(&[]), vec![Mailbox::inbox()]);
    }

    #[derive(Default)]
    struct Fatal(Mutex<Vec<(String, String)>>);

    impl Notifier for Fatal {
        fn on_fatal_exception(&self, kind: &str, message: &str, _trace: &str) {
            self.0
                .lock()
                .unwrap()
                .push((kind.to_string(), message.to_string()));
        }
    }

    #[test]
    fn test_report_fatal() {
        let notifier = Fatal::default();
        let err = report_fatal(&notifier, Error::Interrupted);
        assert!(matches!(err, Error::Interrupted));
        assert_eq!(
            notifier.0.into_inner().unwrap(),
            [("interrupted".to_string(), "Operation interrupted".to_string())]
        );
    }

    #[tokio::test]
    async fn test_bad_location_is_reported() {
        let notifier = Arc::new(Fatal::default());
        let err = backup(
            AccountConfig::new("me@gmail.com", "pw"),
            "#${YEAR}",
            BackupOptions::default(),
            notifier.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(notifier.0.lock().unwrap()[0].0, "config");
    }
}
