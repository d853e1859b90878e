//! Clearing and listing an account.

#![allow(clippy::unwrap_used)]

mod support;

use std::sync::Arc;

use mailkeep_core::{Connection, Notifier, clear_with, list_mailboxes_with};
use support::{ALL_MAIL, FakeGmail, Recorder, TRASH, account, mail};
use tokio_util::sync::CancellationToken;

fn connection(gmail: &FakeGmail, notifier: &Arc<Recorder>) -> Connection<FakeGmail> {
    let notifier: Arc<dyn Notifier> = notifier.clone();
    Connection::new(gmail.clone(), account(), notifier, CancellationToken::new()).unwrap()
}

fn seeded() -> FakeGmail {
    let gmail = FakeGmail::new();
    gmail.deliver(
        &mail("a@x", "a@example.org", "Fri, 01 May 2020 10:00:00 +0000", "A"),
        &["INBOX", "Work"],
    );
    gmail.deliver(
        &mail("b@x", "b@example.org", "Sat, 02 May 2020 10:00:00 +0000", "B"),
        &["Work/Reports"],
    );
    gmail.deliver(
        &mail("c@x", "c@example.org", "Sun, 03 May 2020 10:00:00 +0000", "C"),
        &["Pr&AOE-ce"],
    );
    gmail
}

#[tokio::test]
async fn test_clear_empties_account() {
    let gmail = seeded();
    let notifier = Recorder::new();

    let report = clear_with(connection(&gmail, &notifier), notifier.clone())
        .await
        .unwrap();

    assert_eq!(report.messages, 3);
    assert_eq!(report.trashed, 3);
    assert_eq!(report.labels, 3);
    assert!(notifier.contains("clear ended alice@example.org"));
    gmail.with(|a| {
        assert!(a.mails.is_empty());
        assert_eq!(a.folder_names(), ["INBOX", ALL_MAIL, TRASH]);
        assert_eq!(a.count("INBOX"), Some(0));

        let deletes: Vec<_> = a
            .commands
            .iter()
            .filter(|c| c.starts_with("DELETE "))
            .cloned()
            .collect();
        assert_eq!(deletes, ["DELETE Work/Reports", "DELETE Work", "DELETE Pr&AOE-ce"]);
    });
}

#[tokio::test]
async fn test_clear_of_empty_account() {
    let gmail = FakeGmail::new();
    let notifier = Recorder::new();

    let report = clear_with(connection(&gmail, &notifier), notifier.clone())
        .await
        .unwrap();

    assert_eq!(report.messages, 0);
    assert_eq!(report.trashed, 0);
    assert_eq!(report.labels, 0);
    gmail.with(|a| assert!(!a.commands.iter().any(|c| c.starts_with("EXPUNGE"))));
}

#[tokio::test]
async fn test_list_counts_messages() {
    let gmail = seeded();
    let notifier = Recorder::new();

    let folders = list_mailboxes_with(connection(&gmail, &notifier), notifier.clone())
        .await
        .unwrap();

    let summary: Vec<_> = folders
        .iter()
        .map(|f| (f.name.as_str(), f.messages))
        .collect();
    assert_eq!(
        summary,
        [
            ("[Gmail]", None),
            ("INBOX", Some(1)),
            ("Práce", Some(1)),
            ("Work", Some(1)),
            ("Work/Reports", Some(1)),
            ("[Gmail]/All Mail", Some(3)),
            ("[Gmail]/Trash", Some(0)),
        ]
    );
}

#[tokio::test]
async fn test_list_needs_no_profile() {
    let gmail = FakeGmail::new();
    gmail.with(|a| {
        a.folders.clear();
        a.folders.insert("INBOX".to_string(), Vec::new());
        a.folders.insert("[Gmail]/Alles".to_string(), Vec::new());
    });
    let notifier = Recorder::new();

    let folders = list_mailboxes_with(connection(&gmail, &notifier), notifier.clone())
        .await
        .unwrap();

    assert_eq!(folders.len(), 3);
    assert!(!notifier.contains("fatal"));
}
