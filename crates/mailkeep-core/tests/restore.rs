//! Restoring a backup into a fresh account.

#![allow(clippy::unwrap_used)]

mod support;

use std::sync::Arc;

use chrono::NaiveDate;
use mailkeep_core::{
    BackupOptions, Connection, Notifier, SearchWindow, StorageLocation, backup_with,
    restore_with,
};
use support::{ALL_MAIL, FakeGmail, Recorder, account, mail};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn connection(gmail: &FakeGmail, notifier: &Arc<Recorder>) -> Connection<FakeGmail> {
    let notifier: Arc<dyn Notifier> = notifier.clone();
    Connection::new(gmail.clone(), account(), notifier, CancellationToken::new()).unwrap()
}

fn alice() -> Vec<u8> {
    mail(
        "one@example.org",
        "Alice <alice@example.org>",
        "Fri, 01 May 2020 10:11:12 +0000",
        "Quarterly report",
    )
}

fn bob() -> Vec<u8> {
    mail(
        "two@example.org",
        "bob@example.org",
        "Sun, 03 May 2020 08:00:00 +0000",
        "Lunch",
    )
}

fn carol() -> Vec<u8> {
    mail(
        "three@example.org",
        "carol@example.org",
        "Mon, 04 May 2020 09:30:00 +0000",
        "Plans",
    )
}

/// Backs up a labelled account into a fresh directory.
async fn backed_up() -> (TempDir, StorageLocation) {
    let source = FakeGmail::new();
    source.deliver(&alice(), &["INBOX", "Work"]);
    source.deliver(&bob(), &["Pr&AOE-ce"]);
    source.deliver(&carol(), &[]);

    let dir = TempDir::new().unwrap();
    let location = StorageLocation::parse(&dir.path().display().to_string()).unwrap();
    let notifier = Recorder::new();
    backup_with(
        connection(&source, &notifier),
        &location,
        BackupOptions::default(),
        notifier,
    )
    .await
    .unwrap();
    (dir, location)
}

#[tokio::test]
async fn test_restore_uploads_and_relabels() {
    let (_dir, location) = backed_up().await;
    let target = FakeGmail::new();
    let notifier = Recorder::new();

    let report = restore_with(
        connection(&target, &notifier),
        &location,
        SearchWindow::all(),
        notifier.clone(),
    )
    .await
    .unwrap();

    assert_eq!(report.restored, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.labels, 3);
    target.with(|a| {
        assert_eq!(a.messages_in(ALL_MAIL), [alice(), bob(), carol()]);
        assert_eq!(a.messages_in("INBOX"), [alice()]);
        assert_eq!(a.messages_in("Work"), [alice()]);
        assert_eq!(a.messages_in("Pr&AOE-ce"), [bob()]);
        assert!(
            a.commands
                .iter()
                .any(|c| c.starts_with("APPEND \"[Gmail]/All Mail\" (\\Seen) \"01-May-2020 10:11:12 +0000\""))
        );
        // INBOX is never created
        assert!(!a.commands.iter().any(|c| c == "CREATE INBOX"));
    });
    assert!(notifier.contains("restored 1/3 alice@example.org Quarterly report"));
    assert!(notifier.contains("restore ended alice@example.org"));
}

#[tokio::test]
async fn test_restore_window_limits_uploads() {
    let (_dir, location) = backed_up().await;
    let target = FakeGmail::new();
    let notifier = Recorder::new();
    let window = SearchWindow::all()
        .with_since(NaiveDate::from_ymd_opt(2020, 5, 2).unwrap())
        .with_before(NaiveDate::from_ymd_opt(2020, 5, 4).unwrap());

    let report = restore_with(
        connection(&target, &notifier),
        &location,
        window,
        notifier.clone(),
    )
    .await
    .unwrap();

    assert_eq!(report.restored, 1);
    assert_eq!(report.labels, 1);
    assert!(notifier.contains("date-skipped 1/3 alice@example.org Quarterly report"));
    assert!(notifier.contains("date-skipped 3/3 carol@example.org Plans"));
    target.with(|a| {
        assert_eq!(a.messages_in(ALL_MAIL), [bob()]);
        assert_eq!(a.messages_in("Pr&AOE-ce"), [bob()]);
        assert_eq!(a.count("Work"), None);
    });
}

#[tokio::test]
async fn test_existing_label_is_reused() {
    let (_dir, location) = backed_up().await;
    let target = FakeGmail::new();
    target.add_folder("Work");
    let notifier = Recorder::new();

    let report = restore_with(
        connection(&target, &notifier),
        &location,
        SearchWindow::all(),
        notifier.clone(),
    )
    .await
    .unwrap();

    assert_eq!(report.labels, 3);
    assert!(!notifier.contains("warning"));
    target.with(|a| {
        assert!(!a.commands.iter().any(|c| c == "CREATE Work"));
        assert_eq!(a.messages_in("Work"), [alice()]);
    });
}

#[tokio::test]
async fn test_restore_of_empty_location() {
    let dir = TempDir::new().unwrap();
    let location = StorageLocation::parse(&dir.path().display().to_string()).unwrap();
    let target = FakeGmail::new();
    let notifier = Recorder::new();

    let report = restore_with(
        connection(&target, &notifier),
        &location,
        SearchWindow::all(),
        notifier.clone(),
    )
    .await
    .unwrap();

    assert_eq!(report.restored, 0);
    assert_eq!(report.labels, 0);
    target.with(|a| assert_eq!(a.count(ALL_MAIL), Some(0)));
}
