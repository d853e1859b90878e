//! Backup runs against the in-memory Gmail server.

#![allow(clippy::unwrap_used)]

mod support;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use mailkeep_core::engine::{BackupEngine, BackupPhase, backup_with};
use mailkeep_core::{
    AccountConfig, BackupOptions, Connection, Error, Notifier, StorageLocation, open_storage,
};
use mailkeep_imap::{Config, Mailbox, SearchCriteria};
use support::{ALL_MAIL, FakeGmail, Recorder, account, mail};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const ALICE: &str = "2020/05/20200501-101112-alice-Quarterly_report-1.eml";
const BOB: &str = "2020/05/20200503-080000-bob-Lunch-1.eml";
const CAROL: &str = "2020/05/20200504-093000-carol-Plans-1.eml";

fn seeded() -> FakeGmail {
    let gmail = FakeGmail::new();
    gmail.deliver(
        &mail(
            "one@example.org",
            "Alice <alice@example.org>",
            "Fri, 01 May 2020 10:11:12 +0000",
            "Quarterly report",
        ),
        &["INBOX", "Work"],
    );
    gmail.deliver(
        &mail(
            "two@example.org",
            "bob@example.org",
            "Sun, 03 May 2020 08:00:00 +0000",
            "Lunch",
        ),
        &["Pr&AOE-ce"],
    );
    gmail.deliver(
        &mail(
            "three@example.org",
            "carol@example.org",
            "Mon, 04 May 2020 09:30:00 +0000",
            "Plans",
        ),
        &[],
    );
    gmail
}

fn connection(
    gmail: &FakeGmail,
    account: AccountConfig,
    notifier: &Arc<Recorder>,
    cancel: CancellationToken,
) -> Connection<FakeGmail> {
    let notifier: Arc<dyn Notifier> = notifier.clone();
    Connection::new(gmail.clone(), account, notifier, cancel).unwrap()
}

async fn run(
    gmail: &FakeGmail,
    location: &str,
    options: BackupOptions,
    notifier: &Arc<Recorder>,
) -> mailkeep_core::Result<mailkeep_core::BackupReport> {
    let conn = connection(gmail, account(), notifier, CancellationToken::new());
    let location = StorageLocation::parse(location).unwrap();
    backup_with(conn, &location, options, notifier.clone()).await
}

fn read(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).unwrap()
}

#[tokio::test]
async fn test_backup_stores_messages_and_labels() {
    let gmail = seeded();
    let dir = TempDir::new().unwrap();
    let notifier = Recorder::new();

    let report = run(
        &gmail,
        &dir.path().display().to_string(),
        BackupOptions::default(),
        &notifier,
    )
    .await
    .unwrap();

    assert_eq!(report.stored, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(report.labelled, 2);
    for path in [ALICE, BOB, CAROL] {
        assert!(dir.path().join(path).is_file(), "{path} missing");
    }
    assert!(read(&dir, ALICE).contains("Subject: Quarterly report"));

    assert_eq!(
        read(&dir, "ids.txt"),
        format!(
            "{ALICE}\tone@example.org\n{BOB}\ttwo@example.org\n{CAROL}\tthree@example.org\n"
        )
    );
    assert_eq!(
        read(&dir, "labels.txt"),
        format!("{ALICE}\tINBOX Work\n{BOB}\tPráce\n")
    );
    assert!(notifier.contains("stored 1/3 alice@example.org Quarterly report"));
    assert!(notifier.contains("backup ended alice@example.org"));
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let gmail = seeded();
    let dir = TempDir::new().unwrap();
    let location = dir.path().display().to_string();

    run(&gmail, &location, BackupOptions::default(), &Recorder::new())
        .await
        .unwrap();
    let ids = read(&dir, "ids.txt");

    let notifier = Recorder::new();
    let report = run(&gmail, &location, BackupOptions::default(), &notifier)
        .await
        .unwrap();

    assert_eq!(report.stored, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(read(&dir, "ids.txt"), ids);
    assert!(notifier.contains("duplicate 3/3"));
    // no second copies
    assert!(!dir.path().join("2020/05/20200501-101112-alice-Quarterly_report-2.eml").exists());
}

#[tokio::test]
async fn test_incremental_starts_at_watermark() {
    let gmail = seeded();
    let dir = TempDir::new().unwrap();
    let location = dir.path().display().to_string();
    let options = BackupOptions {
        incremental: true,
        ..Default::default()
    };

    let report = run(&gmail, &location, options, &Recorder::new()).await.unwrap();
    assert_eq!(report.watermark, NaiveDate::from_ymd_opt(2020, 5, 4));
    assert_eq!(read(&dir, "stamp"), "20200504\n");

    gmail.deliver(
        &mail(
            "four@example.org",
            "dave@example.org",
            "Sun, 10 May 2020 12:00:00 +0000",
            "Late",
        ),
        &[],
    );
    gmail.deliver(
        &mail(
            "old@example.org",
            "erin@example.org",
            "Tue, 01 Jan 2019 12:00:00 +0000",
            "Ancient",
        ),
        &[],
    );

    let report = run(&gmail, &location, options, &Recorder::new()).await.unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(read(&dir, "stamp"), "20200510\n");
    assert!(dir.path().join("2020/05/20200510-120000-dave-Late-1.eml").exists());
    assert!(!dir.path().join("2019").exists());
    assert!(gmail.with(|a| a.commands.iter().any(|c| c == "SEARCH SINCE 04-May-2020")));
}

#[tokio::test]
async fn test_watermark_never_moves_back() {
    let gmail = FakeGmail::new();
    gmail.deliver(
        &mail("a@x", "a@example.org", "Fri, 01 May 2020 10:00:00 +0000", "A"),
        &[],
    );
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("stamp"), "20210101\n").unwrap();

    let report = run(
        &gmail,
        &dir.path().display().to_string(),
        BackupOptions::default(),
        &Recorder::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.stored, 1);
    assert_eq!(report.watermark, NaiveDate::from_ymd_opt(2021, 1, 1));
    assert_eq!(read(&dir, "stamp"), "20210101\n");
}

#[tokio::test]
async fn test_colliding_names_get_counters() {
    let gmail = FakeGmail::new();
    for id in ["a@x", "b@x"] {
        gmail.deliver(
            &mail(id, "alice@example.org", "Fri, 01 May 2020 10:00:00 +0000", "Same"),
            &[],
        );
    }
    let dir = TempDir::new().unwrap();
    let location = format!(
        "{}#${{YEAR}}/${{MONTH}}/${{YEAR}}${{MONTH}}${{DAY}}-${{FROM}}",
        dir.path().join("mydir").display()
    );

    let report = run(&gmail, &location, BackupOptions::default(), &Recorder::new())
        .await
        .unwrap();

    assert_eq!(report.stored, 2);
    let base = dir.path().join("mydir/2020/05");
    assert!(base.join("20200501-alice-1.eml").exists());
    assert!(base.join("20200501-alice-2.eml").exists());
}

#[tokio::test]
async fn test_zip_location() {
    let gmail = seeded();
    let dir = TempDir::new().unwrap();
    let zip = dir.path().join("mail.zip");
    let location = zip.display().to_string();

    let report = run(&gmail, &location, BackupOptions::default(), &Recorder::new())
        .await
        .unwrap();
    assert_eq!(report.stored, 3);
    assert!(zip.is_file());
    assert!(dir.path().join("mail.ids.txt").is_file());

    let report = run(&gmail, &location, BackupOptions::default(), &Recorder::new())
        .await
        .unwrap();
    assert_eq!(report.skipped, 3);

    let storage = open_storage(
        &StorageLocation::parse(&location).unwrap(),
        Arc::new(mailkeep_core::NullNotifier),
    )
    .unwrap();
    let stored: Vec<_> = storage
        .iter_stored(None, None, false)
        .unwrap()
        .map(|s| s.unwrap().path)
        .collect();
    assert_eq!(stored, [ALICE, BOB, CAROL]);
}

#[tokio::test]
async fn test_interrupted_run_keeps_progress() {
    let gmail = seeded();
    let dir = TempDir::new().unwrap();
    let location = dir.path().display().to_string();
    let cancel = CancellationToken::new();
    let notifier = Recorder::cancelling(1, cancel.clone());

    let storage = open_storage(
        &StorageLocation::parse(&location).unwrap(),
        Arc::new(mailkeep_core::NullNotifier),
    )
    .unwrap();
    let conn = connection(&gmail, account(), &notifier, cancel);
    let mut engine = BackupEngine::new(conn, storage, notifier.clone(), BackupOptions::default());

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, Error::Interrupted));
    assert_eq!(engine.phase(), BackupPhase::Interrupted);
    assert_eq!(engine.report().stored, 1);
    assert_eq!(read(&dir, "ids.txt"), format!("{ALICE}\tone@example.org\n"));
    assert!(!dir.path().join("stamp").exists());

    let report = run(&gmail, &location, BackupOptions::default(), &Recorder::new())
        .await
        .unwrap();
    assert_eq!(report.stored, 2);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn test_reconnects_after_dropped_connection() {
    let gmail = seeded();
    gmail.with(|a| a.drop_on = Some(("FETCH".to_string(), 2)));
    let dir = TempDir::new().unwrap();
    let notifier = Recorder::new();

    let report = run(
        &gmail,
        &dir.path().display().to_string(),
        BackupOptions::default(),
        &notifier,
    )
    .await
    .unwrap();

    assert_eq!(report.stored, 3);
    assert_eq!(report.failed, 0);
    assert!(notifier.contains("log Network error occurred, disconnected"));
    assert!(notifier.contains("log Reconnected!"));
    gmail.with(|a| {
        assert_eq!(a.logins, 2);
        // the new session reselects All Mail and replays the search
        let replayed = a
            .commands
            .iter()
            .filter(|c| *c == &format!("SELECT \"{ALL_MAIL}\""))
            .count();
        assert_eq!(replayed, 2);
    });
}

#[tokio::test]
async fn test_refused_connections_are_retried() {
    let gmail = seeded();
    gmail.with(|a| a.refuse_connects = 2);
    let dir = TempDir::new().unwrap();
    let notifier = Recorder::new();

    let report = run(
        &gmail,
        &dir.path().display().to_string(),
        BackupOptions::default(),
        &notifier,
    )
    .await
    .unwrap();

    assert_eq!(report.stored, 3);
    assert!(notifier.contains("log Trying to reconnect (2)"));
}

#[tokio::test]
async fn test_bad_password_is_fatal() {
    let gmail = seeded();
    let dir = TempDir::new().unwrap();
    let notifier = Recorder::new();
    let conn = connection(
        &gmail,
        AccountConfig::builder(support::USER, "wrong").build(),
        &notifier,
        CancellationToken::new(),
    );
    let location = StorageLocation::parse(&dir.path().display().to_string()).unwrap();

    let err = backup_with(conn, &location, BackupOptions::default(), notifier.clone())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "auth");
    assert!(notifier.contains("fatal auth:"));
    assert!(!notifier.contains("Trying to reconnect"));
    gmail.with(|a| {
        assert_eq!(a.logins, 0);
        assert_eq!(a.connects, 1);
    });
}

#[tokio::test]
async fn test_unknown_folder_language_is_fatal() {
    let gmail = FakeGmail::new();
    gmail.with(|a| {
        a.folders.clear();
        a.folders.insert("INBOX".to_string(), Vec::new());
        a.folders.insert("[Gmail]/Alles".to_string(), Vec::new());
    });
    let dir = TempDir::new().unwrap();
    let notifier = Recorder::new();

    let err = run(
        &gmail,
        &dir.path().display().to_string(),
        BackupOptions::default(),
        &notifier,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NoMatchingProfile));
    assert!(notifier.contains("fatal config:"));
}

#[tokio::test]
async fn test_credential_error_after_login_is_retried() {
    let gmail = seeded();
    gmail.with(|a| {
        a.drop_on = Some(("FETCH".to_string(), 3));
        a.reject_logins.insert(2);
    });
    let dir = TempDir::new().unwrap();
    let notifier = Recorder::new();

    let report = run(
        &gmail,
        &dir.path().display().to_string(),
        BackupOptions::default(),
        &notifier,
    )
    .await
    .unwrap();

    assert_eq!(report.stored, 3);
    assert_eq!(report.failed, 0);
    assert!(notifier.contains("log Trying to reconnect (2)"));
    assert!(notifier.contains("log Reconnected!"));
    assert!(!notifier.contains("fatal"));
    gmail.with(|a| {
        assert_eq!(a.logins, 2);
        assert_eq!(a.connects, 3);
    });
}

#[tokio::test]
async fn test_broken_messages_are_counted_and_skipped() {
    let gmail = seeded();
    gmail.deliver_raw(b"\r\n  \r\n", NaiveDate::from_ymd_opt(2020, 5, 5).unwrap());
    gmail.deliver(
        &mail(
            "old@example.org",
            "dave@example.org",
            "Tue, 01 Jan 2019 12:00:00 +0000",
            "Archive",
        ),
        &[],
    );
    let dir = TempDir::new().unwrap();
    // a plain file where the 2019 directory would go makes the write fail
    fs::write(dir.path().join("2019"), b"").unwrap();
    let notifier = Recorder::new();

    let report = run(
        &gmail,
        &dir.path().display().to_string(),
        BackupOptions::default(),
        &notifier,
    )
    .await
    .unwrap();

    assert_eq!(report.stored, 3);
    assert_eq!(report.failed, 2);
    assert!(notifier.contains("warning Cannot back up message 4 of 5"));
    assert!(notifier.contains("warning Cannot back up message 5 of 5"));
    assert!(notifier.contains("backup ended alice@example.org"));
    for path in [ALICE, BOB, CAROL] {
        assert!(dir.path().join(path).is_file(), "{path} missing");
    }
    assert!(!read(&dir, "ids.txt").contains("old@example.org"));
}

#[tokio::test]
async fn test_unselectable_label_is_skipped_after_retries() {
    let gmail = seeded();
    gmail.with(|a| {
        a.unselectable.insert("Work".to_string());
    });
    let dir = TempDir::new().unwrap();
    let notifier = Recorder::new();

    let report = run(
        &gmail,
        &dir.path().display().to_string(),
        BackupOptions::default(),
        &notifier,
    )
    .await
    .unwrap();

    assert_eq!(report.stored, 3);
    assert_eq!(report.labelled, 2);
    assert!(notifier.contains("warning Skipping label Work:"));
    assert_eq!(
        read(&dir, "labels.txt"),
        format!("{ALICE}\tINBOX\n{BOB}\tPráce\n")
    );
    gmail.with(|a| {
        let attempts = a
            .commands
            .iter()
            .filter(|c| c.starts_with("SELECT") && c.contains("Work"))
            .count();
        // one try plus label_retries
        assert_eq!(attempts, 2);
        assert_eq!(a.logins, 1);
    });
}

#[tokio::test]
async fn test_refused_select_keeps_login() {
    let gmail = seeded();
    let notifier = Recorder::new();
    let mut conn = connection(&gmail, account(), &notifier, CancellationToken::new());

    conn.connect(false).await.unwrap();
    conn.select(&Mailbox::new(ALL_MAIL)).await.unwrap();
    let err = conn.select(&Mailbox::new("NoSuchLabel")).await.unwrap_err();
    let folders = conn.list_folders().await.unwrap();
    conn.disconnect().await;

    assert!(matches!(err, Error::Imap(mailkeep_imap::Error::No(_))));
    assert!(folders.iter().any(|f| f.mailbox.as_str() == ALL_MAIL));
    assert!(!notifier.contains("Trying to reconnect"));
    gmail.with(|a| {
        assert_eq!(a.logins, 1);
        assert_eq!(a.connects, 1);
    });
}

#[tokio::test(start_paused = true)]
async fn test_slow_transfer_is_not_cut_off() {
    let gmail = FakeGmail::new();
    let mut raw = mail(
        "big@example.org",
        "erin@example.org",
        "Wed, 06 May 2020 07:00:00 +0000",
        "Scans",
    );
    for _ in 0..120 {
        raw.extend_from_slice(&[b'x'; 68]);
        raw.extend_from_slice(b"\r\n");
    }
    gmail.deliver(&raw, &[]);
    gmail.with(|a| a.trickle = Some(Duration::from_millis(10)));

    let server = Config::builder("imap.gmail.com")
        .io_timeout(Duration::from_millis(50))
        .build();
    let account = AccountConfig::builder(support::USER, support::PASSWORD)
        .server(server)
        .build();
    let notifier = Recorder::new();
    let mut conn = connection(&gmail, account, &notifier, CancellationToken::new());

    conn.connect(false).await.unwrap();
    conn.select(&Mailbox::new(ALL_MAIL)).await.unwrap();
    let nums = conn.search(&SearchCriteria::All).await.unwrap();
    let started = tokio::time::Instant::now();
    let body = conn.fetch_body(nums[0]).await.unwrap();
    conn.disconnect().await;

    // about 130 chunks, each well inside the limit
    assert!(started.elapsed() > Duration::from_secs(1));
    assert_eq!(body, raw);
    assert!(!notifier.contains("Trying to reconnect"));
    gmail.with(|a| assert_eq!(a.logins, 1));
}
