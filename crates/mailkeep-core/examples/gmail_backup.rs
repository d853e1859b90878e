#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: Back up a Gmail account into a local directory
//!
//! ## Prerequisites
//!
//! 1. Enable IMAP in Gmail settings ("Forwarding and POP/IMAP")
//! 2. Turn on 2-Step Verification for the Google account
//! 3. Create an app password at https://myaccount.google.com/apppasswords
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=mailkeep_core=debug cargo run --package mailkeep-core --example gmail_backup
//! ```
//!
//! Ctrl-C stops the run; the next run picks up where it ended.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use mailkeep_core::{AccountConfig, BackupOptions, LogNotifier, backup};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    print!("Gmail address: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim();

    print!("App password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim();

    print!("Backup location [~/gmail-backup]: ");
    io::stdout().flush()?;
    let mut location = String::new();
    io::stdin().read_line(&mut location)?;
    let location = match location.trim() {
        "" => "~/gmail-backup",
        other => other,
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let report = backup(
        AccountConfig::new(email, password),
        location,
        BackupOptions {
            incremental: true,
            ..Default::default()
        },
        Arc::new(LogNotifier::new()),
        cancel,
    )
    .await
    .context("backup failed")?;

    println!(
        "\n✓ {} stored, {} already present, {} failed",
        report.stored, report.skipped, report.failed
    );
    if let Some(mark) = report.watermark {
        println!("  next incremental run starts at {}", mark);
    }
    Ok(())
}
