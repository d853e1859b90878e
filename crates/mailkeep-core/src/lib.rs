//! # mailkeep-core
//!
//! Backup, restore and clear of a Gmail account over IMAP.
//!
//! This crate provides:
//! - **Connection** - a session that reconnects with back-off, reselects the
//!   last folder and replays the last search
//! - **Profiles** - the localized names of All Mail and Trash, detected from
//!   the folder listing
//! - **Storage** - messages as `.eml` files or zip entries, with a
//!   deduplication index, label assignment and incremental watermark
//! - **Engines** - backup, restore, clear and folder listing, reporting to a
//!   host-supplied [`Notifier`]
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use mailkeep_core::{AccountConfig, BackupOptions, LogNotifier, backup};
//! use tokio_util::sync::CancellationToken;
//!
//! let account = AccountConfig::new("me@gmail.com", "app-password");
//! let report = backup(
//!     account,
//!     "~/gmail-backup#${YEAR}/${MONTH}/${FROM}",
//!     BackupOptions { incremental: true, ..Default::default() },
//!     Arc::new(LogNotifier::new()),
//!     CancellationToken::new(),
//! )
//! .await?;
//! println!("{} new messages", report.stored);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod engine;
mod error;
pub mod notifier;
pub mod profile;
pub mod storage;

pub use config::{AccountConfig, AccountConfigBuilder, BackupOptions, RetryPolicy, SearchWindow};
pub use connection::Connection;
pub use engine::{
    BackupEngine, BackupPhase, BackupReport, ClearReport, FolderSummary, RestoreReport, backup,
    backup_with, clear, clear_with, label_folders, list_mailboxes, list_mailboxes_with, restore,
    restore_with,
};
pub use error::{Error, Result};
pub use notifier::{LogNotifier, Notifier, NullNotifier, ProgressBridge, TransferMeter};
pub use profile::{Detection, MailboxProfile};
pub use storage::{
    BackendKind, LabelAssignment, Storage, StorageLocation, StoredMessage, open_storage,
};
