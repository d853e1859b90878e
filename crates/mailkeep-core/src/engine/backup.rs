//! Downloading new messages and label membership.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use mailkeep_imap::{Mailbox, SearchCriteria, SeqNum, Transport};
use mailkeep_mime::Message;
use tracing::{debug, info, warn};

use super::{label_folders, report_fatal};
use crate::config::BackupOptions;
use crate::connection::Connection;
use crate::notifier::Notifier;
use crate::storage::{LabelAssignment, Storage, StorageLocation, open_storage};
use crate::{Error, Result};

/// Where a backup run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupPhase {
    /// Not started.
    #[default]
    Idle,
    /// Logging in and detecting the folder profile.
    Connecting,
    /// Searching All Mail.
    Enumerating,
    /// Downloading messages.
    Transferring,
    /// Recording label membership.
    SyncingLabels,
    /// Writing the watermark.
    Finalizing,
    /// Finished.
    Done,
    /// Stopped by the host.
    Interrupted,
}

/// Outcome counters of a backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    /// Messages downloaded and stored.
    pub stored: usize,
    /// Messages skipped as already stored.
    pub skipped: usize,
    /// Messages that could not be fetched or stored.
    pub failed: usize,
    /// Watermark after the run.
    pub watermark: Option<NaiveDate>,
    /// Messages whose labels were recorded.
    pub labelled: usize,
}

/// One backup run over a connection and a storage.
pub struct BackupEngine<T: Transport> {
    connection: Connection<T>,
    storage: Box<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    options: BackupOptions,
    phase: BackupPhase,
    report: BackupReport,
}

impl<T: Transport> std::fmt::Debug for BackupEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupEngine")
            .field("connection", &self.connection)
            .field("options", &self.options)
            .field("phase", &self.phase)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> BackupEngine<T> {
    /// Prepares a run. Nothing happens until [`run`](Self::run).
    pub fn new(
        connection: Connection<T>,
        storage: Box<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        options: BackupOptions,
    ) -> Self {
        Self {
            connection,
            storage,
            notifier,
            options,
            phase: BackupPhase::Idle,
            report: BackupReport::default(),
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> BackupPhase {
        self.phase
    }

    /// Returns the counters so far.
    #[must_use]
    pub const fn report(&self) -> &BackupReport {
        &self.report
    }

    /// Runs the backup and logs out.
    ///
    /// The dedup index is flushed even when the transfer stops early, so a
    /// later run resumes where this one ended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] on cancellation, or the error that
    /// stopped the run.
    pub async fn run(&mut self) -> Result<BackupReport> {
        let result = self.execute().await;
        self.connection.disconnect().await;

        match result {
            Ok(()) => {
                self.phase = BackupPhase::Done;
                info!(
                    stored = self.report.stored,
                    skipped = self.report.skipped,
                    failed = self.report.failed,
                    "Backup finished"
                );
                Ok(self.report.clone())
            }
            Err(e) => {
                if matches!(e, Error::Interrupted) {
                    self.phase = BackupPhase::Interrupted;
                }
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<()> {
        let mut window = self.options.window;
        if self.options.incremental
            && let Some(mark) = self.storage.last_watermark()?
        {
            debug!(%mark, "Incremental backup from watermark");
            window.since = Some(mark);
        }
        let criteria = window.criteria();

        self.phase = BackupPhase::Connecting;
        self.connection.connect(true).await?;
        let all_mail = self.connection.profile()?.all_mail.clone();

        self.phase = BackupPhase::Enumerating;
        self.connection.select(&all_mail).await?;
        let nums = self.connection.search(&criteria).await?;
        info!(count = nums.len(), "Messages to examine");

        self.phase = BackupPhase::Transferring;
        let transferred = self.transfer(&nums).await;
        let finalized = self.storage.finalize_backup();
        let newest = match (transferred, finalized) {
            (Ok(newest), Ok(())) => newest,
            (Err(e), Ok(())) | (Ok(_), Err(e)) => return Err(e),
            (Err(e), Err(flush)) => {
                self.notifier
                    .on_warning_or_recoverable_error(&format!("Cannot save the index: {flush}"));
                return Err(e);
            }
        };

        self.phase = BackupPhase::SyncingLabels;
        self.sync_labels(&criteria).await?;

        self.phase = BackupPhase::Finalizing;
        self.report.watermark = self.advance_watermark(newest)?;
        Ok(())
    }

    /// Downloads every message not yet stored. Returns the latest sent date
    /// among the stored ones.
    async fn transfer(&mut self, nums: &[SeqNum]) -> Result<Option<NaiveDateTime>> {
        let total = nums.len();
        let mut known = self.storage.identities();
        let mut newest = None;

        for (i, &num) in nums.iter().enumerate() {
            self.connection.check_cancelled()?;
            let index = i + 1;

            match self.transfer_one(num, index, total, &mut known).await {
                Ok(Some(sent)) => newest = newest.max(Some(sent)),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.report.failed += 1;
                    warn!(%num, error = %e, "Message skipped");
                    self.notifier.on_warning_or_recoverable_error(&format!(
                        "Cannot back up message {index} of {total}: {e}"
                    ));
                }
            }
        }
        Ok(newest)
    }

    async fn transfer_one(
        &mut self,
        num: SeqNum,
        index: usize,
        total: usize,
        known: &mut HashSet<String>,
    ) -> Result<Option<NaiveDateTime>> {
        let identity = self.connection.fetch_identity(num).await?;
        if known.contains(&identity) {
            self.report.skipped += 1;
            self.notifier
                .on_message_skipped_duplicate(index, total, self.report.skipped, known.len());
            return Ok(None);
        }

        let message = Message::parse(self.connection.fetch_body(num).await?)?;
        let path = self.storage.store(message.raw())?;
        debug!(%num, path, "Stored");
        known.insert(identity);

        self.report.stored += 1;
        self.notifier
            .on_message_stored(&message.sender(), &message.subject(), index, total);
        Ok(Some(message.sent_date()))
    }

    async fn sync_labels(&mut self, criteria: &SearchCriteria) -> Result<()> {
        self.notifier.on_label_sync_started();

        let folders = self.connection.list_folders().await?;
        let mut partial = LabelAssignment::new();

        for label in label_folders(&folders) {
            self.connection.check_cancelled()?;
            match self.label_members(&label, criteria).await {
                Ok(identities) => {
                    debug!(%label, count = identities.len(), "Label scanned");
                    for identity in identities {
                        partial
                            .entry(identity)
                            .or_default()
                            .insert(label.as_str().to_string());
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let name = label.display_name().unwrap_or_else(|_| label.to_string());
                    self.notifier.on_warning_or_recoverable_error(&format!(
                        "Skipping label {name}: {e}"
                    ));
                }
            }
        }

        self.report.labelled = partial.len();
        self.storage.update_label_assignment(partial)?;
        self.notifier.on_label_sync_ended();
        Ok(())
    }

    /// Identities of the messages carrying a label. Selecting or searching
    /// the label is retried before giving up on it.
    async fn label_members(
        &mut self,
        label: &Mailbox,
        criteria: &SearchCriteria,
    ) -> Result<Vec<String>> {
        let retries = self.connection.account().label_retries;
        let mut attempt = 0;
        let nums = loop {
            attempt += 1;
            let searched = match self.connection.select(label).await {
                Ok(_) => self.connection.search(criteria).await,
                Err(e) => Err(e),
            };
            match searched {
                Ok(nums) => break nums,
                Err(e) if e.is_fatal() || attempt > retries => return Err(e),
                Err(e) => debug!(%label, attempt, error = %e, "Label search failed, retrying"),
            }
        };

        let mut identities = Vec::with_capacity(nums.len());
        for num in nums {
            self.connection.check_cancelled()?;
            match self.connection.fetch_identity(num).await {
                Ok(identity) => identities.push(identity),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.notifier.on_warning_or_recoverable_error(&format!(
                    "Cannot identify message {num} in label {label}: {e}"
                )),
            }
        }
        Ok(identities)
    }

    /// Moves the watermark forward to the newest stored message, never
    /// backwards.
    fn advance_watermark(&mut self, newest: Option<NaiveDateTime>) -> Result<Option<NaiveDate>> {
        let previous = self.storage.last_watermark()?;
        let Some(newest) = newest.map(|at| at.date()) else {
            return Ok(previous);
        };

        let mark = previous.map_or(newest, |p| p.max(newest));
        self.storage.update_watermark(mark)?;
        debug!(%mark, "Watermark saved");
        Ok(Some(mark))
    }
}

/// Backs up through `connection` into `location`.
///
/// # Errors
///
/// Returns the error that stopped the run, after reporting it.
pub async fn backup_with<T: Transport>(
    connection: Connection<T>,
    location: &StorageLocation,
    options: BackupOptions,
    notifier: Arc<dyn Notifier>,
) -> Result<BackupReport> {
    let account = connection.account().username.clone();
    let target = location.to_string();
    notifier.on_version_info();
    notifier.on_backup_started(&account, &target);

    let storage = open_storage(location, Arc::clone(&notifier))
        .map_err(|e| report_fatal(notifier.as_ref(), e))?;
    let mut engine = BackupEngine::new(connection, storage, Arc::clone(&notifier), options);
    let report = engine
        .run()
        .await
        .map_err(|e| report_fatal(notifier.as_ref(), e))?;

    notifier.on_backup_ended(&account, &target);
    Ok(report)
}
