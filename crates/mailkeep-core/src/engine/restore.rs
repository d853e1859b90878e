//! Uploading stored messages and re-applying their labels.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use mailkeep_imap::{Flag, Mailbox, SeqNum, SequenceSet, Transport};
use mailkeep_mime::date::internal_date;
use tracing::{debug, info, warn};

use super::report_fatal;
use crate::config::SearchWindow;
use crate::connection::Connection;
use crate::notifier::Notifier;
use crate::storage::{Storage, StorageLocation, open_storage};
use crate::Result;

/// Outcome counters of a restore run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Messages uploaded.
    pub restored: usize,
    /// Messages that could not be read or uploaded.
    pub failed: usize,
    /// Labels re-applied.
    pub labels: usize,
}

/// Sent-date span of the uploaded messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    first: NaiveDate,
    last: NaiveDate,
}

impl Span {
    fn include(span: Option<Self>, date: NaiveDate) -> Self {
        span.map_or(
            Self {
                first: date,
                last: date,
            },
            |s| Self {
                first: s.first.min(date),
                last: s.last.max(date),
            },
        )
    }

    /// The span plus one day either side. `before` is exclusive, hence two
    /// days past the last date.
    fn search_window(self) -> SearchWindow {
        SearchWindow {
            since: Some(self.first.checked_sub_days(Days::new(1)).unwrap_or(self.first)),
            before: self.last.checked_add_days(Days::new(2)),
        }
    }
}

struct Restore<T: Transport> {
    connection: Connection<T>,
    storage: Box<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    report: RestoreReport,
}

impl<T: Transport> Restore<T> {
    async fn run(&mut self, window: SearchWindow) -> Result<()> {
        self.connection.connect(true).await?;
        let all_mail = self.connection.profile()?.all_mail.clone();

        let span = self.upload(&all_mail, window).await?;
        match span {
            Some(span) => self.restore_labels(&all_mail, span).await,
            None => {
                info!("Nothing uploaded, labels left alone");
                Ok(())
            }
        }
    }

    async fn upload(&mut self, all_mail: &Mailbox, window: SearchWindow) -> Result<Option<Span>> {
        let mut span = None;
        let stored = self.storage.iter_stored(window.since, window.before, true)?;

        for item in stored {
            self.connection.check_cancelled()?;
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    self.report.failed += 1;
                    self.notifier
                        .on_warning_or_recoverable_error(&format!("Cannot read stored message: {e}"));
                    continue;
                }
            };

            let message = &item.message;
            let sent = message.sent_date();
            let uploaded = self
                .connection
                .append(
                    all_mail,
                    &[Flag::Seen],
                    Some(&internal_date(sent)),
                    message.raw(),
                )
                .await;

            match uploaded {
                Ok(()) => {
                    self.report.restored += 1;
                    span = Some(Span::include(span, sent.date()));
                    self.notifier.on_message_restored(
                        &message.sender(),
                        &message.subject(),
                        item.index,
                        item.total,
                    );
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.report.failed += 1;
                    warn!(path = %item.path, error = %e, "Upload failed");
                    self.notifier.on_warning_or_recoverable_error(&format!(
                        "Cannot restore {}: {e}",
                        item.path
                    ));
                }
            }
        }
        Ok(span)
    }

    /// Finds the uploaded messages again by date and copies them into the
    /// labels they had when backed up.
    async fn restore_labels(&mut self, all_mail: &Mailbox, span: Span) -> Result<()> {
        let assignment = self.storage.label_assignment()?;
        if assignment.is_empty() {
            return Ok(());
        }

        self.connection.select(all_mail).await?;
        let nums = self
            .connection
            .search(&span.search_window().criteria())
            .await?;

        let total = nums.len();
        let mut per_label: BTreeMap<&str, Vec<SeqNum>> = BTreeMap::new();
        for (i, &num) in nums.iter().enumerate() {
            self.connection.check_cancelled()?;
            self.notifier.on_label_restore_progress(i + 1, total);

            match self.connection.fetch_identity(num).await {
                Ok(identity) => {
                    for label in assignment.get(&identity).into_iter().flatten() {
                        per_label.entry(label.as_str()).or_default().push(num);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.notifier.on_warning_or_recoverable_error(&format!(
                    "Cannot identify message {num}: {e}"
                )),
            }
        }
        if per_label.is_empty() {
            return Ok(());
        }

        let existing: HashSet<Mailbox> = self
            .connection
            .list_folders()
            .await?
            .into_iter()
            .map(|f| f.mailbox)
            .collect();

        for (label, nums) in per_label {
            self.connection.check_cancelled()?;
            let folder = Mailbox::new(label);
            let exists = folder.is_inbox() || existing.contains(&folder);

            match self.apply_label(&folder, &nums, exists).await {
                Ok(()) => {
                    self.report.labels += 1;
                    debug!(%folder, count = nums.len(), "Label restored");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let name = folder.display_name().unwrap_or_else(|_| label.to_string());
                    self.notifier.on_warning_or_recoverable_error(&format!(
                        "Cannot restore label {name}: {e}"
                    ));
                }
            }
        }
        Ok(())
    }

    async fn apply_label(&mut self, folder: &Mailbox, nums: &[SeqNum], exists: bool) -> Result<()> {
        if !exists {
            self.connection.create_folder(folder).await?;
        }
        match SequenceSet::from_numbers(nums) {
            Some(set) => self.connection.copy(&set, folder).await,
            None => Ok(()),
        }
    }
}

/// Restores the messages stored at `location` through `connection`.
///
/// # Errors
///
/// Returns the error that stopped the run, after reporting it.
pub async fn restore_with<T: Transport>(
    connection: Connection<T>,
    location: &StorageLocation,
    window: SearchWindow,
    notifier: Arc<dyn Notifier>,
) -> Result<RestoreReport> {
    let account = connection.account().username.clone();
    let target = location.to_string();
    notifier.on_version_info();
    notifier.on_restore_started(&account, &target);

    let storage = open_storage(location, Arc::clone(&notifier))
        .map_err(|e| report_fatal(notifier.as_ref(), e))?;
    let mut restore = Restore {
        connection,
        storage,
        notifier: Arc::clone(&notifier),
        report: RestoreReport::default(),
    };

    let result = restore.run(window).await;
    restore.connection.disconnect().await;
    result.map_err(|e| report_fatal(notifier.as_ref(), e))?;

    info!(
        restored = restore.report.restored,
        failed = restore.report.failed,
        "Restore finished"
    );
    notifier.on_restore_ended(&account, &target);
    Ok(restore.report)
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
    use mailkeep_imap::SearchCriteria;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_span_tracks_extremes() {
        let span = [day(2020, 5, 3), day(2019, 12, 31), day(2020, 2, 1)]
            .into_iter()
            .fold(None, |span, d| Some(Span::include(span, d)))
            .unwrap();
        assert_eq!(
            span,
            Span {
                first: day(2019, 12, 31),
                last: day(2020, 5, 3)
            }
        );
    }

    #[test]
    fn test_search_window_widened() {
        let span = Span {
            first: day(2020, 3, 1),
            last: day(2020, 3, 1),
        };
        assert_eq!(
            span.search_window().criteria(),
            SearchCriteria::And(vec![
                SearchCriteria::Since("29-Feb-2020".into()),
                SearchCriteria::Before("03-Mar-2020".into()),
            ])
        );
    }
}
