//! Progress and diagnostics callbacks.
//!
//! The engines report everything they do through a [`Notifier`]. Every
//! method has an empty default, so a host only implements what it shows.
//! [`LogNotifier`] renders all events through `tracing`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mailkeep_imap::TransferObserver;

/// Trailing window for the transfer rate average.
pub const SPEED_WINDOW: Duration = Duration::from_secs(21);

/// Receives progress, log and error events from the engines.
///
/// Indices passed to per-message callbacks are 1-based.
#[allow(unused_variables)]
pub trait Notifier: Send + Sync {
    /// Called once at the start of every operation.
    fn on_version_info(&self) {}

    /// One chunk of wire traffic.
    fn on_transfer_progress(&self, bytes: usize, elapsed: Duration) {}

    /// A backup of `account` into `location` begins.
    fn on_backup_started(&self, account: &str, location: &str) {}

    /// A backup has finished.
    fn on_backup_ended(&self, account: &str, location: &str) {}

    /// A restore of `account` from `location` begins.
    fn on_restore_started(&self, account: &str, location: &str) {}

    /// A restore has finished.
    fn on_restore_ended(&self, account: &str, location: &str) {}

    /// Clearing `account` begins.
    fn on_clear_started(&self, account: &str) {}

    /// Clearing has finished.
    fn on_clear_ended(&self, account: &str) {}

    /// A message was downloaded and stored.
    fn on_message_stored(&self, sender: &str, subject: &str, index: usize, total: usize) {}

    /// A message was skipped because its identity is already stored.
    fn on_message_skipped_duplicate(
        &self,
        index: usize,
        total: usize,
        skipped: usize,
        known: usize,
    ) {
    }

    /// A stored message was uploaded back to the server.
    fn on_message_restored(&self, sender: &str, subject: &str, index: usize, total: usize) {}

    /// A stored message fell outside the restore date window.
    fn on_message_restore_skipped_by_date(
        &self,
        sender: &str,
        subject: &str,
        index: usize,
        total: usize,
    ) {
    }

    /// Label synchronisation begins.
    fn on_label_sync_started(&self) {}

    /// Label synchronisation has finished.
    fn on_label_sync_ended(&self) {}

    /// Progress while mapping restored messages back to their labels.
    fn on_label_restore_progress(&self, index: usize, total: usize) {}

    /// Informational message, such as reconnect attempts.
    fn on_log(&self, message: &str) {}

    /// A per-item failure or other problem that does not stop the run.
    fn on_warning_or_recoverable_error(&self, message: &str) {}

    /// The operation stopped. `kind` is [`crate::Error::kind`].
    fn on_fatal_exception(&self, kind: &str, message: &str, trace: &str) {}
}

/// A notifier that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {}

/// Moving-average transfer rate over a trailing time window.
#[derive(Debug, Clone)]
pub struct TransferMeter {
    window: Duration,
    // newest first
    samples: VecDeque<(usize, Duration)>,
    total_bytes: u64,
}

impl Default for TransferMeter {
    fn default() -> Self {
        Self::new(SPEED_WINDOW)
    }
}

impl TransferMeter {
    /// Creates a meter averaging over `window`.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
            total_bytes: 0,
        }
    }

    /// Records one chunk.
    ///
    /// Samples are kept newest first until their summed durations exceed
    /// the window; the sample that crosses it is kept, older ones dropped.
    pub fn record(&mut self, bytes: usize, elapsed: Duration) {
        self.total_bytes += bytes as u64;
        self.samples.push_front((bytes, elapsed));

        let mut covered = Duration::ZERO;
        let mut keep = self.samples.len();
        for (i, (_, d)) in self.samples.iter().enumerate() {
            covered += *d;
            if covered > self.window {
                keep = i + 1;
                break;
            }
        }
        self.samples.truncate(keep);
    }

    /// Average rate over the window in KiB/s, or zero before any timed
    /// sample.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn speed_kib_per_sec(&self) -> f64 {
        let (bytes, elapsed) = self
            .samples
            .iter()
            .fold((0usize, Duration::ZERO), |(b, d), (sb, sd)| (b + sb, d + *sd));
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            bytes as f64 / secs / 1024.0
        }
    }

    /// Total bytes seen since the last reset, in MiB.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_mib(&self) -> f64 {
        self.total_bytes as f64 / 1024.0 / 1024.0
    }

    /// Clears all samples and the running total.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.total_bytes = 0;
    }
}

/// Forwards wire traffic from a metered stream to a notifier.
pub struct ProgressBridge(pub Arc<dyn Notifier>);

impl TransferObserver for ProgressBridge {
    fn on_transfer(&self, bytes: usize, elapsed: Duration) {
        self.0.on_transfer_progress(bytes, elapsed);
    }
}

impl std::fmt::Debug for ProgressBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBridge").finish_non_exhaustive()
    }
}

/// Console notifier rendering every event through `tracing`.
#[derive(Debug, Default)]
pub struct LogNotifier {
    meter: Mutex<TransferMeter>,
}

impl LogNotifier {
    /// Creates a notifier with a fresh transfer meter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the transfer meter.
    #[must_use]
    pub fn meter(&self) -> TransferMeter {
        self.meter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reset(&self) {
        self.meter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(index: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        index as f64 / total as f64 * 100.0
    }
}

impl Notifier for LogNotifier {
    fn on_version_info(&self) {
        tracing::info!("mailkeep {}", env!("CARGO_PKG_VERSION"));
    }

    fn on_transfer_progress(&self, bytes: usize, elapsed: Duration) {
        let mut meter = self.meter.lock().unwrap_or_else(PoisonError::into_inner);
        meter.record(bytes, elapsed);
        tracing::trace!(
            "{:.0}KB/s (total: {:.2}MB)",
            meter.speed_kib_per_sec(),
            meter.total_mib()
        );
    }

    fn on_backup_started(&self, account: &str, location: &str) {
        self.reset();
        tracing::info!("Starting backup of account {account} into {location}");
    }

    fn on_backup_ended(&self, account: &str, _location: &str) {
        tracing::info!("Ending backup of account {account}");
    }

    fn on_restore_started(&self, account: &str, location: &str) {
        self.reset();
        tracing::info!("Restoring the content of account {account} from {location}");
    }

    fn on_restore_ended(&self, account: &str, _location: &str) {
        tracing::info!("End of restoring of account {account}");
    }

    fn on_clear_started(&self, account: &str) {
        tracing::info!("Clearing the content of account {account}");
    }

    fn on_clear_ended(&self, account: &str) {
        tracing::info!("End of clearing of account {account}");
    }

    fn on_message_stored(&self, sender: &str, subject: &str, index: usize, total: usize) {
        tracing::info!(
            "Stored {:4.1}%: {sender} - {subject}",
            percentage(index, total)
        );
    }

    fn on_message_skipped_duplicate(
        &self,
        index: usize,
        total: usize,
        skipped: usize,
        known: usize,
    ) {
        tracing::info!(
            "Skip   {:4.1}%: message already stored ({skipped} of {known})",
            percentage(index, total)
        );
    }

    fn on_message_restored(&self, sender: &str, subject: &str, index: usize, total: usize) {
        tracing::info!(
            "Restored {:4.1}%: {sender} - {subject}",
            percentage(index, total)
        );
    }

    fn on_message_restore_skipped_by_date(
        &self,
        sender: &str,
        subject: &str,
        index: usize,
        total: usize,
    ) {
        tracing::info!(
            "Skipdate {:4.1}%: {sender} - {subject}",
            percentage(index, total)
        );
    }

    fn on_label_sync_started(&self) {
        tracing::info!("Starting backup of labels");
    }

    fn on_label_sync_ended(&self) {
        tracing::info!("Backup of labels ended");
    }

    fn on_label_restore_progress(&self, index: usize, total: usize) {
        tracing::info!("Restoring labels, {:.1}%", percentage(index, total));
    }

    fn on_log(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn on_warning_or_recoverable_error(&self, message: &str) {
        tracing::warn!("Error: {message}");
    }

    fn on_fatal_exception(&self, kind: &str, message: &str, trace: &str) {
        match kind {
            "network" | "timeout" => {
                tracing::error!("{message}: there are network problems, please try it later");
            }
            "aborted" => tracing::error!("IMAP aborted the transfer"),
            "auth" | "imap" => tracing::error!("IMAP: {message}"),
            "interrupted" => tracing::info!("Program interrupted by user"),
            _ => tracing::error!(kind, "Error occurred: {message}\n{trace}"),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names,
    clippy::float_cmp
)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_empty() {
        let meter = TransferMeter::default();
        assert_eq!(meter.speed_kib_per_sec(), 0.0);
        assert_eq!(meter.total_mib(), 0.0);
    }

    #[test]
    fn test_meter_average() {
        let mut meter = TransferMeter::default();
        meter.record(1024, Duration::from_secs(1));
        meter.record(3072, Duration::from_secs(1));
        assert_eq!(meter.speed_kib_per_sec(), 2.0);
    }

    #[test]
    fn test_meter_drops_samples_outside_window() {
        let mut meter = TransferMeter::new(Duration::from_secs(10));
        // an old slow sample
        meter.record(1024, Duration::from_secs(20));
        for _ in 0..11 {
            meter.record(10 * 1024, Duration::from_secs(1));
        }
        // the crossing sample is the 11th newest; the slow one is gone
        assert_eq!(meter.speed_kib_per_sec(), 10.0);
        assert_eq!(meter.total_mib(), (1024.0 + 110.0 * 1024.0) / 1024.0 / 1024.0);
    }

    #[test]
    fn test_meter_reset() {
        let mut meter = TransferMeter::default();
        meter.record(2048, Duration::from_millis(500));
        meter.reset();
        assert_eq!(meter.total_mib(), 0.0);
        assert_eq!(meter.speed_kib_per_sec(), 0.0);
    }

    #[test]
    fn test_bridge_forwards() {
        let notifier = Arc::new(LogNotifier::new());
        let bridge = ProgressBridge(notifier.clone());
        bridge.on_transfer(1024 * 1024, Duration::from_secs(1));
        assert_eq!(notifier.meter().total_mib(), 1.0);
        assert_eq!(notifier.meter().speed_kib_per_sec(), 1024.0);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(0, 0), 100.0);
    }
}
