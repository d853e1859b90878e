//! Durable message storage.
//!
//! A storage location is a base path plus a path template, written as
//! `base#template`. A base ending in `.zip` keeps messages as entries of
//! one archive; anything else keeps them as `.eml` files under a
//! directory. Either way the dedup index, label assignment and watermark
//! live in plain-text sidecar files next to the messages.

mod archive;
mod dir;
mod index;
mod labels;
mod stamp;
mod template;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use mailkeep_mime::Message;
use tracing::{debug, info};

pub use archive::Archive;
pub use dir::Directory;
pub use index::DedupIndex;
pub use labels::{LabelAssignment, LabelFile};
pub use stamp::Stamp;
pub use template::{DEFAULT_FRAGMENT, PathTemplate, clean_path};

use crate::notifier::Notifier;
use crate::{Error, Result};

/// File extension of stored messages.
pub const MESSAGE_EXTENSION: &str = "eml";

/// One stored message yielded by [`Storage::iter_stored`].
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Path relative to the storage base, `/`-separated.
    pub path: String,
    /// The parsed message.
    pub message: Message,
    /// 1-based position among all stored messages.
    pub index: usize,
    /// Number of stored messages.
    pub total: usize,
}

/// Stored messages, in path order.
pub type StoredIter<'a> = Box<dyn Iterator<Item = Result<StoredMessage>> + Send + 'a>;

/// Operations common to both storage backends.
pub trait Storage: Send + Sync {
    /// Identities of every stored message.
    fn identities(&self) -> HashSet<String>;

    /// Iterates stored messages sorted by path, keeping those sent on or
    /// after `since` and before `before`. Messages outside the window are
    /// reported through the notifier when `report` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be opened for reading.
    /// Per-message failures are yielded as `Err` items.
    fn iter_stored(
        &self,
        since: Option<NaiveDate>,
        before: Option<NaiveDate>,
        report: bool,
    ) -> Result<StoredIter<'_>>;

    /// Stores a raw message and returns its relative path. The index is
    /// updated in memory only; see [`finalize_backup`](Self::finalize_backup).
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be parsed or written.
    fn store(&mut self, raw: &[u8]) -> Result<String>;

    /// Flushes the dedup index to its sidecar.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be written.
    fn finalize_backup(&mut self) -> Result<()>;

    /// Reads the persisted label assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be read.
    fn label_assignment(&self) -> Result<LabelAssignment>;

    /// Replaces the labels of every identity in `partial` and rewrites the
    /// sidecar, keeping the previous version as `.bak`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be read or written.
    fn update_label_assignment(&mut self, partial: LabelAssignment) -> Result<()>;

    /// Reads the incremental backup watermark.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar exists but cannot be read.
    fn last_watermark(&self) -> Result<Option<NaiveDate>>;

    /// Persists the incremental backup watermark.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be written.
    fn update_watermark(&mut self, at: NaiveDate) -> Result<()>;
}

/// Where message blobs physically live.
pub trait Backend: Send + Sync {
    /// Reader handed out for one pass over the stored messages.
    type Reader: BlobReader + Send + 'static;

    /// Relative paths of every stored message.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn list(&self) -> Result<Vec<String>>;

    /// Returns true if a message is stored at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Writes a new message at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write(&mut self, path: &str, raw: &[u8]) -> Result<()>;

    /// Opens a reader for stored messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be opened.
    fn reader(&self) -> Result<Self::Reader>;

    /// Sidecar file names: index, labels, watermark.
    fn sidecars(&self) -> (PathBuf, PathBuf, PathBuf);
}

/// Reads stored message blobs.
pub trait BlobReader {
    /// Reads the message at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be read.
    fn read(&mut self, path: &str) -> Result<Vec<u8>>;
}

/// Which backend a location selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// `.eml` files under a directory tree.
    Directory,
    /// Entries of a single zip archive.
    Archive,
}

/// A parsed `base#template` storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    raw: String,
    base: PathBuf,
    template: PathTemplate,
    kind: BackendKind,
}

impl StorageLocation {
    /// Parses a location string. The template after the first `#` is
    /// optional; without it the default template applies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base path is empty.
    pub fn parse(location: &str) -> Result<Self> {
        let (base, fragment) = match location.split_once('#') {
            Some((base, fragment)) if !fragment.is_empty() => (base, fragment),
            Some((base, _)) => (base, DEFAULT_FRAGMENT),
            None => (location, DEFAULT_FRAGMENT),
        };
        let base = base.trim();
        if base.is_empty() {
            return Err(Error::Config(format!(
                "storage location has no base path: {location:?}"
            )));
        }

        let base = expand_home(base);
        let kind = if base
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
        {
            BackendKind::Archive
        } else {
            BackendKind::Directory
        };

        Ok(Self {
            raw: location.to_string(),
            base,
            template: PathTemplate::new(fragment),
            kind,
        })
    }

    /// Returns the base path.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns the path template.
    #[must_use]
    pub const fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Returns the selected backend.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn expand_home(base: &str) -> PathBuf {
    let rest = match base.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(base),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(base),
    }
}

/// Opens the storage a location names, creating it on first use.
///
/// # Errors
///
/// Returns an error if the location cannot be created or its index
/// cannot be rebuilt.
pub fn open_storage(
    location: &StorageLocation,
    notifier: Arc<dyn Notifier>,
) -> Result<Box<dyn Storage>> {
    let template = location.template.clone();
    Ok(match location.kind {
        BackendKind::Directory => Box::new(MessageStore::open(
            Directory::open(&location.base)?,
            template,
            notifier,
        )?),
        BackendKind::Archive => Box::new(MessageStore::open(
            Archive::open(&location.base)?,
            template,
            notifier,
        )?),
    })
}

/// A [`Backend`] plus its dedup index and sidecars.
pub struct MessageStore<B: Backend> {
    backend: B,
    template: PathTemplate,
    index: DedupIndex,
    index_file: PathBuf,
    labels: LabelFile,
    stamp: Stamp,
    notifier: Arc<dyn Notifier>,
}

impl<B: Backend> fmt::Debug for MessageStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStore")
            .field("template", &self.template)
            .field("index_file", &self.index_file)
            .field("entries", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> MessageStore<B> {
    /// Wraps a backend, loading its index or rebuilding it from the
    /// stored messages when the sidecar is missing or unreadable.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored messages cannot be listed.
    pub fn open(backend: B, template: PathTemplate, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let (index_file, labels_file, stamp_file) = backend.sidecars();

        let index = match DedupIndex::load(&index_file, notifier.as_ref()) {
            Some(index) => index,
            None => rebuild_index(&backend, notifier.as_ref())?,
        };

        Ok(Self {
            backend,
            template,
            index,
            index_file,
            labels: LabelFile::new(labels_file),
            stamp: Stamp::new(stamp_file),
            notifier,
        })
    }

    /// Returns the in-memory dedup index.
    #[must_use]
    pub const fn index(&self) -> &DedupIndex {
        &self.index
    }

    fn free_path(&self, stem: &str) -> String {
        let mut n = 1u32;
        loop {
            let candidate = format!("{stem}-{n}.{MESSAGE_EXTENSION}");
            if !self.backend.exists(&candidate) && self.index.identity_of(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn rebuild_index<B: Backend>(backend: &B, notifier: &dyn Notifier) -> Result<DedupIndex> {
    let paths = backend.list()?;
    let mut index = DedupIndex::new();
    if paths.is_empty() {
        return Ok(index);
    }

    notifier.on_log(&format!("Rebuilding index of {} stored messages", paths.len()));
    let mut reader = backend.reader()?;
    for path in paths {
        match reader
            .read(&path)
            .and_then(|raw| Message::parse(raw).map_err(Error::from))
        {
            Ok(message) => index.insert(path, message.identity()),
            Err(e) => {
                notifier.on_warning_or_recoverable_error(&format!("Cannot index {path}: {e}"));
            }
        }
    }
    info!(entries = index.len(), "Index rebuilt");
    Ok(index)
}

fn midnight(date: Option<NaiveDate>) -> Option<NaiveDateTime> {
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl<B: Backend> Storage for MessageStore<B> {
    fn identities(&self) -> HashSet<String> {
        self.index.identities()
    }

    fn iter_stored(
        &self,
        since: Option<NaiveDate>,
        before: Option<NaiveDate>,
        report: bool,
    ) -> Result<StoredIter<'_>> {
        let mut paths = self.backend.list()?;
        paths.sort();
        let total = paths.len();
        let mut reader = if total == 0 {
            None
        } else {
            Some(self.backend.reader()?)
        };
        let since = midnight(since);
        let before = midnight(before);
        let notifier = Arc::clone(&self.notifier);

        let iter = paths.into_iter().enumerate().filter_map(move |(i, path)| {
            let reader = reader.as_mut()?;
            let index = i + 1;
            let message = match reader
                .read(&path)
                .and_then(|raw| Message::parse(raw).map_err(Error::from))
            {
                Ok(message) => message,
                Err(e) => return Some(Err(e)),
            };

            let sent = message.sent_date();
            let in_window = since.is_none_or(|s| sent >= s) && before.is_none_or(|b| sent < b);
            if !in_window {
                if report {
                    notifier.on_message_restore_skipped_by_date(
                        &message.sender(),
                        &message.subject(),
                        index,
                        total,
                    );
                }
                return None;
            }

            Some(Ok(StoredMessage {
                path,
                message,
                index,
                total,
            }))
        });
        Ok(Box::new(iter))
    }

    fn store(&mut self, raw: &[u8]) -> Result<String> {
        let message = Message::parse(raw.to_vec())?;
        let stem = self.template.expand(&message);
        let path = self.free_path(&stem);

        self.backend.write(&path, message.raw())?;
        debug!(path, "Message stored");
        self.index.insert(path.clone(), message.identity());
        Ok(path)
    }

    fn finalize_backup(&mut self) -> Result<()> {
        self.index.save(&self.index_file)
    }

    fn label_assignment(&self) -> Result<LabelAssignment> {
        self.labels.load(&self.index, self.notifier.as_ref())
    }

    fn update_label_assignment(&mut self, partial: LabelAssignment) -> Result<()> {
        let mut assignment = self.label_assignment()?;
        labels::merge(&mut assignment, partial);
        self.labels.save(&assignment, &self.index)
    }

    fn last_watermark(&self) -> Result<Option<NaiveDate>> {
        self.stamp.read()
    }

    fn update_watermark(&mut self, at: NaiveDate) -> Result<()> {
        self.stamp.write(at)
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
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_with_fragment() {
        let loc = StorageLocation::parse("mydir#${YEAR}/${FROM}").unwrap();
        assert_eq!(loc.base(), Path::new("mydir"));
        assert_eq!(loc.template().as_str(), "${YEAR}/${FROM}");
        assert_eq!(loc.kind(), BackendKind::Directory);
        assert_eq!(loc.to_string(), "mydir#${YEAR}/${FROM}");
    }

    #[test]
    fn test_parse_location_defaults() {
        let loc = StorageLocation::parse("/backups/Mail.ZIP").unwrap();
        assert_eq!(loc.kind(), BackendKind::Archive);
        assert_eq!(loc.template().as_str(), DEFAULT_FRAGMENT);

        let loc = StorageLocation::parse("out#").unwrap();
        assert_eq!(loc.template().as_str(), DEFAULT_FRAGMENT);
    }

    #[test]
    fn test_parse_location_requires_base() {
        assert!(matches!(
            StorageLocation::parse("#${YEAR}"),
            Err(Error::Config(_))
        ));
        assert!(StorageLocation::parse("").is_err());
    }

    #[test]
    fn test_home_expansion() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let loc = StorageLocation::parse("~/gmail").unwrap();
        assert_eq!(loc.base(), home.join("gmail"));
        let loc = StorageLocation::parse("~other/gmail").unwrap();
        assert_eq!(loc.base(), Path::new("~other/gmail"));
    }
}
