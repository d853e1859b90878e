//! The incremental backup watermark.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use mailkeep_mime::date;

use crate::Result;

/// One-line `YYYYMMDD` sidecar holding the latest sent date seen.
#[derive(Debug, Clone)]
pub struct Stamp {
    path: PathBuf,
}

impl Stamp {
    /// Wraps the sidecar location.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the sidecar location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the watermark. A missing or unparseable file reads as none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read(&self) -> Result<Option<NaiveDate>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(date::parse_stamp(text.trim())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the watermark.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, at: NaiveDate) -> Result<()> {
        fs::write(&self.path, format!("{}\n", date::stamp(at)))?;
        Ok(())
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
    fn test_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = Stamp::new(dir.path().join("stamp"));
        assert_eq!(stamp.read().unwrap(), None);

        let day = NaiveDate::from_ymd_opt(2020, 5, 1).unwrap();
        stamp.write(day).unwrap();
        assert_eq!(fs::read_to_string(stamp.path()).unwrap(), "20200501\n");
        assert_eq!(stamp.read().unwrap(), Some(day));
    }

    #[test]
    fn test_garbage_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = Stamp::new(dir.path().join("stamp"));
        fs::write(stamp.path(), "not a date").unwrap();
        assert_eq!(stamp.read().unwrap(), None);
    }
}
