//! Messages as entries of a single zip archive.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{Backend, BlobReader, MESSAGE_EXTENSION};
use crate::Result;

/// A zip archive of `.eml` entries. Sidecars sit next to it, named by
/// replacing the archive's extension: `x.ids.txt`, `x.labels.txt`,
/// `x.stamp.txt`.
///
/// The archive is reopened for every write rather than held open.
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    names: HashSet<String>,
}

impl Archive {
    /// Opens the archive, reading its entry names. A missing archive is
    /// created on the first write; its parent directory is created now.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing archive cannot be read.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let names = if path.exists() {
            let archive = ZipArchive::new(File::open(path)?)?;
            archive.file_names().map(str::to_string).collect()
        } else {
            HashSet::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            names,
        })
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        self.path.with_extension(suffix)
    }
}

impl Backend for Archive {
    type Reader = ArchiveReader;

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .filter(|name| {
                !name.ends_with('/')
                    && Path::new(name)
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(MESSAGE_EXTENSION))
            })
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    fn exists(&self, path: &str) -> bool {
        self.names.contains(path)
    }

    fn write(&mut self, path: &str, raw: &[u8]) -> Result<()> {
        let mut writer = if self.path.exists() {
            let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
            ZipWriter::new_append(file)?
        } else {
            ZipWriter::new(File::create(&self.path)?)
        };

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(path, options)?;
        writer.write_all(raw)?;
        writer.finish()?;

        self.names.insert(path.to_string());
        Ok(())
    }

    fn reader(&self) -> Result<Self::Reader> {
        Ok(ArchiveReader(ZipArchive::new(File::open(&self.path)?)?))
    }

    fn sidecars(&self) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.sidecar("ids.txt"),
            self.sidecar("labels.txt"),
            self.sidecar("stamp.txt"),
        )
    }
}

/// Reads entries from one open handle on the archive.
#[derive(Debug)]
pub struct ArchiveReader(ZipArchive<File>);

impl BlobReader for ArchiveReader {
    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut entry = self.0.by_name(path)?;
        let mut raw = Vec::new();
        entry.read_to_end(&mut raw)?;
        Ok(raw)
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
    use std::sync::Arc;

    use super::*;
    use crate::NullNotifier;
    use crate::storage::{MessageStore, PathTemplate, Storage};

    const MAIL: &[u8] =
        b"From: carol@example.com\r\nDate: 3 Mar 2021 08:00:00\r\nMessage-ID: <c@x>\r\n\r\nhi\r\n";

    fn open(path: &Path) -> MessageStore<Archive> {
        MessageStore::open(
            Archive::open(path).unwrap(),
            PathTemplate::new("${YEAR}/${FROM}"),
            Arc::new(NullNotifier),
        )
        .unwrap()
    }

    #[test]
    fn test_sidecar_names() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = Archive::open(&tmp.path().join("backup.zip")).unwrap();
        let (ids, labels, stamp) = archive.sidecars();
        assert_eq!(ids, tmp.path().join("backup.ids.txt"));
        assert_eq!(labels, tmp.path().join("backup.labels.txt"));
        assert_eq!(stamp, tmp.path().join("backup.stamp.txt"));
    }

    #[test]
    fn test_store_reopens_and_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("mail.zip");

        let mut store = open(&path);
        assert_eq!(store.store(MAIL).unwrap(), "2021/carol-1.eml");
        assert_eq!(store.store(MAIL).unwrap(), "2021/carol-2.eml");
        store.finalize_backup().unwrap();
        drop(store);

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut body = String::new();
        archive
            .by_name("2021/carol-2.eml")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert!(body.ends_with("hi\r\n"));

        let reopened = open(&path);
        let stored: Vec<_> = reopened
            .iter_stored(None, None, false)
            .unwrap()
            .map(|m| m.unwrap().path)
            .collect();
        assert_eq!(stored, ["2021/carol-1.eml", "2021/carol-2.eml"]);
        assert!(tmp.path().join("nested/mail.ids.txt").is_file());
    }

    #[test]
    fn test_empty_archive_iterates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open(&tmp.path().join("fresh.zip"));
        assert_eq!(store.iter_stored(None, None, true).unwrap().count(), 0);
    }
}
