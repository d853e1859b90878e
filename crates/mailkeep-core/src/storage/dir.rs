//! Messages as `.eml` files under a directory tree.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Backend, BlobReader, MESSAGE_EXTENSION};
use crate::Result;

/// A directory of `.eml` files with `ids.txt`, `labels.txt` and `stamp`
/// sidecars at its root.
#[derive(Debug, Clone)]
pub struct Directory {
    base: PathBuf,
}

impl Directory {
    /// Opens the directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(base: &Path) -> Result<Self> {
        fs::create_dir_all(base)?;
        Ok(Self {
            base: base.to_path_buf(),
        })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/').fold(self.base.clone(), |acc, seg| acc.join(seg))
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(root, &path, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MESSAGE_EXTENSION))
            && let Ok(rel) = path.strip_prefix(root)
        {
            let rel: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(rel.join("/"));
        }
    }
    Ok(())
}

impl Backend for Directory {
    type Reader = Self;

    fn list(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        walk(&self.base, &self.base, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn write(&mut self, path: &str, raw: &[u8]) -> Result<()> {
        let file = self.resolve(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = OpenOptions::new().write(true).create_new(true).open(&file)?;
        out.write_all(raw)?;
        out.flush()?;
        Ok(())
    }

    fn reader(&self) -> Result<Self::Reader> {
        Ok(self.clone())
    }

    fn sidecars(&self) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.base.join("ids.txt"),
            self.base.join("labels.txt"),
            self.base.join("stamp"),
        )
    }
}

impl BlobReader for Directory {
    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(path))?)
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
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::NullNotifier;
    use crate::storage::{MessageStore, PathTemplate, Storage};

    fn mail(from: &str, date: &str, id: &str) -> Vec<u8> {
        format!(
            "From: {from}\r\nDate: {date}\r\nMessage-ID: <{id}>\r\nSubject: hello\r\n\r\nbody {id}\r\n"
        )
        .into_bytes()
    }

    fn open(base: &Path, template: &str) -> MessageStore<Directory> {
        MessageStore::open(
            Directory::open(base).unwrap(),
            PathTemplate::new(template),
            Arc::new(NullNotifier),
        )
        .unwrap()
    }

    #[test]
    fn test_collision_gets_numeric_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("mydir");
        let mut store = open(&base, "${YEAR}/${MONTH}/${YEAR}${MONTH}${DAY}-${FROM}");

        let first = store
            .store(&mail("alice@example.com", "1 May 2020 10:00:00", "one@x"))
            .unwrap();
        let second = store
            .store(&mail("Alice <alice@example.com>", "1 May 2020 18:30:00", "two@x"))
            .unwrap();

        assert_eq!(first, "2020/05/20200501-alice-1.eml");
        assert_eq!(second, "2020/05/20200501-alice-2.eml");
        assert!(base.join("2020/05/20200501-alice-1.eml").is_file());
        assert!(base.join("2020/05/20200501-alice-2.eml").is_file());
        assert_eq!(
            store.identities(),
            HashSet::from(["one@x".to_string(), "two@x".to_string()])
        );
    }

    #[test]
    fn test_index_flushed_only_on_finalize() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = open(tmp.path(), "${FROM}");
        store
            .store(&mail("bob@example.com", "2 Jan 2021 00:00:00", "b@x"))
            .unwrap();
        assert!(!tmp.path().join("ids.txt").exists());

        store.finalize_backup().unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("ids.txt")).unwrap(),
            "bob-1.eml\tb@x\n"
        );
    }

    #[test]
    fn test_index_rebuilt_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = open(tmp.path(), "${FROM}");
        store
            .store(&mail("bob@example.com", "2 Jan 2021 00:00:00", "b@x"))
            .unwrap();
        drop(store);

        let reopened = open(tmp.path(), "${FROM}");
        assert!(reopened.identities().contains("b@x"));
        assert_eq!(reopened.index().path_of("b@x"), Some("bob-1.eml"));
    }

    #[test]
    fn test_iter_stored_window() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = open(tmp.path(), "${YEAR}${MONTH}${DAY}");
        for (day, id) in [(1, "a"), (2, "b"), (3, "c")] {
            store
                .store(&mail("x@y.z", &format!("{day} May 2020 12:00:00"), id))
                .unwrap();
        }

        let since = NaiveDate::from_ymd_opt(2020, 5, 2);
        let before = NaiveDate::from_ymd_opt(2020, 5, 3);
        let kept: Vec<_> = store
            .iter_stored(since, before, false)
            .unwrap()
            .map(|m| m.unwrap())
            .collect();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path, "20200502-1.eml");
        assert_eq!((kept[0].index, kept[0].total), (2, 3));
        assert_eq!(kept[0].message.identity(), "b");
    }

    #[test]
    fn test_iter_stored_can_stop_early() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = open(tmp.path(), "${FROM}");
        for id in ["a", "b", "c"] {
            store.store(&mail("x@y.z", "1 May 2020", id)).unwrap();
        }
        let first = store.iter_stored(None, None, false).unwrap().next();
        assert_eq!(first.unwrap().unwrap().path, "x-1.eml");
    }

    #[test]
    fn test_watermark_and_labels() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = open(tmp.path(), "${FROM}");
        assert_eq!(store.last_watermark().unwrap(), None);

        store.store(&mail("x@y.z", "1 May 2020", "a")).unwrap();
        store
            .update_label_assignment([("a".to_string(), ["INBOX".to_string()].into())].into())
            .unwrap();
        store
            .update_watermark(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap())
            .unwrap();

        assert_eq!(store.label_assignment().unwrap()["a"].len(), 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("stamp")).unwrap(),
            "20200501\n"
        );
    }
}
