//! Persisted label membership per message.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use mailkeep_imap::utf7;
use tracing::debug;

use super::index::DedupIndex;
use crate::Result;
use crate::notifier::Notifier;

/// Label names (in mailbox wire form) per message identity.
pub type LabelAssignment = BTreeMap<String, BTreeSet<String>>;

/// Escapes a label for a space-separated list.
fn escape(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ' ' => out.push_str("\\ "),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Splits a space-separated escaped list back into labels.
fn split_escaped(list: &str) -> Vec<String> {
    let mut labels = Vec::new();
    let mut current = String::new();
    let mut chars = list.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('t') => current.push('\t'),
                Some(other) => current.push(other),
                None => current.push('\\'),
            },
            ' ' => {
                if !current.is_empty() {
                    labels.push(std::mem::take(&mut current));
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        labels.push(current);
    }
    labels
}

/// Renders one sidecar line's label list. Labels are written in their
/// human-readable form.
fn render_labels(labels: &BTreeSet<String>) -> String {
    labels
        .iter()
        .map(|wire| escape(&utf7::decode(wire).unwrap_or_else(|_| wire.clone())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The label sidecar file and its `.bak` rotation.
#[derive(Debug, Clone)]
pub struct LabelFile {
    path: PathBuf,
}

impl LabelFile {
    /// Wraps the sidecar location.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Returns the sidecar location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the assignment, resolving each line's path through the
    /// index. Lines naming paths the index does not know are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self, index: &DedupIndex, notifier: &dyn Notifier) -> Result<LabelAssignment> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LabelAssignment::new()),
            Err(e) => return Err(e.into()),
        };

        let mut assignment = LabelAssignment::new();
        for line in text.lines().filter(|l| !l.is_empty()) {
            let Some((path, list)) = line.split_once('\t') else {
                notifier.on_warning_or_recoverable_error(&format!(
                    "Ignoring malformed label line: {line}"
                ));
                continue;
            };
            let Some(identity) = index.identity_of(path) else {
                debug!(path, "Dropping labels of unknown message");
                continue;
            };
            let labels = split_escaped(list).iter().map(|l| utf7::encode(l)).collect();
            assignment.insert(identity.to_string(), labels);
        }
        Ok(assignment)
    }

    /// Rewrites the sidecar, copying the previous version to `.bak`
    /// first. Identities without a stored path are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup copy or the write fails.
    pub fn save(&self, assignment: &LabelAssignment, index: &DedupIndex) -> Result<()> {
        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }

        let mut lines: Vec<(&str, String)> = assignment
            .iter()
            .filter_map(|(identity, labels)| {
                index
                    .path_of(identity)
                    .map(|path| (path, render_labels(labels)))
            })
            .collect();
        lines.sort();

        let mut out = String::new();
        for (path, list) in lines {
            out.push_str(path);
            out.push('\t');
            out.push_str(&list);
            out.push('\n');
        }
        fs::write(&self.path, out)?;
        Ok(())
    }
}

/// Replaces the entries of `assignment` for every identity in `partial`.
pub fn merge(assignment: &mut LabelAssignment, partial: LabelAssignment) {
    for (identity, labels) in partial {
        assignment.insert(identity, labels);
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
    use crate::NullNotifier;

    fn set(labels: &[&str]) -> BTreeSet<String> {
        labels.iter().map(|l| (*l).to_string()).collect()
    }

    #[test]
    fn test_escape_roundtrip() {
        let labels = ["Work stuff", "a\\b", "tab\there", "plain"];
        let joined = labels.iter().map(|l| escape(l)).collect::<Vec<_>>().join(" ");
        assert_eq!(joined, "Work\\ stuff a\\\\b tab\\there plain");
        assert_eq!(split_escaped(&joined), labels);
    }

    #[test]
    fn test_split_ignores_repeated_spaces() {
        assert_eq!(split_escaped("  a   b "), vec!["a", "b"]);
        assert!(split_escaped("").is_empty());
    }

    #[test]
    fn test_save_load_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file = LabelFile::new(dir.path().join("labels.txt"));
        let mut index = DedupIndex::new();
        index.insert("2020/a.eml", "id-a");
        index.insert("2020/b.eml", "id-b");

        let mut assignment = LabelAssignment::new();
        assignment.insert("id-a".into(), set(&["INBOX", "Wys&AUI-ane"]));
        file.save(&assignment, &index).unwrap();

        let text = fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "2020/a.eml\tINBOX Wysłane\n");
        assert!(!dir.path().join("labels.txt.bak").exists());

        merge(&mut assignment, [("id-b".to_string(), set(&["My Label"]))].into());
        file.save(&assignment, &index).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("labels.txt.bak")).unwrap(),
            text
        );

        let loaded = file.load(&index, &NullNotifier).unwrap();
        assert_eq!(loaded, assignment);
    }

    #[test]
    fn test_load_drops_unknown_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = LabelFile::new(dir.path().join("labels.txt"));
        fs::write(file.path(), "gone.eml\tINBOX\nkept.eml\tWork\n").unwrap();
        let mut index = DedupIndex::new();
        index.insert("kept.eml", "id");

        let loaded = file.load(&index, &NullNotifier).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["id"], set(&["Work"]));
    }

    #[test]
    fn test_merge_replaces() {
        let mut assignment = LabelAssignment::new();
        assignment.insert("id".into(), set(&["Old", "INBOX"]));
        merge(&mut assignment, [("id".to_string(), set(&["New"]))].into());
        assert_eq!(assignment["id"], set(&["New"]));
    }
}
