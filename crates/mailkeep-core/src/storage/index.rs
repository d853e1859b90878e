//! The deduplication index: a one-to-one map between stored paths and
//! message identities.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::Result;
use crate::notifier::Notifier;

/// Bidirectional `path <-> identity` map.
///
/// Both sides are unique: registering an identity under a new path drops
/// its old path, and registering a path under a new identity drops the
/// identity it had.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupIndex {
    by_path: BTreeMap<String, String>,
    by_identity: HashMap<String, String>,
}

impl DedupIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `identity` as stored at `path`.
    pub fn insert(&mut self, path: impl Into<String>, identity: impl Into<String>) {
        let path = path.into();
        let identity = identity.into();

        if let Some(old_path) = self.by_identity.remove(&identity) {
            self.by_path.remove(&old_path);
        }
        if let Some(old_identity) = self.by_path.remove(&path) {
            self.by_identity.remove(&old_identity);
        }

        self.by_identity.insert(identity.clone(), path.clone());
        self.by_path.insert(path, identity);
    }

    /// Returns true if the identity is already stored.
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.by_identity.contains_key(identity)
    }

    /// Returns the path an identity is stored at.
    #[must_use]
    pub fn path_of(&self, identity: &str) -> Option<&str> {
        self.by_identity.get(identity).map(String::as_str)
    }

    /// Returns the identity stored at a path.
    #[must_use]
    pub fn identity_of(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    /// Returns every stored identity.
    #[must_use]
    pub fn identities(&self) -> HashSet<String> {
        self.by_identity.keys().cloned().collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Parses `path<TAB>identity` lines. Malformed lines are reported and
    /// skipped.
    pub fn parse(text: &str, notifier: &dyn Notifier) -> Self {
        let mut index = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((path, identity)) if !path.is_empty() && !identity.is_empty() => {
                    index.insert(path, identity);
                }
                _ => notifier.on_warning_or_recoverable_error(&format!(
                    "Ignoring malformed index line {}: {line}",
                    lineno + 1
                )),
            }
        }
        index
    }

    /// Renders the index as `path<TAB>identity` lines sorted by path.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, identity) in &self.by_path {
            out.push_str(path);
            out.push('\t');
            out.push_str(identity);
            out.push('\n');
        }
        out
    }

    /// Loads the index sidecar. Returns `None` if it is missing or cannot
    /// be read, in which case the caller rebuilds it from the stored
    /// messages.
    pub fn load(file: &Path, notifier: &dyn Notifier) -> Option<Self> {
        match fs::read_to_string(file) {
            Ok(text) => Some(Self::parse(&text, notifier)),
            Err(e) => {
                debug!(file = %file.display(), error = %e, "Index sidecar unavailable");
                None
            }
        }
    }

    /// Writes the index sidecar.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, file: &Path) -> Result<()> {
        fs::write(file, self.render())?;
        debug!(file = %file.display(), entries = self.len(), "Index saved");
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
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Warnings(Mutex<Vec<String>>);

    impl Notifier for Warnings {
        fn on_warning_or_recoverable_error(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_insert_keeps_one_to_one() {
        let mut index = DedupIndex::new();
        index.insert("a.eml", "id-1");
        index.insert("b.eml", "id-1");
        assert_eq!(index.len(), 1);
        assert_eq!(index.path_of("id-1"), Some("b.eml"));
        assert_eq!(index.identity_of("a.eml"), None);

        index.insert("b.eml", "id-2");
        assert_eq!(index.len(), 1);
        assert!(!index.contains("id-1"));
        assert!(index.contains("id-2"));
    }

    #[test]
    fn test_render_sorted_by_path() {
        let mut index = DedupIndex::new();
        index.insert("z/2.eml", "two");
        index.insert("a/1.eml", "one");
        assert_eq!(index.render(), "a/1.eml\tone\nz/2.eml\ttwo\n");
    }

    #[test]
    fn test_parse_reports_bad_lines() {
        let warnings = Warnings::default();
        let index = DedupIndex::parse("a.eml\tone\n\nbroken\nb.eml\ttwo\n", &warnings);

        assert_eq!(index.len(), 2);
        assert_eq!(index.identity_of("b.eml"), Some("two"));
        let warnings = warnings.0.into_inner().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("line 3"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ids.txt");
        let mut index = DedupIndex::new();
        index.insert("2020/05/x.eml", "abc@example.com");

        index.save(&file).unwrap();
        let loaded = DedupIndex::load(&file, &crate::NullNotifier).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DedupIndex::load(&dir.path().join("nope.txt"), &crate::NullNotifier).is_none());
    }
}
