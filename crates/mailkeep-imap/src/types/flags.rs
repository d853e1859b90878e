//! Message flags as carried by FLAGS lists, STORE and APPEND.

use std::fmt;

/// One message flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`. Restored messages are appended with it.
    Seen,
    /// `\Answered`.
    Answered,
    /// `\Flagged`, Gmail's star.
    Flagged,
    /// `\Deleted`, removed by the next EXPUNGE.
    Deleted,
    /// `\Draft`.
    Draft,
    /// `\Recent`.
    Recent,
    /// Any other atom, such as `$Junk` or the `\*` wildcard.
    Keyword(String),
}

static SYSTEM_FLAGS: [(Flag, &str); 6] = [
    (Flag::Seen, "\\Seen"),
    (Flag::Answered, "\\Answered"),
    (Flag::Flagged, "\\Flagged"),
    (Flag::Deleted, "\\Deleted"),
    (Flag::Draft, "\\Draft"),
    (Flag::Recent, "\\Recent"),
];

impl Flag {
    /// Reads a flag atom. System flags match case-insensitively; anything
    /// else is kept verbatim as a keyword.
    #[must_use]
    pub fn parse(atom: &str) -> Self {
        SYSTEM_FLAGS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(atom))
            .map_or_else(|| Self::Keyword(atom.to_string()), |(flag, _)| flag.clone())
    }

    /// Returns the wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        if let Self::Keyword(atom) = self {
            return atom;
        }
        SYSTEM_FLAGS
            .iter()
            .find(|(flag, _)| flag == self)
            .map_or("", |(_, name)| name)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The flags of one message or mailbox, in arrival order, each once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<Flag>);

impl Flags {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a flag unless already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
    }

    /// Returns true if `flag` is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    /// Returns true if `\Seen` is present.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// Number of distinct flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are none.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in arrival order.
    pub fn iter(&self) -> std::slice::Iter<'_, Flag> {
        self.0.iter()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |mut flags, flag| {
            flags.insert(flag);
            flags
        })
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::vec::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
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
    fn test_system_flags_ignore_case() {
        assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\DELETED"), Flag::Deleted);
        assert_eq!(Flag::parse("\\recent"), Flag::Recent);
    }

    #[test]
    fn test_keywords_kept_verbatim() {
        assert_eq!(Flag::parse("$Junk"), Flag::Keyword("$Junk".to_string()));
        assert_eq!(Flag::parse("\\*").as_str(), "\\*");
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(Flag::Deleted.as_str(), "\\Deleted");
        assert_eq!(Flag::Seen.to_string(), "\\Seen");
    }

    #[test]
    fn test_flags_keep_first_occurrence() {
        let flags: Flags = [Flag::Flagged, Flag::Seen, Flag::Flagged]
            .into_iter()
            .collect();
        assert_eq!(flags.len(), 2);
        assert!(flags.is_seen());
        assert!(!flags.contains(&Flag::Deleted));
        assert_eq!(
            flags.iter().collect::<Vec<_>>(),
            [&Flag::Flagged, &Flag::Seen]
        );
    }
}
