//! Command tags and message sequence numbers.

use std::fmt;
use std::num::NonZeroU32;

/// The tag a server echoes on a command's completion line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Wraps a tag string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a message in the selected mailbox, counted from 1.
///
/// Only stable until the next expunge, so every reconnect searches again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqNum(pub NonZeroU32);

impl SeqNum {
    /// Returns `None` for 0, which is not a valid position.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// The position as a plain number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
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
    fn test_zero_is_not_a_position() {
        assert!(SeqNum::new(0).is_none());
        assert_eq!(SeqNum::new(42).unwrap().get(), 42);
        assert_eq!(SeqNum::new(7).unwrap().to_string(), "7");
    }

    #[test]
    fn test_positions_sort_numerically() {
        let mut nums: Vec<_> = [10, 9, 2].into_iter().filter_map(SeqNum::new).collect();
        nums.sort();
        assert_eq!(nums.iter().map(|n| n.get()).collect::<Vec<_>>(), [2, 9, 10]);
    }

    #[test]
    fn test_tag_text() {
        let tag = Tag::new("A0007");
        assert_eq!(tag.as_str(), "A0007");
        assert_eq!(tag.to_string(), "A0007");
    }
}
