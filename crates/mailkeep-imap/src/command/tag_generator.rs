//! Command tags.

use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out `A0001`, `A0002`, ... for successive commands.
///
/// The counter wraps after `u32::MAX`. A tag only has to be unique among
/// the commands in flight and a client keeps at most one in flight.
#[derive(Debug)]
pub struct TagGenerator {
    prefix: char,
    issued: AtomicU32,
}

impl TagGenerator {
    /// Creates a generator whose tags start with `prefix`.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            prefix,
            issued: AtomicU32::new(0),
        }
    }

    /// Returns a fresh tag.
    #[must_use]
    pub fn next(&self) -> String {
        let serial = self.issued.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        format!("{}{serial:04}", self.prefix)
    }

    /// How many tags have been handed out, modulo wrap-around.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
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
    fn test_sequential_tags() {
        let tags = TagGenerator::default();
        assert_eq!(tags.next(), "A0001");
        assert_eq!(tags.next(), "A0002");
        assert_eq!(tags.issued(), 2);
    }

    #[test]
    fn test_serial_outgrows_padding() {
        let tags = TagGenerator::new('K');
        tags.issued.store(12_344, Ordering::Relaxed);
        assert_eq!(tags.next(), "K12345");
    }

    #[test]
    fn test_wraps_at_max() {
        let tags = TagGenerator::default();
        tags.issued.store(u32::MAX - 1, Ordering::Relaxed);
        assert_eq!(tags.next(), format!("A{}", u32::MAX));
        assert_eq!(tags.next(), "A0000");
    }
}
