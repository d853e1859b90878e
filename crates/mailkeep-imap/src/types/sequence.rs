//! Message sets for FETCH, STORE and COPY.

use std::fmt;

use super::SeqNum;

/// A set of sequence numbers as written on the wire: `5`, `1:3` or
/// `1:3,5,7:9`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSet {
    /// One message.
    Single(SeqNum),
    /// `first:last`, both ends included.
    Range(SeqNum, SeqNum),
    /// Comma-separated parts.
    Set(Vec<Self>),
}

impl SequenceSet {
    /// `n` alone; `None` for 0.
    #[must_use]
    pub fn single(n: u32) -> Option<Self> {
        SeqNum::new(n).map(Self::Single)
    }

    /// `start:end`; `None` if either is 0.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Option<Self> {
        Some(Self::Range(SeqNum::new(start)?, SeqNum::new(end)?))
    }

    /// The shortest set naming exactly `nums`, with consecutive runs
    /// written as ranges. `None` when `nums` is empty.
    #[must_use]
    pub fn from_numbers(nums: &[SeqNum]) -> Option<Self> {
        let mut sorted = nums.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut runs: Vec<(SeqNum, SeqNum)> = Vec::new();
        for n in sorted {
            match runs.last_mut() {
                Some((_, last)) if last.get().checked_add(1) == Some(n.get()) => *last = n,
                _ => runs.push((n, n)),
            }
        }

        let mut parts: Vec<Self> = runs
            .into_iter()
            .map(|(first, last)| {
                if first == last {
                    Self::Single(first)
                } else {
                    Self::Range(first, last)
                }
            })
            .collect();
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Self::Set(parts)),
        }
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(first, last) => write!(f, "{first}:{last}"),
            Self::Set(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
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
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn nums(values: &[u32]) -> Vec<SeqNum> {
        values.iter().map(|&n| SeqNum::new(n).unwrap()).collect()
    }

    #[test]
    fn test_display() {
        assert_eq!(SequenceSet::single(1).unwrap().to_string(), "1");
        assert_eq!(SequenceSet::range(1, 10).unwrap().to_string(), "1:10");
        assert!(SequenceSet::single(0).is_none());
    }

    #[test]
    fn test_from_numbers_collapses_runs() {
        let set = SequenceSet::from_numbers(&nums(&[7, 1, 2, 3, 5, 8, 9, 3])).unwrap();
        assert_eq!(set.to_string(), "1:3,5,7:9");
    }

    #[test]
    fn test_from_numbers_single() {
        let set = SequenceSet::from_numbers(&nums(&[4])).unwrap();
        assert_eq!(set, SequenceSet::single(4).unwrap());
    }

    #[test]
    fn test_from_numbers_empty() {
        assert!(SequenceSet::from_numbers(&[]).is_none());
    }
}
