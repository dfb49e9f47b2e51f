//! Document revisions
//!
//! A revision is `"<generation>-<hash>"`. Every local write bumps the
//! generation; replicas converge by keeping the higher revision.

use std::cmp::Ordering;
use std::fmt;

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    generation: u64,
    hash: String,
}

impl Revision {
    /// First revision of a new document
    pub fn initial() -> Self {
        Self::with_generation(1)
    }

    fn with_generation(generation: u64) -> Self {
        let hash = Uuid::new_v4().simple().to_string();
        Self {
            generation,
            hash: hash[..12].to_string(),
        }
    }

    /// The revision a local write on top of `previous` gets
    pub fn successor(previous: Option<&Revision>) -> Self {
        match previous {
            Some(rev) => Self::with_generation(rev.generation + 1),
            None => Self::initial(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (generation, hash) = s.split_once('-')?;
        let generation = generation.parse().ok()?;
        if hash.is_empty() {
            return None;
        }
        Some(Self {
            generation,
            hash: hash.to_string(),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an incoming `self` should replace `current` (last writer wins)
    pub fn supersedes(&self, current: Option<&Revision>) -> bool {
        match current {
            None => true,
            Some(current) => self.cmp(current) == Ordering::Greater,
        }
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_bumps_generation() {
        let first = Revision::initial();
        let second = Revision::successor(Some(&first));
        assert_eq!(first.generation(), 1);
        assert_eq!(second.generation(), 2);
        assert!(second.supersedes(Some(&first)));
        assert!(!first.supersedes(Some(&second)));
    }

    #[test]
    fn test_equal_revision_does_not_supersede() {
        let rev = Revision::parse("3-abc").unwrap();
        assert!(!rev.supersedes(Some(&rev.clone())));
        assert!(rev.supersedes(None));
    }

    #[test]
    fn test_same_generation_breaks_tie_on_hash() {
        let a = Revision::parse("2-aaa").unwrap();
        let b = Revision::parse("2-bbb").unwrap();
        assert!(b.supersedes(Some(&a)));
        assert!(!a.supersedes(Some(&b)));
    }

    #[test]
    fn test_parse_round_trip() {
        let rev = Revision::parse("12-deadbeef").unwrap();
        assert_eq!(rev.to_string(), "12-deadbeef");
        assert!(Revision::parse("nope").is_none());
        assert!(Revision::parse("x-abc").is_none());
        assert!(Revision::parse("4-").is_none());
    }
}
