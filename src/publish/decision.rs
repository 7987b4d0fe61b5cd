use std::fmt;

use crate::checksum::Checksum;

/// Outcome of comparing a fresh checksum with the stored pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Publish,
    Skip,
}

impl Decision {
    pub fn is_publish(self) -> bool {
        matches!(self, Decision::Publish)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Publish => f.write_str("publish"),
            Decision::Skip => f.write_str("skip"),
        }
    }
}

/// `Skip` iff a stored checksum exists and equals `fresh`.
pub fn decide(fresh: &Checksum, stored: Option<&Checksum>) -> Decision {
    match stored {
        Some(stored) if stored == fresh => Decision::Skip,
        _ => Decision::Publish,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(c: char) -> Checksum {
        Checksum::parse(&c.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn test_equal_is_skip() {
        for c in ['0', 'a', 'f'] {
            assert_eq!(decide(&sum(c), Some(&sum(c))), Decision::Skip);
        }
    }

    #[test]
    fn test_absent_is_publish() {
        assert_eq!(decide(&sum('a'), None), Decision::Publish);
    }

    #[test]
    fn test_different_is_publish() {
        assert_eq!(decide(&sum('a'), Some(&sum('b'))), Decision::Publish);
        assert!(decide(&sum('a'), Some(&sum('b'))).is_publish());
    }
}
