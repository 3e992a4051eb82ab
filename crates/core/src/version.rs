//! Maven version ordering.
//!
//! Versions are split into numeric and qualifier items at `.`, `-` and at
//! digit/letter transitions. Numbers compare numerically, well-known
//! qualifiers compare by release stage, and anything else compares
//! lexically after the known qualifiers:
//!
//! ```text
//! alpha < beta < milestone < rc < snapshot < "" (release) < sp < other
//! ```
//!
//! Trailing zeros and release qualifiers are insignificant, so `1.0`,
//! `1.0.0` and `1.0-final` are equal.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// Digits with leading zeros stripped.
    Number(String),
    /// Lower-cased qualifier with its release-stage rank.
    Qualifier(u8, String),
}

const RELEASE_RANK: u8 = 5;
const UNKNOWN_RANK: u8 = 7;

fn qualifier_rank(qualifier: &str) -> u8 {
    match qualifier {
        "alpha" | "a" => 0,
        "beta" | "b" => 1,
        "milestone" | "m" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => RELEASE_RANK,
        "sp" => 6,
        _ => UNKNOWN_RANK,
    }
}

impl Item {
    fn number(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        Self::Number(trimmed.to_string())
    }

    fn qualifier(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        Self::Qualifier(qualifier_rank(&lower), lower)
    }

    fn is_null(&self) -> bool {
        match self {
            Self::Number(n) => n.is_empty(),
            Self::Qualifier(rank, _) => *rank == RELEASE_RANK,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Self::Number(_), Self::Qualifier(..)) => Ordering::Greater,
            (Self::Qualifier(..), Self::Number(_)) => Ordering::Less,
            (Self::Qualifier(ra, a), Self::Qualifier(rb, b)) => {
                ra.cmp(rb).then_with(|| {
                    if *ra == UNKNOWN_RANK {
                        a.cmp(b)
                    } else {
                        Ordering::Equal
                    }
                })
            }
        }
    }

    /// Compare against a missing item on the other side.
    fn compare_to_null(&self) -> Ordering {
        match self {
            Self::Number(n) if n.is_empty() => Ordering::Equal,
            Self::Number(_) => Ordering::Greater,
            Self::Qualifier(rank, _) => rank.cmp(&RELEASE_RANK),
        }
    }
}

/// A version string with Maven comparison semantics.
#[derive(Debug, Clone)]
pub struct MavenVersion {
    original: String,
    items: Vec<Item>,
}

impl MavenVersion {
    /// Tokenize a version string.
    #[must_use]
    pub fn parse(version: &str) -> Self {
        let mut items = Vec::new();
        let mut current = String::new();
        let mut current_is_digit = false;

        let flush = |current: &mut String, is_digit: bool, items: &mut Vec<Item>| {
            if current.is_empty() {
                return;
            }
            if is_digit {
                items.push(Item::number(current));
            } else {
                items.push(Item::qualifier(current));
            }
            current.clear();
        };

        for ch in version.trim().chars() {
            if ch == '.' || ch == '-' || ch == '_' {
                flush(&mut current, current_is_digit, &mut items);
                continue;
            }
            let is_digit = ch.is_ascii_digit();
            if !current.is_empty() && is_digit != current_is_digit {
                flush(&mut current, current_is_digit, &mut items);
            }
            current_is_digit = is_digit;
            current.push(ch);
        }
        flush(&mut current, current_is_digit, &mut items);

        while items.last().is_some_and(Item::is_null) {
            items.pop();
        }

        Self {
            original: version.to_string(),
            items,
        }
    }

    /// The version string as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.items.len().max(other.items.len());
        for index in 0..len {
            let ordering = match (self.items.get(index), other.items.get(index)) {
                (Some(a), Some(b)) => a.compare(b),
                (Some(a), None) => a.compare_to_null(),
                (None, Some(b)) => b.compare_to_null().reverse(),
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MavenVersion {}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Compare two version strings with Maven semantics.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    MavenVersion::parse(a).cmp(&MavenVersion::parse(b))
}
