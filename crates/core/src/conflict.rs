//! Version conflicts recorded during resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Coordinates;

/// Two versions of the same artifact key met in one graph; `winner` was kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Conflict {
    /// The selected coordinates.
    pub winner: Coordinates,
    /// The coordinates that lost.
    pub loser: Coordinates,
}

impl Conflict {
    /// Create a new conflict record.
    #[must_use]
    pub fn new(winner: Coordinates, loser: Coordinates) -> Self {
        Self { winner, loser }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (over {})", self.winner, self.loser)
    }
}
