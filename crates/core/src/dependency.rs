//! Resolved artifacts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::Coordinates;

/// A resolved artifact and everything the lockfile records about it.
///
/// Set membership uses full field equality: the same coordinates with a
/// different checksum are a different entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyInfo {
    /// Identity of the artifact.
    pub coordinates: Coordinates,
    /// Repositories the artifact was fetched from.
    pub repositories: BTreeSet<String>,
    /// Cache-relative path of the downloaded file; `None` for aggregators.
    pub path: Option<PathBuf>,
    /// SHA-256 of the payload; `None` when there is no file.
    pub sha256: Option<String>,
    /// Direct dependencies, at their resolved versions.
    pub dependencies: BTreeSet<Coordinates>,
    /// Exclusions in effect when this artifact's dependencies were expanded.
    pub exclusions: BTreeSet<Coordinates>,
    /// Checksums of classifier variants such as `sources` or `javadoc`.
    pub auxiliary_checksums: BTreeMap<String, Option<String>>,
}

impl DependencyInfo {
    /// A resolved artifact with a payload at its standard repository path.
    #[must_use]
    pub fn new(coordinates: Coordinates, repository: impl Into<String>, sha256: Option<String>) -> Self {
        let path = sha256
            .as_ref()
            .map(|_| PathBuf::from(coordinates.to_repo_path()));
        Self {
            coordinates,
            repositories: BTreeSet::from([repository.into()]),
            path,
            sha256,
            dependencies: BTreeSet::new(),
            exclusions: BTreeSet::new(),
            auxiliary_checksums: BTreeMap::new(),
        }
    }

    /// Whether this artifact carries no file (a `pom`-packaged aggregator).
    #[must_use]
    pub fn is_aggregator(&self) -> bool {
        self.path.is_none() && self.sha256.is_none()
    }

    /// Replace the direct dependency set.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = Coordinates>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Replace the exclusion set.
    #[must_use]
    pub fn with_exclusions(mut self, exclusions: impl IntoIterator<Item = Coordinates>) -> Self {
        self.exclusions = exclusions.into_iter().collect();
        self
    }

    /// Record the checksum of a classifier variant.
    #[must_use]
    pub fn with_auxiliary_checksum(
        mut self,
        classifier: impl Into<String>,
        sha256: Option<String>,
    ) -> Self {
        self.auxiliary_checksums.insert(classifier.into(), sha256);
        self
    }
}
