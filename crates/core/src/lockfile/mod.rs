//! Lockfile codec.
//!
//! The lockfile (`jarlock_install.json`) records one resolution so it can be
//! reviewed in diffs and reproduced later. Every collection is written in
//! sorted order, so rendering the same [`Lockfile`] always yields the same
//! bytes.
//!
//! ## Structure
//!
//! ```json
//! {
//!   "__resolved_artifacts_hash": "<sha256 of the compact artifacts object>",
//!   "artifacts": {
//!     "com.example:item": {
//!       "dependencies": ["com.example:dep:1.0"],
//!       "exclusions": [],
//!       "repositories": ["https://repo.example/maven2/"],
//!       "shasums": { "jar": "de3a...", "sources": null },
//!       "version": "1.0.0"
//!     }
//!   },
//!   "conflicts": [{ "loser": "g:a:1.0", "winner": "g:a:2.0" }],
//!   "m2local": false,
//!   "repositories": ["https://repo.example/maven2/"],
//!   "version": "1"
//! }
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::{Conflict, Coordinates, DependencyInfo, Error, Result};

/// Current lockfile format version.
pub const LOCKFILE_VERSION: u32 = 1;

/// Filename for the lockfile.
pub const LOCKFILE_NAME: &str = "jarlock_install.json";

/// Stand-in for the local Maven repository in per-artifact repository lists.
pub const M2LOCAL_MARKER: &str = "m2local";

const HASH_FIELD: &str = "__resolved_artifacts_hash";

/// URI of the local Maven repository (`~/.m2/repository/`).
#[must_use]
pub fn local_repository_uri() -> String {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    format!("file://{}/.m2/repository/", home.display())
}

/// A resolution snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    /// Repositories the resolution consulted.
    pub repositories: BTreeSet<String>,
    /// Every resolved artifact.
    pub dependencies: BTreeSet<DependencyInfo>,
    /// Version conflicts and how they were settled.
    pub conflicts: BTreeSet<Conflict>,
}

impl Lockfile {
    /// Create a lockfile from a resolution.
    #[must_use]
    pub fn new(
        repositories: impl IntoIterator<Item = String>,
        dependencies: BTreeSet<DependencyInfo>,
        conflicts: BTreeSet<Conflict>,
    ) -> Self {
        Self {
            repositories: repositories.into_iter().collect(),
            dependencies,
            conflicts,
        }
    }

    /// Load a lockfile from disk.
    ///
    /// Returns `None` if the file doesn't exist.
    /// Returns an error if the file exists but is invalid.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        LockfileCodec::default().load(path)
    }

    /// Save the lockfile to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        LockfileCodec::default().save(self, path)
    }

    /// Whether the file at `path` is exactly what this lockfile renders to.
    pub fn verify_reproducible(&self, path: &Path) -> Result<bool> {
        LockfileCodec::default().verify_reproducible(self, path)
    }

    /// Find the resolved entry for an artifact key.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&DependencyInfo> {
        self.dependencies
            .iter()
            .find(|info| info.coordinates.key() == key)
    }

    /// Primary checksums by coordinates, for verifying later downloads.
    #[must_use]
    pub fn expected_checksums(&self) -> BTreeMap<Coordinates, String> {
        self.dependencies
            .iter()
            .filter_map(|info| {
                info.sha256
                    .as_ref()
                    .map(|sha| (info.coordinates.clone(), sha.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "__resolved_artifacts_hash")]
    resolved_artifacts_hash: String,
    artifacts: BTreeMap<String, ArtifactEntry>,
    #[serde(default)]
    conflicts: BTreeSet<ConflictEntry>,
    #[serde(default)]
    m2local: bool,
    #[serde(default)]
    repositories: BTreeSet<String>,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEntry {
    #[serde(default)]
    dependencies: BTreeSet<Coordinates>,
    #[serde(default)]
    exclusions: BTreeSet<Coordinates>,
    #[serde(default)]
    repositories: BTreeSet<String>,
    shasums: BTreeMap<String, Option<String>>,
    version: String,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct ConflictEntry {
    loser: Coordinates,
    winner: Coordinates,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: Option<String>,
}

/// Converts [`Lockfile`] values to and from their JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockfileCodec {
    local_repository: String,
}

impl Default for LockfileCodec {
    fn default() -> Self {
        Self::new(local_repository_uri())
    }
}

impl LockfileCodec {
    /// Codec treating `local_repository` as the implicit local Maven repository.
    #[must_use]
    pub fn new(local_repository: impl Into<String>) -> Self {
        Self {
            local_repository: local_repository.into(),
        }
    }

    /// Render a lockfile to its JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockfileFormat`] when two entries share an artifact key.
    pub fn render(&self, lockfile: &Lockfile) -> Result<String> {
        let mut artifacts = BTreeMap::new();
        for info in &lockfile.dependencies {
            let key = info.coordinates.key();
            if artifacts.contains_key(&key) {
                return Err(Error::lockfile_format(
                    format!("artifacts.{key}"),
                    "more than one resolved entry for this artifact",
                ));
            }
            artifacts.insert(key, self.entry_for(info));
        }

        let document = Document {
            resolved_artifacts_hash: artifacts_hash(&artifacts)?,
            artifacts,
            conflicts: lockfile
                .conflicts
                .iter()
                .map(|c| ConflictEntry {
                    loser: c.loser.clone(),
                    winner: c.winner.clone(),
                })
                .collect(),
            m2local: lockfile.repositories.contains(&self.local_repository),
            repositories: lockfile
                .repositories
                .iter()
                .filter(|r| **r != self.local_repository)
                .cloned()
                .collect(),
            version: LOCKFILE_VERSION.to_string(),
        };

        let mut rendered = serde_json::to_string_pretty(&document)
            .map_err(|e| Error::lockfile_format("<document>", e.to_string()))?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// Parse a JSON document back into a lockfile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockfileFormat`] naming the offending field for
    /// malformed documents, unsupported versions, and hash mismatches.
    pub fn parse(&self, content: &str) -> Result<Lockfile> {
        let header: VersionHeader = serde_json::from_str(content)
            .map_err(|e| Error::lockfile_format("<document>", e.to_string()))?;
        let version = header
            .version
            .ok_or_else(|| Error::lockfile_format("version", "missing field"))?;
        let version: u32 = version.parse().map_err(|_| {
            Error::lockfile_format("version", format!("'{version}' is not a format version"))
        })?;
        if version > LOCKFILE_VERSION {
            return Err(Error::lockfile_format(
                "version",
                format!(
                    "Lockfile version {version} is newer than supported version {LOCKFILE_VERSION}. Please upgrade jarlock."
                ),
            ));
        }

        let deserializer = &mut serde_json::Deserializer::from_str(content);
        let document: Document = serde_path_to_error::deserialize(deserializer)
            .map_err(|e| Error::lockfile_format(e.path().to_string(), e.inner().to_string()))?;

        let actual = artifacts_hash(&document.artifacts)?;
        if actual != document.resolved_artifacts_hash {
            return Err(Error::lockfile_format(
                HASH_FIELD,
                format!(
                    "expected {}, computed {actual}; the artifacts section was edited by hand",
                    document.resolved_artifacts_hash
                ),
            ));
        }

        let mut dependencies = BTreeSet::new();
        for (key, entry) in document.artifacts {
            dependencies.insert(self.info_from(&key, entry)?);
        }

        let mut repositories = document.repositories;
        if document.m2local {
            repositories.insert(self.local_repository.clone());
        }

        Ok(Lockfile {
            repositories,
            dependencies,
            conflicts: document
                .conflicts
                .into_iter()
                .map(|c| Conflict::new(c.winner, c.loser))
                .collect(),
        })
    }

    /// Load a lockfile, `None` when the file does not exist.
    pub fn load(&self, path: &Path) -> Result<Option<Lockfile>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        self.parse(&content).map(Some)
    }

    /// Render and write a lockfile.
    pub fn save(&self, lockfile: &Lockfile, path: &Path) -> Result<()> {
        let content = self.render(lockfile)?;
        std::fs::write(path, content).map_err(|e| Error::io(e, path, "write"))
    }

    /// Whether the file at `path` holds exactly the rendering of `lockfile`.
    pub fn verify_reproducible(&self, lockfile: &Lockfile, path: &Path) -> Result<bool> {
        let expected = self.render(lockfile)?;
        match std::fs::read_to_string(path) {
            Ok(actual) => Ok(actual == expected),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(e, path, "read")),
        }
    }

    fn entry_for(&self, info: &DependencyInfo) -> ArtifactEntry {
        let mut shasums = info.auxiliary_checksums.clone();
        shasums.insert(
            info.coordinates.extension().to_string(),
            info.sha256.clone(),
        );
        ArtifactEntry {
            dependencies: info.dependencies.clone(),
            exclusions: info.exclusions.clone(),
            repositories: info
                .repositories
                .iter()
                .map(|r| {
                    if *r == self.local_repository {
                        M2LOCAL_MARKER.to_string()
                    } else {
                        r.clone()
                    }
                })
                .collect(),
            shasums,
            version: info.coordinates.version().to_string(),
        }
    }

    fn info_from(&self, key: &str, entry: ArtifactEntry) -> Result<DependencyInfo> {
        let coordinates = Coordinates::from_key(key, &entry.version)
            .map_err(|e| Error::lockfile_format(format!("artifacts.{key}"), e.to_string()))?;

        let mut auxiliary = entry.shasums;
        let sha256 = auxiliary
            .remove(coordinates.extension())
            .ok_or_else(|| {
                Error::lockfile_format(
                    format!("artifacts.{key}.shasums"),
                    format!("missing '{}' checksum", coordinates.extension()),
                )
            })?;
        let path = sha256
            .as_ref()
            .map(|_| PathBuf::from(coordinates.to_repo_path()));

        Ok(DependencyInfo {
            coordinates,
            repositories: entry
                .repositories
                .into_iter()
                .map(|r| {
                    if r == M2LOCAL_MARKER {
                        self.local_repository.clone()
                    } else {
                        r
                    }
                })
                .collect(),
            path,
            sha256,
            dependencies: entry.dependencies,
            exclusions: entry.exclusions,
            auxiliary_checksums: auxiliary,
        })
    }
}

fn artifacts_hash(artifacts: &BTreeMap<String, ArtifactEntry>) -> Result<String> {
    let canonical = serde_json::to_string(artifacts)
        .map_err(|e| Error::lockfile_format("artifacts", e.to_string()))?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}
