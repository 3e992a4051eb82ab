//! Local artifact cache.
//!
//! Files are stored under the repository they came from, at their standard
//! repository path, with a `.sha256` sidecar holding the payload checksum:
//!
//! ```text
//! ~/.cache/jarlock/
//! └── repo1.maven.org_maven2/
//!     └── com/example/item/1.0.0/
//!         ├── item-1.0.0.jar
//!         └── item-1.0.0.jar.sha256
//! ```
//!
//! The cache is append-only. Writes go through a temporary file renamed into
//! place, so concurrent writers of the same path leave one complete copy.
//! Every operation here blocks; async callers run them on the blocking pool.

use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::transport::Repository;
use crate::{Error, Result};

/// Suffix of checksum sidecar files.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// A file present in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    /// Absolute location of the file.
    pub path: PathBuf,
    /// SHA-256 of the file, lowercase hex.
    pub sha256: String,
}

/// Repository-namespaced artifact cache.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Create a cache at the specified root directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of a repository-relative path in the cache.
    #[must_use]
    pub fn entry_path(&self, repository: &Repository, path: &str) -> PathBuf {
        self.root.join(repository.cache_namespace()).join(path)
    }

    /// Look up a cached file, computing its sidecar if it is missing.
    pub fn get(&self, repository: &Repository, path: &str) -> Result<Option<CachedArtifact>> {
        let file = self.entry_path(repository, path);
        if !file.is_file() {
            trace!(path, %repository, "Cache miss");
            return Ok(None);
        }

        let sidecar = sidecar_path(&file);
        let sha256 = match std::fs::read_to_string(&sidecar) {
            Ok(content) => content.trim().to_string(),
            Err(_) => {
                let bytes = std::fs::read(&file).map_err(|e| Error::io(e, &file, "read"))?;
                let sha256 = sha256_hex(&bytes);
                write_atomic(&sidecar, sha256.as_bytes())?;
                sha256
            }
        };

        trace!(path, %repository, "Cache hit");
        Ok(Some(CachedArtifact { path: file, sha256 }))
    }

    /// Store file content and its checksum sidecar.
    pub fn store(&self, repository: &Repository, path: &str, bytes: &[u8]) -> Result<CachedArtifact> {
        let file = self.entry_path(repository, path);
        let sha256 = sha256_hex(bytes);
        write_atomic(&file, bytes)?;
        write_atomic(&sidecar_path(&file), sha256.as_bytes())?;
        debug!(path = %file.display(), %sha256, "Stored artifact in cache");
        Ok(CachedArtifact { path: file, sha256 })
    }

    /// Remove a cached file and its sidecar.
    pub fn remove(&self, repository: &Repository, path: &str) {
        let file = self.entry_path(repository, path);
        std::fs::remove_file(sidecar_path(&file)).ok();
        std::fs::remove_file(&file).ok();
    }
}

/// SHA-256 of `bytes`, lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(CHECKSUM_SUFFIX);
    PathBuf::from(name)
}

/// Write a file, creating parent directories, via rename from a temp file.
fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::io(std::io::Error::other("no parent directory"), dest, "write"))?;
    std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create directory"))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(e, parent, "create temp file"))?;
    temp.write_all(bytes).map_err(|e| Error::io(e, dest, "write"))?;
    temp.persist(dest).map_err(|e| Error::io(e.error, dest, "rename"))?;
    Ok(())
}
