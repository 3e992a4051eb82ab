//! Artifact downloads with repository fallback and checksum verification.
//!
//! Repositories are tried in the order given. For each one the downloader
//! emits a `STARTING` event, looks in the local cache, falls back to the
//! network, and emits `COMPLETE` whatever the outcome. The first repository
//! that has the file wins. Running out of repositories is a normal result,
//! reported as a [`DownloadResult`] without a path.

use jarlock_core::{Coordinates, CredentialSource};
use jarlock_events::{EventSender, emit_log};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::cache::{ArtifactCache, CHECKSUM_SUFFIX, CachedArtifact, sha256_hex};
use crate::retry::{RetryConfig, with_retry};
use crate::transport::{FetchError, Repository, Transport};
use crate::{Error, Result};

const EVENT_SOURCE: &str = "downloader";

/// Outcome of downloading one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// What was requested.
    pub coordinates: Coordinates,
    /// Absolute location in the cache; `None` when no repository had it.
    pub path: Option<PathBuf>,
    /// SHA-256 of the payload.
    pub sha256: Option<String>,
    /// Repository that provided the file.
    pub repository: Option<Repository>,
}

impl DownloadResult {
    fn not_found(coordinates: &Coordinates) -> Self {
        Self {
            coordinates: coordinates.clone(),
            path: None,
            sha256: None,
            repository: None,
        }
    }
}

/// A metadata file fetched without download events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// File content.
    pub bytes: Vec<u8>,
    /// Repository that provided it.
    pub repository: Repository,
}

/// Fetches artifacts into the local cache.
///
/// Network operations share one semaphore, so no more than `max_parallel`
/// fetches are in flight at once across every caller. Cache reads and
/// writes run on the blocking pool.
#[derive(Debug)]
pub struct Downloader {
    cache: ArtifactCache,
    transport: Transport,
    events: EventSender,
    retry: RetryConfig,
    permits: Arc<Semaphore>,
}

impl Downloader {
    /// Create a downloader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        events: EventSender,
        credentials: Arc<dyn CredentialSource>,
        max_parallel: usize,
    ) -> Result<Self> {
        Ok(Self {
            cache: ArtifactCache::new(cache_dir),
            transport: Transport::new(credentials)?,
            events,
            retry: RetryConfig::default(),
            permits: Arc::new(Semaphore::new(max_parallel.max(1))),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The cache this downloader writes to.
    #[must_use]
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// The event sender used for download events.
    #[must_use]
    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Download an artifact from the first repository that has it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integrity`] when a repository publishes a checksum
    /// that does not match the payload, or an I/O error from the cache.
    pub async fn download(
        &self,
        coordinates: &Coordinates,
        repositories: &[Repository],
    ) -> Result<DownloadResult> {
        self.download_verified(coordinates, repositories, None).await
    }

    /// Download an artifact and check it against an expected checksum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integrity`] when the payload does not match
    /// `expected` or a published checksum; the bad file is not kept.
    /// Returns [`Error::TransientFetch`] when a published checksum exists
    /// but cannot be fetched.
    #[instrument(skip(self, repositories), fields(coordinates = %coordinates))]
    pub async fn download_verified(
        &self,
        coordinates: &Coordinates,
        repositories: &[Repository],
        expected: Option<&str>,
    ) -> Result<DownloadResult> {
        for (index, repository) in repositories.iter().enumerate() {
            let target = format!("{coordinates} from {repository}");
            self.events.download_starting(&target);
            let outcome = self.try_repository(coordinates, repository, expected).await;
            self.events.download_complete(&target);

            if let Some(found) = outcome? {
                return Ok(DownloadResult {
                    coordinates: coordinates.clone(),
                    path: Some(found.path),
                    sha256: Some(found.sha256),
                    repository: Some(repository.clone()),
                });
            }
            let next = repositories
                .get(index + 1)
                .map_or_else(|| "no repositories left".to_string(), |r| format!("trying {r}"));
            self.events.log_detail(
                EVENT_SOURCE,
                format!("{coordinates} not in {repository}"),
                next,
            );
        }

        debug!("Not found in any repository");
        Ok(DownloadResult::not_found(coordinates))
    }

    /// Fetch the POM of `coordinates` without download events.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the cache.
    pub async fn fetch_pom(
        &self,
        coordinates: &Coordinates,
        repositories: &[Repository],
    ) -> Result<Option<FetchedFile>> {
        let path = coordinates.pom().to_repo_path();
        for repository in repositories {
            if let Some(hit) = self.cached(repository, &path).await? {
                let bytes = tokio::fs::read(&hit.path)
                    .await
                    .map_err(|e| Error::io(e, &hit.path, "read"))?;
                return Ok(Some(FetchedFile {
                    bytes,
                    repository: repository.clone(),
                }));
            }
            match self.fetch(repository, &path).await {
                Ok(bytes) => {
                    let (_, bytes) = self.store(repository, &path, bytes).await?;
                    return Ok(Some(FetchedFile {
                        bytes,
                        repository: repository.clone(),
                    }));
                }
                Err(FetchError::NotFound) => {}
                Err(e) => {
                    warn!(%repository, %path, error = %e, "Failed to fetch POM");
                }
            }
        }
        Ok(None)
    }

    async fn try_repository(
        &self,
        coordinates: &Coordinates,
        repository: &Repository,
        expected: Option<&str>,
    ) -> Result<Option<CachedArtifact>> {
        let path = coordinates.to_repo_path();

        if let Some(hit) = self.cached(repository, &path).await? {
            debug!(%repository, "Using cached artifact");
            self.events.log_detail(
                EVENT_SOURCE,
                format!("Using cached {coordinates}"),
                hit.path.display().to_string(),
            );
            if let Some(expected) = expected {
                if !expected.eq_ignore_ascii_case(&hit.sha256) {
                    self.evict(repository, &path).await?;
                    return Err(Error::integrity(coordinates, expected, hit.sha256));
                }
            }
            return Ok(Some(hit));
        }

        let bytes = match self.fetch(repository, &path).await {
            Ok(bytes) => bytes,
            Err(FetchError::NotFound) => {
                debug!(%repository, "Not in repository");
                return Ok(None);
            }
            Err(e) => {
                emit_log!(
                    self.events,
                    EVENT_SOURCE,
                    "Skipping {repository} for {coordinates}: {e}"
                );
                return Ok(None);
            }
        };

        let actual = sha256_hex(&bytes);
        if let Some(published) = self.published_checksum(repository, &path).await? {
            if !published.eq_ignore_ascii_case(&actual) {
                return Err(Error::integrity(coordinates, published, actual));
            }
        }
        if let Some(expected) = expected {
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(Error::integrity(coordinates, expected, actual));
            }
        }

        let (stored, _) = self.store(repository, &path, bytes).await?;
        Ok(Some(stored))
    }

    /// The repository's `.sha256` file for `path`, if it has one.
    ///
    /// A sidecar that cannot be read or parsed is reported and skipped; one
    /// that keeps failing transiently is an error, since the payload could
    /// not be checked.
    async fn published_checksum(&self, repository: &Repository, path: &str) -> Result<Option<String>> {
        let sidecar = format!("{path}{CHECKSUM_SUFFIX}");
        let bytes = match self.fetch(repository, &sidecar).await {
            Ok(bytes) => bytes,
            Err(FetchError::NotFound) => return Ok(None),
            Err(FetchError::Transient(message)) => {
                return Err(Error::transient_fetch(format!("{repository}{sidecar}"), message));
            }
            Err(FetchError::Fatal(message)) => {
                emit_log!(
                    self.events,
                    EVENT_SOURCE,
                    "Cannot read {sidecar} from {repository}, skipping checksum check: {message}"
                );
                return Ok(None);
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        match text.split_whitespace().next().map(str::to_ascii_lowercase) {
            Some(checksum) if checksum.len() == 64 && checksum.chars().all(|c| c.is_ascii_hexdigit()) => {
                Ok(Some(checksum))
            }
            _ => {
                emit_log!(
                    self.events,
                    EVENT_SOURCE,
                    "Ignoring malformed checksum file {sidecar} in {repository}"
                );
                Ok(None)
            }
        }
    }

    /// One network fetch under a pool permit, with retries.
    async fn fetch(&self, repository: &Repository, path: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::Fatal(e.to_string()))?;
        with_retry(
            &self.retry,
            || self.transport.fetch(repository, path),
            |attempt, e, delay| {
                self.events.log_detail(
                    EVENT_SOURCE,
                    format!("Retrying {path} from {repository}"),
                    format!(
                        "attempt {attempt}/{} failed: {e}; next attempt in {delay:?}",
                        self.retry.max_attempts
                    ),
                );
            },
        )
        .await
    }

    async fn cached(&self, repository: &Repository, path: &str) -> Result<Option<CachedArtifact>> {
        let (repository, path) = (repository.clone(), path.to_string());
        self.blocking(move |cache| cache.get(&repository, &path)).await
    }

    /// Store `bytes`, handing them back for callers that still need them.
    async fn store(
        &self,
        repository: &Repository,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<(CachedArtifact, Vec<u8>)> {
        let (repository, path) = (repository.clone(), path.to_string());
        self.blocking(move |cache| cache.store(&repository, &path, &bytes).map(|stored| (stored, bytes)))
            .await
    }

    async fn evict(&self, repository: &Repository, path: &str) -> Result<()> {
        let (repository, path) = (repository.clone(), path.to_string());
        self.blocking(move |cache| {
            cache.remove(&repository, &path);
            Ok(())
        })
        .await
    }

    /// Run a cache operation on the blocking pool.
    async fn blocking<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ArtifactCache) -> Result<T> + Send + 'static,
    {
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || task(&cache))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }
}
