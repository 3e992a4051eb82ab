//! Resolution requests, results and the configuration-driven entry point.

use jarlock_core::{
    Conflict, Coordinates, CredentialSource, DependencyInfo, Lockfile, ResolverConfig,
};
use jarlock_events::{EventSender, emit_phase};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::backend::{Backend, BackendOptions, ResolverBackend};
use crate::downloader::Downloader;
use crate::transport::Repository;
use crate::Result;

/// What to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Repositories to consult, highest priority first.
    pub repositories: Vec<Repository>,
    /// Requested artifacts; each needs a version.
    pub root_coordinates: Vec<Coordinates>,
    /// Group/artifact patterns excluded everywhere in the graph.
    pub global_exclusions: Vec<Coordinates>,
    /// Checksums downloads must match, usually from an earlier lockfile.
    pub expected_checksums: BTreeMap<Coordinates, String>,
}

impl Request {
    /// Build a request from resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed coordinates or repository URIs.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        let repositories = config
            .effective_repositories()
            .iter()
            .map(|uri| Repository::parse(uri))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            repositories,
            root_coordinates: config.root_coordinates()?,
            global_exclusions: config.exclusion_coordinates()?,
            expected_checksums: BTreeMap::new(),
        })
    }

    /// Require downloads to match the checksums recorded in `lockfile`.
    #[must_use]
    pub fn verified_against(mut self, lockfile: &Lockfile) -> Self {
        self.expected_checksums = lockfile.expected_checksums();
        self
    }
}

/// The resolved graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Every selected artifact with its resolved dependencies.
    pub dependencies: BTreeSet<DependencyInfo>,
    /// Version conflicts and their winners.
    pub conflicts: BTreeSet<Conflict>,
    /// Transitive artifacts no repository had; dropped from the graph.
    pub missing: BTreeSet<Coordinates>,
}

impl Resolution {
    /// Turn the resolution into a lockfile for `repositories`.
    #[must_use]
    pub fn into_lockfile(self, repositories: &[Repository]) -> Lockfile {
        Lockfile::new(
            repositories.iter().map(|r| r.as_str().to_string()),
            self.dependencies,
            self.conflicts,
        )
    }
}

/// Resolver assembled from configuration.
#[derive(Debug)]
pub struct Resolver {
    backend: Backend,
    downloader: Arc<Downloader>,
    request: Request,
}

impl Resolver {
    /// Assemble a resolver from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn from_config(
        config: &ResolverConfig,
        events: EventSender,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self> {
        config.validate()?;
        let request = Request::from_config(config)?;
        let downloader = Arc::new(Downloader::new(
            config.effective_cache_dir(),
            events,
            credentials,
            config.effective_max_threads(),
        )?);
        let backend = Backend::new(
            config.backend,
            Arc::clone(&downloader),
            BackendOptions {
                conflict_policy: config.conflict_policy,
                fetch_sources: config.fetch_sources,
                fetch_javadoc: config.fetch_javadoc,
            },
        );
        Ok(Self {
            backend,
            downloader,
            request,
        })
    }

    /// The request built from configuration.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The selected backend.
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The downloader shared by the backend.
    #[must_use]
    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// Resolve the configured artifacts.
    ///
    /// # Errors
    ///
    /// See [`ResolverBackend::resolve`].
    pub async fn resolve(&self) -> Result<Resolution> {
        self.backend.resolve(&self.request).await
    }

    /// Resolve and produce a lockfile.
    ///
    /// When `previous` is given, artifacts it already records must download
    /// with the same checksums.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArtifactNotFound`] for missing roots and
    /// [`crate::Error::Integrity`] when a download differs from `previous`.
    #[instrument(skip_all, fields(backend = self.backend.name()))]
    pub async fn lock(&self, previous: Option<&Lockfile>) -> Result<Lockfile> {
        let request = match previous {
            Some(lockfile) => self.request.clone().verified_against(lockfile),
            None => self.request.clone(),
        };
        let resolution = self.backend.resolve(&request).await?;
        info!(
            artifacts = resolution.dependencies.len(),
            conflicts = resolution.conflicts.len(),
            missing = resolution.missing.len(),
            "Resolution complete"
        );
        emit_phase!(self.downloader.events(), "Resolved");
        Ok(resolution.into_lockfile(&request.repositories))
    }

    /// Absolute cache location of a locked artifact's payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRepository`] when the entry names an unusable
    /// repository.
    pub fn cached_path(&self, info: &DependencyInfo) -> Result<Option<PathBuf>> {
        let (Some(path), Some(repository)) = (&info.path, info.repositories.iter().next()) else {
            return Ok(None);
        };
        let repository = Repository::parse(repository)?;
        let relative = path.to_string_lossy();
        Ok(Some(self.downloader.cache().entry_path(&repository, &relative)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_request_from_config() {
        let config = ResolverConfig::from_toml_str(
            r#"
            repositories = ["https://repo.example/maven2"]
            artifacts = ["com.example:item:1.0.0"]
            exclusions = ["org.noise:*"]
            "#,
        )
        .unwrap();
        let request = Request::from_config(&config).unwrap();
        assert_eq!(request.repositories.len(), 1);
        assert_eq!(request.repositories[0].as_str(), "https://repo.example/maven2/");
        assert_eq!(
            request.root_coordinates,
            vec![Coordinates::parse("com.example:item:1.0.0").unwrap()]
        );
        assert_eq!(request.global_exclusions.len(), 1);
    }

    #[test]
    fn test_bad_repository_is_rejected() {
        let config = ResolverConfig::from_toml_str(
            r#"
            repositories = ["ftp://repo.example/"]
            artifacts = ["com.example:item:1.0.0"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            Request::from_config(&config),
            Err(Error::InvalidRepository { .. })
        ));
    }

    #[test]
    fn test_into_lockfile() {
        let repo = Repository::parse("https://repo.example/").unwrap();
        let info = DependencyInfo::new(
            Coordinates::parse("g:a:1").unwrap(),
            repo.as_str(),
            Some("ab".repeat(32)),
        );
        let resolution = Resolution {
            dependencies: BTreeSet::from([info.clone()]),
            ..Resolution::default()
        };
        let lockfile = resolution.into_lockfile(std::slice::from_ref(&repo));
        assert_eq!(lockfile.repositories, BTreeSet::from([repo.as_str().to_string()]));
        assert_eq!(lockfile.find("g:a"), Some(&info));
    }
}
