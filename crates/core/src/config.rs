//! Resolver configuration.
//!
//! Loaded from a TOML file (`jarlock.toml` by convention):
//!
//! ```toml
//! backend = "maven"
//! max_threads = 8
//! repositories = ["https://repo1.maven.org/maven2/"]
//! artifacts = ["com.google.guava:guava:33.0.0-jre"]
//! exclusions = ["com.google.code.findbugs:jsr305"]
//! fetch_sources = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Coordinates, Error, Result};

/// Default maximum number of concurrent network operations.
pub const DEFAULT_MAX_THREADS: usize = 5;

/// Environment variable overriding `max_threads`.
pub const MAX_THREADS_ENV: &str = "JARLOCK_MAX_THREADS";

/// Repository used when the configuration names none.
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "jarlock.toml";

/// Which resolution engine to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Maven semantics: nearest declaration wins.
    #[default]
    Maven,
    /// Gradle semantics: highest version wins.
    Gradle,
}

impl BackendKind {
    /// Lowercase name, as written in configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Maven => "maven",
            Self::Gradle => "gradle",
        }
    }

    /// Conflict policy the engine applies unless configured otherwise.
    #[must_use]
    pub const fn default_policy(self) -> ConflictPolicy {
        match self {
            Self::Maven => ConflictPolicy::Nearest,
            Self::Gradle => ConflictPolicy::Highest,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How two versions of the same artifact key are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// The version closest to a root wins; ties go to the first declared.
    Nearest,
    /// The highest version wins, by Maven version ordering.
    Highest,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Highest => write!(f, "highest"),
        }
    }
}

/// Configuration consumed by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Resolution engine.
    pub backend: BackendKind,
    /// Hard cap on simultaneous network operations.
    pub max_threads: usize,
    /// Repositories in priority order.
    pub repositories: Vec<String>,
    /// Requested root artifacts.
    pub artifacts: Vec<String>,
    /// Artifacts never pulled in transitively (`group:artifact`, `*` allowed).
    pub exclusions: Vec<String>,
    /// Override of the backend's conflict policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_policy: Option<ConflictPolicy>,
    /// Download `sources` jars and record their checksums.
    pub fetch_sources: bool,
    /// Download `javadoc` jars and record their checksums.
    pub fetch_javadoc: bool,
    /// Emit detailed log events.
    pub verbose: bool,
    /// Artifact cache location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Add the local Maven repository (`~/.m2/repository`) before the others.
    pub use_m2local: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            max_threads: DEFAULT_MAX_THREADS,
            repositories: vec![MAVEN_CENTRAL.to_string()],
            artifacts: Vec::new(),
            exclusions: Vec::new(),
            conflict_policy: None,
            fetch_sources: false,
            fetch_javadoc: false,
            verbose: false,
            cache_dir: None,
            use_m2local: false,
        }
    }
}

impl ResolverConfig {
    /// Parse and validate TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid TOML or invalid values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if it is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        Self::from_toml_str(&content)
    }

    /// Check value constraints.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero thread count, an empty
    /// repository list, or malformed artifact and exclusion coordinates.
    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            return Err(Error::configuration("max_threads must be a positive integer"));
        }
        if self.repositories.is_empty() && !self.use_m2local {
            return Err(Error::configuration("at least one repository is required"));
        }
        self.root_coordinates()?;
        self.exclusion_coordinates()?;
        Ok(())
    }

    /// Thread count, honoring `JARLOCK_MAX_THREADS` when it holds a positive integer.
    #[must_use]
    pub fn effective_max_threads(&self) -> usize {
        std::env::var(MAX_THREADS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.max_threads)
    }

    /// Conflict policy: the explicit override, else the backend's default.
    #[must_use]
    pub fn effective_conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
            .unwrap_or_else(|| self.backend.default_policy())
    }

    /// Artifact cache directory, defaulting to the user cache dir.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("jarlock")
        })
    }

    /// Repository list, with the local Maven repository first when enabled.
    #[must_use]
    pub fn effective_repositories(&self) -> Vec<String> {
        let mut repositories = Vec::new();
        if self.use_m2local {
            repositories.push(crate::lockfile::local_repository_uri());
        }
        repositories.extend(self.repositories.iter().cloned());
        repositories
    }

    /// Parsed root artifacts.
    ///
    /// # Errors
    ///
    /// Returns a malformed-coordinate error for the first invalid entry.
    pub fn root_coordinates(&self) -> Result<Vec<Coordinates>> {
        self.artifacts.iter().map(|a| Coordinates::parse(a)).collect()
    }

    /// Parsed global exclusions.
    ///
    /// # Errors
    ///
    /// Returns a malformed-coordinate error for the first invalid entry.
    pub fn exclusion_coordinates(&self) -> Result<Vec<Coordinates>> {
        self.exclusions.iter().map(|a| Coordinates::parse(a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::from_toml_str("").unwrap();
        assert_eq!(config.backend, BackendKind::Maven);
        assert_eq!(config.max_threads, DEFAULT_MAX_THREADS);
        assert_eq!(config.repositories, vec![MAVEN_CENTRAL.to_string()]);
        assert_eq!(config.effective_conflict_policy(), ConflictPolicy::Nearest);
    }

    #[test]
    fn test_full_config() {
        let config = ResolverConfig::from_toml_str(
            r#"
backend = "gradle"
max_threads = 12
repositories = ["https://repo.example/maven2/"]
artifacts = ["com.example:item:1.0.0"]
exclusions = ["com.example:unwanted"]
fetch_sources = true
verbose = true
cache_dir = "/tmp/jarlock-cache"
"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Gradle);
        assert_eq!(config.max_threads, 12);
        assert!(config.fetch_sources);
        assert!(!config.fetch_javadoc);
        assert_eq!(config.effective_conflict_policy(), ConflictPolicy::Highest);
        assert_eq!(config.effective_cache_dir(), PathBuf::from("/tmp/jarlock-cache"));
        assert_eq!(config.root_coordinates().unwrap().len(), 1);
    }

    #[test]
    fn test_policy_override() {
        let config =
            ResolverConfig::from_toml_str("backend = \"gradle\"\nconflict_policy = \"nearest\"")
                .unwrap();
        assert_eq!(config.effective_conflict_policy(), ConflictPolicy::Nearest);
    }

    #[test]
    fn test_rejects_zero_threads() {
        let err = ResolverConfig::from_toml_str("max_threads = 0").unwrap_err();
        assert!(err.to_string().contains("max_threads"));
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(ResolverConfig::from_toml_str("threads = 3").is_err());
    }

    #[test]
    fn test_rejects_malformed_artifact() {
        let err = ResolverConfig::from_toml_str("artifacts = [\"nope\"]").unwrap_err();
        assert!(matches!(err, Error::MalformedCoordinate { .. }));
    }

    #[test]
    fn test_env_overrides_threads() {
        let config = ResolverConfig::default();
        temp_env::with_var(MAX_THREADS_ENV, Some("3"), || {
            assert_eq!(config.effective_max_threads(), 3);
        });
        temp_env::with_var(MAX_THREADS_ENV, Some("0"), || {
            assert_eq!(config.effective_max_threads(), DEFAULT_MAX_THREADS);
        });
    }

    #[test]
    fn test_m2local_goes_first() {
        let config = ResolverConfig {
            use_m2local: true,
            ..ResolverConfig::default()
        };
        let repos = config.effective_repositories();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0], crate::lockfile::local_repository_uri());
    }
}
