//! Error types for resolution and downloads

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for resolution, downloads and repository access
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A requested root artifact exists in no repository
    #[error("Artifact {coordinates} not found in any repository (tried: {})", repositories.join(", "))]
    #[diagnostic(
        code(jarlock::resolver::artifact_not_found),
        help("Check the coordinates for typos and that the repository list contains a repository hosting them")
    )]
    ArtifactNotFound {
        /// The requested coordinates
        coordinates: String,
        /// Repositories consulted, in priority order
        repositories: Vec<String>,
    },

    /// Network failure that outlasted every retry
    #[error("Transient failure fetching {url}: {message}")]
    #[diagnostic(
        code(jarlock::resolver::transient_fetch),
        help("The repository may be overloaded or unreachable. Try again later")
    )]
    TransientFetch {
        /// URL being fetched
        url: String,
        /// Underlying failure
        message: String,
    },

    /// Downloaded content does not match its expected checksum
    #[error("Checksum mismatch for {coordinates}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(jarlock::resolver::integrity),
        help("The artifact changed since it was locked, or the repository served corrupt data. Re-resolve only if the change is expected")
    )]
    Integrity {
        /// Artifact whose content was rejected
        coordinates: String,
        /// Checksum that was expected
        expected: String,
        /// Checksum of the received content
        actual: String,
    },

    /// HTTP client setup or a non-retryable HTTP failure
    #[error("HTTP error: {message}")]
    #[diagnostic(code(jarlock::resolver::http))]
    Http {
        /// Error message
        message: String,
    },

    /// Repository URI that cannot be used
    #[error("Invalid repository '{uri}': {reason}")]
    #[diagnostic(
        code(jarlock::resolver::invalid_repository),
        help("Repositories must be http://, https:// or file:// URLs")
    )]
    InvalidRepository {
        /// The offending URI
        uri: String,
        /// Why it was rejected
        reason: String,
    },

    /// POM document that cannot be understood
    #[error("Invalid POM for {coordinates}: {message}")]
    #[diagnostic(code(jarlock::resolver::pom))]
    Pom {
        /// Artifact the POM describes
        coordinates: String,
        /// Parse or model error
        message: String,
    },

    /// A resolution worker task failed
    #[error("Resolution task failed: {0}")]
    #[diagnostic(code(jarlock::resolver::task))]
    Task(String),

    /// I/O error in the artifact cache
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(jarlock::resolver::io),
        help("Check permissions on the cache directory")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write")
        operation: String,
    },

    /// Error from the core crate
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] jarlock_core::Error),
}

impl Error {
    /// Create an artifact-not-found error
    #[must_use]
    pub fn artifact_not_found(
        coordinates: impl ToString,
        repositories: impl IntoIterator<Item = impl ToString>,
    ) -> Self {
        Self::ArtifactNotFound {
            coordinates: coordinates.to_string(),
            repositories: repositories.into_iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Create a transient fetch error
    #[must_use]
    pub fn transient_fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientFetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an integrity error
    #[must_use]
    pub fn integrity(
        coordinates: impl ToString,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Integrity {
            coordinates: coordinates.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an HTTP error
    #[must_use]
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Create an invalid repository error
    #[must_use]
    pub fn invalid_repository(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRepository {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a POM error
    #[must_use]
    pub fn pom(coordinates: impl ToString, message: impl Into<String>) -> Self {
        Self::Pom {
            coordinates: coordinates.to_string(),
            message: message.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_coordinate_and_repositories() {
        let err = Error::artifact_not_found(
            "com.example:item:1.0.0",
            ["https://a.example/", "https://b.example/"],
        );
        assert_eq!(
            err.to_string(),
            "Artifact com.example:item:1.0.0 not found in any repository (tried: https://a.example/, https://b.example/)"
        );
    }

    #[test]
    fn test_integrity_display() {
        let err = Error::integrity("g:a:1", "aa", "bb");
        assert_eq!(
            err.to_string(),
            "Checksum mismatch for g:a:1: expected aa, got bb"
        );
    }

    #[test]
    fn test_core_errors_are_transparent() {
        let core = jarlock_core::Error::configuration("bad");
        let err: Error = core.into();
        assert_eq!(err.to_string(), "Configuration error: bad");
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("jarlock::core::config".to_string())
        );
    }
}
