//! Error types for the core crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for coordinate parsing, configuration and lockfile handling
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Artifact identifier that does not follow the coordinate syntax
    #[error("Malformed coordinates '{input}': {reason}")]
    #[diagnostic(
        code(jarlock::core::malformed_coordinate),
        help("Coordinates take the form group:artifact[:extension[:classifier]]:version")
    )]
    MalformedCoordinate {
        /// The offending input string
        input: String,
        /// Why the input was rejected
        reason: String,
    },

    /// Persisted lockfile that cannot be loaded
    #[error("Lockfile format error in '{field}': {message}")]
    #[diagnostic(
        code(jarlock::core::lockfile_format),
        help("Regenerate the lockfile with `jarlock resolve`")
    )]
    LockfileFormat {
        /// Path of the offending field inside the document
        field: String,
        /// Error message describing the problem
        message: String,
    },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(jarlock::core::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// I/O error while reading or writing configuration and lockfiles
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(jarlock::core::io),
        help("Check file permissions and ensure the path exists")
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
}

impl Error {
    /// Create a malformed coordinate error
    #[must_use]
    pub fn malformed_coordinate(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCoordinate {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a lockfile format error naming the offending field
    #[must_use]
    pub fn lockfile_format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LockfileFormat {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
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

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
