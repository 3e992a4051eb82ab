//! CLI-level errors and process exit codes.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Successful run.
pub const EXIT_OK: i32 = 0;
/// Resolution, verification or I/O failure.
pub const EXIT_FAILURE: i32 = 1;
/// Bad invocation: missing configuration or lockfile, unknown key.
pub const EXIT_CLI: i32 = 2;

/// Errors raised by the `jarlock` commands.
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// No configuration file at the given path
    #[error("Configuration file not found: {}", path.display())]
    #[diagnostic(
        code(jarlock::cli::config_missing),
        help("Create a jarlock.toml or pass --config <path>")
    )]
    ConfigMissing {
        /// Path that was looked up
        path: PathBuf,
    },

    /// No lockfile where one is required
    #[error("Lockfile not found: {}", path.display())]
    #[diagnostic(
        code(jarlock::cli::lockfile_missing),
        help("Run `jarlock resolve` to create it")
    )]
    LockfileMissing {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Re-resolution produced a different lockfile
    #[error("Lockfile is out of date: {}", path.display())]
    #[diagnostic(
        code(jarlock::cli::stale),
        help("Run `jarlock resolve` and commit the result")
    )]
    Stale {
        /// Lockfile that no longer matches
        path: PathBuf,
    },

    /// Key absent from the lockfile
    #[error("'{key}' is not in the lockfile")]
    #[diagnostic(code(jarlock::cli::not_locked))]
    NotLocked {
        /// `group:artifact` key that was requested
        key: String,
    },

    /// Locked entry without a downloadable payload
    #[error("'{key}' has no payload; it is an aggregator")]
    #[diagnostic(code(jarlock::cli::no_payload))]
    NoPayload {
        /// `group:artifact` key that was requested
        key: String,
    },

    /// Configuration or lockfile error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] jarlock_core::Error),

    /// Resolution or download error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolver(#[from] jarlock_resolver::Error),
}

impl CliError {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigMissing { .. } | Self::LockfileMissing { .. } | Self::NotLocked { .. } => {
                EXIT_CLI
            }
            Self::Stale { .. } | Self::NoPayload { .. } | Self::Core(_) | Self::Resolver(_) => {
                EXIT_FAILURE
            }
        }
    }
}

/// Result type for CLI commands
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let missing = CliError::ConfigMissing {
            path: PathBuf::from("jarlock.toml"),
        };
        assert_eq!(missing.exit_code(), EXIT_CLI);
        assert!(missing.to_string().contains("jarlock.toml"));

        let stale = CliError::Stale {
            path: PathBuf::from("jarlock_install.json"),
        };
        assert_eq!(stale.exit_code(), EXIT_FAILURE);
        assert_ne!(stale.exit_code(), EXIT_OK);
    }

    #[test]
    fn test_wrapped_errors_keep_their_diagnostics() {
        let err = CliError::from(jarlock_core::Error::configuration("bad"));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert_eq!(
            err.code().map(|c| c.to_string()).as_deref(),
            Some("jarlock::core::config")
        );
    }
}
