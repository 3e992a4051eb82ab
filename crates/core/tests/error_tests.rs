//! Tests for error types

use jarlock_core::{Coordinates, Error, ResolverConfig};
use miette::Diagnostic;
use std::path::Path;

#[test]
fn test_configuration_error() {
    let error = Error::configuration("max_threads must be a positive integer");
    assert_eq!(
        error.to_string(),
        "Configuration error: max_threads must be a positive integer"
    );
}

#[test]
fn test_malformed_coordinate_from_parse() {
    let error = Coordinates::parse("a:b:c:d:e:f").unwrap_err();
    assert_eq!(
        error.to_string(),
        "Malformed coordinates 'a:b:c:d:e:f': expected 2 to 5 segments, found 6"
    );
    assert_eq!(
        error.code().map(|c| c.to_string()),
        Some("jarlock::core::malformed_coordinate".to_string())
    );
    assert!(error.help().is_some());
}

#[test]
fn test_lockfile_format_error() {
    let error = Error::lockfile_format("__resolved_artifacts_hash", "mismatch");
    assert_eq!(
        error.to_string(),
        "Lockfile format error in '__resolved_artifacts_hash': mismatch"
    );
}

#[test]
fn test_missing_config_is_io_error() {
    let path = Path::new("/nonexistent/jarlock.toml");
    let error = ResolverConfig::load(path).unwrap_err();
    assert!(matches!(error, Error::Io { .. }));
    assert_eq!(error.to_string(), "I/O read failed: /nonexistent/jarlock.toml");
}
