//! Core types for jarlock
//!
//! This crate holds everything that does not touch the network: artifact
//! coordinates and Maven version ordering, the resolved-artifact model,
//! repository credentials, resolver configuration and the lockfile codec.

pub mod config;
pub mod conflict;
pub mod coordinates;
pub mod credentials;
pub mod dependency;
pub mod error;
pub mod lockfile;
pub mod version;

// Re-export main types
pub use config::{BackendKind, ConflictPolicy, ResolverConfig};
pub use conflict::Conflict;
pub use coordinates::Coordinates;
pub use credentials::{Credential, CredentialSource, Netrc};
pub use dependency::DependencyInfo;
pub use error::{Error, Result};
pub use lockfile::{Lockfile, LockfileCodec};
pub use version::{MavenVersion, compare_versions};
