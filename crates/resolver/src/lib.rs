//! Transitive dependency resolution for jarlock
//!
//! This crate turns requested artifact coordinates into a resolved graph:
//!
//! - **Transport**: reads repository files over `file://` and HTTP(S), with
//!   per-host credentials
//! - **Downloader**: tries repositories in order, caches payloads and
//!   verifies their SHA-256 checksums
//! - **POM model**: parent inheritance, properties and managed versions
//! - **Graph engine**: level-by-level expansion with a bounded number of
//!   concurrent network operations
//! - **Backends**: Maven (nearest wins) and Gradle (highest wins)
//!
//! # Example
//!
//! ```rust,ignore
//! use jarlock_core::{Netrc, ResolverConfig};
//! use jarlock_events::EventSender;
//! use jarlock_resolver::Resolver;
//! use std::sync::Arc;
//!
//! let config = ResolverConfig::load("jarlock.toml".as_ref())?;
//! let resolver = Resolver::from_config(&config, EventSender::noop(), Arc::new(Netrc::from_user_file()))?;
//! let lockfile = resolver.lock(None).await?;
//! ```

pub mod backend;
pub mod cache;
pub mod downloader;
pub mod error;
pub mod graph;
pub mod pom;
pub mod resolver;
pub mod retry;
pub mod transport;

pub use backend::{Backend, BackendOptions, ResolverBackend};
pub use cache::{ArtifactCache, CachedArtifact, sha256_hex};
pub use downloader::{DownloadResult, Downloader, FetchedFile};
pub use error::{Error, Result};
pub use graph::GraphBuilder;
pub use resolver::{Request, Resolution, Resolver};
pub use retry::{RetryConfig, Retryable, with_retry};
pub use transport::{FetchError, Repository, Transport};
