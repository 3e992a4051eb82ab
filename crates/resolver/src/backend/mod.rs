//! Resolver backends.
//!
//! A backend turns a [`Request`] into a [`Resolution`]. Every backend runs
//! the graph engine in [`crate::graph`]; they differ only in how they settle
//! version conflicts by default. Maven keeps the declaration nearest the root
//! (first declared at equal depth), Gradle keeps the highest version
//! requested anywhere. Requested roots pin their versions under both.

use async_trait::async_trait;
use jarlock_core::{BackendKind, ConflictPolicy};
use jarlock_events::emit_phase;
use std::sync::Arc;
use tracing::instrument;

use crate::Result;
use crate::downloader::Downloader;
use crate::graph::GraphBuilder;
use crate::resolver::{Request, Resolution};

/// The contract every resolver backend implements.
#[async_trait]
pub trait ResolverBackend: Send + Sync {
    /// Short name used in logs and events.
    fn name(&self) -> &'static str;

    /// Conflict policy used when the configuration does not override it.
    fn default_policy(&self) -> ConflictPolicy;

    /// The conflict policy this backend resolves with.
    fn policy(&self) -> ConflictPolicy;

    /// Resolve the request into a complete graph.
    async fn resolve(&self, request: &Request) -> Result<Resolution>;
}

/// Options shared by every backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendOptions {
    /// Overrides the backend's default conflict policy.
    pub conflict_policy: Option<ConflictPolicy>,
    /// Download `sources` classifier variants.
    pub fetch_sources: bool,
    /// Download `javadoc` classifier variants.
    pub fetch_javadoc: bool,
}

/// The backend selected by configuration.
#[derive(Debug, Clone)]
pub struct Backend {
    kind: BackendKind,
    graph: GraphBuilder,
}

impl Backend {
    /// Build the backend of the given kind.
    #[must_use]
    pub fn new(kind: BackendKind, downloader: Arc<Downloader>, options: BackendOptions) -> Self {
        let policy = options
            .conflict_policy
            .unwrap_or_else(|| kind.default_policy());
        Self {
            kind,
            graph: GraphBuilder::new(downloader, policy)
                .with_sources(options.fetch_sources)
                .with_javadoc(options.fetch_javadoc),
        }
    }
}

#[async_trait]
impl ResolverBackend for Backend {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn default_policy(&self) -> ConflictPolicy {
        self.kind.default_policy()
    }

    fn policy(&self) -> ConflictPolicy {
        self.graph.policy()
    }

    #[instrument(name = "backend_resolve", skip_all, fields(backend = %self.kind))]
    async fn resolve(&self, request: &Request) -> Result<Resolution> {
        emit_phase!(self.graph.events(), format!("Resolving with {}", self.kind));
        self.graph.build(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarlock_core::Netrc;
    use jarlock_events::EventSender;

    fn downloader() -> Arc<Downloader> {
        let temp = tempfile::TempDir::new().unwrap();
        Arc::new(
            Downloader::new(temp.path(), EventSender::noop(), Arc::new(Netrc::empty()), 1).unwrap(),
        )
    }

    #[test]
    fn test_default_policies() {
        let maven = Backend::new(BackendKind::Maven, downloader(), BackendOptions::default());
        assert_eq!(maven.name(), "maven");
        assert_eq!(maven.default_policy(), ConflictPolicy::Nearest);
        assert_eq!(maven.policy(), ConflictPolicy::Nearest);

        let gradle = Backend::new(BackendKind::Gradle, downloader(), BackendOptions::default());
        assert_eq!(gradle.name(), "gradle");
        assert_eq!(gradle.default_policy(), ConflictPolicy::Highest);
        assert_eq!(gradle.policy(), ConflictPolicy::Highest);
    }

    #[test]
    fn test_policy_override() {
        let options = BackendOptions {
            conflict_policy: Some(ConflictPolicy::Highest),
            ..BackendOptions::default()
        };
        let maven = Backend::new(BackendKind::Maven, downloader(), options);
        assert_eq!(maven.default_policy(), ConflictPolicy::Nearest);
        assert_eq!(maven.policy(), ConflictPolicy::Highest);
    }
}
