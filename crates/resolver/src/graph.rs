//! Breadth-first dependency graph expansion.
//!
//! The graph is expanded one depth level at a time. Every node of a level is
//! visited concurrently on a [`JoinSet`] (POM lookup, then payload download);
//! the results are merged back on the coordinating task in declaration order,
//! so the outcome never depends on which download finished first.
//!
//! Version selection happens during the merge:
//!
//! - roots are pinned and always win over transitive versions of their key
//! - [`ConflictPolicy::Nearest`] keeps the first version met, which is the
//!   shallowest one and, at equal depth, the first declared
//! - [`ConflictPolicy::Highest`] replaces the selection whenever a higher
//!   version turns up
//!
//! After expansion, nodes no longer reachable from the roots through the
//! selected versions are pruned and conflicts are computed against the final
//! selection.

use jarlock_core::{Conflict, ConflictPolicy, Coordinates, DependencyInfo, compare_versions};
use jarlock_events::{EventSender, emit_log};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::downloader::Downloader;
use crate::pom::{self, EffectivePom};
use crate::resolver::{Request, Resolution};
use crate::transport::Repository;
use crate::{Error, Result};

const EVENT_SOURCE: &str = "resolver";

/// Classifier of source archives.
pub const SOURCES_CLASSIFIER: &str = "sources";

/// Classifier of javadoc archives.
pub const JAVADOC_CLASSIFIER: &str = "javadoc";

/// Whether an exclusion pattern matches an artifact.
///
/// Patterns match on group and artifact; either may be `*`.
#[must_use]
pub fn exclusion_matches(pattern: &Coordinates, candidate: &Coordinates) -> bool {
    let matches = |pattern: &str, value: &str| pattern == "*" || pattern == value;
    matches(pattern.group_id(), candidate.group_id())
        && matches(pattern.artifact_id(), candidate.artifact_id())
}

/// A node waiting to be visited.
#[derive(Debug, Clone)]
struct Pending {
    coordinates: Coordinates,
    /// Exclusions applied to this node's children.
    exclusions: BTreeSet<Coordinates>,
}

/// What visiting a node found.
#[derive(Debug)]
enum Visited {
    Found {
        info: DependencyInfo,
        pom: Option<EffectivePom>,
    },
    Missing,
}

#[derive(Debug)]
struct Selection {
    coordinates: Coordinates,
    pinned: bool,
}

#[derive(Debug)]
struct Node {
    info: DependencyInfo,
    /// Declared children, at the versions their POM asked for.
    children: Vec<Coordinates>,
}

/// Graph state, owned by the coordinating task.
#[derive(Debug, Default)]
struct State {
    selected: BTreeMap<String, Selection>,
    seen: BTreeMap<String, BTreeSet<Coordinates>>,
    nodes: BTreeMap<Coordinates, Node>,
    missing: BTreeSet<Coordinates>,
}

impl State {
    /// Offer a candidate; returns true when it becomes the selection for its key.
    fn offer(&mut self, candidate: &Coordinates, policy: ConflictPolicy, pinned: bool) -> bool {
        let key = candidate.key();
        self.seen
            .entry(key.clone())
            .or_default()
            .insert(candidate.clone());

        let replace = match self.selected.get(&key) {
            None => true,
            Some(current) if &current.coordinates == candidate => false,
            Some(current) => match policy {
                ConflictPolicy::Nearest => false,
                ConflictPolicy::Highest => {
                    !current.pinned
                        && compare_versions(candidate.version(), current.coordinates.version())
                            == Ordering::Greater
                }
            },
        };
        if replace {
            self.selected.insert(
                key,
                Selection {
                    coordinates: candidate.clone(),
                    pinned,
                },
            );
        }
        replace
    }

    fn selection(&self, coordinates: &Coordinates) -> Option<&Coordinates> {
        self.selected.get(&coordinates.key()).map(|s| &s.coordinates)
    }

    fn is_known(&self, coordinates: &Coordinates) -> bool {
        self.nodes.contains_key(coordinates) || self.missing.contains(coordinates)
    }
}

/// Expands root coordinates into a resolved dependency graph.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    downloader: Arc<Downloader>,
    policy: ConflictPolicy,
    fetch_sources: bool,
    fetch_javadoc: bool,
}

impl GraphBuilder {
    /// Create a graph builder using `policy` to settle version conflicts.
    #[must_use]
    pub fn new(downloader: Arc<Downloader>, policy: ConflictPolicy) -> Self {
        Self {
            downloader,
            policy,
            fetch_sources: false,
            fetch_javadoc: false,
        }
    }

    /// Also download `sources` archives of resolved artifacts.
    #[must_use]
    pub fn with_sources(mut self, fetch: bool) -> Self {
        self.fetch_sources = fetch;
        self
    }

    /// Also download `javadoc` archives of resolved artifacts.
    #[must_use]
    pub fn with_javadoc(mut self, fetch: bool) -> Self {
        self.fetch_javadoc = fetch;
        self
    }

    /// The conflict policy in use.
    #[must_use]
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Sender for progress events.
    #[must_use]
    pub fn events(&self) -> &EventSender {
        self.downloader.events()
    }

    /// Resolve the request's roots into a complete graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactNotFound`] when a root is in no repository,
    /// a malformed coordinate error for a root without a version, and any
    /// integrity or I/O error raised while downloading.
    #[instrument(skip_all, fields(roots = request.root_coordinates.len(), policy = ?self.policy))]
    pub async fn build(&self, request: &Request) -> Result<Resolution> {
        for root in &request.root_coordinates {
            if root.version().is_empty() {
                return Err(jarlock_core::Error::malformed_coordinate(
                    root.to_string(),
                    "requested artifacts need a version",
                )
                .into());
            }
        }

        let repositories: Arc<[Repository]> = request.repositories.clone().into();
        let expected = Arc::new(request.expected_checksums.clone());
        let mut state = State::default();

        let mut frontier: Vec<Pending> = request
            .root_coordinates
            .iter()
            .map(|root| Pending {
                coordinates: root.clone(),
                exclusions: BTreeSet::new(),
            })
            .collect();
        let mut depth = 0usize;

        while !frontier.is_empty() {
            let mut scheduled: Vec<Pending> = Vec::new();
            for pending in frontier {
                if !state.offer(&pending.coordinates, self.policy, depth == 0) {
                    continue;
                }
                if state.is_known(&pending.coordinates)
                    || scheduled.iter().any(|s| s.coordinates == pending.coordinates)
                {
                    continue;
                }
                scheduled.push(pending);
            }

            debug!(depth, nodes = scheduled.len(), "Expanding level");
            let visits = self.visit_level(&scheduled, &repositories, &expected).await?;

            let mut next = Vec::new();
            for (pending, visited) in scheduled.into_iter().zip(visits) {
                match visited? {
                    Visited::Missing if depth == 0 => {
                        return Err(Error::artifact_not_found(
                            &pending.coordinates,
                            repositories.iter().map(Repository::as_str),
                        ));
                    }
                    Visited::Missing => {
                        emit_log!(
                            self.downloader.events(),
                            EVENT_SOURCE,
                            "{} not found in any repository, dropping it",
                            pending.coordinates
                        );
                        state.missing.insert(pending.coordinates);
                    }
                    Visited::Found { info, pom } => {
                        let children = pom.map_or_else(Vec::new, |pom| {
                            self.expand_children(&pom, &pending, request, &mut next)
                        });
                        let info = info.with_exclusions(pending.exclusions.iter().cloned());
                        state
                            .nodes
                            .insert(pending.coordinates, Node { info, children });
                    }
                }
            }

            frontier = next;
            depth += 1;
        }

        let mut resolution = Self::assemble(&state, &request.root_coordinates);
        if self.fetch_sources || self.fetch_javadoc {
            resolution.dependencies = self
                .attach_classified(resolution.dependencies, &repositories)
                .await?;
        }
        Ok(resolution)
    }

    /// Queue a node's declared children and return them in declaration order.
    fn expand_children(
        &self,
        pom: &EffectivePom,
        parent: &Pending,
        request: &Request,
        next: &mut Vec<Pending>,
    ) -> Vec<Coordinates> {
        let mut children = Vec::new();
        for declared in pom.dependencies() {
            let child = declared.coordinates;
            if child.key() == parent.coordinates.key() {
                continue;
            }
            let excluded = request
                .global_exclusions
                .iter()
                .chain(parent.exclusions.iter())
                .any(|pattern| exclusion_matches(pattern, &child));
            if excluded {
                debug!(parent = %parent.coordinates, %child, "Excluded");
                continue;
            }
            if let Some(range) = declared.range {
                emit_log!(
                    self.downloader.events(),
                    EVENT_SOURCE,
                    "{} asks for {} in range {range}, using {}",
                    parent.coordinates,
                    child.key(),
                    child.version()
                );
            }

            let mut exclusions = parent.exclusions.clone();
            exclusions.extend(declared.exclusions);
            next.push(Pending {
                coordinates: child.clone(),
                exclusions,
            });
            children.push(child);
        }
        children
    }

    /// Visit a level's nodes concurrently; results come back in input order.
    async fn visit_level(
        &self,
        scheduled: &[Pending],
        repositories: &Arc<[Repository]>,
        expected: &Arc<BTreeMap<Coordinates, String>>,
    ) -> Result<Vec<Result<Visited>>> {
        let mut join_set = JoinSet::new();
        for (index, pending) in scheduled.iter().enumerate() {
            let downloader = Arc::clone(&self.downloader);
            let repositories = Arc::clone(repositories);
            let coordinates = pending.coordinates.clone();
            let expected = expected.get(&coordinates).cloned();
            join_set.spawn(async move {
                let visited =
                    visit(&downloader, &coordinates, &repositories, expected.as_deref()).await;
                (index, visited)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, visited) = joined.map_err(|e| Error::Task(e.to_string()))?;
            results.insert(index, visited);
        }
        Ok(results.into_values().collect())
    }

    /// Prune to the selected graph and compute conflicts.
    fn assemble(state: &State, roots: &[Coordinates]) -> Resolution {
        let mut reachable = BTreeSet::new();
        let mut queue: VecDeque<Coordinates> = roots
            .iter()
            .filter_map(|root| state.selection(root).cloned())
            .collect();
        while let Some(coordinates) = queue.pop_front() {
            let Some(node) = state.nodes.get(&coordinates) else {
                continue;
            };
            if !reachable.insert(coordinates) {
                continue;
            }
            queue.extend(
                node.children
                    .iter()
                    .filter_map(|child| state.selection(child).cloned()),
            );
        }

        let mut dependencies = BTreeSet::new();
        let mut conflicts = BTreeSet::new();
        let mut missing = BTreeSet::new();
        for coordinates in &reachable {
            let Some(node) = state.nodes.get(coordinates) else {
                continue;
            };
            let mut children = BTreeSet::new();
            for child in &node.children {
                let Some(selected) = state.selection(child) else {
                    continue;
                };
                if reachable.contains(selected) {
                    children.insert(selected.clone());
                } else if state.missing.contains(selected) {
                    missing.insert(selected.clone());
                }
            }
            dependencies.insert(node.info.clone().with_dependencies(children));

            if let Some(seen) = state.seen.get(&coordinates.key()) {
                conflicts.extend(
                    seen.iter()
                        .filter(|other| *other != coordinates)
                        .map(|other| Conflict::new(coordinates.clone(), other.clone())),
                );
            }
        }

        Resolution {
            dependencies,
            conflicts,
            missing,
        }
    }

    /// Download classifier variants and record their checksums.
    async fn attach_classified(
        &self,
        dependencies: BTreeSet<DependencyInfo>,
        repositories: &Arc<[Repository]>,
    ) -> Result<BTreeSet<DependencyInfo>> {
        let mut classifiers = Vec::new();
        if self.fetch_sources {
            classifiers.push(SOURCES_CLASSIFIER);
        }
        if self.fetch_javadoc {
            classifiers.push(JAVADOC_CLASSIFIER);
        }

        let mut join_set = JoinSet::new();
        for info in dependencies.iter().filter(|info| info.sha256.is_some()) {
            if !info.coordinates.classifier().is_empty() {
                continue;
            }
            for classifier in &classifiers {
                let downloader = Arc::clone(&self.downloader);
                let repositories = Arc::clone(repositories);
                let owner = info.coordinates.clone();
                let classifier = (*classifier).to_string();
                join_set.spawn(async move {
                    let variant = owner.with_classifier(classifier.as_str());
                    let result = downloader.download(&variant, &repositories).await;
                    (owner, classifier, result)
                });
            }
        }

        let mut checksums: BTreeMap<Coordinates, BTreeMap<String, Option<String>>> =
            BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (owner, classifier, result) = joined.map_err(|e| Error::Task(e.to_string()))?;
            let sha256 = match result {
                Ok(download) => download.sha256,
                Err(Error::Integrity { .. }) => {
                    warn!(%owner, %classifier, "Ignoring classified artifact with bad checksum");
                    None
                }
                Err(e) => return Err(e),
            };
            checksums
                .entry(owner)
                .or_default()
                .insert(classifier, sha256);
        }

        Ok(dependencies
            .into_iter()
            .map(|mut info| {
                if let Some(extra) = checksums.remove(&info.coordinates) {
                    info.auxiliary_checksums.extend(extra);
                }
                info
            })
            .collect())
    }
}

/// Look up a node's POM and payload.
async fn visit(
    downloader: &Downloader,
    coordinates: &Coordinates,
    repositories: &[Repository],
    expected: Option<&str>,
) -> Result<Visited> {
    let pom = match pom::load(downloader, coordinates, repositories).await {
        Ok(pom) => pom,
        Err(Error::Pom { message, .. }) => {
            warn!(%coordinates, %message, "Treating artifact with unreadable POM as a leaf");
            None
        }
        Err(e) => return Err(e),
    };

    if let Some((pom, repository)) = &pom {
        let wants_payload = coordinates.extension() == "pom" || !coordinates.classifier().is_empty();
        if pom.is_aggregator() && !wants_payload {
            let info = DependencyInfo::new(coordinates.clone(), repository.as_str(), None);
            return Ok(Visited::Found {
                info,
                pom: Some(pom.clone()),
            });
        }
    }

    let download = downloader
        .download_verified(coordinates, repositories, expected)
        .await?;
    match (download.sha256, download.repository) {
        (Some(sha256), Some(repository)) => Ok(Visited::Found {
            info: DependencyInfo::new(coordinates.clone(), repository.as_str(), Some(sha256)),
            pom: pom.map(|(pom, _)| pom),
        }),
        _ => Ok(Visited::Missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(s: &str) -> Coordinates {
        Coordinates::parse(s).unwrap()
    }

    #[test]
    fn test_exclusion_wildcards() {
        let target = coords("org.noise:logger:1.0");
        assert!(exclusion_matches(&coords("org.noise:logger"), &target));
        assert!(exclusion_matches(&coords("org.noise:*"), &target));
        assert!(exclusion_matches(&coords("*:logger"), &target));
        assert!(exclusion_matches(&coords("*:*"), &target));
        assert!(!exclusion_matches(&coords("org.noise:other"), &target));
        assert!(!exclusion_matches(&coords("org:logger"), &target));
    }

    #[test]
    fn test_nearest_keeps_first() {
        let mut state = State::default();
        assert!(state.offer(&coords("g:a:1.0"), ConflictPolicy::Nearest, false));
        assert!(!state.offer(&coords("g:a:2.0"), ConflictPolicy::Nearest, false));
        assert_eq!(state.selection(&coords("g:a:9")), Some(&coords("g:a:1.0")));
        assert_eq!(state.seen["g:a"].len(), 2);
    }

    #[test]
    fn test_highest_replaces_unless_pinned() {
        let mut state = State::default();
        assert!(state.offer(&coords("g:a:1.0"), ConflictPolicy::Highest, false));
        assert!(state.offer(&coords("g:a:1.10"), ConflictPolicy::Highest, false));
        assert!(!state.offer(&coords("g:a:1.9"), ConflictPolicy::Highest, false));
        assert_eq!(state.selection(&coords("g:a")), Some(&coords("g:a:1.10")));

        let mut state = State::default();
        assert!(state.offer(&coords("g:a:1.0"), ConflictPolicy::Highest, true));
        assert!(!state.offer(&coords("g:a:2.0"), ConflictPolicy::Highest, false));
        assert_eq!(state.selection(&coords("g:a")), Some(&coords("g:a:1.0")));
    }

    #[test]
    fn test_assemble_prunes_and_records_conflicts() {
        let mut state = State::default();
        let root = coords("g:root:1");
        let old = coords("g:lib:1");
        let new = coords("g:lib:2");
        let orphan = coords("g:orphan:1");

        state.offer(&root, ConflictPolicy::Highest, true);
        state.offer(&old, ConflictPolicy::Highest, false);
        state.offer(&new, ConflictPolicy::Highest, false);
        state.offer(&orphan, ConflictPolicy::Highest, false);

        state.nodes.insert(
            root.clone(),
            Node {
                info: DependencyInfo::new(root.clone(), "r", Some("00".into())),
                children: vec![old.clone()],
            },
        );
        state.nodes.insert(
            old.clone(),
            Node {
                info: DependencyInfo::new(old.clone(), "r", Some("11".into())),
                children: vec![orphan.clone()],
            },
        );
        state.nodes.insert(
            new.clone(),
            Node {
                info: DependencyInfo::new(new.clone(), "r", Some("22".into())),
                children: vec![],
            },
        );
        state.nodes.insert(
            orphan.clone(),
            Node {
                info: DependencyInfo::new(orphan.clone(), "r", Some("33".into())),
                children: vec![],
            },
        );

        let resolution = GraphBuilder::assemble(&state, std::slice::from_ref(&root));
        let resolved: Vec<String> = resolution
            .dependencies
            .iter()
            .map(|d| d.coordinates.to_string())
            .collect();
        assert_eq!(resolved, vec!["g:lib:2", "g:root:1"]);

        let root_info = resolution
            .dependencies
            .iter()
            .find(|d| d.coordinates == root)
            .unwrap();
        assert_eq!(root_info.dependencies, BTreeSet::from([new.clone()]));
        assert_eq!(
            resolution.conflicts,
            BTreeSet::from([Conflict::new(new, old)])
        );
    }
}
