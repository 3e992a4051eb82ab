//! POM documents and the effective dependency model.
//!
//! A POM is read with `quick-xml`'s serde support into a raw document, then
//! merged with its parent chain into an [`EffectivePom`]: properties and
//! managed versions are inherited (the child overriding the parent),
//! `${...}` placeholders are interpolated, and each declared dependency is
//! mapped onto [`Coordinates`].

use jarlock_core::Coordinates;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

use crate::downloader::Downloader;
use crate::transport::Repository;
use crate::{Error, Result};

/// Longest parent chain followed before giving up.
pub const MAX_PARENT_DEPTH: usize = 16;

/// Passes of `${...}` substitution, enough for nested property references.
const MAX_INTERPOLATION_PASSES: usize = 10;

/// Packaging of aggregator projects, which publish no payload.
pub const AGGREGATOR_PACKAGING: &str = "pom";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPom {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    packaging: Option<String>,
    parent: Option<RawParent>,
    properties: BTreeMap<String, String>,
    dependency_management: Option<RawDependencyManagement>,
    dependencies: Option<RawDependencies>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawParent {
    group_id: String,
    artifact_id: String,
    version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDependencyManagement {
    dependencies: Option<RawDependencies>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDependencies {
    dependency: Vec<RawDependency>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDependency {
    group_id: String,
    artifact_id: String,
    version: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    classifier: Option<String>,
    scope: Option<String>,
    optional: Option<String>,
    exclusions: Option<RawExclusions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawExclusions {
    exclusion: Vec<RawExclusion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawExclusion {
    group_id: String,
    artifact_id: String,
}

/// Dependency scope. Only `compile` and `runtime` reach the lockfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The default scope.
    Compile,
    /// Needed at run time only.
    Runtime,
    /// Supplied by the container.
    Provided,
    /// Test classpath only.
    Test,
    /// Taken from a local path.
    System,
    /// Bill-of-materials import inside `dependencyManagement`.
    Import,
}

impl Scope {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("runtime") => Self::Runtime,
            Some("provided") => Self::Provided,
            Some("test") => Self::Test,
            Some("system") => Self::System,
            Some("import") => Self::Import,
            _ => Self::Compile,
        }
    }

    /// Whether dependencies in this scope are part of the resolved graph.
    #[must_use]
    pub fn is_transitive(self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }
}

/// One parsed POM document, before inheritance.
#[derive(Debug)]
pub struct PomDocument {
    raw: RawPom,
}

impl PomDocument {
    /// Parse POM XML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pom`] when the document is not well-formed.
    pub fn parse(coordinates: &Coordinates, bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| Error::pom(coordinates, e.to_string()))?;
        let raw: RawPom =
            quick_xml::de::from_str(text).map_err(|e| Error::pom(coordinates, e.to_string()))?;
        Ok(Self { raw })
    }

    /// The declared parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Coordinates> {
        self.raw.parent.as_ref().and_then(|p| {
            let (group, artifact, version) =
                (p.group_id.trim(), p.artifact_id.trim(), p.version.trim());
            if group.is_empty() || artifact.is_empty() || version.is_empty() {
                return None;
            }
            Coordinates::try_new(group, artifact, version, "", "pom")
                .inspect_err(|e| warn!(error = %e, "Ignoring unusable parent"))
                .ok()
        })
    }
}

#[derive(Debug, Clone)]
struct ManagedDependency {
    version: Option<String>,
    scope: Option<String>,
    exclusions: Vec<RawExclusion>,
}

/// A dependency declared by an effective POM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    /// The dependency, with the version the POM asks for.
    pub coordinates: Coordinates,
    /// Its scope after management is applied.
    pub scope: Scope,
    /// Group/artifact patterns excluded below this dependency.
    pub exclusions: Vec<Coordinates>,
    /// Set when the version came from a range rather than a plain version.
    pub range: Option<String>,
}

/// A POM merged with its parents.
#[derive(Debug, Clone)]
pub struct EffectivePom {
    coordinates: Coordinates,
    packaging: String,
    properties: BTreeMap<String, String>,
    managed: BTreeMap<String, ManagedDependency>,
    dependencies: Vec<RawDependency>,
}

impl EffectivePom {
    /// Build the effective model from a document and its ancestors.
    ///
    /// `ancestors` runs from the direct parent upwards.
    #[must_use]
    pub fn build(coordinates: &Coordinates, document: PomDocument, ancestors: Vec<PomDocument>) -> Self {
        let mut properties = BTreeMap::new();
        let mut managed = BTreeMap::new();
        let mut dependencies = Vec::new();

        // Oldest ancestor first so that descendants override.
        let mut chain: Vec<RawPom> = ancestors.into_iter().rev().map(|d| d.raw).collect();
        chain.push(document.raw);

        let mut group_id = coordinates.group_id().to_string();
        let mut version = coordinates.version().to_string();
        let mut packaging = "jar".to_string();
        let mut parent_fields: Option<(String, String, String)> = None;

        for raw in &chain {
            for (name, value) in &raw.properties {
                properties.insert(name.clone(), value.trim().to_string());
            }
            if let Some(management) = raw
                .dependency_management
                .as_ref()
                .and_then(|m| m.dependencies.as_ref())
            {
                for dep in &management.dependency {
                    if Scope::parse(dep.scope.as_deref()) == Scope::Import {
                        trace!(group = %dep.group_id, artifact = %dep.artifact_id, "Skipping BOM import");
                        continue;
                    }
                    managed.insert(
                        management_key(dep),
                        ManagedDependency {
                            version: dep.version.clone(),
                            scope: dep.scope.clone(),
                            exclusions: dep.exclusions.clone().map(|e| e.exclusion).unwrap_or_default(),
                        },
                    );
                }
            }
            if let Some(deps) = &raw.dependencies {
                dependencies.extend(deps.dependency.iter().cloned());
            }
            if let Some(parent) = &raw.parent {
                parent_fields = Some((
                    parent.group_id.trim().to_string(),
                    parent.artifact_id.trim().to_string(),
                    parent.version.trim().to_string(),
                ));
            }
            if let Some(g) = raw.group_id.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
                g.clone_into(&mut group_id);
            }
            if let Some(v) = raw.version.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                v.clone_into(&mut version);
            }
            if let Some(p) = raw.packaging.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                p.clone_into(&mut packaging);
            }
        }

        let artifact_id = coordinates.artifact_id().to_string();
        let mut builtins = vec![
            ("project.groupId", group_id.clone()),
            ("project.artifactId", artifact_id.clone()),
            ("project.version", version.clone()),
            ("project.packaging", packaging.clone()),
            ("pom.groupId", group_id.clone()),
            ("pom.artifactId", artifact_id),
            ("pom.version", version.clone()),
            ("groupId", group_id),
            ("version", version),
        ];
        if let Some((group, artifact, version)) = parent_fields {
            builtins.push(("project.parent.groupId", group.clone()));
            builtins.push(("parent.groupId", group));
            builtins.push(("project.parent.artifactId", artifact));
            builtins.push(("project.parent.version", version.clone()));
            builtins.push(("parent.version", version));
        }
        for (name, value) in builtins {
            properties.entry(name.to_string()).or_insert(value);
        }

        let packaging = interpolate(&packaging, &properties);
        Self {
            coordinates: coordinates.clone(),
            packaging,
            properties,
            managed,
            dependencies,
        }
    }

    /// The project packaging, `jar` when unspecified.
    #[must_use]
    pub fn packaging(&self) -> &str {
        &self.packaging
    }

    /// Whether the project is an aggregator without a payload.
    #[must_use]
    pub fn is_aggregator(&self) -> bool {
        self.packaging == AGGREGATOR_PACKAGING
    }

    /// Dependencies that belong in the resolved graph, in declaration order.
    ///
    /// Test, provided, system and optional dependencies are left out, as
    /// are declarations with no version after management.
    #[must_use]
    pub fn dependencies(&self) -> Vec<DeclaredDependency> {
        self.dependencies
            .iter()
            .filter_map(|dep| self.declared(dep))
            .collect()
    }

    fn declared(&self, dep: &RawDependency) -> Option<DeclaredDependency> {
        let group = self.interpolate(&dep.group_id);
        let artifact = self.interpolate(&dep.artifact_id);
        let kind = dep.kind.as_deref().map(|t| self.interpolate(t));
        let classifier = dep.classifier.as_deref().map(|c| self.interpolate(c));

        if dep
            .optional
            .as_deref()
            .is_some_and(|o| self.interpolate(o) == "true")
        {
            trace!(%group, %artifact, "Skipping optional dependency");
            return None;
        }

        let lookup = RawDependency {
            group_id: group.clone(),
            artifact_id: artifact.clone(),
            kind: kind.clone(),
            classifier: classifier.clone(),
            ..RawDependency::default()
        };
        let managed = self.managed.get(&management_key(&lookup)).map(|m| ManagedDependency {
            version: m.version.as_deref().map(|v| self.interpolate(v)),
            scope: m.scope.as_deref().map(|s| self.interpolate(s)),
            exclusions: m.exclusions.clone(),
        });

        let scope = Scope::parse(
            dep.scope
                .as_deref()
                .map(|s| self.interpolate(s))
                .or_else(|| managed.as_ref().and_then(|m| m.scope.clone()))
                .as_deref(),
        );
        if !scope.is_transitive() {
            trace!(%group, %artifact, ?scope, "Skipping out-of-scope dependency");
            return None;
        }

        let requested = dep
            .version
            .as_deref()
            .map(|v| self.interpolate(v))
            .filter(|v| !v.is_empty())
            .or_else(|| managed.as_ref().and_then(|m| m.version.clone()));
        let Some(requested) = requested else {
            warn!(pom = %self.coordinates, %group, %artifact, "Dependency has no version");
            return None;
        };
        let (version, range) = match select_version(&requested) {
            Some(VersionSpec::Exact(v)) => (v, None),
            Some(VersionSpec::FromRange(v)) => (v, Some(requested.clone())),
            None => {
                warn!(pom = %self.coordinates, %group, %artifact, version = %requested, "Unusable version range");
                return None;
            }
        };

        let (extension, classifier) =
            artifact_type(kind.as_deref().unwrap_or("jar"), classifier.as_deref().unwrap_or(""));

        let exclusions = dep
            .exclusions
            .iter()
            .flat_map(|e| e.exclusion.iter())
            .chain(managed.iter().flat_map(|m| m.exclusions.iter()))
            .filter_map(|e| {
                let group = self.interpolate(&e.group_id);
                let artifact = self.interpolate(&e.artifact_id);
                (!group.is_empty() && !artifact.is_empty())
                    .then(|| Coordinates::new(group, artifact, "", "", ""))
            })
            .collect();

        let coordinates = match Coordinates::try_new(group, artifact, version, classifier, extension) {
            Ok(coordinates) => coordinates,
            Err(e) => {
                warn!(pom = %self.coordinates, error = %e, "Skipping dependency with unusable coordinates");
                return None;
            }
        };

        Some(DeclaredDependency {
            coordinates,
            scope,
            exclusions,
            range,
        })
    }

    fn interpolate(&self, value: &str) -> String {
        interpolate(value.trim(), &self.properties)
    }
}

fn management_key(dep: &RawDependency) -> String {
    let kind = dep.kind.as_deref().map_or("jar", str::trim);
    let classifier = dep.classifier.as_deref().map_or("", str::trim);
    format!(
        "{}:{}:{}:{}",
        dep.group_id.trim(),
        dep.artifact_id.trim(),
        if kind.is_empty() { "jar" } else { kind },
        classifier
    )
}

/// Substitute `${name}` placeholders from `properties`.
///
/// Unknown placeholders are left in place.
#[must_use]
pub fn interpolate(value: &str, properties: &BTreeMap<String, String>) -> String {
    let mut current = value.to_string();
    for _ in 0..MAX_INTERPOLATION_PASSES {
        if !current.contains("${") {
            break;
        }
        let next = substitute_once(&current, properties);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn substitute_once(value: &str, properties: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match properties.get(name) {
            Some(replacement) => out.push_str(replacement.trim()),
            None => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// A concrete version chosen from a dependency's version requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// A plain version or a single pinned range like `[1.0]`.
    Exact(String),
    /// A bound picked out of a wider range.
    FromRange(String),
}

/// Pick a version for a version requirement.
///
/// Plain versions and `[v]` are taken as is. A range resolves to its lower
/// bound when that bound is inclusive, otherwise to its inclusive upper
/// bound. Ranges without an inclusive bound are skipped, and when several
/// ranges are listed the first usable one wins.
#[must_use]
pub fn select_version(requirement: &str) -> Option<VersionSpec> {
    let requirement = requirement.trim();
    if !(requirement.starts_with('[') || requirement.starts_with('(')) {
        return (!requirement.is_empty()).then(|| VersionSpec::Exact(requirement.to_string()));
    }

    let mut rest = requirement;
    while let Some(start) = rest.find(['[', '(']) {
        let opening = &rest[start..];
        let end = opening.find([']', ')'])?;
        let lower_inclusive = opening.starts_with('[');
        let upper_inclusive = opening[end..].starts_with(']');
        let inner = &opening[1..end];
        rest = &opening[end + 1..];

        let Some((lower, upper)) = inner.split_once(',') else {
            let pinned = inner.trim();
            if lower_inclusive && upper_inclusive && !pinned.is_empty() {
                return Some(VersionSpec::Exact(pinned.to_string()));
            }
            continue;
        };
        let (lower, upper) = (lower.trim(), upper.trim());
        if lower_inclusive && !lower.is_empty() {
            return Some(VersionSpec::FromRange(lower.to_string()));
        }
        if upper_inclusive && !upper.is_empty() {
            return Some(VersionSpec::FromRange(upper.to_string()));
        }
    }
    None
}

/// Map a dependency `type` and classifier onto an extension and classifier.
#[must_use]
pub fn artifact_type<'a>(kind: &'a str, classifier: &'a str) -> (&'a str, &'a str) {
    let (extension, implied) = match kind.trim() {
        "" | "jar" => ("jar", ""),
        "test-jar" => ("jar", "tests"),
        "bundle" | "maven-plugin" | "ejb" | "ejb-client" => ("jar", ""),
        "java-source" => ("jar", "sources"),
        "javadoc" => ("jar", "javadoc"),
        other => (other, ""),
    };
    let classifier = classifier.trim();
    (extension, if classifier.is_empty() { implied } else { classifier })
}

/// Fetch the POM of `coordinates` and its parents, and build the effective model.
///
/// Returns `None` when no repository has the POM. A missing or unreadable
/// parent ends the chain with a warning.
///
/// # Errors
///
/// Returns [`Error::Pom`] when the artifact's own POM is malformed, or an
/// I/O error from the cache.
pub async fn load(
    downloader: &Downloader,
    coordinates: &Coordinates,
    repositories: &[Repository],
) -> Result<Option<(EffectivePom, Repository)>> {
    let Some(fetched) = downloader.fetch_pom(coordinates, repositories).await? else {
        debug!(%coordinates, "No POM in any repository");
        return Ok(None);
    };
    let document = PomDocument::parse(coordinates, &fetched.bytes)?;

    let mut ancestors = Vec::new();
    let mut next = document.parent();
    while let Some(parent) = next.take() {
        if ancestors.len() >= MAX_PARENT_DEPTH {
            warn!(%coordinates, "Parent chain too deep, ignoring remaining ancestors");
            break;
        }
        let Some(bytes) = downloader.fetch_pom(&parent, repositories).await? else {
            warn!(%coordinates, %parent, "Parent POM not found");
            break;
        };
        match PomDocument::parse(&parent, &bytes.bytes) {
            Ok(doc) => {
                next = doc.parent();
                ancestors.push(doc);
            }
            Err(e) => {
                warn!(%coordinates, %parent, error = %e, "Ignoring unreadable parent POM");
                break;
            }
        }
    }

    Ok(Some((
        EffectivePom::build(coordinates, document, ancestors),
        fetched.repository,
    )))
}
