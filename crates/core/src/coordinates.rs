//! Maven-style artifact coordinates.
//!
//! A coordinate identifies one artifact file by five fields: group, artifact,
//! version, classifier and extension. The string form accepts between two and
//! five colon-separated segments:
//!
//! ```text
//! group:artifact                                   extension=jar, no version
//! group:artifact:version                           extension=jar
//! group:artifact:extension:version
//! group:artifact:extension:classifier:version
//! ```
//!
//! Every derived string (`key`, `Display`, `to_repo_path`) is a pure function
//! of the normalized fields, so equal coordinates always render identically.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Default extension for artifacts that do not name one.
pub const DEFAULT_EXTENSION: &str = "jar";

/// Immutable identity of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinates {
    group_id: String,
    artifact_id: String,
    version: String,
    classifier: String,
    extension: String,
}

impl Coordinates {
    /// Build coordinates from individual fields, normalizing extension and classifier.
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        classifier: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let classifier = classifier.into();
        let extension = extension.into();
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: if classifier == DEFAULT_EXTENSION {
                String::new()
            } else {
                classifier
            },
            extension: if extension.is_empty() {
                DEFAULT_EXTENSION.to_string()
            } else {
                extension
            },
        }
    }

    /// Parse a colon-delimited coordinate string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCoordinate`] when the segment count is outside
    /// `2..=5` or the group or artifact segment is empty.
    pub fn parse(input: &str) -> Result<Self> {
        let parts: Vec<&str> = input.trim().split(':').collect();
        let coordinates = match parts.as_slice() {
            [group, artifact] => Self::new(*group, *artifact, "", "", DEFAULT_EXTENSION),
            [group, artifact, version] => {
                Self::new(*group, *artifact, *version, "", DEFAULT_EXTENSION)
            }
            [group, artifact, extension, version] => {
                Self::new(*group, *artifact, *version, "", *extension)
            }
            [group, artifact, extension, classifier, version] => {
                Self::new(*group, *artifact, *version, *classifier, *extension)
            }
            _ => {
                return Err(Error::malformed_coordinate(
                    input,
                    format!("expected 2 to 5 segments, found {}", parts.len()),
                ));
            }
        };

        coordinates.validate(input)?;
        Ok(coordinates)
    }

    /// Like [`Coordinates::new`], but rejects fields that are unusable in a
    /// repository path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCoordinate`] when group or artifact is empty,
    /// or a field is `.`/`..`, contains a path separator, or the group has an
    /// empty dot-separated component.
    pub fn try_new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        classifier: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<Self> {
        let coordinates = Self::new(group_id, artifact_id, version, classifier, extension);
        coordinates.validate(&coordinates.to_string())?;
        Ok(coordinates)
    }

    /// Every field must stay inside its own directory of the repository layout.
    fn validate(&self, input: &str) -> Result<()> {
        if self.group_id.is_empty() || self.artifact_id.is_empty() {
            return Err(Error::malformed_coordinate(
                input,
                "group and artifact must not be empty",
            ));
        }
        if self.group_id.split('.').any(str::is_empty) {
            return Err(Error::malformed_coordinate(
                input,
                format!("group '{}' has an empty component", self.group_id),
            ));
        }
        let fields = [
            ("group", &self.group_id),
            ("artifact", &self.artifact_id),
            ("version", &self.version),
            ("classifier", &self.classifier),
            ("extension", &self.extension),
        ];
        for (name, value) in fields {
            if value == "." || value == ".." || value.contains(['/', '\\']) {
                return Err(Error::malformed_coordinate(
                    input,
                    format!("{name} '{value}' is not a valid path segment"),
                ));
            }
        }
        Ok(())
    }

    /// Rebuild coordinates from a version-free key and a version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCoordinate`] when the key has the wrong shape.
    pub fn from_key(key: &str, version: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split(':').collect();
        let coordinates = match parts.as_slice() {
            [group, artifact] => Self::new(*group, *artifact, version, "", DEFAULT_EXTENSION),
            [group, artifact, extension] => Self::new(*group, *artifact, version, "", *extension),
            [group, artifact, extension, classifier] => {
                Self::new(*group, *artifact, version, *classifier, *extension)
            }
            _ => {
                return Err(Error::malformed_coordinate(
                    key,
                    format!("expected 2 to 4 key segments, found {}", parts.len()),
                ));
            }
        };
        coordinates.validate(key)?;
        Ok(coordinates)
    }

    /// The group identifier.
    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The artifact identifier.
    #[must_use]
    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    /// The version, empty before resolution.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The classifier, empty for the main artifact.
    #[must_use]
    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    /// The file extension.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Copy with a different version.
    #[must_use]
    pub fn set_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    /// Copy with a different classifier.
    #[must_use]
    pub fn with_classifier(&self, classifier: impl Into<String>) -> Self {
        Self::new(
            self.group_id.clone(),
            self.artifact_id.clone(),
            self.version.clone(),
            classifier,
            self.extension.clone(),
        )
    }

    /// Copy with a different extension.
    #[must_use]
    pub fn with_extension(&self, extension: impl Into<String>) -> Self {
        Self::new(
            self.group_id.clone(),
            self.artifact_id.clone(),
            self.version.clone(),
            self.classifier.clone(),
            extension,
        )
    }

    /// The POM describing this artifact (same group, artifact and version).
    #[must_use]
    pub fn pom(&self) -> Self {
        Self::new(
            self.group_id.clone(),
            self.artifact_id.clone(),
            self.version.clone(),
            "",
            "pom",
        )
    }

    /// Version-free identity: `group:artifact[:extension][:classifier]`.
    #[must_use]
    pub fn key(&self) -> String {
        let mut key = format!("{}:{}", self.group_id, self.artifact_id);
        if !self.classifier.is_empty() {
            key.push(':');
            key.push_str(&self.extension);
            key.push(':');
            key.push_str(&self.classifier);
        } else if self.extension != DEFAULT_EXTENSION {
            key.push(':');
            key.push_str(&self.extension);
        }
        key
    }

    /// Whether both coordinates name the same artifact, whatever their versions.
    #[must_use]
    pub fn is_same_artifact_ignoring_version(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    /// Repository-relative path in the standard Maven layout.
    ///
    /// `com.example:item:1.0.0` maps to `com/example/item/1.0.0/item-1.0.0.jar`.
    #[must_use]
    pub fn to_repo_path(&self) -> String {
        let mut path = format!(
            "{}/{}/{}/{}-{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.artifact_id,
            self.version
        );
        if !self.classifier.is_empty() {
            path.push('-');
            path.push_str(&self.classifier);
        }
        path.push('.');
        path.push_str(&self.extension);
        path
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key();
        if self.version.is_empty() {
            // A trailing separator keeps `group:artifact:ext:` from reading back as a version.
            if key.matches(':').count() > 1 {
                write!(f, "{key}:")
            } else {
                write!(f, "{key}")
            }
        } else {
            write!(f, "{key}:{}", self.version)
        }
    }
}

impl FromStr for Coordinates {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Coordinates {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Coordinates> for String {
    fn from(value: Coordinates) -> Self {
        value.to_string()
    }
}

impl Ord for Coordinates {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string()).then_with(|| {
            (
                &self.group_id,
                &self.artifact_id,
                &self.extension,
                &self.classifier,
                &self.version,
            )
                .cmp(&(
                    &other.group_id,
                    &other.artifact_id,
                    &other.extension,
                    &other.classifier,
                    &other.version,
                ))
        })
    }
}

impl PartialOrd for Coordinates {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_segments() {
        let c = Coordinates::parse("com.example:item").unwrap();
        assert_eq!(c.group_id(), "com.example");
        assert_eq!(c.artifact_id(), "item");
        assert_eq!(c.version(), "");
        assert_eq!(c.extension(), "jar");
        assert_eq!(c.classifier(), "");
    }

    #[test]
    fn test_parse_three_segments() {
        let c = Coordinates::parse("com.example:item:1.0.0").unwrap();
        assert_eq!(c.version(), "1.0.0");
        assert_eq!(c.extension(), "jar");
    }

    #[test]
    fn test_parse_four_segments() {
        let c = Coordinates::parse("com.example:item:aar:1.0.0").unwrap();
        assert_eq!(c.extension(), "aar");
        assert_eq!(c.version(), "1.0.0");
        assert_eq!(c.classifier(), "");
    }

    #[test]
    fn test_parse_five_segments_normalizes() {
        let c = Coordinates::parse("com.example:item::jar:1.0.0").unwrap();
        assert_eq!(c.extension(), "jar");
        assert_eq!(c.classifier(), "");
        assert_eq!(c, Coordinates::parse("com.example:item:1.0.0").unwrap());

        let sources = Coordinates::parse("com.example:item:jar:sources:1.0.0").unwrap();
        assert_eq!(sources.classifier(), "sources");
    }

    #[test]
    fn test_parse_rejects_bad_arity() {
        assert!(matches!(
            Coordinates::parse("item"),
            Err(Error::MalformedCoordinate { .. })
        ));
        assert!(Coordinates::parse("a:b:c:d:e:f").is_err());
        assert!(Coordinates::parse(":item:1.0").is_err());
    }

    #[test]
    fn test_key() {
        assert_eq!(Coordinates::parse("g:a:1").unwrap().key(), "g:a");
        assert_eq!(Coordinates::parse("g:a:aar:1").unwrap().key(), "g:a:aar");
        assert_eq!(
            Coordinates::parse("g:a:jar:sources:1").unwrap().key(),
            "g:a:jar:sources"
        );
    }

    #[test]
    fn test_display() {
        for s in ["g:a:1", "g:a:aar:1", "g:a:jar:sources:1", "g:a"] {
            assert_eq!(Coordinates::parse(s).unwrap().to_string(), s);
        }
        let versionless = Coordinates::parse("g:a:pom:").unwrap();
        assert_eq!(versionless.to_string(), "g:a:pom:");
        assert_eq!(Coordinates::parse(&versionless.to_string()).unwrap(), versionless);
    }

    #[test]
    fn test_repo_path() {
        let c = Coordinates::parse("com.example:item:1.0.0").unwrap();
        assert_eq!(c.to_repo_path(), "com/example/item/1.0.0/item-1.0.0.jar");

        let c = Coordinates::parse("com.example:item:jar:sources:1.0.0").unwrap();
        assert_eq!(
            c.to_repo_path(),
            "com/example/item/1.0.0/item-1.0.0-sources.jar"
        );

        assert_eq!(
            c.pom().to_repo_path(),
            "com/example/item/1.0.0/item-1.0.0.pom"
        );
    }

    #[test]
    fn test_from_key() {
        let c = Coordinates::from_key("g:a:jar:sources", "2.0").unwrap();
        assert_eq!(c, Coordinates::parse("g:a:jar:sources:2.0").unwrap());
        assert!(Coordinates::from_key("g", "1").is_err());
    }

    #[test]
    fn test_ordering_is_string_order() {
        let mut coords = vec![
            Coordinates::parse("b:a:1").unwrap(),
            Coordinates::parse("a:b:2").unwrap(),
            Coordinates::parse("a:b:10").unwrap(),
        ];
        coords.sort();
        let rendered: Vec<String> = coords.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["a:b:10", "a:b:2", "b:a:1"]);
    }

    #[test]
    fn test_serde_uses_string_form() {
        let c = Coordinates::parse("g:a:aar:1.0").unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"g:a:aar:1.0\"");
        let back: Coordinates = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
        assert!(serde_json::from_str::<Coordinates>("\"nope\"").is_err());
    }

    #[test]
    fn test_rejects_segments_that_escape_the_layout() {
        for input in [
            "g:a:../../../../x",
            "g:a:..",
            "g:a:.",
            "g:../a:1.0",
            "g:a\\b:1.0",
            "g:a:jar:../x:1.0",
            "g:a:../jar:1.0",
            ".etc:a:1.0",
            "org..example:a:1.0",
            "org.example.:a:1.0",
        ] {
            let err = Coordinates::parse(input).unwrap_err();
            assert!(
                matches!(err, Error::MalformedCoordinate { .. }),
                "{input}: {err}"
            );
        }
        assert!(Coordinates::from_key("g:a", "../x").is_err());
        assert!(Coordinates::try_new("g", "a", "1.0/../../x", "", "jar").is_err());
        assert!(Coordinates::try_new("g", "a", "1.0..2", "", "jar").is_ok());
        assert!(Coordinates::parse("org.noise:*").is_ok());
    }
}
