use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::pattern::cached_regex;

const SPECIFIER_PATTERN: &str = r"^([^:@]+):([^:@]+):([^:@]+)(?::([^:@]+))?(?:@([^:@]+))?$";
static SPECIFIER_REGEX: OnceLock<Regex> = OnceLock::new();

/// A parsed Maven-style coordinate.
///
/// Supported formats:
///   `groupId:artifactId:version`
///   `groupId:artifactId:version:classifier`
///   `groupId:artifactId:version:classifier@extension`
///   `groupId:artifactId:version@extension`
///
/// Equality and hashing ignore the extension.
#[derive(Debug, Clone, Eq)]
pub struct CoordinateSpecifier {
    group_id: String,
    artifact_id: String,
    version: String,
    classifier: Option<String>,
    extension: String,
}

impl CoordinateSpecifier {
    /// Parse a coordinate string.
    ///
    /// # Examples
    /// ```
    /// use profile_launch::core::maven::CoordinateSpecifier;
    /// let c = CoordinateSpecifier::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
    /// assert_eq!(c.group_id(), "net.sf.jopt-simple");
    /// ```
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        let re = cached_regex(&SPECIFIER_REGEX, SPECIFIER_PATTERN)?;
        let caps = re
            .captures(raw)
            .ok_or_else(|| LauncherError::InvalidSpecifier(raw.to_string()))?;

        let part = |idx: usize| caps.get(idx).map(|m| m.as_str().to_string());

        match (part(1), part(2), part(3)) {
            (Some(group_id), Some(artifact_id), Some(version)) => Ok(Self {
                group_id,
                artifact_id,
                version,
                classifier: part(4),
                extension: part(5).unwrap_or_else(|| "jar".to_string()),
            }),
            _ => Err(LauncherError::InvalidSpecifier(raw.to_string())),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Copy of this coordinate with the classifier replaced.
    pub fn with_classifier(&self, classifier: &str) -> Self {
        let mut out = self.clone();
        out.classifier = Some(classifier.to_string());
        out
    }

    /// Serialize back into coordinate form. The default `jar` extension is elided.
    pub fn serialize(&self) -> String {
        let mut out = format!("{}:{}:{}", self.group_id, self.artifact_id, self.version);
        if let Some(classifier) = &self.classifier {
            out.push(':');
            out.push_str(classifier);
        }
        if self.extension != "jar" {
            out.push('@');
            out.push_str(&self.extension);
        }
        out
    }

    /// `artifactId-version[-classifier].extension`
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, c, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension),
        }
    }

    /// `group/path/artifactId/version`
    pub fn base_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version
        )
    }

    /// Relative storage path, always `/`-separated so it can double as a URL suffix.
    pub fn to_path(&self, filename_override: Option<&str>) -> String {
        let filename = match filename_override {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.file_name(),
        };
        format!("{}/{}", self.base_path(), filename)
    }

    /// Dedupe key comparison: group, artifact and classifier. Version is ignored.
    pub fn match_name(&self, other: &CoordinateSpecifier) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.classifier == other.classifier
    }
}

impl PartialEq for CoordinateSpecifier {
    fn eq(&self, other: &Self) -> bool {
        self.match_name(other) && self.version == other.version
    }
}

impl Hash for CoordinateSpecifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group_id.hash(state);
        self.artifact_id.hash(state);
        self.version.hash(state);
        self.classifier.hash(state);
    }
}

impl fmt::Display for CoordinateSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl std::str::FromStr for CoordinateSpecifier {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CoordinateSpecifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&CoordinateSpecifier::serialize(self))
    }
}

impl<'de> Deserialize<'de> for CoordinateSpecifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CoordinateSpecifier::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_coordinate() {
        let c = CoordinateSpecifier::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        assert_eq!(c.group_id(), "net.sf.jopt-simple");
        assert_eq!(c.artifact_id(), "jopt-simple");
        assert_eq!(c.version(), "5.0.4");
        assert_eq!(c.classifier(), None);
        assert_eq!(c.extension(), "jar");
    }

    #[test]
    fn parse_with_classifier_and_extension() {
        let c = CoordinateSpecifier::parse("org.lwjgl:lwjgl:3.3.3:natives-windows@zip").unwrap();
        assert_eq!(c.classifier(), Some("natives-windows"));
        assert_eq!(c.extension(), "zip");
    }

    #[test]
    fn rejects_incomplete_coordinates() {
        assert!(CoordinateSpecifier::parse("org.lwjgl:lwjgl").is_err());
        assert!(CoordinateSpecifier::parse("").is_err());
        assert!(CoordinateSpecifier::parse("a:b:c:d:e").is_err());
        assert!(CoordinateSpecifier::parse("a:b:1@").is_err());
    }

    #[test]
    fn serialize_round_trips() {
        for raw in [
            "net.minecraft:launchwrapper:1.12",
            "org.lwjgl.lwjgl:lwjgl-platform:2.9.4:natives-osx",
            "com.example:pack:1.0@zip",
            "com.example:pack:1.0:sources@txt",
        ] {
            assert_eq!(CoordinateSpecifier::parse(raw).unwrap().serialize(), raw);
        }
        let elided = CoordinateSpecifier::parse("a.b:c:1.0@jar").unwrap();
        assert_eq!(elided.serialize(), "a.b:c:1.0");
    }

    #[test]
    fn to_path_for_native_classifier() {
        let c = CoordinateSpecifier::parse("org.lwjgl.lwjgl:lwjgl-platform:2.9.4:natives-osx")
            .unwrap();
        assert_eq!(
            c.to_path(None),
            "org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-osx.jar"
        );
    }

    #[test]
    fn to_path_honors_filename_override() {
        let c = CoordinateSpecifier::parse("org.multimc.jarmods:abc:1").unwrap();
        assert_eq!(c.to_path(Some("mod.zip")), "org/multimc/jarmods/abc/1/mod.zip");
        assert_eq!(c.to_path(Some("")), "org/multimc/jarmods/abc/1/abc-1.jar");
    }

    #[test]
    fn match_name_ignores_version_but_not_classifier() {
        let a = CoordinateSpecifier::parse("org.ow2.asm:asm:9.1").unwrap();
        let b = CoordinateSpecifier::parse("org.ow2.asm:asm:9.7").unwrap();
        let c = CoordinateSpecifier::parse("org.ow2.asm:asm:9.7:sources").unwrap();
        assert!(a.match_name(&b));
        assert!(!b.match_name(&c));
    }

    #[test]
    fn equality_ignores_extension() {
        let a = CoordinateSpecifier::parse("a:b:1").unwrap();
        let b = CoordinateSpecifier::parse("a:b:1@zip").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, CoordinateSpecifier::parse("a:b:2").unwrap());
    }

    #[test]
    fn serde_uses_string_form() {
        let c: CoordinateSpecifier = serde_json::from_str("\"a.b:c:1.0:natives\"").unwrap();
        assert_eq!(c.classifier(), Some("natives"));
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"a.b:c:1.0:natives\"");
    }
}
