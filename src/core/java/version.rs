use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::pattern::cached_regex;

static LEGACY_PATTERN: OnceLock<Regex> = OnceLock::new();
static MODERN_PATTERN: OnceLock<Regex> = OnceLock::new();

/// A Java version string such as `1.8.0_51` or `17.0.2`.
#[derive(Debug, Clone, Default)]
pub struct JavaVersion {
    raw: String,
    parseable: bool,
    pub major: u32,
    pub minor: u32,
    pub security: u32,
    pub prerelease: String,
}

impl JavaVersion {
    pub fn parse(raw: &str) -> Self {
        let mut version = JavaVersion {
            raw: raw.to_string(),
            ..Default::default()
        };
        let pattern = if raw.starts_with("1.") {
            cached_regex(
                &LEGACY_PATTERN,
                r"1[.](?P<major>[0-9]+)([.](?P<minor>[0-9]+))?(_(?P<security>[0-9]+)?)?(-(?P<prerelease>[a-zA-Z0-9]+))?",
            )
        } else {
            cached_regex(
                &MODERN_PATTERN,
                r"(?P<major>[0-9]+)([.](?P<minor>[0-9]+))?([.](?P<security>[0-9]+))?(-(?P<prerelease>[a-zA-Z0-9]+))?",
            )
        };
        let Ok(pattern) = pattern else {
            return version;
        };
        let Some(caps) = pattern.captures(raw) else {
            return version;
        };

        let number = |name: &str| {
            caps.name(name)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0)
        };
        version.parseable = true;
        version.major = number("major");
        version.minor = number("minor");
        version.security = number("security");
        version.prerelease = caps
            .name("prerelease")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        version
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_parseable(&self) -> bool {
        self.parseable
    }

    /// Java before 8 still has a permanent generation. Unknown versions are assumed old.
    pub fn requires_perm_gen(&self) -> bool {
        !self.parseable || self.major < 8
    }
}

impl PartialEq for JavaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for JavaVersion {}

impl PartialOrd for JavaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JavaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        if !(self.parseable && other.parseable) {
            return self.raw.cmp(&other.raw);
        }
        (self.major, self.minor, self.security)
            .cmp(&(other.major, other.minor, other.security))
            .then_with(|| match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                (true, true) => Ordering::Equal,
                (false, true) => Ordering::Less,
                (true, false) => Ordering::Greater,
                (false, false) => self.prerelease.cmp(&other.prerelease),
            })
    }
}

impl fmt::Display for JavaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_and_modern_majors() {
        let eight = JavaVersion::parse("1.8.0_51");
        assert_eq!((eight.major, eight.minor, eight.security), (8, 0, 51));
        assert!(!eight.requires_perm_gen());

        let seventeen = JavaVersion::parse("17.0.2");
        assert_eq!(seventeen.major, 17);
        assert!(JavaVersion::parse("1.7.0_80").requires_perm_gen());
        assert!(JavaVersion::parse("garbage").requires_perm_gen());
    }

    #[test]
    fn prerelease_sorts_before_release() {
        assert!(JavaVersion::parse("9-ea") < JavaVersion::parse("9"));
        assert!(JavaVersion::parse("1.8.0_51") < JavaVersion::parse("17.0.2"));
    }
}
