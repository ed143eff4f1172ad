use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::error::{LauncherError, LauncherResult};

/// A dependency (or conflict) on another component. Identity is the `uid` alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Require {
    pub uid: String,
    /// Exact version required, empty for any.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub equals: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suggests: String,
}

pub type RequireSet = BTreeSet<Require>;

impl Require {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            ..Default::default()
        }
    }

    pub fn exact(uid: &str, version: &str) -> Self {
        Self {
            uid: uid.to_string(),
            equals: version.to_string(),
            suggests: String::new(),
        }
    }
}

impl PartialEq for Require {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Require {}

impl PartialOrd for Require {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Require {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uid.cmp(&other.uid)
    }
}

/// Parse a `requires` / `conflicts` array.
pub fn requires_from_json(value: &serde_json::Value, file: &str) -> LauncherResult<RequireSet> {
    let items = value
        .as_array()
        .ok_or_else(|| LauncherError::validation(file, "requirements must be an array"))?;

    let mut out = RequireSet::new();
    for item in items {
        let uid = item
            .get("uid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LauncherError::validation(file, "requirement is missing 'uid'"))?;
        let text = |key: &str| {
            item.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        out.insert(Require {
            uid: uid.to_string(),
            equals: text("equals"),
            suggests: text("suggests"),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_uid_is_a_no_op() {
        let mut set = RequireSet::new();
        assert!(set.insert(Require::exact("net.minecraft", "1.12.2")));
        assert!(!set.insert(Require::exact("net.minecraft", "1.7.10")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().equals, "1.12.2");
    }

    #[test]
    fn parses_requirement_list() {
        let json = serde_json::json!([
            {"uid": "net.minecraft", "equals": "1.12.2"},
            {"uid": "org.lwjgl", "suggests": "2.9.4"}
        ]);
        let set = requires_from_json(&json, "forge.json").unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Require::new("org.lwjgl")));

        let bad = serde_json::json!([{"equals": "1"}]);
        assert!(requires_from_json(&bad, "forge.json").is_err());
    }
}
