use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

/// One downloadable file from Mojang metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MojangDownloadInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

impl MojangDownloadInfo {
    /// Parse and validate; `sha1` and `url` are mandatory.
    pub fn from_json(value: &serde_json::Value, file: &str) -> LauncherResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| LauncherError::validation(file, "download info is not an object"))?;

        let required = |key: &str| -> LauncherResult<String> {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| LauncherError::validation(file, format!("download info is missing '{}'", key)))
        };

        Ok(Self {
            path: obj
                .get("path")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            sha1: required("sha1")?,
            size: obj.get("size").and_then(|v| v.as_u64()).unwrap_or_default(),
            url: required("url")?,
        })
    }
}

/// `downloads` block of a library: the plain artifact and per-classifier natives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MojangLibraryDownloadInfo {
    pub artifact: Option<MojangDownloadInfo>,
    pub classifiers: BTreeMap<String, MojangDownloadInfo>,
}

impl MojangLibraryDownloadInfo {
    pub fn from_json(value: &serde_json::Value, file: &str) -> LauncherResult<Self> {
        let mut out = Self::default();
        if let Some(artifact) = value.get("artifact") {
            out.artifact = Some(MojangDownloadInfo::from_json(artifact, file)?);
        }
        if let Some(classifiers) = value.get("classifiers").and_then(|v| v.as_object()) {
            for (classifier, info) in classifiers {
                out.classifiers
                    .insert(classifier.clone(), MojangDownloadInfo::from_json(info, file)?);
            }
        }
        Ok(out)
    }

    /// Artifact for an empty classifier, otherwise the named classifier.
    pub fn get_download_info(&self, classifier: &str) -> Option<&MojangDownloadInfo> {
        if classifier.is_empty() {
            return self.artifact.as_ref();
        }
        self.classifiers.get(classifier)
    }
}

/// `downloads` block of a Mojang version (client, server, mappings ...).
pub type MojangDownloads = BTreeMap<String, MojangDownloadInfo>;

pub fn downloads_from_json(value: &serde_json::Value, file: &str) -> LauncherResult<MojangDownloads> {
    let mut out = MojangDownloads::new();
    if let Some(obj) = value.as_object() {
        for (key, info) in obj {
            out.insert(key.clone(), MojangDownloadInfo::from_json(info, file)?);
        }
    }
    Ok(out)
}
