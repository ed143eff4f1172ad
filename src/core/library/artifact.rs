// ─── Library ───
// One dependency artifact: coordinate + natives + rules + download metadata, resolved
// against a runtime context into local paths and download requests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::download_info::MojangLibraryDownloadInfo;
use crate::core::downloader::{DownloadRequest, MetaCache};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{CoordinateSpecifier, LIBRARY_BASE};
use crate::core::rules::{evaluate, rules_from_json, Rule, RuntimeContext};

pub const HINT_LOCAL: &str = "local";
pub const HINT_ALWAYS_STALE: &str = "always-stale";

const ARCH_TOKEN: &str = "${arch}";

#[derive(Debug, Clone)]
pub struct Library {
    pub name: CoordinateSpecifier,
    /// OS or `os-arch` key -> classifier template (may contain `${arch}`).
    pub native_classifiers: BTreeMap<String, String>,
    pub rules: Vec<Rule>,
    pub repository_url: String,
    pub absolute_url: String,
    /// Storage filename override.
    pub filename: String,
    pub display_name: String,
    /// `""`, `local`, `always-stale` or `forge-pack-xz`.
    pub hint: String,
    pub extract_excludes: Vec<String>,
    pub storage_prefix: String,
    pub mojang_downloads: Option<MojangLibraryDownloadInfo>,
}

/// Local paths partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicableFiles {
    pub jar: Vec<PathBuf>,
    pub native: Vec<PathBuf>,
    pub native32: Vec<PathBuf>,
    pub native64: Vec<PathBuf>,
}

impl Library {
    pub fn new(name: CoordinateSpecifier) -> Self {
        Self {
            name,
            native_classifiers: BTreeMap::new(),
            rules: Vec::new(),
            repository_url: String::new(),
            absolute_url: String::new(),
            filename: String::new(),
            display_name: String::new(),
            hint: String::new(),
            extract_excludes: Vec::new(),
            storage_prefix: "libraries/".to_string(),
            mojang_downloads: None,
        }
    }

    /// Read the Mojang library fields (`name`, `url`, `natives`, `extract`, `rules`, `downloads`).
    pub fn from_json(value: &serde_json::Value, file: &str) -> LauncherResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| LauncherError::validation(file, "library is not an object"))?;
        let raw_name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LauncherError::validation(file, "library is missing 'name'"))?;

        let mut lib = Library::new(CoordinateSpecifier::parse(raw_name)?);

        if let Some(url) = obj.get("url").and_then(|v| v.as_str()) {
            lib.repository_url = url.to_string();
        }
        if let Some(natives) = obj.get("natives").and_then(|v| v.as_object()) {
            for (os, classifier) in natives {
                if let Some(classifier) = classifier.as_str() {
                    lib.native_classifiers
                        .insert(os.clone(), classifier.to_string());
                }
            }
        }
        if let Some(excludes) = obj
            .get("extract")
            .and_then(|v| v.get("exclude"))
            .and_then(|v| v.as_array())
        {
            lib.extract_excludes = excludes
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
        }
        if let Some(rules) = obj.get("rules") {
            lib.rules = rules_from_json(rules);
        }
        if let Some(downloads) = obj.get("downloads") {
            lib.mojang_downloads = Some(MojangLibraryDownloadInfo::from_json(downloads, file)?);
        }
        Ok(lib)
    }

    pub fn is_native(&self) -> bool {
        !self.native_classifiers.is_empty()
    }

    pub fn is_local(&self) -> bool {
        self.hint == HINT_LOCAL
    }

    pub fn is_always_stale(&self) -> bool {
        self.hint == HINT_ALWAYS_STALE
    }

    /// Classifier template for the context: precise `os-arch` key first, bare OS on legacy archs.
    pub fn get_compatible_native(&self, ctx: &RuntimeContext) -> Option<&str> {
        if let Some(classifier) = self.native_classifiers.get(&ctx.classifier()) {
            return Some(classifier);
        }
        if ctx.is_legacy_arch() {
            return self.native_classifiers.get(&ctx.system).map(String::as_str);
        }
        None
    }

    pub fn is_active(&self, ctx: &RuntimeContext) -> bool {
        if !evaluate(&self.rules, ctx) {
            return false;
        }
        !self.is_native() || self.get_compatible_native(ctx).is_some()
    }

    /// Path below the storage prefix, still containing `${arch}` when the template does.
    pub fn storage_suffix(&self, ctx: &RuntimeContext) -> String {
        let filename = Some(self.filename.as_str());
        if !self.is_native() {
            return self.name.to_path(filename);
        }
        let classifier = self.get_compatible_native(ctx).unwrap_or("INVALID");
        self.name.with_classifier(classifier).to_path(filename)
    }

    /// Filename of the stored artifact for this context.
    pub fn storage_filename(&self, ctx: &RuntimeContext) -> String {
        let suffix = self.storage_suffix(ctx);
        suffix.rsplit('/').next().unwrap_or_default().to_string()
    }

    /// Local paths this library contributes, partitioned by kind.
    ///
    /// Local-hint libraries resolve directly under `override_path` when one is given.
    pub fn get_applicable_files(
        &self,
        ctx: &RuntimeContext,
        out: &mut ApplicableFiles,
        override_path: Option<&Path>,
        storage_root: &Path,
    ) {
        if !self.is_active(ctx) {
            return;
        }

        let actual_path = |rel: &str| -> PathBuf {
            let stored = storage_root.join(&self.storage_prefix).join(rel);
            match override_path {
                Some(dir) if self.is_local() => match stored.file_name() {
                    Some(name) => dir.join(name),
                    None => stored,
                },
                _ => stored,
            }
        };

        let storage = self.storage_suffix(ctx);
        if self.is_native() {
            if storage.contains(ARCH_TOKEN) {
                out.native32.push(actual_path(&storage.replace(ARCH_TOKEN, "32")));
                out.native64.push(actual_path(&storage.replace(ARCH_TOKEN, "64")));
            } else {
                out.native.push(actual_path(&storage));
            }
        } else {
            out.jar.push(actual_path(&storage));
        }
    }

    /// Requests for whatever this library still needs fetched.
    ///
    /// Missing local-hint files are appended to `failed_local_files` instead of being
    /// requested.
    pub fn get_downloads(
        &self,
        ctx: &RuntimeContext,
        cache: &dyn MetaCache,
        failed_local_files: &mut Vec<String>,
        override_path: Option<&Path>,
    ) -> Vec<DownloadRequest> {
        let mut out = Vec::new();
        if !self.is_active(ctx) {
            return out;
        }

        let raw_storage = self.storage_suffix(ctx);

        let mut add_download = |storage: &str, url: &str, sha1: &str, size: u64| {
            if self.is_local() {
                let file_name = storage.rsplit('/').next().unwrap_or(storage);
                let local = match override_path {
                    Some(dir) => dir.join(file_name),
                    None => cache.resolve_entry("libraries", storage).full_path,
                };
                if !local.exists() {
                    failed_local_files.push(local.display().to_string());
                }
                return;
            }

            let mut entry = cache.resolve_entry("libraries", storage);
            if self.is_always_stale() {
                entry.stale = true;
            }
            if !entry.stale {
                return;
            }
            out.push(
                DownloadRequest::new(url, entry.full_path.clone())
                    .with_sha1(sha1)
                    .with_size(size)
                    .accepting_local(self.is_always_stale())
                    .with_cache_entry(entry),
            );
        };

        if let Some(downloads) = &self.mojang_downloads {
            if self.is_native() {
                match self.get_compatible_native(ctx) {
                    None => debug!(
                        "Ignoring native library {} with no classifier for this OS",
                        self.name
                    ),
                    Some(classifier) if classifier.contains(ARCH_TOKEN) => {
                        for bits in ["32", "64"] {
                            let cooked = classifier.replace(ARCH_TOKEN, bits);
                            if let Some(info) = downloads.get_download_info(&cooked) {
                                add_download(
                                    &raw_storage.replace(ARCH_TOKEN, bits),
                                    &info.url,
                                    &info.sha1,
                                    info.size,
                                );
                            }
                        }
                    }
                    Some(classifier) => {
                        if let Some(info) = downloads.get_download_info(classifier) {
                            add_download(&raw_storage, &info.url, &info.sha1, info.size);
                        }
                    }
                }
            } else if let Some(info) = &downloads.artifact {
                add_download(&raw_storage, &info.url, &info.sha1, info.size);
            } else {
                debug!("Ignoring java library {} with no artifact", self.name);
            }
        } else {
            let raw_url = if !self.absolute_url.is_empty() {
                self.absolute_url.clone()
            } else if self.repository_url.is_empty() {
                format!("{}{}", LIBRARY_BASE, raw_storage)
            } else if self.repository_url.ends_with('/') {
                format!("{}{}", self.repository_url, raw_storage)
            } else {
                format!("{}/{}", self.repository_url, raw_storage)
            };

            if raw_storage.contains(ARCH_TOKEN) {
                for bits in ["32", "64"] {
                    add_download(
                        &raw_storage.replace(ARCH_TOKEN, bits),
                        &raw_url.replace(ARCH_TOKEN, bits),
                        "",
                        0,
                    );
                }
            } else {
                add_download(&raw_storage, &raw_url, "", 0);
            }
        }
        out
    }
}

/// A library loaded as `-javaagent`, with an optional agent argument.
#[derive(Debug, Clone)]
pub struct Agent {
    pub library: Library,
    pub argument: String,
}

impl Agent {
    pub fn new(library: Library, argument: impl Into<String>) -> Self {
        Self {
            library,
            argument: argument.into(),
        }
    }

    /// `-javaagent:<jar>[=<argument>]` for every jar the agent library resolves to.
    pub fn java_arguments(&self, ctx: &RuntimeContext, storage_root: &Path) -> Vec<String> {
        let mut files = ApplicableFiles::default();
        self.library
            .get_applicable_files(ctx, &mut files, None, storage_root);
        files
            .jar
            .iter()
            .map(|jar| {
                let mut arg = format!("-javaagent:{}", jar.display());
                if !self.argument.is_empty() {
                    arg.push('=');
                    arg.push_str(&self.argument);
                }
                arg
            })
            .collect()
    }
}
