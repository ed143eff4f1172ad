// ─── Assets Index ───
// Content-addressed asset store (`objects/<hh>/<hash>`) and reconstruction of the virtual
// or resources tree older game versions read from.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::downloader::DownloadRequest;
use crate::core::error::{LauncherError, LauncherResult};

pub const RESOURCE_BASE: &str = "https://resources.download.minecraft.net/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// `<hh>/<hash>`
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.hash.get(..2).unwrap_or_default(), self.hash)
    }

    pub fn local_path(&self, assets_root: &Path) -> PathBuf {
        assets_root.join("objects").join(self.relative_path())
    }

    pub fn url(&self) -> String {
        format!("{}{}", RESOURCE_BASE, self.relative_path())
    }

    /// Request for this object if it is missing or has the wrong size.
    pub fn download_request(&self, assets_root: &Path) -> Option<DownloadRequest> {
        let path = self.local_path(assets_root);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() == self.size => None,
            _ => Some(
                DownloadRequest::new(self.url(), path)
                    .with_sha1(self.hash.clone())
                    .with_size(self.size),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetsIndex {
    pub id: String,
    pub is_virtual: bool,
    pub map_to_resources: bool,
    /// Virtual path -> object.
    pub objects: BTreeMap<String, AssetObject>,
}

/// Files copied and skipped by one reconstruction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconstructReport {
    pub target: Option<PathBuf>,
    pub copied: usize,
    pub missing_objects: usize,
    pub leftovers: usize,
    /// Index keys that would land outside the target tree.
    pub rejected: usize,
}

pub fn index_path(assets_root: &Path, id: &str) -> PathBuf {
    assets_root.join("indexes").join(format!("{}.json", id))
}

impl AssetsIndex {
    pub fn from_json(id: &str, value: &serde_json::Value, file: &str) -> LauncherResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| LauncherError::validation(file, "asset index is not an object"))?;

        let flag = |key: &str| obj.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        let mut index = AssetsIndex {
            id: id.to_string(),
            is_virtual: flag("virtual"),
            map_to_resources: flag("map_to_resources"),
            objects: BTreeMap::new(),
        };

        let objects = obj
            .get("objects")
            .and_then(|v| v.as_object())
            .ok_or_else(|| LauncherError::validation(file, "asset index has no 'objects'"))?;
        for (path, entry) in objects {
            let hash = entry
                .get("hash")
                .and_then(|v| v.as_str())
                .filter(|h| h.len() > 2 && h.chars().all(|c| c.is_ascii_hexdigit()))
                .ok_or_else(|| LauncherError::validation(file, format!("asset {} has no valid hash", path)))?;
            let size = entry
                .get("size")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| LauncherError::validation(file, format!("asset {} has no size", path)))?;
            index.objects.insert(
                path.clone(),
                AssetObject {
                    hash: hash.to_string(),
                    size,
                },
            );
        }
        Ok(index)
    }

    /// Load `indexes/<id>.json` below `assets_root`.
    pub fn load(assets_root: &Path, id: &str) -> LauncherResult<Self> {
        let path = index_path(assets_root, id);
        let content = std::fs::read_to_string(&path).map_err(|e| LauncherError::io(&path, e))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| LauncherError::validation(path.display().to_string(), e.to_string()))?;
        Self::from_json(id, &value, &path.display().to_string())
    }

    /// Where the game should look for assets of this index.
    pub fn target_dir(&self, assets_root: &Path, resources_dir: &Path) -> Option<PathBuf> {
        if self.is_virtual {
            Some(assets_root.join("virtual").join(&self.id))
        } else if self.map_to_resources {
            Some(resources_dir.to_path_buf())
        } else {
            None
        }
    }

    /// Requests for every object missing from the store, one per hash.
    pub fn download_requests(&self, assets_root: &Path) -> Vec<DownloadRequest> {
        let mut seen = BTreeSet::new();
        self.objects
            .values()
            .filter(|object| seen.insert(object.hash.clone()))
            .filter_map(|object| object.download_request(assets_root))
            .collect()
    }

    /// Copy objects into the virtual or resources tree.
    ///
    /// Objects not yet in the store are skipped and existing targets are left alone, so a
    /// second run over a complete tree copies nothing. Copies are staged next to the target
    /// and renamed into place.
    pub fn reconstruct(&self, assets_root: &Path, resources_dir: &Path) -> LauncherResult<ReconstructReport> {
        let Some(target_root) = self.target_dir(assets_root, resources_dir) else {
            return Ok(ReconstructReport::default());
        };
        info!("Reconstructing assets {} at {:?}", self.id, target_root);

        let mut report = ReconstructReport {
            target: Some(target_root.clone()),
            ..Default::default()
        };
        let mut present = BTreeSet::new();
        collect_files(&target_root, &mut present);

        for (virtual_path, object) in &self.objects {
            if !is_contained(virtual_path) {
                warn!("Ignoring asset with unsafe path {:?} in {}", virtual_path, self.id);
                report.rejected += 1;
                continue;
            }
            let original = object.local_path(assets_root);
            if !original.is_file() {
                report.missing_objects += 1;
                continue;
            }

            let target = target_root.join(virtual_path);
            present.remove(&target);
            if target.exists() {
                continue;
            }
            copy_into_place(&original, &target)?;
            report.copied += 1;
        }

        if self.is_virtual {
            for leftover in &present {
                debug!("Leftover asset not in index: {:?}", leftover);
            }
            report.leftovers = present.len();
        }
        if report.missing_objects > 0 {
            warn!(
                "{} assets of {} are not downloaded yet",
                report.missing_objects, self.id
            );
        }
        Ok(report)
    }
}

/// Effective game assets directory for index `id`.
pub fn assets_dir_for(assets_root: &Path, id: &str, resources_dir: &Path) -> PathBuf {
    let virtual_root = assets_root.join("virtual").join(id);
    match AssetsIndex::load(assets_root, id) {
        Ok(index) => index
            .target_dir(assets_root, resources_dir)
            .unwrap_or_else(|| assets_root.to_path_buf()),
        Err(_) => virtual_root,
    }
}

/// Relative path made only of plain names.
fn is_contained(virtual_path: &str) -> bool {
    let path = Path::new(virtual_path);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn copy_into_place(original: &Path, target: &Path) -> LauncherResult<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let mut staged_name = target.as_os_str().to_os_string();
    staged_name.push(format!(".{}.tmp", std::process::id()));
    let staged = PathBuf::from(staged_name);

    std::fs::copy(original, &staged).map_err(|e| LauncherError::io(&staged, e))?;
    if target.exists() {
        // Someone else finished it first.
        let _ = std::fs::remove_file(&staged);
        return Ok(());
    }
    std::fs::rename(&staged, target).map_err(|e| LauncherError::io(target, e))
}

fn collect_files(dir: &Path, out: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.insert(path);
        }
    }
}
