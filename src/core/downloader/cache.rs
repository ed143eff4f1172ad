// ─── Metadata Cache ───
// Tracks files in the shared stores by namespace + relative path so resolution can tell
// whether a local copy is still good without re-downloading it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

/// One tracked file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaEntry {
    pub base: String,
    #[serde(rename = "path")]
    pub relative_path: String,
    #[serde(skip)]
    pub full_path: PathBuf,
    #[serde(skip)]
    pub stale: bool,
    #[serde(default)]
    pub md5sum: String,
    #[serde(default)]
    pub etag: String,
    /// Local mtime (ms since epoch) at the time the md5 was taken.
    #[serde(default)]
    pub local_changed_timestamp: i64,
    /// Eternal entries never expire on their own.
    #[serde(default)]
    pub eternal: bool,
}

impl MetaEntry {
    fn untracked(base: &str, relative_path: &str, full_path: PathBuf) -> Self {
        Self {
            base: base.to_string(),
            relative_path: relative_path.to_string(),
            full_path,
            stale: true,
            ..Default::default()
        }
    }
}

/// Metadata cache seam consumed by library and asset resolution.
pub trait MetaCache: Send + Sync {
    /// Look up (or create) the entry for `relative_path` under namespace `base`,
    /// with `stale` set when the local file needs fetching.
    fn resolve_entry(&self, base: &str, relative_path: &str) -> MetaEntry;

    /// Record a freshly written file. Persisting may be deferred until [`flush`].
    ///
    /// [`flush`]: MetaCache::flush
    fn update_entry(&self, entry: &MetaEntry) -> LauncherResult<()>;

    /// Forget an entry so the next resolution treats it as stale.
    fn evict_entry(&self, entry: &MetaEntry);

    /// Persist pending updates.
    fn flush(&self) -> LauncherResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    version: String,
    entries: Vec<MetaEntry>,
}

const INDEX_VERSION: &str = "1";

/// JSON-backed cache. Namespaces map to root directories registered with [`add_base`].
///
/// [`add_base`]: FileMetaCache::add_base
pub struct FileMetaCache {
    index_path: PathBuf,
    bases: RwLock<HashMap<String, PathBuf>>,
    entries: Mutex<HashMap<(String, String), MetaEntry>>,
    dirty: AtomicBool,
}

impl FileMetaCache {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            bases: RwLock::new(HashMap::new()),
            entries: Mutex::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load the index at `index_path`. A missing or unreadable index starts empty.
    pub fn load(index_path: impl Into<PathBuf>) -> Self {
        let cache = Self::new(index_path);
        match std::fs::read_to_string(&cache.index_path) {
            Ok(content) => match serde_json::from_str::<CacheIndex>(&content) {
                Ok(index) if index.version == INDEX_VERSION => {
                    let mut entries = cache.lock_entries();
                    for entry in index.entries {
                        entries.insert((entry.base.clone(), entry.relative_path.clone()), entry);
                    }
                    debug!("Loaded {} cache entries from {:?}", entries.len(), cache.index_path);
                }
                Ok(index) => warn!(
                    "Ignoring cache index {:?} with unknown version {}",
                    cache.index_path, index.version
                ),
                Err(e) => warn!("Ignoring corrupt cache index {:?}: {}", cache.index_path, e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not read cache index {:?}: {}", cache.index_path, e),
        }
        cache
    }

    pub fn add_base(&self, base: &str, root: impl Into<PathBuf>) {
        let mut bases = match self.bases.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        bases.insert(base.to_string(), root.into());
    }

    pub fn base_path(&self, base: &str) -> Option<PathBuf> {
        let bases = match self.bases.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        bases.get(base).cloned()
    }

    /// Write the index. Staged to a per-process sibling file and renamed into place.
    pub fn save(&self) -> LauncherResult<()> {
        self.dirty.store(false, Ordering::SeqCst);
        let mut entries: Vec<MetaEntry> = self.lock_entries().values().cloned().collect();
        entries.sort_by(|a, b| (&a.base, &a.relative_path).cmp(&(&b.base, &b.relative_path)));
        let index = CacheIndex {
            version: INDEX_VERSION.to_string(),
            entries,
        };

        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let staged = self
            .index_path
            .with_extension(format!("json.{}.tmp", std::process::id()));
        let payload = serde_json::to_vec_pretty(&index)?;
        let written = std::fs::write(&staged, payload)
            .map_err(|e| LauncherError::io(&staged, e))
            .and_then(|_| {
                std::fs::rename(&staged, &self.index_path)
                    .map_err(|e| LauncherError::io(&self.index_path, e))
            });
        if written.is_err() {
            let _ = std::fs::remove_file(&staged);
            self.dirty.store(true, Ordering::SeqCst);
        }
        written
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), MetaEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl MetaCache for FileMetaCache {
    fn resolve_entry(&self, base: &str, relative_path: &str) -> MetaEntry {
        let Some(root) = self.base_path(base) else {
            warn!("Cache base {} is not registered", base);
            return MetaEntry::untracked(base, relative_path, PathBuf::from(relative_path));
        };
        let full_path = root.join(relative_path);
        let key = (base.to_string(), relative_path.to_string());

        let mut entries = self.lock_entries();
        let Some(entry) = entries.get_mut(&key) else {
            // Untracked files are never trusted, whatever is on disk.
            return MetaEntry::untracked(base, relative_path, full_path);
        };

        entry.full_path = full_path.clone();
        let Some(mtime) = modified_millis(&full_path) else {
            entry.stale = true;
            return entry.clone();
        };

        if mtime != entry.local_changed_timestamp {
            match md5_file(&full_path) {
                Ok(md5sum) if md5sum == entry.md5sum => {
                    entry.local_changed_timestamp = mtime;
                    entry.stale = false;
                }
                Ok(_) => {
                    debug!("{:?} changed on disk, marking stale", full_path);
                    entry.stale = true;
                }
                Err(_) => entry.stale = true,
            }
        } else {
            entry.stale = false;
        }
        entry.clone()
    }

    fn update_entry(&self, entry: &MetaEntry) -> LauncherResult<()> {
        let mut updated = entry.clone();
        updated.md5sum = md5_file(&entry.full_path)?;
        updated.local_changed_timestamp = modified_millis(&entry.full_path).unwrap_or_default();
        updated.stale = false;
        self.lock_entries().insert(
            (updated.base.clone(), updated.relative_path.clone()),
            updated,
        );
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn evict_entry(&self, entry: &MetaEntry) {
        let removed = self
            .lock_entries()
            .remove(&(entry.base.clone(), entry.relative_path.clone()));
        if removed.is_some() {
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    fn flush(&self) -> LauncherResult<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        self.save()
    }
}

fn modified_millis(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(chrono::DateTime::<chrono::Utc>::from(modified).timestamp_millis())
}

fn md5_file(path: &Path) -> LauncherResult<String> {
    let bytes = std::fs::read(path).map_err(|e| LauncherError::io(path, e))?;
    let mut hasher = Md5::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pl_cache_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_is_stale() {
        let root = temp_root("missing");
        let cache = FileMetaCache::new(root.join("index.json"));
        cache.add_base("libraries", root.join("libraries"));

        let entry = cache.resolve_entry("libraries", "a/b/1/b-1.jar");
        assert!(entry.stale);
        assert_eq!(entry.full_path, root.join("libraries").join("a/b/1/b-1.jar"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn updated_entry_is_fresh_and_persisted() {
        let root = temp_root("update");
        let index = root.join("index.json");
        let cache = FileMetaCache::new(&index);
        cache.add_base("libraries", root.join("libraries"));

        let mut entry = cache.resolve_entry("libraries", "x/y.jar");
        std::fs::create_dir_all(entry.full_path.parent().unwrap()).unwrap();
        std::fs::write(&entry.full_path, b"payload").unwrap();
        entry.etag = "\"abc\"".to_string();
        cache.update_entry(&entry).unwrap();
        assert!(!index.exists());
        assert!(cache.is_dirty());
        cache.flush().unwrap();
        assert!(!cache.is_dirty());
        assert!(!root.join(format!("index.json.{}.tmp", std::process::id())).exists());

        let reloaded = FileMetaCache::load(&index);
        reloaded.add_base("libraries", root.join("libraries"));
        let again = reloaded.resolve_entry("libraries", "x/y.jar");
        assert!(!again.stale);
        assert_eq!(again.etag, "\"abc\"");
        assert_eq!(again.md5sum, md5_file(&entry.full_path).unwrap());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn evicted_entry_with_missing_file_goes_stale() {
        let root = temp_root("evict");
        let cache = FileMetaCache::new(root.join("index.json"));
        cache.add_base("assets", root.join("assets"));

        let entry = cache.resolve_entry("assets", "objects/ab/abcd");
        std::fs::create_dir_all(entry.full_path.parent().unwrap()).unwrap();
        std::fs::write(&entry.full_path, b"x").unwrap();
        cache.update_entry(&entry).unwrap();
        assert!(!cache.resolve_entry("assets", "objects/ab/abcd").stale);

        cache.evict_entry(&entry);
        std::fs::remove_file(&entry.full_path).unwrap();
        assert!(cache.resolve_entry("assets", "objects/ab/abcd").stale);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unknown_base_is_stale() {
        let root = temp_root("nobase");
        let cache = FileMetaCache::new(root.join("index.json"));
        assert!(cache.resolve_entry("nope", "file").stale);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn untracked_file_on_disk_is_stale() {
        let root = temp_root("untracked");
        let cache = FileMetaCache::new(root.join("index.json"));
        cache.add_base("libraries", root.join("libraries"));

        let jar = root.join("libraries/com/example/lib/1.0/lib-1.0.jar");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"trunc").unwrap();

        let entry = cache.resolve_entry("libraries", "com/example/lib/1.0/lib-1.0.jar");
        assert!(entry.stale);
        assert_eq!(entry.full_path, jar);
        assert!(!cache.is_dirty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn flush_without_updates_writes_nothing() {
        let root = temp_root("noflush");
        let index = root.join("index.json");
        let cache = FileMetaCache::new(&index);
        cache.add_base("assets", root.join("assets"));
        let _ = cache.resolve_entry("assets", "objects/00/0000");
        cache.flush().unwrap();
        assert!(!index.exists());
        let _ = std::fs::remove_dir_all(&root);
    }
}
