use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::cache::{MetaCache, MetaEntry};
use super::lock::{lock_path_for, CacheLock};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;

/// A single file to fetch, with optional SHA-1 / size for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub target: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    /// Cache entry to refresh once the file is in place.
    pub cache_entry: Option<MetaEntry>,
    /// Keep an existing local copy when the fetch fails.
    pub accept_local: bool,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            target: target.into(),
            sha1: None,
            size: None,
            cache_entry: None,
            accept_local: false,
        }
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        let sha1 = sha1.into();
        self.sha1 = if sha1.is_empty() { None } else { Some(sha1) };
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = if size == 0 { None } else { Some(size) };
        self
    }

    pub fn with_cache_entry(mut self, entry: MetaEntry) -> Self {
        self.cache_entry = Some(entry);
        self
    }

    pub fn accepting_local(mut self, accept: bool) -> Self {
        self.accept_local = accept;
        self
    }
}

/// Concurrent, SHA-1 validated downloader writing into the shared stores.
pub struct Downloader {
    client: Client,
    cache: Option<Arc<dyn MetaCache>>,
}

impl Downloader {
    pub fn new() -> LauncherResult<Self> {
        Ok(Self {
            client: build_http_client()?,
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Arc<dyn MetaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    // ── Single file download ────────────────────────────

    /// Fetch one request into place.
    ///
    /// The body is validated in memory, written to `<target>.part` and renamed, all while
    /// holding `<target>.lock` so concurrent launchers never see a partial file.
    pub async fn download(&self, request: &DownloadRequest) -> LauncherResult<()> {
        match self.fetch(request).await {
            Ok(()) => Ok(()),
            Err(e) if request.accept_local && request.target.exists() => {
                warn!(
                    "Download of {} failed ({}), keeping local {:?}",
                    request.url, e, request.target
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, request: &DownloadRequest) -> LauncherResult<()> {
        let dest = &request.target;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let _lock = CacheLock::acquire(&lock_path_for(dest)).await?;

        // Another process may have finished this file while we waited for the lock.
        if request.sha1.is_some() && local_copy_is_valid(request).await {
            debug!("Already present: {:?}", dest);
            self.refresh_cache_entry(request, None);
            return Ok(());
        }

        let mut builder = self.client.get(&request.url);
        if let Some(entry) = &request.cache_entry {
            if !entry.etag.is_empty() && dest.exists() {
                builder = builder.header(IF_NONE_MATCH, entry.etag.as_str());
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            debug!("Not modified: {}", request.url);
            self.refresh_cache_entry(request, None);
            return Ok(());
        }
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        if let Some(expected) = &request.sha1 {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let staged = part_path(dest);
        {
            let mut file = tokio::fs::File::create(&staged)
                .await
                .map_err(|e| LauncherError::io(&staged, e))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| LauncherError::io(&staged, e))?;
            file.flush().await.map_err(|e| LauncherError::io(&staged, e))?;
        }
        tokio::fs::rename(&staged, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;

        self.refresh_cache_entry(request, etag);
        debug!("Downloaded: {} -> {:?}", request.url, dest);
        Ok(())
    }

    fn refresh_cache_entry(&self, request: &DownloadRequest, etag: Option<String>) {
        let (Some(cache), Some(entry)) = (&self.cache, &request.cache_entry) else {
            return;
        };
        let mut entry = entry.clone();
        entry.full_path = request.target.clone();
        if let Some(etag) = etag {
            entry.etag = etag;
        }
        if let Err(e) = cache.update_entry(&entry) {
            warn!("Could not update cache entry for {:?}: {}", request.target, e);
        }
    }

    /// Persist cache entries recorded by the downloads so far.
    pub fn flush_cache(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.flush() {
                warn!("Could not save the metadata cache: {}", e);
            }
        }
    }

    /// Validate an existing file's SHA-1.
    pub async fn validate_sha1(path: &Path, expected: &str) -> LauncherResult<bool> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        Ok(sha1_hex(&bytes).eq_ignore_ascii_case(expected))
    }
}

async fn local_copy_is_valid(request: &DownloadRequest) -> bool {
    let Ok(meta) = tokio::fs::metadata(&request.target).await else {
        return false;
    };
    if let Some(size) = request.size {
        if meta.len() != size {
            return false;
        }
    }
    match &request.sha1 {
        Some(expected) => Downloader::validate_sha1(&request.target, expected)
            .await
            .unwrap_or(false),
        None => true,
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_drops_empty_validation_fields() {
        let req = DownloadRequest::new("https://example.invalid/a.jar", "/tmp/a.jar")
            .with_sha1("")
            .with_size(0);
        assert_eq!(req.sha1, None);
        assert_eq!(req.size, None);
        assert!(!req.accept_local);
    }

    #[test]
    fn part_path_appends_suffix() {
        let p = part_path(Path::new("/cache/libraries/x-1.jar"));
        assert_eq!(p, PathBuf::from("/cache/libraries/x-1.jar.part"));
    }

    #[tokio::test]
    async fn valid_local_copy_is_detected() {
        let dir = std::env::temp_dir().join(format!("pl_dl_local_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let target = dir.join("obj");
        std::fs::write(&target, b"hello").unwrap();

        let good = DownloadRequest::new("https://example.invalid/obj", &target)
            .with_sha1(sha1_hex(b"hello"))
            .with_size(5);
        assert!(local_copy_is_valid(&good).await);

        let wrong_size = good.clone().with_size(6);
        assert!(!local_copy_is_valid(&wrong_size).await);

        let wrong_hash = good.with_sha1("00");
        assert!(!local_copy_is_valid(&wrong_hash).await);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn accept_local_keeps_existing_file_on_failure() {
        let dir = std::env::temp_dir().join(format!("pl_dl_accept_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let target = dir.join("forge.jar");
        std::fs::write(&target, b"local build").unwrap();

        let downloader = Downloader::new().unwrap();
        // Nothing listens on the discard port, so the fetch fails.
        let req = DownloadRequest::new("http://127.0.0.1:9/forge.jar", &target).accepting_local(true);
        downloader.download(&req).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"local build");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
