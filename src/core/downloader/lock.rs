// ─── Cache Lock ───
// Cross-process lock file guarding writes into the shared artifact and asset stores.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};

const LOCK_STALE_SECS: i64 = 60 * 10;
const LOCK_WAIT_LIMIT: Duration = Duration::from_secs(60 * 5);
const LOCK_POLL: Duration = Duration::from_millis(250);

/// Sibling lock path for a cache target, `<target>.lock`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Held while a process stages and renames a file into the shared cache.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    /// Wait until `lock_path` can be created exclusively.
    pub async fn acquire(lock_path: &Path) -> LauncherResult<Self> {
        Self::acquire_within(lock_path, LOCK_WAIT_LIMIT).await
    }

    /// [`acquire`](Self::acquire), giving up once `limit` has passed.
    pub async fn acquire_within(lock_path: &Path, limit: Duration) -> LauncherResult<Self> {
        if let Some(parent) = lock_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let deadline = tokio::time::Instant::now() + limit;
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            match tokio::fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(lock_path)
                .await
            {
                Ok(mut file) => {
                    let payload = serde_json::json!({
                        "pid": std::process::id(),
                        "timestamp": Utc::now().timestamp(),
                    });
                    file.write_all(payload.to_string().as_bytes())
                        .await
                        .map_err(|e| LauncherError::io(lock_path, e))?;
                    return Ok(Self {
                        path: lock_path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if remove_if_stale(lock_path).await {
                        continue;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(LauncherError::Other(format!(
                            "Timed out waiting for cache lock {}",
                            lock_path.display()
                        )));
                    }
                    if attempts % 20 == 0 {
                        info!("Waiting for cache lock at {:?}", lock_path);
                    }
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(e) => return Err(LauncherError::io(lock_path, e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove lock {:?}: {}", self.path, e);
        }
    }
}

/// Remove the lock at `lock_path` if its holder is gone. Returns whether it was removed.
async fn remove_if_stale(lock_path: &Path) -> bool {
    let Ok(content) = tokio::fs::read_to_string(lock_path).await else {
        return false;
    };

    let stale = match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(value) => holder_is_gone(&value),
        // Empty or garbled: the writer died before finishing, or is about to finish.
        Err(_) => lock_age_secs(lock_path).await.unwrap_or_default() > LOCK_STALE_SECS,
    };

    if !stale {
        return false;
    }
    warn!("Removing stale cache lock {:?}", lock_path);
    tokio::fs::remove_file(lock_path).await.is_ok()
}

fn holder_is_gone(value: &serde_json::Value) -> bool {
    let pid = value.get("pid").and_then(|v| v.as_u64()).unwrap_or_default() as u32;
    let timestamp = value
        .get("timestamp")
        .and_then(|v| v.as_i64())
        .unwrap_or_default();
    let expired = Utc::now().timestamp().saturating_sub(timestamp) > LOCK_STALE_SECS;

    #[cfg(target_os = "linux")]
    let dead = !PathBuf::from(format!("/proc/{pid}")).exists();
    #[cfg(not(target_os = "linux"))]
    let dead = {
        let _ = pid;
        false
    };

    expired || dead
}

async fn lock_age_secs(lock_path: &Path) -> Option<i64> {
    let modified = tokio::fs::metadata(lock_path).await.ok()?.modified().ok()?;
    let age = SystemTime::now().duration_since(modified).ok()?;
    Some(age.as_secs() as i64)
}
