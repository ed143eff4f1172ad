// ─── Download Jobs ───
// Generic asynchronous jobs the update step runs in sequence. Each job reports progress
// over a channel and finishes with exactly one outcome.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use super::client::{DownloadRequest, Downloader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Progress { current: u64, total: u64 },
    Status(String),
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed {
        failed_files: Vec<String>,
        reason: String,
    },
}

impl JobOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        JobOutcome::Failed {
            failed_files: Vec::new(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetMode {
    #[default]
    Online,
    Offline,
}

#[async_trait]
pub trait DownloadJob: Send + Sync {
    fn name(&self) -> &str;

    /// Number of units of work (files) in the job.
    fn size(&self) -> usize;

    /// Run to completion. Dropping the future cancels outstanding transfers.
    async fn run(&self, events: UnboundedSender<JobEvent>) -> JobOutcome;
}

/// Fetches a list of [`DownloadRequest`]s through a shared [`Downloader`].
pub struct HttpDownloadJob {
    name: String,
    requests: Vec<DownloadRequest>,
    downloader: Arc<Downloader>,
    mode: NetMode,
    concurrency: usize,
}

impl HttpDownloadJob {
    pub fn new(name: impl Into<String>, downloader: Arc<Downloader>, mode: NetMode) -> Self {
        Self {
            name: name.into(),
            requests: Vec::new(),
            downloader,
            mode,
            concurrency: 8,
        }
    }

    pub fn add(&mut self, request: DownloadRequest) {
        self.requests.push(request);
    }

    pub fn extend(&mut self, requests: impl IntoIterator<Item = DownloadRequest>) {
        self.requests.extend(requests);
    }

    pub fn requests(&self) -> &[DownloadRequest] {
        &self.requests
    }
}

#[async_trait]
impl DownloadJob for HttpDownloadJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.requests.len()
    }

    async fn run(&self, events: UnboundedSender<JobEvent>) -> JobOutcome {
        let total = self.requests.len() as u64;
        if total == 0 {
            return JobOutcome::Succeeded;
        }

        if self.mode == NetMode::Offline {
            let failed_files: Vec<String> = self
                .requests
                .iter()
                .map(|r| r.target.display().to_string())
                .collect();
            warn!("{}: {} files missing while offline", self.name, failed_files.len());
            return JobOutcome::Failed {
                failed_files,
                reason: "Cannot download files while offline".to_string(),
            };
        }

        let _ = events.send(JobEvent::Status(format!("Downloading {}", self.name)));
        info!("{}: fetching {} files", self.name, total);

        let mut completed = 0_u64;
        let mut failed_files = Vec::new();
        let mut first_error = None;

        let downloader = self.downloader.clone();
        let mut results = stream::iter(self.requests.clone())
            .map(move |request| {
                let downloader = downloader.clone();
                async move {
                    let result = downloader.download(&request).await;
                    (request, result)
                }
            })
            .buffer_unordered(self.concurrency);

        while let Some((request, result)) = results.next().await {
            completed += 1;
            if let Err(e) = result {
                let _ = events.send(JobEvent::Log(format!("Failed to download {}: {}", request.url, e)));
                failed_files.push(request.target.display().to_string());
                first_error.get_or_insert_with(|| e.to_string());
            }
            let _ = events.send(JobEvent::Progress {
                current: completed,
                total,
            });
        }
        self.downloader.flush_cache();

        if failed_files.is_empty() {
            JobOutcome::Succeeded
        } else {
            JobOutcome::Failed {
                reason: format!(
                    "{} of {} downloads failed: {}",
                    failed_files.len(),
                    total,
                    first_error.unwrap_or_default()
                ),
                failed_files,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::{FileMetaCache, MetaCache};

    #[tokio::test]
    async fn empty_job_succeeds() {
        let downloader = Arc::new(Downloader::new().unwrap());
        let job = HttpDownloadJob::new("libraries", downloader, NetMode::Online);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        assert_eq!(job.run(tx).await, JobOutcome::Succeeded);
    }

    #[tokio::test]
    async fn offline_job_reports_every_missing_file() {
        let downloader = Arc::new(Downloader::new().unwrap());
        let mut job = HttpDownloadJob::new("assets", downloader, NetMode::Offline);
        job.add(DownloadRequest::new("https://example.invalid/a", "/nowhere/a"));
        job.add(DownloadRequest::new("https://example.invalid/b", "/nowhere/b"));
        assert_eq!(job.size(), 2);

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        match job.run(tx).await {
            JobOutcome::Failed { failed_files, .. } => assert_eq!(failed_files.len(), 2),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn online_job_collects_failures_and_saves_cache() {
        let dir = std::env::temp_dir().join(format!("pl_job_online_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("libraries/present")).unwrap();
        std::fs::write(dir.join("libraries/present/ok.jar"), b"hello").unwrap();

        let cache = Arc::new(FileMetaCache::new(dir.join("index.json")));
        cache.add_base("libraries", dir.join("libraries"));
        let downloader = Arc::new(Downloader::new().unwrap().with_cache(cache.clone()));

        let present = cache.resolve_entry("libraries", "present/ok.jar");
        assert!(present.stale);
        let mut job = HttpDownloadJob::new("libraries", downloader, NetMode::Online);
        job.add(
            DownloadRequest::new("http://127.0.0.1:9/ok.jar", present.full_path.clone())
                .with_sha1("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
                .with_size(5)
                .with_cache_entry(present),
        );
        // Nothing listens on the discard port.
        job.add(DownloadRequest::new("http://127.0.0.1:9/gone.jar", dir.join("libraries/gone.jar")));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        match job.run(tx).await {
            JobOutcome::Failed { failed_files, reason } => {
                assert_eq!(failed_files, vec![dir.join("libraries/gone.jar").display().to_string()]);
                assert!(reason.starts_with("1 of 2 downloads failed"));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let mut progress = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, JobEvent::Progress { .. }) {
                progress += 1;
            }
        }
        assert_eq!(progress, 2);
        assert!(dir.join("index.json").exists());
        assert!(!cache.resolve_entry("libraries", "present/ok.jar").stale);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
