// ─── Asset Update Job ───
// Fetches the asset index for a profile, then every object it names that is not yet stored.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use super::asset_index::{index_path, AssetsIndex};
use crate::core::downloader::{DownloadJob, DownloadRequest, Downloader, HttpDownloadJob, JobEvent, JobOutcome, NetMode};
use crate::core::version::MojangAssetIndexInfo;

pub struct AssetUpdateJob {
    info: MojangAssetIndexInfo,
    assets_root: PathBuf,
    downloader: Arc<Downloader>,
    mode: NetMode,
}

impl AssetUpdateJob {
    pub fn new(info: MojangAssetIndexInfo, assets_root: impl Into<PathBuf>, downloader: Arc<Downloader>, mode: NetMode) -> Self {
        Self {
            info,
            assets_root: assets_root.into(),
            downloader,
            mode,
        }
    }

    fn index_request(&self) -> DownloadRequest {
        let target = index_path(&self.assets_root, &self.info.id);
        // An index we only know by id is re-used when the server cannot be reached.
        DownloadRequest::new(&self.info.url, target)
            .with_sha1(self.info.sha1.clone())
            .with_size(self.info.size)
            .accepting_local(true)
    }
}

#[async_trait]
impl DownloadJob for AssetUpdateJob {
    fn name(&self) -> &str {
        "assets"
    }

    fn size(&self) -> usize {
        1
    }

    async fn run(&self, events: UnboundedSender<JobEvent>) -> JobOutcome {
        let index_file = index_path(&self.assets_root, &self.info.id);
        let _ = events.send(JobEvent::Status(format!("Updating asset index {}", self.info.id)));

        if self.mode == NetMode::Online {
            if let Err(e) = self.downloader.download(&self.index_request()).await {
                warn!("Asset index {} could not be fetched: {}", self.info.id, e);
                return JobOutcome::Failed {
                    failed_files: vec![index_file.display().to_string()],
                    reason: e.to_string(),
                };
            }
        }

        let index = match AssetsIndex::load(&self.assets_root, &self.info.id) {
            Ok(index) => index,
            Err(e) => {
                return JobOutcome::Failed {
                    failed_files: vec![index_file.display().to_string()],
                    reason: format!("Failed to read the assets index: {}", e),
                }
            }
        };

        let requests = index.download_requests(&self.assets_root);
        info!(
            "Asset index {}: {} objects, {} to fetch",
            index.id,
            index.objects.len(),
            requests.len()
        );

        let mut objects = HttpDownloadJob::new("asset objects", self.downloader.clone(), self.mode);
        objects.extend(requests);
        objects.run(events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_update_with_complete_store_succeeds() {
        let root = std::env::temp_dir().join(format!("pl_asset_job_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let hash = "0a4d55a8d778e5022fab701977c5d840bbc486d0";
        let object = root.join("objects").join(&hash[..2]).join(hash);
        std::fs::create_dir_all(object.parent().unwrap()).unwrap();
        std::fs::write(&object, b"hello world\n").unwrap();
        let index = index_path(&root, "legacy");
        std::fs::create_dir_all(index.parent().unwrap()).unwrap();
        std::fs::write(
            &index,
            format!(r#"{{"virtual": true, "objects": {{"a.txt": {{"hash": "{}", "size": 12}}}}}}"#, hash),
        )
        .unwrap();

        let downloader = Arc::new(Downloader::new().unwrap());
        let job = AssetUpdateJob::new(MojangAssetIndexInfo::from_id("legacy"), &root, downloader, NetMode::Offline);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        assert_eq!(job.run(tx).await, JobOutcome::Succeeded);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn offline_update_without_index_fails() {
        let root = std::env::temp_dir().join(format!("pl_asset_job_missing_{}", std::process::id()));
        let downloader = Arc::new(Downloader::new().unwrap());
        let job = AssetUpdateJob::new(MojangAssetIndexInfo::from_id("legacy"), &root, downloader, NetMode::Offline);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        assert!(matches!(job.run(tx).await, JobOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn offline_update_with_missing_objects_fails() {
        let root = std::env::temp_dir().join(format!("pl_asset_job_offline_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let present = "0a4d55a8d778e5022fab701977c5d840bbc486d0";
        let absent = "5ff04807c356f1beed0b86ccf659b44b9983e3fa";
        let object = root.join("objects").join(&present[..2]).join(present);
        std::fs::create_dir_all(object.parent().unwrap()).unwrap();
        std::fs::write(&object, b"hello world\n").unwrap();
        let index = index_path(&root, "1.20");
        std::fs::create_dir_all(index.parent().unwrap()).unwrap();
        std::fs::write(
            &index,
            serde_json::json!({
                "objects": {
                    "minecraft/lang/en_us.json": {"hash": present, "size": 12},
                    "minecraft/sounds/ambient/cave/cave1.ogg": {"hash": absent, "size": 3}
                }
            })
            .to_string(),
        )
        .unwrap();

        let downloader = Arc::new(Downloader::new().unwrap());
        let job = AssetUpdateJob::new(MojangAssetIndexInfo::from_id("1.20"), &root, downloader, NetMode::Offline);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        match job.run(tx).await {
            JobOutcome::Failed { failed_files, reason } => {
                let expected = root.join("objects").join(&absent[..2]).join(absent);
                assert_eq!(failed_files, vec![expected.display().to_string()]);
                assert!(reason.contains("offline"));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let _ = std::fs::remove_dir_all(&root);
    }
}
