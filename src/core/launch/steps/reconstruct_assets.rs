use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::core::assets::AssetsIndex;
use crate::core::instance::MinecraftInstance;
use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

/// Rebuilds virtual and resource-mapped asset trees. Failures are logged, never fatal.
pub struct ReconstructAssets {
    instance: Arc<MinecraftInstance>,
}

impl ReconstructAssets {
    pub fn new(instance: Arc<MinecraftInstance>) -> Self {
        Self { instance }
    }
}

#[async_trait]
impl LaunchStep for ReconstructAssets {
    fn name(&self) -> &str {
        "ReconstructAssets"
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        let assets_id = match self.instance.profile() {
            Ok(profile) => profile.get_minecraft_assets().id,
            Err(e) => {
                ctx.log(format!("Failed to reconstruct Minecraft assets: {}", e), MessageLevel::Error);
                return StepOutcome::Succeeded;
            }
        };
        ctx.status("Reconstructing assets...");

        let assets_root = self.instance.assets_root();
        let resources_dir = self.instance.resources_dir();
        let result = tokio::task::spawn_blocking(move || {
            let index = AssetsIndex::load(&assets_root, &assets_id)?;
            index.reconstruct(&assets_root, &resources_dir)
        })
        .await;

        match result {
            Ok(Ok(report)) => {
                if let Some(target) = report.target {
                    ctx.log(
                        format!(
                            "Reconstructed assets in {} ({} copied)",
                            target.display(),
                            report.copied
                        ),
                        MessageLevel::Launcher,
                    );
                }
            }
            Ok(Err(e)) => {
                warn!("Asset reconstruction failed: {}", e);
                ctx.log(format!("Failed to reconstruct Minecraft assets: {}", e), MessageLevel::Error);
            }
            Err(e) => {
                ctx.log(format!("Failed to reconstruct Minecraft assets: {}", e), MessageLevel::Error);
            }
        }
        StepOutcome::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::model::tests::temp_instance;
    use crate::core::launch::task::{LaunchTask, TaskOutcome};

    #[tokio::test]
    async fn missing_index_is_not_fatal() {
        let (base, instance) = temp_instance("reconstruct");
        let (mut task, _rx) = LaunchTask::new();
        task.append_step(Box::new(ReconstructAssets::new(instance)));
        assert_eq!(task.run().await, TaskOutcome::Succeeded);
        let _ = std::fs::remove_dir_all(&base);
    }
}
