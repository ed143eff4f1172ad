use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

/// Ensures the game root exists before anything writes into it.
pub struct CreateGameFolders {
    game_root: PathBuf,
}

impl CreateGameFolders {
    pub fn new(game_root: impl Into<PathBuf>) -> Self {
        Self {
            game_root: game_root.into(),
        }
    }
}

#[async_trait]
impl LaunchStep for CreateGameFolders {
    fn name(&self) -> &str {
        "CreateGameFolders"
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        if let Err(e) = tokio::fs::create_dir_all(&self.game_root).await {
            ctx.log(format!("Couldn't create the main game folder: {}", e), MessageLevel::Error);
            return StepOutcome::failed("Couldn't create the main game folder");
        }

        // The game fails to download server resource packs without this folder.
        let packs = self.game_root.join("server-resource-packs");
        if let Err(e) = tokio::fs::create_dir_all(&packs).await {
            ctx.log(
                format!("Couldn't create the 'server-resource-packs' folder: {}", e),
                MessageLevel::Error,
            );
        }
        StepOutcome::Succeeded
    }
}
