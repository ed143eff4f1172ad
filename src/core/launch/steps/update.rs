// ─── Update ───
// Runs the download jobs an instance needs before launch, forwarding their events.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;

use crate::core::downloader::{DownloadJob, JobEvent, JobOutcome};
use crate::core::error::LauncherResult;
use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

/// Everything the update step has to do, computed when the step starts.
#[derive(Default)]
pub struct UpdatePlan {
    pub jobs: Vec<Box<dyn DownloadJob>>,
    /// Libraries marked `local` whose files are missing.
    pub failed_local_files: Vec<String>,
}

/// Builds the plan. Runs on the blocking pool since it hashes local files.
pub type UpdatePlanner = Arc<dyn Fn() -> LauncherResult<UpdatePlan> + Send + Sync>;

pub struct Update {
    planner: UpdatePlanner,
}

impl Update {
    pub fn new(planner: UpdatePlanner) -> Self {
        Self { planner }
    }
}

fn forward(ctx: &StepContext, event: JobEvent) {
    match event {
        JobEvent::Progress { current, total } => ctx.progress(current, total),
        JobEvent::Status(status) => ctx.status(status),
        JobEvent::Log(line) => ctx.log(line, MessageLevel::Launcher),
    }
}

#[async_trait]
impl LaunchStep for Update {
    fn name(&self) -> &str {
        "Update"
    }

    fn can_abort(&self) -> bool {
        true
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        let planner = self.planner.clone();
        let planning = tokio::task::spawn_blocking(move || planner());
        let planned = tokio::select! {
            joined = planning => joined,
            _ = ctx.aborted() => return StepOutcome::Aborted,
        };
        let plan = match planned {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => return StepOutcome::failed(format!("Could not prepare the game update: {}", e)),
            Err(e) => return StepOutcome::failed(format!("Update planning stopped unexpectedly: {}", e)),
        };

        if !plan.failed_local_files.is_empty() {
            let reason = format!(
                "Some libraries marked as 'local' are missing their jar files:\n{}",
                plan.failed_local_files.join("\n")
            );
            ctx.log(reason.clone(), MessageLevel::Fatal);
            return StepOutcome::Failed(reason);
        }

        for job in &plan.jobs {
            info!("Running update job {} ({} items)", job.name(), job.size());
            let (tx, mut rx) = unbounded_channel();
            let run = job.run(tx);
            tokio::pin!(run);

            let outcome = loop {
                tokio::select! {
                    outcome = &mut run => break outcome,
                    Some(event) = rx.recv() => forward(ctx, event),
                    _ = ctx.aborted() => return StepOutcome::Aborted,
                }
            };
            while let Ok(event) = rx.try_recv() {
                forward(ctx, event);
            }

            if let JobOutcome::Failed { failed_files, reason } = outcome {
                let mut message = format!("Game update failed: {}", reason);
                if !failed_files.is_empty() {
                    message.push_str("\nFailed files:\n");
                    message.push_str(&failed_files.join("\n"));
                }
                ctx.log(message.clone(), MessageLevel::Error);
                return StepOutcome::Failed(message);
            }
        }
        StepOutcome::Succeeded
    }
}
