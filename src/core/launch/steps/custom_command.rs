// ─── Custom Command ───
// Runs the user's pre-launch or post-exit command with the instance variables exported.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::core::launch::message::MessageLevel;
use crate::core::launch::process::forward_output;
use crate::core::launch::script::{expand_variables, split_args};
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    PreLaunch,
    PostExit,
}

impl CommandKind {
    pub fn label(self) -> &'static str {
        match self {
            CommandKind::PreLaunch => "Pre-Launch",
            CommandKind::PostExit => "Post-Exit",
        }
    }
}

pub struct CustomCommand {
    kind: CommandKind,
    command: String,
    working_dir: PathBuf,
    variables: BTreeMap<String, String>,
}

impl CustomCommand {
    pub fn new(
        kind: CommandKind,
        command: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            kind,
            command: command.into(),
            working_dir: working_dir.into(),
            variables,
        }
    }
}

#[async_trait]
impl LaunchStep for CustomCommand {
    fn name(&self) -> &str {
        match self.kind {
            CommandKind::PreLaunch => "PreLaunchCommand",
            CommandKind::PostExit => "PostExitCommand",
        }
    }

    fn can_abort(&self) -> bool {
        true
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        let label = self.kind.label();
        let command = expand_variables(&self.command, &self.variables);
        ctx.log(format!("Running {} command: {}", label, command), MessageLevel::Launcher);

        let mut args = split_args(&command);
        if args.is_empty() {
            return StepOutcome::failed(format!("{} command is empty", label));
        }
        let program = args.remove(0);

        let spawned = Command::new(&program)
            .args(&args)
            .current_dir(&self.working_dir)
            .envs(&self.variables)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let reason = format!("Failed to run {} command: {}", label, e);
                ctx.log(reason.clone(), MessageLevel::Fatal);
                return StepOutcome::Failed(reason);
            }
        };
        let readers = forward_output(&mut child, ctx);

        let status = tokio::select! {
            status = child.wait() => status,
            _ = ctx.aborted() => {
                let _ = child.kill().await;
                ctx.log(format!("{} command was aborted", label), MessageLevel::Launcher);
                return StepOutcome::Aborted;
            }
        };
        for reader in readers {
            let _ = reader.await;
        }

        match status {
            Ok(status) if status.success() => {
                ctx.log(format!("{} command ran successfully.\n\n", label), MessageLevel::Launcher);
                StepOutcome::Succeeded
            }
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                info!("{} command exited with {}", label, code);
                let reason = format!("{} command failed with code {}.\n\n", label, code);
                ctx.log(reason.clone(), MessageLevel::Fatal);
                StepOutcome::Failed(reason)
            }
            Err(e) => StepOutcome::failed(format!("{} command failed: {}", label, e)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::launch::task::{LaunchEvent, LaunchTask, TaskOutcome};

    fn vars() -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("INST_NAME".to_string(), "Test".to_string());
        vars
    }

    #[tokio::test]
    async fn successful_command_logs_output() {
        let (mut task, mut rx) = LaunchTask::new();
        task.append_step(Box::new(CustomCommand::new(
            CommandKind::PreLaunch,
            "echo $INST_NAME",
            std::env::temp_dir(),
            vars(),
        )));
        assert_eq!(task.run().await, TaskOutcome::Succeeded);

        let mut saw_output = false;
        while let Ok(event) = rx.try_recv() {
            if let LaunchEvent::Log { line, .. } = event {
                saw_output |= line == "Test";
            }
        }
        assert!(saw_output);
    }

    #[tokio::test]
    async fn failing_command_reports_code() {
        let (mut task, _rx) = LaunchTask::new();
        task.append_step(Box::new(CustomCommand::new(
            CommandKind::PostExit,
            "sh -c 'exit 3'",
            std::env::temp_dir(),
            BTreeMap::new(),
        )));
        match task.run().await {
            TaskOutcome::Failed { reason, .. } => assert!(reason.starts_with("Post-Exit command failed with code 3")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
