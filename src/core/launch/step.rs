// ─── Launch Steps ───
// One unit of the launch pipeline and the context it runs in.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::message::MessageLevel;
use super::task::{LaunchEvent, TaskShared, TaskState};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum StepState {
    NotStarted,
    Running,
    Succeeded,
    Failed(String),
    Aborted,
}

/// The single terminal report of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    Aborted,
}

impl StepOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        StepOutcome::Failed(reason.into())
    }
}

#[async_trait]
pub trait LaunchStep: Send + Sync {
    fn name(&self) -> &str;

    /// Whether an abort may be delivered while this step runs.
    fn can_abort(&self) -> bool {
        false
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome;

    /// Cleanup once the task ends, called for every step that started, newest first.
    async fn finalize(&mut self, _ctx: &StepContext) {}
}

/// Handle a step uses to talk to its task. Cheap to clone into spawned readers.
#[derive(Clone)]
pub struct StepContext {
    pub(super) shared: Arc<TaskShared>,
    pub(super) abort_rx: watch::Receiver<bool>,
    pub(super) proceed_rx: watch::Receiver<bool>,
}

impl StepContext {
    /// Emit a log line after level detection and censoring.
    pub fn log(&self, line: impl Into<String>, level: MessageLevel) {
        self.shared.log(line.into(), level);
    }

    pub fn log_lines<I, S>(&self, lines: I, level: MessageLevel)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.log(line, level);
        }
    }

    pub fn status(&self, status: impl Into<String>) {
        self.shared.emit(LaunchEvent::Status(status.into()));
    }

    pub fn progress(&self, current: u64, total: u64) {
        self.shared.emit(LaunchEvent::Progress { current, total });
    }

    pub fn censor(&self, text: &str) -> String {
        self.shared.censor_private_info(text)
    }

    pub fn set_abortable(&self, abortable: bool) {
        self.shared.can_abort.store(abortable, Ordering::SeqCst);
    }

    pub fn is_abort_requested(&self) -> bool {
        *self.abort_rx.borrow()
    }

    /// Resolves once an abort has been delivered to the running step.
    pub async fn aborted(&self) {
        let mut rx = self.abort_rx.clone();
        let _ = rx.wait_for(|requested| *requested).await;
    }

    /// Tell the task the step is waiting for [`LaunchHandle::proceed`](super::LaunchHandle::proceed).
    pub fn ready_for_launch(&self) {
        self.shared.set_state(TaskState::Waiting);
        self.shared.emit(LaunchEvent::ReadyForLaunch);
    }

    /// Resolves once the task was told to proceed.
    pub async fn proceeded(&self) {
        let mut rx = self.proceed_rx.clone();
        let _ = rx.wait_for(|proceed| *proceed).await;
    }

    pub fn set_pid(&self, pid: Option<u32>) {
        self.shared.set_pid(pid);
    }
}
