// ─── Launch Task ───
// Runs launch steps strictly one after another and reports exactly one terminal event.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::message::{guess_level, MessageLevel};
use super::step::{LaunchStep, StepContext, StepOutcome, StepState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    NotStarted,
    Running,
    Waiting,
    Finished,
    Failed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    Log { line: String, level: MessageLevel },
    Status(String),
    Progress { current: u64, total: u64 },
    StepStarted { index: usize, name: String },
    ReadyForLaunch,
    Succeeded,
    Failed { reason: String, fatal: bool },
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed { reason: String, fatal: bool },
    Aborted,
}

pub(super) struct TaskShared {
    state: Mutex<TaskState>,
    step_states: Mutex<Vec<StepState>>,
    pid: Mutex<Option<u32>>,
    pub(super) can_abort: AtomicBool,
    abort_tx: watch::Sender<bool>,
    proceed_tx: watch::Sender<bool>,
    events: UnboundedSender<LaunchEvent>,
    censor_filter: Mutex<BTreeMap<String, String>>,
    terminal_sent: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl TaskShared {
    pub(super) fn emit(&self, event: LaunchEvent) {
        let _ = self.events.send(event);
    }

    fn emit_terminal(&self, event: LaunchEvent) {
        if !self.terminal_sent.swap(true, Ordering::SeqCst) {
            self.emit(event);
        }
    }

    pub(super) fn state(&self) -> TaskState {
        *lock(&self.state)
    }

    pub(super) fn set_state(&self, state: TaskState) {
        *lock(&self.state) = state;
    }

    pub(super) fn set_pid(&self, pid: Option<u32>) {
        *lock(&self.pid) = pid;
    }

    fn set_step_state(&self, index: usize, state: StepState) {
        if let Some(slot) = lock(&self.step_states).get_mut(index) {
            *slot = state;
        }
    }

    pub(super) fn censor_private_info(&self, text: &str) -> String {
        let filter = lock(&self.censor_filter);
        filter
            .iter()
            .filter(|(secret, _)| !secret.is_empty())
            .fold(text.to_string(), |acc, (secret, placeholder)| acc.replace(secret.as_str(), placeholder))
    }

    pub(super) fn log(&self, mut line: String, level: MessageLevel) {
        let mut level = level;
        let inner = MessageLevel::from_line(&mut line);
        if inner != MessageLevel::Unknown {
            level = inner;
        }
        if level.is_undetermined() {
            level = guess_level(&line, level);
        }
        let line = self.censor_private_info(&line);
        self.emit(LaunchEvent::Log { line, level });
    }
}

/// Remote control for a running [`LaunchTask`].
#[derive(Clone)]
pub struct LaunchHandle {
    shared: Arc<TaskShared>,
}

impl LaunchHandle {
    pub fn state(&self) -> TaskState {
        self.shared.state()
    }

    pub fn step_states(&self) -> Vec<StepState> {
        lock(&self.shared.step_states).clone()
    }

    pub fn pid(&self) -> Option<u32> {
        *lock(&self.shared.pid)
    }

    /// Let a step waiting for launch continue. Ignored unless the task is waiting.
    pub fn proceed(&self) -> bool {
        let mut state = lock(&self.shared.state);
        if *state != TaskState::Waiting {
            return false;
        }
        *state = TaskState::Running;
        self.shared.proceed_tx.send_replace(true);
        true
    }

    pub fn can_abort(&self) -> bool {
        match self.state() {
            TaskState::Aborted | TaskState::Failed | TaskState::Finished => false,
            TaskState::NotStarted => true,
            TaskState::Running | TaskState::Waiting => self.shared.can_abort.load(Ordering::SeqCst),
        }
    }

    /// Deliver an abort to the running step. Returns whether the abort was accepted.
    pub fn abort(&self) -> bool {
        let mut state = lock(&self.shared.state);
        match *state {
            TaskState::Aborted | TaskState::Failed | TaskState::Finished => true,
            TaskState::NotStarted => {
                *state = TaskState::Aborted;
                drop(state);
                self.shared.emit_terminal(LaunchEvent::Failed {
                    reason: "Aborted".to_string(),
                    fatal: true,
                });
                true
            }
            TaskState::Running | TaskState::Waiting => {
                if !self.shared.can_abort.load(Ordering::SeqCst) {
                    return false;
                }
                self.shared.abort_tx.send_replace(true);
                true
            }
        }
    }
}

/// An ordered list of steps sharing one context.
pub struct LaunchTask {
    steps: Vec<Box<dyn LaunchStep>>,
    shared: Arc<TaskShared>,
    abort_rx: watch::Receiver<bool>,
    proceed_rx: watch::Receiver<bool>,
}

impl LaunchTask {
    pub fn new() -> (Self, UnboundedReceiver<LaunchEvent>) {
        let (events, rx) = unbounded_channel();
        let (abort_tx, abort_rx) = watch::channel(false);
        let (proceed_tx, proceed_rx) = watch::channel(false);
        let shared = Arc::new(TaskShared {
            state: Mutex::new(TaskState::NotStarted),
            step_states: Mutex::new(Vec::new()),
            pid: Mutex::new(None),
            can_abort: AtomicBool::new(false),
            abort_tx,
            proceed_tx,
            events,
            censor_filter: Mutex::new(BTreeMap::new()),
            terminal_sent: AtomicBool::new(false),
        });
        (
            Self {
                steps: Vec::new(),
                shared,
                abort_rx,
                proceed_rx,
            },
            rx,
        )
    }

    pub fn append_step(&mut self, step: Box<dyn LaunchStep>) {
        self.steps.push(step);
        lock(&self.shared.step_states).push(StepState::NotStarted);
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Secret -> placeholder pairs applied to every log line.
    pub fn set_censor_filter(&self, filter: BTreeMap<String, String>) {
        *lock(&self.shared.censor_filter) = filter;
    }

    pub fn censor_private_info(&self, text: &str) -> String {
        self.shared.censor_private_info(text)
    }

    pub fn handle(&self) -> LaunchHandle {
        LaunchHandle {
            shared: self.shared.clone(),
        }
    }

    fn context(&self) -> StepContext {
        StepContext {
            shared: self.shared.clone(),
            abort_rx: self.abort_rx.clone(),
            proceed_rx: self.proceed_rx.clone(),
        }
    }

    /// Execute every step in order until one fails or the task is aborted.
    pub async fn run(mut self) -> TaskOutcome {
        {
            let mut state = lock(&self.shared.state);
            if *state != TaskState::NotStarted {
                debug!("Launch task already ended before it started ({:?})", *state);
                return TaskOutcome::Failed {
                    reason: "Aborted".to_string(),
                    fatal: true,
                };
            }
            *state = TaskState::Running;
        }

        let ctx = self.context();
        let mut outcome = TaskOutcome::Succeeded;
        let mut last_started = None;

        for index in 0..self.steps.len() {
            if ctx.is_abort_requested() {
                outcome = TaskOutcome::Aborted;
                break;
            }

            let step = &mut self.steps[index];
            let name = step.name().to_string();
            self.shared.can_abort.store(step.can_abort(), Ordering::SeqCst);
            self.shared.set_step_state(index, StepState::Running);
            self.shared.emit(LaunchEvent::StepStarted {
                index,
                name: name.clone(),
            });
            debug!("Launch step {} ({}) started", index, name);
            last_started = Some(index);

            let result = step.execute(&ctx).await;
            self.shared.can_abort.store(false, Ordering::SeqCst);

            match result {
                StepOutcome::Succeeded if ctx.is_abort_requested() => {
                    self.shared.set_step_state(index, StepState::Aborted);
                    outcome = TaskOutcome::Aborted;
                    break;
                }
                StepOutcome::Succeeded => {
                    self.shared.set_step_state(index, StepState::Succeeded);
                }
                StepOutcome::Failed(reason) => {
                    warn!("Launch step {} failed: {}", name, reason);
                    self.shared.set_step_state(index, StepState::Failed(reason.clone()));
                    outcome = TaskOutcome::Failed { reason, fatal: true };
                    break;
                }
                StepOutcome::Aborted => {
                    self.shared.set_step_state(index, StepState::Aborted);
                    outcome = TaskOutcome::Aborted;
                    break;
                }
            }
        }

        if let Some(last) = last_started {
            for step in self.steps[..=last].iter_mut().rev() {
                step.finalize(&ctx).await;
            }
        }

        let (state, event) = match &outcome {
            TaskOutcome::Succeeded => (TaskState::Finished, LaunchEvent::Succeeded),
            TaskOutcome::Failed { reason, fatal } => (
                TaskState::Failed,
                LaunchEvent::Failed {
                    reason: reason.clone(),
                    fatal: *fatal,
                },
            ),
            TaskOutcome::Aborted => (TaskState::Aborted, LaunchEvent::Aborted),
        };
        self.shared.set_state(state);
        info!("Launch task ended: {:?}", outcome);
        self.shared.emit_terminal(event);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        outcome: StepOutcome,
        abortable: bool,
        hang: bool,
    }

    impl Recorder {
        fn boxed(name: &'static str, log: &Arc<Mutex<Vec<String>>>, outcome: StepOutcome) -> Box<Self> {
            Box::new(Self {
                name,
                log: log.clone(),
                outcome,
                abortable: false,
                hang: false,
            })
        }
    }

    #[async_trait]
    impl LaunchStep for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn can_abort(&self) -> bool {
            self.abortable
        }

        async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
            lock(&self.log).push(format!("start {}", self.name));
            if self.hang {
                tokio::select! {
                    _ = ctx.aborted() => return StepOutcome::Aborted,
                    _ = tokio::time::sleep(Duration::from_secs(30)) => {}
                }
            }
            self.outcome.clone()
        }

        async fn finalize(&mut self, _ctx: &StepContext) {
            lock(&self.log).push(format!("finalize {}", self.name));
        }
    }

    fn drain(rx: &mut UnboundedReceiver<LaunchEvent>) -> Vec<LaunchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn terminal_count(events: &[LaunchEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, LaunchEvent::Succeeded | LaunchEvent::Failed { .. } | LaunchEvent::Aborted))
            .count()
    }

    #[tokio::test]
    async fn failing_step_stops_the_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut task, mut rx) = LaunchTask::new();
        task.append_step(Recorder::boxed("A", &log, StepOutcome::Succeeded));
        task.append_step(Recorder::boxed("B", &log, StepOutcome::failed("broken")));
        task.append_step(Recorder::boxed("C", &log, StepOutcome::Succeeded));
        let handle = task.handle();

        let outcome = task.run().await;
        assert_eq!(
            outcome,
            TaskOutcome::Failed {
                reason: "broken".to_string(),
                fatal: true
            }
        );
        assert_eq!(
            *lock(&log),
            vec!["start A", "start B", "finalize B", "finalize A"]
        );
        assert_eq!(handle.state(), TaskState::Failed);
        assert_eq!(handle.step_states()[2], StepState::NotStarted);

        let events = drain(&mut rx);
        assert_eq!(terminal_count(&events), 1);
    }

    #[tokio::test]
    async fn abort_during_running_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut task, mut rx) = LaunchTask::new();
        task.append_step(Recorder::boxed("A", &log, StepOutcome::Succeeded));
        task.append_step(Box::new(Recorder {
            name: "B",
            log: log.clone(),
            outcome: StepOutcome::Succeeded,
            abortable: true,
            hang: true,
        }));
        task.append_step(Recorder::boxed("C", &log, StepOutcome::Succeeded));
        let handle = task.handle();

        let running = tokio::spawn(task.run());
        loop {
            if handle.step_states()[1] == StepState::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(handle.can_abort());
        assert!(handle.abort());

        let outcome = running.await.unwrap();
        assert_eq!(outcome, TaskOutcome::Aborted);
        assert_eq!(handle.state(), TaskState::Aborted);
        assert!(!lock(&log).iter().any(|entry| entry == "start C"));
        assert_eq!(terminal_count(&drain(&mut rx)), 1);
    }

    #[tokio::test]
    async fn abort_is_refused_by_non_abortable_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut task, _rx) = LaunchTask::new();
        task.append_step(Box::new(Recorder {
            name: "slow",
            log: log.clone(),
            outcome: StepOutcome::Succeeded,
            abortable: false,
            hang: true,
        }));
        let handle = task.handle();
        let running = tokio::spawn(task.run());
        while handle.step_states()[0] != StepState::Running {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!handle.abort());
        running.abort();
    }

    #[tokio::test]
    async fn abort_before_start_fails_with_aborted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut task, mut rx) = LaunchTask::new();
        task.append_step(Recorder::boxed("A", &log, StepOutcome::Succeeded));
        let handle = task.handle();

        assert!(handle.abort());
        let outcome = task.run().await;
        assert!(matches!(outcome, TaskOutcome::Failed { ref reason, .. } if reason == "Aborted"));
        assert!(lock(&log).is_empty());
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![LaunchEvent::Failed {
                reason: "Aborted".to_string(),
                fatal: true
            }]
        );
    }

    #[tokio::test]
    async fn empty_task_succeeds() {
        let (task, mut rx) = LaunchTask::new();
        assert_eq!(task.run().await, TaskOutcome::Succeeded);
        assert_eq!(drain(&mut rx), vec![LaunchEvent::Succeeded]);
    }

    #[tokio::test]
    async fn proceed_only_while_waiting() {
        let (task, _rx) = LaunchTask::new();
        let handle = task.handle();
        assert!(!handle.proceed());
    }

    #[test]
    fn censor_filter_replaces_secrets() {
        let (task, mut rx) = LaunchTask::new();
        let mut filter = BTreeMap::new();
        filter.insert("abc123".to_string(), "<ACCESS TOKEN>".to_string());
        task.set_censor_filter(filter);
        task.shared.log("token=abc123".to_string(), MessageLevel::Launcher);
        assert_eq!(
            rx.try_recv().unwrap(),
            LaunchEvent::Log {
                line: "token=<ACCESS TOKEN>".to_string(),
                level: MessageLevel::Launcher
            }
        );
    }
}
