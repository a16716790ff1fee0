// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Playbook execution engine.
//!
//! Turns a resolved playbook into a live run: one task at a time, each
//! launched through the spawn-config resolver and the process launcher,
//! with progress reported as an ordered, finite event stream.
//!
//! The loop is single-threaded cooperative per run. It suspends in two
//! places: awaiting the current task's process, and scheduling the
//! fire-and-forget recording of completed work. Recording never gates task
//! progression; a task failure never aborts the run unless the policy says
//! so; cancellation is a first-class terminal path with its own reason.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::launcher::{CommandSpec, ProcessLauncher};
use crate::spawn::resolve_for;
use crate::stats::{
    AutoRunSessionUpdate, NewAutoRunSession, NewAutoRunTask, NewQueryEvent, StatsRecorder,
};
use crate::types::{AgentType, QuerySource, TaskOutcome};

use super::source::TaskDocument;
use super::types::{
    CancelHandle, ContinuationPolicy, PlaybookRun, PlaybookTask, RunEndReason, RunEvent,
    RunHandle, RunOptions, TaskState,
};

/// Event channel depth; a slow consumer backpressures the run loop.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything needed to start one run.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Agent driving every task.
    pub agent: AgentType,
    /// Agent session the run targets.
    pub session_id: String,
    /// Playbook identifier, recorded in history.
    pub playbook: String,
    /// Resolved, ordered task documents.
    pub documents: Vec<TaskDocument>,
    /// Working directory for spawned processes.
    pub cwd: PathBuf,
    /// Project path recorded in history, when known.
    pub project_path: Option<String>,
    /// Run options.
    pub options: RunOptions,
}

/// Drives playbook runs against a launcher and a recorder.
pub struct PlaybookEngine {
    ctx: Arc<AppContext>,
    launcher: Arc<dyn ProcessLauncher>,
    recorder: Arc<StatsRecorder>,
}

impl PlaybookEngine {
    pub fn new(
        ctx: Arc<AppContext>,
        launcher: Arc<dyn ProcessLauncher>,
        recorder: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            ctx,
            launcher,
            recorder,
        }
    }

    /// Start a run and hand back its event stream.
    ///
    /// Events arrive strictly in task index order and end with exactly one
    /// `run-complete`. The stream cannot be replayed; start a new run
    /// instead.
    pub fn start(&self, spec: RunSpec) -> RunHandle {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancelHandle::new();

        let run = PlaybookRun {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: spec.session_id.clone(),
            agent: spec.agent,
            started_at: Instant::now(),
            tasks: spec
                .documents
                .iter()
                .enumerate()
                .map(|(index, doc)| PlaybookTask {
                    index,
                    title: doc.title.clone(),
                    content: doc.content.clone(),
                    state: TaskState::Pending,
                })
                .collect(),
            tasks_completed: 0,
            options: spec.options.clone(),
        };

        let worker = RunWorker {
            ctx: Arc::clone(&self.ctx),
            launcher: Arc::clone(&self.launcher),
            recorder: Arc::clone(&self.recorder),
            spec,
            cancel: cancel.clone(),
            events: tx,
        };

        let done = tokio::spawn(worker.run(run));

        RunHandle {
            events: rx,
            cancel,
            done,
        }
    }
}

struct RunWorker {
    ctx: Arc<AppContext>,
    launcher: Arc<dyn ProcessLauncher>,
    recorder: Arc<StatsRecorder>,
    spec: RunSpec,
    cancel: CancelHandle,
    events: mpsc::Sender<RunEvent>,
}

impl RunWorker {
    async fn run(self, mut run: PlaybookRun) -> PlaybookRun {
        let total = run.tasks_total();
        info!(
            run_id = %run.id,
            agent = %run.agent,
            playbook = %self.spec.playbook,
            tasks = total,
            dry_run = run.options.dry_run,
            "starting playbook run"
        );

        // History is written through the recorder; the session row must
        // exist before any task row can reference it. Dry runs mutate no
        // persisted state at all.
        let write_history = run.options.write_history && !run.options.dry_run;
        let session_row = if write_history {
            self.recorder
                .begin_auto_run_session(NewAutoRunSession {
                    session_id: run.session_id.clone(),
                    agent_type: run.agent,
                    playbook: self.spec.playbook.clone(),
                    started_at_ms: Utc::now().timestamp_millis(),
                    tasks_total: total as i64,
                    project_path: self.spec.project_path.clone(),
                })
                .await
        } else {
            None
        };

        let mut reason = RunEndReason::Completed;

        for index in 0..total {
            // Cancellation is cooperative: checked between tasks, never
            // interrupting one already dispatched.
            if self.cancel.is_cancelled() {
                reason = RunEndReason::Cancelled;
                break;
            }

            let config = resolve_for(&self.ctx, run.agent, run.options.remote.as_ref());
            let title = run.tasks[index].title.clone();

            if run.options.dry_run {
                self.emit(RunEvent::TaskStart {
                    task_index: index,
                    message: format!("[dry-run] would run task {}/{}: {}", index + 1, total, title),
                })
                .await;
                run.tasks[index].state = TaskState::Skipped;
                continue;
            }

            self.emit(RunEvent::TaskStart {
                task_index: index,
                message: format!("task {}/{}: {}", index + 1, total, title),
            })
            .await;

            run.tasks[index].state = TaskState::Running;
            let command = agent_command(run.agent, &run.tasks[index].content);
            let task_started_ms = Utc::now().timestamp_millis();
            let started = Instant::now();

            let outcome = match self.launcher.spawn(&config, &command, &self.spec.cwd).await {
                Ok(handle) => handle.wait().await,
                // A spawn failure is a task failure like any other.
                Err(e) => TaskOutcome::failed(started.elapsed(), e.to_string()),
            };

            let duration_ms = outcome.duration.as_millis() as u64;

            if write_history {
                self.record_task(session_row, index, &title, &outcome, task_started_ms);
            }

            if outcome.success {
                run.tasks[index].state = TaskState::Succeeded;
                run.tasks_completed += 1;
                let percent = (run.tasks_completed * 100 / total) as u8;
                self.emit(RunEvent::TaskComplete {
                    task_index: index,
                    message: format!("task {}/{} complete", index + 1, total),
                    duration_ms,
                    percent,
                })
                .await;
            } else {
                let error = outcome
                    .error
                    .unwrap_or_else(|| "unknown failure".to_string());
                warn!(run_id = %run.id, task_index = index, error = %error, "task failed");
                run.tasks[index].state = TaskState::Failed;
                self.emit(RunEvent::TaskFailed {
                    task_index: index,
                    message: format!("task {}/{} failed", index + 1, total),
                    error,
                })
                .await;

                if run.options.continuation == ContinuationPolicy::AbortOnFailure {
                    reason = RunEndReason::Aborted;
                    break;
                }
            }
        }

        let duration_ms = run.started_at.elapsed().as_millis() as u64;
        self.emit(RunEvent::RunComplete {
            tasks_completed: run.tasks_completed,
            tasks_total: total,
            duration_ms,
            reason,
            message: match reason {
                RunEndReason::Completed => format!(
                    "run complete: {}/{} tasks succeeded",
                    run.tasks_completed, total
                ),
                RunEndReason::Cancelled => format!(
                    "run cancelled after {}/{} tasks",
                    run.tasks_completed, total
                ),
                RunEndReason::Aborted => format!(
                    "run aborted after failure, {}/{} tasks succeeded",
                    run.tasks_completed, total
                ),
            },
        })
        .await;

        if let Some(id) = session_row {
            self.recorder
                .finish_auto_run_session(
                    id,
                    run.agent,
                    AutoRunSessionUpdate {
                        tasks_completed: run.tasks_completed as i64,
                        duration_ms: duration_ms as i64,
                        end_reason: reason,
                    },
                )
                .await;
        }

        info!(run_id = %run.id, reason = reason.as_str(), "playbook run finished");
        run
    }

    /// Schedule recording of one finished task. Fire-and-forget: the run
    /// loop moves on as soon as the work is scheduled.
    fn record_task(
        &self,
        session_row: Option<i64>,
        index: usize,
        title: &str,
        outcome: &TaskOutcome,
        task_started_ms: i64,
    ) {
        let recorder = Arc::clone(&self.recorder);
        let agent = self.spec.agent;
        let session_id = self.spec.session_id.clone();
        let project_path = self.spec.project_path.clone();
        let title = title.to_string();
        let outcome = outcome.clone();

        tokio::spawn(async move {
            recorder
                .record_query_event(NewQueryEvent {
                    session_id,
                    agent_type: agent,
                    source: QuerySource::Auto,
                    start_time_ms: task_started_ms,
                    duration_ms: outcome.duration.as_millis() as i64,
                    project_path,
                    tab_id: None,
                })
                .await;

            if let Some(session_row) = session_row {
                recorder
                    .record_auto_run_task(
                        agent,
                        NewAutoRunTask {
                            session_id: session_row,
                            task_index: index as i64,
                            title,
                            succeeded: outcome.success,
                            duration_ms: outcome.duration.as_millis() as i64,
                            error: outcome.error,
                        },
                    )
                    .await;
            }
        });
    }

    async fn emit(&self, event: RunEvent) {
        debug!(?event, "emitting run event");
        // A dropped receiver means the caller stopped listening; the run
        // still finishes so history stays accurate.
        let _ = self.events.send(event).await;
    }
}

/// Map an agent type to the command invoking it.
fn agent_command(agent: AgentType, prompt: &str) -> CommandSpec {
    let (program, args): (&str, &[&str]) = match agent {
        AgentType::ClaudeCode => ("claude", &[]),
        AgentType::Codex => ("codex", &[]),
        AgentType::Opencode => ("opencode", &["run"]),
        AgentType::Aider => ("aider", &["--message"]),
        AgentType::GeminiCli => ("gemini", &[]),
        AgentType::Terminal => ("sh", &["-lc"]),
    };
    let mut spec = CommandSpec::new(program, prompt);
    spec.args = args.iter().map(|s| s.to_string()).collect();
    spec
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::LaunchError;
    use crate::launcher::ProcessHandle;
    use crate::spawn::SpawnConfig;

    /// Launcher returning scripted outcomes without real processes.
    struct FakeLauncher {
        spawned: AtomicUsize,
        fail_indexes: HashSet<usize>,
        /// When set, each task waits for one permit before finishing.
        gate: Option<Arc<Notify>>,
    }

    impl FakeLauncher {
        fn succeeding() -> Self {
            Self {
                spawned: AtomicUsize::new(0),
                fail_indexes: HashSet::new(),
                gate: None,
            }
        }

        fn failing_at(indexes: impl IntoIterator<Item = usize>) -> Self {
            Self {
                spawned: AtomicUsize::new(0),
                fail_indexes: indexes.into_iter().collect(),
                gate: None,
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                spawned: AtomicUsize::new(0),
                fail_indexes: HashSet::new(),
                gate: Some(gate),
            }
        }
    }

    struct FakeHandle {
        success: bool,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ProcessHandle for FakeHandle {
        async fn wait(self: Box<Self>) -> TaskOutcome {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.success {
                TaskOutcome::succeeded(Duration::from_millis(10))
            } else {
                TaskOutcome::failed(Duration::from_millis(10), "scripted failure")
            }
        }
    }

    #[async_trait]
    impl ProcessLauncher for FakeLauncher {
        async fn spawn(
            &self,
            _config: &SpawnConfig,
            _command: &CommandSpec,
            _cwd: &Path,
        ) -> Result<Box<dyn ProcessHandle>, LaunchError> {
            let index = self.spawned.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeHandle {
                success: !self.fail_indexes.contains(&index),
                gate: self.gate.clone(),
            }))
        }
    }

    fn documents(count: usize) -> Vec<TaskDocument> {
        (0..count)
            .map(|i| TaskDocument {
                title: format!("task-{i}"),
                content: format!("do thing {i}"),
            })
            .collect()
    }

    fn spec(count: usize, options: RunOptions) -> RunSpec {
        RunSpec {
            agent: AgentType::ClaudeCode,
            session_id: "session-1".to_string(),
            playbook: "test-playbook".to_string(),
            documents: documents(count),
            cwd: PathBuf::from("."),
            project_path: None,
            options,
        }
    }

    fn engine(launcher: Arc<dyn ProcessLauncher>) -> PlaybookEngine {
        PlaybookEngine::new(
            Arc::new(AppContext::new()),
            launcher,
            Arc::new(StatsRecorder::new()),
        )
    }

    async fn collect_events(handle: &mut RunHandle) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_all_tasks_succeed_in_order() {
        let launcher = Arc::new(FakeLauncher::succeeding());
        let engine = engine(launcher.clone());
        let mut handle = engine.start(spec(3, RunOptions::default()));

        let events = collect_events(&mut handle).await;
        let completes: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::TaskComplete { task_index, .. } => Some(*task_index),
                _ => None,
            })
            .collect();
        assert_eq!(completes, vec![0, 1, 2]);

        match events.last().unwrap() {
            RunEvent::RunComplete {
                tasks_completed,
                tasks_total,
                reason,
                ..
            } => {
                assert_eq!(*tasks_completed, 3);
                assert_eq!(*tasks_total, 3);
                assert_eq!(*reason, RunEndReason::Completed);
            }
            other => panic!("expected run-complete, got {other:?}"),
        }

        // Strict index ordering: no event for task N+1 before task N's
        // terminal event.
        let mut last_terminal = -1i64;
        for event in &events {
            match event {
                RunEvent::TaskStart { task_index, .. } => {
                    assert_eq!(*task_index as i64, last_terminal + 1);
                }
                RunEvent::TaskComplete { task_index, .. } => {
                    last_terminal = *task_index as i64;
                }
                _ => {}
            }
        }

        let run = handle.done.await.unwrap();
        assert!(run.tasks.iter().all(|t| t.state == TaskState::Succeeded));
        assert_eq!(launcher.spawned.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_continues_by_default() {
        let launcher = Arc::new(FakeLauncher::failing_at([1]));
        let engine = engine(launcher.clone());
        let mut handle = engine.start(spec(4, RunOptions::default()));

        let events = collect_events(&mut handle).await;
        let failed: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::TaskFailed { task_index, .. } => Some(*task_index),
                _ => None,
            })
            .collect();
        assert_eq!(failed, vec![1]);

        match events.last().unwrap() {
            RunEvent::RunComplete {
                tasks_completed,
                tasks_total,
                reason,
                ..
            } => {
                assert_eq!(*tasks_completed, 3);
                assert_eq!(*tasks_total, 4);
                // Partial completion is still a completed run.
                assert_eq!(*reason, RunEndReason::Completed);
            }
            other => panic!("expected run-complete, got {other:?}"),
        }

        let run = handle.done.await.unwrap();
        assert_eq!(run.tasks[1].state, TaskState::Failed);
        assert_eq!(run.tasks[3].state, TaskState::Succeeded);
    }

    #[tokio::test]
    async fn test_abort_on_failure_policy() {
        let launcher = Arc::new(FakeLauncher::failing_at([0]));
        let engine = engine(launcher.clone());
        let options = RunOptions {
            continuation: ContinuationPolicy::AbortOnFailure,
            ..Default::default()
        };
        let mut handle = engine.start(spec(3, options));

        let events = collect_events(&mut handle).await;
        match events.last().unwrap() {
            RunEvent::RunComplete {
                tasks_completed,
                reason,
                ..
            } => {
                assert_eq!(*tasks_completed, 0);
                assert_eq!(*reason, RunEndReason::Aborted);
            }
            other => panic!("expected run-complete, got {other:?}"),
        }

        // Tasks after the failure were never dispatched.
        assert_eq!(launcher.spawned.load(Ordering::SeqCst), 1);
        let run = handle.done.await.unwrap();
        assert_eq!(run.tasks[1].state, TaskState::Pending);
    }

    #[tokio::test]
    async fn test_dry_run_never_spawns() {
        let launcher = Arc::new(FakeLauncher::succeeding());
        let engine = engine(launcher.clone());
        let options = RunOptions {
            dry_run: true,
            write_history: true,
            ..Default::default()
        };
        let mut handle = engine.start(spec(3, options));

        let events = collect_events(&mut handle).await;
        assert_eq!(launcher.spawned.load(Ordering::SeqCst), 0);

        let starts = events
            .iter()
            .filter(|e| matches!(e, RunEvent::TaskStart { .. }))
            .count();
        assert_eq!(starts, 3);
        assert!(!events.iter().any(|e| matches!(
            e,
            RunEvent::TaskComplete { .. } | RunEvent::TaskFailed { .. }
        )));

        match events.last().unwrap() {
            RunEvent::RunComplete {
                tasks_completed, ..
            } => assert_eq!(*tasks_completed, 0),
            other => panic!("expected run-complete, got {other:?}"),
        }

        let run = handle.done.await.unwrap();
        assert!(run.tasks.iter().all(|t| t.state == TaskState::Skipped));
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch_and_reports_partial() {
        let gate = Arc::new(Notify::new());
        let launcher = Arc::new(FakeLauncher::gated(gate.clone()));
        let engine = engine(launcher.clone());
        let mut handle = engine.start(spec(3, RunOptions::default()));

        // Task 0 is in flight. Raise the signal, then let the task finish:
        // the already-dispatched task is not treated as failed.
        let first = handle.events.recv().await.unwrap();
        assert!(matches!(first, RunEvent::TaskStart { task_index: 0, .. }));
        handle.cancel.cancel();
        gate.notify_one();

        let events = collect_events(&mut handle).await;
        match events.last().unwrap() {
            RunEvent::RunComplete {
                tasks_completed,
                tasks_total,
                reason,
                ..
            } => {
                assert_eq!(*tasks_completed, 1);
                assert_eq!(*tasks_total, 3);
                assert_eq!(*reason, RunEndReason::Cancelled);
            }
            other => panic!("expected run-complete, got {other:?}"),
        }

        assert_eq!(launcher.spawned.load(Ordering::SeqCst), 1);
        let run = handle.done.await.unwrap();
        assert_eq!(run.tasks[0].state, TaskState::Succeeded);
        assert_eq!(run.tasks[1].state, TaskState::Pending);
    }

    #[test]
    fn test_agent_command_mapping() {
        let spec = agent_command(AgentType::ClaudeCode, "fix the bug");
        assert_eq!(spec.program, "claude");
        assert_eq!(spec.prompt, "fix the bug");

        let spec = agent_command(AgentType::Aider, "fix the bug");
        assert_eq!(spec.program, "aider");
        assert_eq!(spec.args, vec!["--message".to_string()]);
    }
}
