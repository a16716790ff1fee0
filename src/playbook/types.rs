// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Playbook run state and event types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::spawn::RemoteExecution;
use crate::types::AgentType;

/// Lifecycle state of one playbook task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
        }
    }

    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Skipped
        )
    }
}

/// One step of a playbook, owned and mutated only by the engine.
#[derive(Debug, Clone)]
pub struct PlaybookTask {
    /// Zero-based position in the playbook.
    pub index: usize,
    /// Short human-readable title.
    pub title: String,
    /// Prompt content handed to the agent.
    pub content: String,
    /// Current lifecycle state.
    pub state: TaskState,
}

/// What the engine does after a task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContinuationPolicy {
    /// Keep going; partial completion is a reportable outcome, not an error.
    #[default]
    ContinueOnFailure,
    /// Stop dispatching further tasks after the first failure.
    AbortOnFailure,
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Report intended actions without spawning processes or writing history.
    pub dry_run: bool,
    /// Record the run and its tasks in the stats store.
    pub write_history: bool,
    /// Failure continuation policy.
    pub continuation: ContinuationPolicy,
    /// Remote-execution target, if the run executes on a remote host.
    pub remote: Option<RemoteExecution>,
}

/// Why a run reached its terminal event.
///
/// Operator stop and failure-abort are deliberately distinct from normal
/// completion so that `tasks_completed < tasks_total` alone never has to
/// disambiguate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEndReason {
    /// All tasks reached a terminal state.
    Completed,
    /// The operator raised the cancellation signal.
    Cancelled,
    /// A task failed under `ContinuationPolicy::AbortOnFailure`.
    Aborted,
}

impl RunEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunEndReason::Completed => "completed",
            RunEndReason::Cancelled => "cancelled",
            RunEndReason::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(RunEndReason::Completed),
            "cancelled" => Some(RunEndReason::Cancelled),
            "aborted" => Some(RunEndReason::Aborted),
            _ => None,
        }
    }
}

/// Progress event emitted by a playbook run.
///
/// Events arrive strictly in task index order; the `run-complete` event is
/// always last and always present, including on cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RunEvent {
    TaskStart {
        task_index: usize,
        message: String,
    },
    TaskComplete {
        task_index: usize,
        message: String,
        duration_ms: u64,
        percent: u8,
    },
    TaskFailed {
        task_index: usize,
        message: String,
        error: String,
    },
    RunComplete {
        tasks_completed: usize,
        tasks_total: usize,
        duration_ms: u64,
        reason: RunEndReason,
        message: String,
    },
}

/// Cooperative cancellation signal for one run.
///
/// Checked between tasks; an already-dispatched task is left to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the cancellation signal.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// In-memory aggregate over one run's tasks.
///
/// Owned exclusively by the engine for the run's lifetime; discarded when
/// the run object is dropped.
#[derive(Debug)]
pub struct PlaybookRun {
    /// Unique id for this run.
    pub id: String,
    /// Agent session the run targets.
    pub session_id: String,
    /// Agent driving every task.
    pub agent: AgentType,
    /// When the run started.
    pub started_at: Instant,
    /// Ordered task list.
    pub tasks: Vec<PlaybookTask>,
    /// Monotonically increasing count of succeeded tasks.
    pub tasks_completed: usize,
    /// Options the run was started with.
    pub options: RunOptions,
}

impl PlaybookRun {
    pub fn tasks_total(&self) -> usize {
        self.tasks.len()
    }
}

/// Caller-side handle for a started run: the event stream plus the
/// cancellation signal. The stream is finite and forward-only; a new run is
/// required to replay.
pub struct RunHandle {
    /// Ordered event stream.
    pub events: mpsc::Receiver<RunEvent>,
    /// Cancellation signal for this run.
    pub cancel: CancelHandle,
    /// Resolves to the run's final in-memory state once the stream ends.
    pub done: tokio::task::JoinHandle<PlaybookRun>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_terminal() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Skipped.is_terminal());
    }

    #[test]
    fn test_continuation_policy_default_is_continue() {
        assert_eq!(
            ContinuationPolicy::default(),
            ContinuationPolicy::ContinueOnFailure
        );
    }

    #[test]
    fn test_run_end_reason_round_trip() {
        for reason in [
            RunEndReason::Completed,
            RunEndReason::Cancelled,
            RunEndReason::Aborted,
        ] {
            assert_eq!(RunEndReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(RunEndReason::parse("stopped"), None);
    }

    #[test]
    fn test_cancel_handle() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_run_event_json_shape() {
        let event = RunEvent::TaskComplete {
            task_index: 2,
            message: "task 3 complete".to_string(),
            duration_ms: 1200,
            percent: 60,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"], "task-complete");
        assert_eq!(json["taskIndex"], 2);
        assert_eq!(json["durationMs"], 1200);
        assert_eq!(json["percent"], 60);
    }

    #[test]
    fn test_run_complete_event_json_shape() {
        let event = RunEvent::RunComplete {
            tasks_completed: 4,
            tasks_total: 5,
            duration_ms: 9000,
            reason: RunEndReason::Cancelled,
            message: "run cancelled".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"], "run-complete");
        assert_eq!(json["tasksCompleted"], 4);
        assert_eq!(json["reason"], "cancelled");
    }
}
