// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process launching for agent binaries.
//!
//! The playbook engine talks to launchers through the [`ProcessLauncher`]
//! trait: hand over a [`SpawnConfig`], a command, and a working directory,
//! get back a handle whose only job is to report the terminal outcome.
//! [`AgentProcessLauncher`] is the real tokio-backed implementation; tests
//! substitute scripted fakes.

mod process;

use std::path::Path;

use async_trait::async_trait;

use crate::error::LaunchError;
use crate::spawn::SpawnConfig;
use crate::types::TaskOutcome;

pub use process::AgentProcessLauncher;

/// The command to run for one task, plus the prompt to deliver.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Agent binary or shell-level command line.
    pub program: String,
    /// Arguments for the direct argv invocation path.
    pub args: Vec<String>,
    /// Prompt text for the task.
    pub prompt: String,
}

impl CommandSpec {
    /// A command with no extra arguments.
    pub fn new(program: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            prompt: prompt.into(),
        }
    }
}

/// A live agent process awaiting its terminal state.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Wait for the process to finish and report the outcome.
    ///
    /// Timeouts and non-zero exits are outcomes, not errors; this never
    /// fails once the process has been spawned.
    async fn wait(self: Box<Self>) -> TaskOutcome;
}

/// Launches agent processes according to a resolved spawn configuration.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the agent process for one task.
    async fn spawn(
        &self,
        config: &SpawnConfig,
        command: &CommandSpec,
        cwd: &Path,
    ) -> Result<Box<dyn ProcessHandle>, LaunchError>;
}
