// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tokio-backed agent process launcher.
//!
//! Honors the resolved [`SpawnConfig`]: shell wrapping on Windows, prompt
//! delivery via structured or raw stdin, direct argv invocation everywhere
//! else. A per-task timeout turns a runaway process into a failed outcome
//! and kills the child.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::LaunchError;
use crate::spawn::SpawnConfig;
use crate::types::TaskOutcome;

use super::{CommandSpec, ProcessHandle, ProcessLauncher};

/// Default per-task timeout.
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Cap on the stderr tail kept for failure messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// Launches real agent processes via tokio.
pub struct AgentProcessLauncher {
    task_timeout: Duration,
}

impl AgentProcessLauncher {
    pub fn new() -> Self {
        Self {
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    /// Override the per-task timeout.
    pub fn with_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    fn build_command(config: &SpawnConfig, spec: &CommandSpec, cwd: &Path) -> Command {
        let mut cmd = if config.run_in_shell {
            let shell = config
                .shell
                .as_deref()
                .unwrap_or(crate::spawn::DEFAULT_WINDOWS_SHELL);
            let mut cmd = Command::new(shell);
            cmd.arg(shell_command_flag(shell));
            let mut line = spec.program.clone();
            for arg in &spec.args {
                line.push(' ');
                line.push_str(arg);
            }
            cmd.arg(line);
            cmd
        } else {
            let mut cmd = Command::new(&spec.program);
            cmd.args(&spec.args);
            cmd
        };

        cmd.current_dir(cwd)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if config.send_prompt_via_structured_stdin || config.send_prompt_via_raw_stdin {
            cmd.stdin(Stdio::piped());
        } else {
            // Direct argv invocation: the prompt rides as the final argument.
            cmd.arg(&spec.prompt);
            cmd.stdin(Stdio::null());
        }

        cmd
    }

    async fn deliver_prompt(
        config: &SpawnConfig,
        spec: &CommandSpec,
        child: &mut Child,
    ) -> Result<(), LaunchError> {
        let Some(mut stdin) = child.stdin.take() else {
            return Ok(());
        };

        let payload = if config.send_prompt_via_structured_stdin {
            let message = serde_json::json!({
                "type": "user",
                "content": spec.prompt,
            });
            format!("{}\n", message)
        } else {
            format!("{}\n", spec.prompt)
        };

        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| LaunchError::StdinWriteFailed(e.to_string()))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| LaunchError::StdinWriteFailed(e.to_string()))?;
        // Dropping stdin closes the pipe so line-reading agents see EOF.
        Ok(())
    }
}

impl Default for AgentProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

/// Flag that makes a shell run one command line and exit.
fn shell_command_flag(shell: &str) -> &'static str {
    let name = Path::new(shell)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(shell)
        .to_ascii_lowercase();
    if name.contains("powershell") || name == "pwsh" {
        "-Command"
    } else {
        "/C"
    }
}

#[async_trait]
impl ProcessLauncher for AgentProcessLauncher {
    async fn spawn(
        &self,
        config: &SpawnConfig,
        command: &CommandSpec,
        cwd: &Path,
    ) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        let mut cmd = Self::build_command(config, command, cwd);

        debug!(
            program = %command.program,
            run_in_shell = config.run_in_shell,
            structured_stdin = config.send_prompt_via_structured_stdin,
            "spawning agent process"
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| LaunchError::SpawnFailed(e.to_string()))?;

        Self::deliver_prompt(config, command, &mut child).await?;

        Ok(Box::new(TokioProcessHandle {
            child,
            started: Instant::now(),
            task_timeout: self.task_timeout,
        }))
    }
}

struct TokioProcessHandle {
    child: Child,
    started: Instant,
    task_timeout: Duration,
}

#[async_trait]
impl ProcessHandle for TokioProcessHandle {
    async fn wait(mut self: Box<Self>) -> TaskOutcome {
        let stderr = self.child.stderr.take();

        let stderr_task = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut tail = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut tail).await;
            }
            if tail.len() > STDERR_TAIL_BYTES {
                let cut = tail.len() - STDERR_TAIL_BYTES;
                tail.drain(..cut);
            }
            String::from_utf8_lossy(&tail).into_owned()
        });

        match timeout(self.task_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                let duration = self.started.elapsed();
                if status.success() {
                    TaskOutcome::succeeded(duration)
                } else {
                    let stderr_tail = stderr_task.await.unwrap_or_default();
                    let mut message = format!("process exited with {status}");
                    if !stderr_tail.trim().is_empty() {
                        message.push_str(": ");
                        message.push_str(stderr_tail.trim());
                    }
                    TaskOutcome::failed(duration, message)
                }
            }
            Ok(Err(e)) => TaskOutcome::failed(self.started.elapsed(), e.to_string()),
            Err(_) => {
                warn!(
                    timeout_secs = self.task_timeout.as_secs(),
                    "agent process timed out, killing"
                );
                let _ = self.child.kill().await;
                TaskOutcome::failed(
                    self.started.elapsed(),
                    format!(
                        "task timed out after {} seconds",
                        self.task_timeout.as_secs()
                    ),
                )
            }
        }
    }
}
