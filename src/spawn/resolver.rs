// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Spawn configuration resolution.
//!
//! Computes, per invocation, how an agent process must be launched given
//! the host platform, an optional remote-execution target, and the agent's
//! capabilities. Pure: no I/O beyond reading the registered shell override,
//! and it always returns a value.
//!
//! # Invariants
//!
//! - On any platform other than Windows, or whenever remote execution is
//!   enabled, the result is the all-default config: `run_in_shell = false`
//!   and both stdin transport flags false.
//! - On Windows with remote execution disabled, `run_in_shell = true` and
//!   exactly one stdin transport flag is set, chosen by
//!   `supports_streaming_structured_input`.

use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::types::AgentType;

use super::capabilities::AgentCapabilities;
use super::shell::{resolve_shell, ResolvedShell};

/// Host platform, as far as spawning is concerned.
///
/// Only Windows needs shell wrapping and stdin-based prompt delivery; the
/// Unix platforms invoke agents directly via argv.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    MacOs,
    Linux,
}

impl HostPlatform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostPlatform::Windows
        } else if cfg!(target_os = "macos") {
            HostPlatform::MacOs
        } else {
            HostPlatform::Linux
        }
    }
}

/// Optional remote-execution target for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteExecution {
    /// Whether the task runs on a remote host.
    pub enabled: bool,
    /// Identifier of the remote target, when enabled.
    pub remote_id: Option<String>,
}

impl RemoteExecution {
    /// A descriptor targeting the given remote host.
    pub fn remote(id: impl Into<String>) -> Self {
        Self {
            enabled: true,
            remote_id: Some(id.into()),
        }
    }
}

/// How the launcher must start an agent process.
///
/// Consumed exactly once per spawn. The all-default value means "invoke
/// directly via argv, prompt on standard stdin line-by-line".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnConfig {
    /// Shell executable to wrap the command in, when `run_in_shell`.
    pub shell: Option<String>,
    /// Whether the command line is wrapped in a shell.
    pub run_in_shell: bool,
    /// Deliver the prompt via the structured line-delimited stdin protocol.
    pub send_prompt_via_structured_stdin: bool,
    /// Deliver the prompt as raw text on stdin.
    pub send_prompt_via_raw_stdin: bool,
}

/// Resolve a spawn configuration.
///
/// `shell_lookup` is only consulted on the Windows-local path; remote and
/// non-Windows invocations never touch shell resolution.
pub fn resolve_with(
    platform: HostPlatform,
    capabilities: AgentCapabilities,
    remote: Option<&RemoteExecution>,
    shell_lookup: impl FnOnce() -> ResolvedShell,
) -> SpawnConfig {
    if platform != HostPlatform::Windows {
        return SpawnConfig::default();
    }

    // The shell context differs on the remote host, so local shell
    // wrapping never applies to remote execution.
    if remote.map(|r| r.enabled).unwrap_or(false) {
        return SpawnConfig::default();
    }

    let resolved = shell_lookup();
    let structured = capabilities.supports_streaming_structured_input;

    SpawnConfig {
        shell: Some(resolved.shell),
        run_in_shell: resolved.use_shell,
        send_prompt_via_structured_stdin: structured,
        send_prompt_via_raw_stdin: !structured,
    }
}

/// Resolve a spawn configuration with an explicit shell override.
pub fn resolve(
    platform: HostPlatform,
    capabilities: AgentCapabilities,
    remote: Option<&RemoteExecution>,
    custom_shell_path: Option<&str>,
) -> SpawnConfig {
    resolve_with(platform, capabilities, remote, || {
        resolve_shell(custom_shell_path)
    })
}

/// Resolve a spawn configuration for the current process.
///
/// Reads the capability table and the registered custom-shell-path callback
/// from the context.
pub fn resolve_for(
    ctx: &AppContext,
    agent: AgentType,
    remote: Option<&RemoteExecution>,
) -> SpawnConfig {
    let capabilities = ctx.capabilities().lookup(agent);
    let custom = ctx.custom_shell_path();
    resolve(
        HostPlatform::current(),
        capabilities,
        remote,
        custom.as_deref(),
    )
}
