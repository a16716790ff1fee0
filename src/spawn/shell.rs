// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shell resolution for agent execution.
//!
//! Picks the concrete shell executable used to wrap agent commands on
//! Windows. The `source` field is diagnostic metadata for logging; nothing
//! branches on it.

use tracing::debug;

/// Where the resolved shell came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellSource {
    /// Platform default shell.
    Default,
    /// Operator-configured shell path.
    Custom,
}

impl ShellSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShellSource::Default => "default",
            ShellSource::Custom => "custom",
        }
    }
}

/// A resolved shell choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedShell {
    /// Shell executable to invoke.
    pub shell: String,
    /// Whether command lines should be wrapped in the shell at all.
    pub use_shell: bool,
    /// Diagnostic origin of the choice.
    pub source: ShellSource,
}

/// Default Windows shell when no override is registered.
///
/// COMSPEC is honored when set; cmd.exe is the documented fallback, so
/// resolution always produces a value.
pub const DEFAULT_WINDOWS_SHELL: &str = "cmd.exe";

/// Resolve the shell to use for agent execution.
///
/// A registered custom path always wins. Without one, the COMSPEC
/// environment variable is consulted, then the fixed default. Never fails.
pub fn resolve_shell(custom_shell_path: Option<&str>) -> ResolvedShell {
    if let Some(path) = custom_shell_path {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            debug!(shell = trimmed, "using custom shell");
            return ResolvedShell {
                shell: trimmed.to_string(),
                use_shell: true,
                source: ShellSource::Custom,
            };
        }
    }

    let shell = std::env::var("COMSPEC")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_WINDOWS_SHELL.to_string());

    ResolvedShell {
        shell,
        use_shell: true,
        source: ShellSource::Default,
    }
}
