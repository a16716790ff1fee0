// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core type definitions shared across the crate.
//!
//! Agent identifiers, invocation sources, and process outcomes are used by
//! the spawn resolver, the playbook engine, and the stats layer alike, so
//! they live here rather than in any one subsystem.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The kind of coding agent being driven.
///
/// Each variant corresponds to an external CLI binary with its own input
/// protocol. Used as a lookup key for capabilities and as a stored field in
/// run stats, so the string form is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    ClaudeCode,
    Codex,
    Opencode,
    Aider,
    GeminiCli,
    Terminal,
}

impl AgentType {
    /// All known agent types.
    pub const ALL: [AgentType; 6] = [
        AgentType::ClaudeCode,
        AgentType::Codex,
        AgentType::Opencode,
        AgentType::Aider,
        AgentType::GeminiCli,
        AgentType::Terminal,
    ];

    /// Stable string form used for storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::ClaudeCode => "claude-code",
            AgentType::Codex => "codex",
            AgentType::Opencode => "opencode",
            AgentType::Aider => "aider",
            AgentType::GeminiCli => "gemini-cli",
            AgentType::Terminal => "terminal",
        }
    }

    /// Parse from the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claude-code" => Some(AgentType::ClaudeCode),
            "codex" => Some(AgentType::Codex),
            "opencode" => Some(AgentType::Opencode),
            "aider" => Some(AgentType::Aider),
            "gemini-cli" => Some(AgentType::GeminiCli),
            "terminal" => Some(AgentType::Terminal),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an agent invocation was user-initiated or part of an auto run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    User,
    Auto,
}

impl QuerySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuerySource::User => "user",
            QuerySource::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(QuerySource::User),
            "auto" => Some(QuerySource::Auto),
            _ => None,
        }
    }
}

/// Terminal outcome of a spawned agent process.
///
/// Timeouts and spawn-side failures are reported through `success = false`
/// with a message; they are never panics and never bubble out of the run
/// loop as errors.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Whether the process completed successfully.
    pub success: bool,
    /// Wall-clock duration of the process.
    pub duration: Duration,
    /// Failure description when `success` is false.
    pub error: Option<String>,
}

impl TaskOutcome {
    /// A successful outcome with the given duration.
    pub fn succeeded(duration: Duration) -> Self {
        Self {
            success: true,
            duration,
            error: None,
        }
    }

    /// A failed outcome with the given duration and message.
    pub fn failed(duration: Duration, error: impl Into<String>) -> Self {
        Self {
            success: false,
            duration,
            error: Some(error.into()),
        }
    }
}
