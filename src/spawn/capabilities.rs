// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Static per-agent capability metadata.
//!
//! The table is built once at process start and never mutated afterwards,
//! so it is safe to read from any thread without synchronization.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::AgentType;

/// Launch-relevant capabilities of one agent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentCapabilities {
    /// Whether the agent accepts a line-delimited structured input protocol
    /// on stdin. Agents without it are fed the prompt as raw text.
    pub supports_streaming_structured_input: bool,
}

impl AgentCapabilities {
    /// Capabilities assumed for agent types not present in the table.
    pub const fn fallback() -> Self {
        Self {
            supports_streaming_structured_input: false,
        }
    }
}

/// Built-in capability defaults, constructed once.
///
/// claude-code and codex speak a line-delimited JSON protocol on stdin;
/// the remaining agents only read plain prompt text.
static BUILTIN_ENTRIES: Lazy<HashMap<AgentType, AgentCapabilities>> = Lazy::new(|| {
    let mut entries = HashMap::new();
    entries.insert(
        AgentType::ClaudeCode,
        AgentCapabilities {
            supports_streaming_structured_input: true,
        },
    );
    entries.insert(
        AgentType::Codex,
        AgentCapabilities {
            supports_streaming_structured_input: true,
        },
    );
    entries.insert(AgentType::Opencode, AgentCapabilities::fallback());
    entries.insert(AgentType::Aider, AgentCapabilities::fallback());
    entries.insert(AgentType::GeminiCli, AgentCapabilities::fallback());
    entries.insert(AgentType::Terminal, AgentCapabilities::fallback());
    entries
});

/// Read-only capability table keyed by agent type.
#[derive(Debug)]
pub struct CapabilityTable {
    entries: HashMap<AgentType, AgentCapabilities>,
}

impl CapabilityTable {
    /// Build the table with the built-in defaults.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_ENTRIES.clone(),
        }
    }

    /// Look up capabilities for an agent type.
    pub fn lookup(&self, agent: AgentType) -> AgentCapabilities {
        self.entries
            .get(&agent)
            .copied()
            .unwrap_or(AgentCapabilities::fallback())
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::builtin()
    }
}
