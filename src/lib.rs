// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agentdeck - agent process orchestration.
//!
//! Coordinates external, long-lived AI coding-agent subprocesses
//! (claude-code, codex, opencode, and friends) on behalf of a desktop UI:
//! resolving how each process must be launched, driving multi-step
//! playbooks through them, and durably recording what happened.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Core type definitions (AgentType, QuerySource, TaskOutcome)
//! - [`error`] - Error types and result aliases
//! - [`context`] - Process-wide context (capability table, shell override)
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing and observability infrastructure
//! - [`spawn`] - Spawn configuration resolution per agent/platform/target
//! - [`launcher`] - Process launching behind a narrow trait
//! - [`playbook`] - Playbook execution engine with an ordered event stream
//! - [`stats`] - Durable run stats: retrying recorder + versioned SQLite store
//! - [`cli`] - Thin command-line renderings of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use agentdeck::context::AppContext;
//! use agentdeck::launcher::AgentProcessLauncher;
//! use agentdeck::playbook::{PlaybookEngine, RunOptions, RunSpec};
//! use agentdeck::stats::StatsRecorder;
//! use agentdeck::types::AgentType;
//!
//! let engine = PlaybookEngine::new(
//!     Arc::new(AppContext::new()),
//!     Arc::new(AgentProcessLauncher::new()),
//!     Arc::new(StatsRecorder::new()),
//! );
//! let mut handle = engine.start(RunSpec { /* ... */ });
//! while let Some(event) = handle.events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod launcher;
pub mod playbook;
pub mod spawn;
pub mod stats;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use context::AppContext;
pub use error::{ConfigError, LaunchError, PlaybookError, Result, StoreError};
pub use launcher::{AgentProcessLauncher, CommandSpec, ProcessHandle, ProcessLauncher};
pub use playbook::{
    CancelHandle, ContinuationPolicy, PlaybookEngine, RunEndReason, RunEvent, RunHandle,
    RunOptions, RunSpec,
};
pub use spawn::{AgentCapabilities, HostPlatform, RemoteExecution, SpawnConfig};
pub use stats::{StatsRecorder, StatsStore, TimeRange};
pub use types::{AgentType, QuerySource, TaskOutcome};

/// agentdeck version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        // Verify key types are accessible
        let _config = SpawnConfig::default();
        let _ctx = AppContext::new();
        assert_eq!(AgentType::ClaudeCode.as_str(), "claude-code");
    }
}
