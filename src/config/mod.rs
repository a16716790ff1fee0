// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading and merging.
//!
//! Workspace config files (`.agentdeck.json`, `.agentdeck/config.json`,
//! `.agentdeck.yaml`) are merged over built-in defaults. CLI flags win over
//! both; that merge happens at the call site.

pub mod loader;
pub mod types;

pub use loader::{find_project_root, load_config, load_config_file, load_workspace_config, CONFIG_FILES};
pub use types::{ResolvedConfig, WorkspaceConfig};
