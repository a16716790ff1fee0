// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};

/// Workspace configuration for agentdeck.
/// Can be defined in .agentdeck.json or .agentdeck/config.json in the
/// project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Shell executable used to wrap agent commands on Windows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_shell_path: Option<String>,

    /// Directory containing playbooks, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playbook_dir: Option<String>,

    /// Per-task timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout_secs: Option<u64>,

    /// Whether auto runs write history by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_history: Option<bool>,

    /// Abort the run on the first task failure instead of continuing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_on_failure: Option<bool>,

    /// Stats database size above which open-time compaction runs, in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vacuum_threshold_bytes: Option<i64>,

    /// Custom stats database file path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

/// Fully-resolved configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub custom_shell_path: Option<String>,
    pub playbook_dir: String,
    pub task_timeout_secs: u64,
    pub write_history: bool,
    pub abort_on_failure: bool,
    pub vacuum_threshold_bytes: i64,
    pub database_path: Option<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            custom_shell_path: None,
            playbook_dir: "playbooks".to_string(),
            task_timeout_secs: 30 * 60,
            write_history: true,
            abort_on_failure: false,
            vacuum_threshold_bytes: crate::stats::DEFAULT_VACUUM_THRESHOLD_BYTES,
            database_path: None,
        }
    }
}

impl ResolvedConfig {
    /// Apply a workspace config on top of the defaults.
    pub fn merge(mut self, workspace: &WorkspaceConfig) -> Self {
        if let Some(path) = &workspace.custom_shell_path {
            self.custom_shell_path = Some(path.clone());
        }
        if let Some(dir) = &workspace.playbook_dir {
            self.playbook_dir = dir.clone();
        }
        if let Some(timeout) = workspace.task_timeout_secs {
            self.task_timeout_secs = timeout;
        }
        if let Some(write_history) = workspace.write_history {
            self.write_history = write_history;
        }
        if let Some(abort) = workspace.abort_on_failure {
            self.abort_on_failure = abort;
        }
        if let Some(threshold) = workspace.vacuum_threshold_bytes {
            self.vacuum_threshold_bytes = threshold;
        }
        if let Some(path) = &workspace.database_path {
            self.database_path = Some(path.clone());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_defaults() {
        let config = ResolvedConfig::default();
        assert_eq!(config.playbook_dir, "playbooks");
        assert!(config.write_history);
        assert!(!config.abort_on_failure);
        assert_eq!(config.task_timeout_secs, 1800);
    }

    #[test]
    fn test_merge_overrides_only_present_fields() {
        let workspace = WorkspaceConfig {
            task_timeout_secs: Some(60),
            write_history: Some(false),
            ..Default::default()
        };
        let config = ResolvedConfig::default().merge(&workspace);
        assert_eq!(config.task_timeout_secs, 60);
        assert!(!config.write_history);
        // Untouched fields keep their defaults.
        assert_eq!(config.playbook_dir, "playbooks");
    }

    #[test]
    fn test_workspace_config_json_field_names() {
        let json = r#"{"customShellPath": "pwsh.exe", "taskTimeoutSecs": 120}"#;
        let config: WorkspaceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.custom_shell_path, Some("pwsh.exe".to_string()));
        assert_eq!(config.task_timeout_secs, Some(120));
    }
}
