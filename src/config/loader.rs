// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various
//! locations.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::{ResolvedConfig, WorkspaceConfig};

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    ".agentdeck.json",
    ".agentdeck/config.json",
    ".agentdeck.yaml",
];

/// Load workspace configuration from the project root.
///
/// Searches for config files in the following order:
/// 1. .agentdeck.json
/// 2. .agentdeck/config.json
/// 3. .agentdeck.yaml
pub fn load_workspace_config(project_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = project_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Load and resolve configuration for a project root.
///
/// Missing files resolve to the defaults; malformed files are errors.
pub fn load_config(project_root: &Path) -> Result<ResolvedConfig, ConfigError> {
    let resolved = ResolvedConfig::default();
    match load_workspace_config(project_root)? {
        Some(workspace) => Ok(resolved.merge(&workspace)),
        None => Ok(resolved),
    }
}

/// Find the project root by searching for config files.
///
/// Walks up the directory tree from `start` until it finds a directory
/// containing a config file or reaches the filesystem root.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        for filename in CONFIG_FILES {
            if current.join(filename).exists() {
                return Some(current);
            }
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}
