// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Playbook resolution.
//!
//! A playbook is an ordered list of task documents. The engine consumes an
//! already-resolved list; resolution itself lives behind [`PlaybookSource`]
//! so the desktop UI can plug in its own document service. The shipped
//! implementation reads markdown files from a directory, ordered by file
//! name.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PlaybookError;

/// One resolved task document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDocument {
    /// Short title, taken from the first markdown heading or the file stem.
    pub title: String,
    /// Full prompt content.
    pub content: String,
}

/// Supplies the ordered task list for an identified playbook.
pub trait PlaybookSource: Send + Sync {
    /// Resolve a playbook identifier to its ordered task documents.
    ///
    /// Unknown identifiers and empty playbooks are configuration errors;
    /// the run never starts.
    fn resolve(&self, playbook: &str) -> Result<Vec<TaskDocument>, PlaybookError>;
}

/// Directory-backed playbook source.
///
/// Each playbook is a subdirectory of the root; its tasks are the `.md`
/// files inside, sorted by file name. Prefixing files with `01-`, `02-`...
/// is the expected convention.
pub struct DirectoryPlaybookSource {
    root: PathBuf,
}

impl DirectoryPlaybookSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PlaybookSource for DirectoryPlaybookSource {
    fn resolve(&self, playbook: &str) -> Result<Vec<TaskDocument>, PlaybookError> {
        let dir = self.root.join(playbook);
        if !dir.is_dir() {
            return Err(PlaybookError::UnknownPlaybook(playbook.to_string()));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
            .collect();
        paths.sort();

        let mut tasks = Vec::with_capacity(paths.len());
        for path in &paths {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                return Err(PlaybookError::InvalidDocument {
                    path: path.display().to_string(),
                    message: "empty document".to_string(),
                });
            }
            tasks.push(TaskDocument {
                title: document_title(path, &content),
                content,
            });
        }

        if tasks.is_empty() {
            return Err(PlaybookError::EmptyPlaybook(playbook.to_string()));
        }

        debug!(playbook, tasks = tasks.len(), "resolved playbook");
        Ok(tasks)
    }
}

/// Title from the first markdown heading, falling back to the file stem.
fn document_title(path: &Path, content: &str) -> String {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix('#').map(|t| t.trim_start_matches('#').trim().to_string()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("task")
                .to_string()
        })
}
