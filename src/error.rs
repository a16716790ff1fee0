// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for agent orchestration.
//!
//! This module provides strongly-typed errors for different parts of the
//! application, using `thiserror` for ergonomic error definitions and
//! `anyhow` for error propagation.

use thiserror::Error;

/// Errors that can occur when launching an agent process.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("Failed to write prompt to stdin: {0}")]
    StdinWriteFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for LaunchError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors that can occur while setting up a playbook run.
///
/// These are configuration errors: they surface before any event is
/// emitted and the run never starts. Failures of individual tasks are not
/// errors at this level; they are reported as `TaskFailed` events.
#[derive(Error, Debug)]
pub enum PlaybookError {
    #[error("Playbook not found: {0}")]
    UnknownPlaybook(String),

    #[error("Playbook '{0}' contains no tasks")]
    EmptyPlaybook(String),

    #[error("Invalid task document {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("IO error reading playbook: {0}")]
    IoError(String),
}

impl From<std::io::Error> for PlaybookError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors that can occur in the run stats store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store is not initialized")]
    NotReady,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Migration to version {version} failed: {message}")]
    Migration { version: u32, message: String },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Sqlite(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl StoreError {
    /// Check if a failed insert may succeed on a later attempt.
    ///
    /// Precondition errors are deterministic; retrying them is wasted work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Sqlite(_) | Self::IoError(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
