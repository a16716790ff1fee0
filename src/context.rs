// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide application context.
//!
//! Holds state that would otherwise live in module-level globals: the
//! read-only capability table and the operator's custom-shell-path
//! registration. Created once at startup and passed by reference; nothing
//! in the crate reaches for a hidden global.
//!
//! The shell-path registration is a single mutable slot with last-write-wins
//! semantics. The UI thread registers it once at startup; readers copy the
//! value out.

use std::sync::{Arc, RwLock};

use crate::spawn::CapabilityTable;

/// Callback supplying the operator-configured shell path, if any.
pub type ShellPathCallback = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Application context shared across subsystems.
pub struct AppContext {
    capabilities: CapabilityTable,
    shell_path_callback: RwLock<Option<ShellPathCallback>>,
}

impl AppContext {
    /// Create a context with the built-in capability table.
    pub fn new() -> Self {
        Self {
            capabilities: CapabilityTable::builtin(),
            shell_path_callback: RwLock::new(None),
        }
    }

    /// The per-agent capability table.
    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Register the callback supplying the custom shell path.
    ///
    /// Replaces any previous registration.
    pub fn set_custom_shell_path_callback(&self, callback: ShellPathCallback) {
        let mut slot = self
            .shell_path_callback
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(callback);
    }

    /// Read the custom shell path through the registered callback.
    ///
    /// Returns `None` when no callback is registered or the callback has
    /// nothing configured.
    pub fn custom_shell_path(&self) -> Option<String> {
        let slot = self
            .shell_path_callback
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_ref().and_then(|cb| cb())
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}
