// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ordered, versioned schema migrations for the stats store.
//!
//! The current schema version lives in SQLite's `user_version` pragma. Each
//! pending migration runs inside its own transaction: the schema change and
//! the version bump commit together or not at all. Every step appends a row
//! to the `schema_migrations` log (success rows inside the step's
//! transaction, failure rows after rollback), so a half-applied schema can
//! never go unnoticed.

use rusqlite::Transaction;

/// One versioned schema step.
pub struct Migration {
    /// Target schema version after this step.
    pub version: u32,
    /// Short description recorded in the migrations log.
    pub description: &'static str,
    /// Apply the step inside the given transaction.
    pub apply: fn(&Transaction) -> rusqlite::Result<()>,
}

/// All migrations, strictly ordered by version.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create query_events",
        apply: |tx| {
            tx.execute_batch(
                r#"
                CREATE TABLE query_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    agent_type TEXT NOT NULL,
                    source TEXT NOT NULL,
                    start_time_ms INTEGER NOT NULL,
                    duration_ms INTEGER NOT NULL,
                    project_path TEXT,
                    tab_id TEXT
                );

                CREATE INDEX idx_query_events_start_time ON query_events(start_time_ms);
                CREATE INDEX idx_query_events_agent ON query_events(agent_type);
                "#,
            )
        },
    },
    Migration {
        version: 2,
        description: "create auto_run_sessions and auto_run_tasks",
        apply: |tx| {
            tx.execute_batch(
                r#"
                CREATE TABLE auto_run_sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    agent_type TEXT NOT NULL,
                    playbook TEXT NOT NULL,
                    started_at_ms INTEGER NOT NULL,
                    tasks_total INTEGER NOT NULL,
                    tasks_completed INTEGER NOT NULL DEFAULT 0,
                    duration_ms INTEGER,
                    project_path TEXT
                );

                CREATE TABLE auto_run_tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id INTEGER NOT NULL REFERENCES auto_run_sessions(id) ON DELETE CASCADE,
                    task_index INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    succeeded INTEGER NOT NULL,
                    duration_ms INTEGER NOT NULL,
                    error TEXT
                );

                CREATE INDEX idx_auto_run_sessions_started ON auto_run_sessions(started_at_ms);
                CREATE INDEX idx_auto_run_tasks_session ON auto_run_tasks(session_id, task_index);
                "#,
            )
        },
    },
    Migration {
        version: 3,
        description: "add end_reason to auto_run_sessions",
        apply: |tx| {
            tx.execute_batch("ALTER TABLE auto_run_sessions ADD COLUMN end_reason TEXT;")
        },
    },
];

/// The schema version the code targets.
pub fn target_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_strictly_ordered() {
        let mut previous = 0;
        for migration in MIGRATIONS {
            assert!(
                migration.version > previous,
                "migration versions must strictly increase"
            );
            previous = migration.version;
        }
    }

    #[test]
    fn test_target_version_is_last() {
        assert_eq!(target_version(), MIGRATIONS.last().unwrap().version);
    }
}
