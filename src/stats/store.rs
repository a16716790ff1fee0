// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SQLite-backed run stats store.
//!
//! Owns the persisted QueryEvent/AutoRunSession/AutoRunTask records, the
//! versioned schema, and maintenance (vacuum, retention). WAL mode is set
//! at open, before any migration or query, so readers stay live during
//! writes. Serialization of writers is the store's job; callers never
//! coordinate.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::playbook::RunEndReason;
use crate::types::{AgentType, QuerySource};

use super::migrations::{Migration, MIGRATIONS};
use super::types::{
    AgentBucket, AggregatedStats, AutoRunSession, AutoRunSessionUpdate, AutoRunTask,
    ClearedCounts, DayBucket, NewAutoRunSession, NewAutoRunTask, NewQueryEvent, QueryEvent,
    QueryFilters, SourceBucket, TimeRange, VacuumCheck, VacuumResult,
};

/// Vacuum threshold used on open when none is configured.
pub const DEFAULT_VACUUM_THRESHOLD_BYTES: i64 = 100 * 1024 * 1024;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// One row of the append-only migrations log.
#[derive(Debug, Clone)]
pub struct MigrationLogEntry {
    pub version: u32,
    pub description: String,
    pub applied_at: String,
    pub status: String,
    pub error: Option<String>,
}

/// Get the stats directory for a project.
pub fn get_stats_directory(project_root: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(project_root.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let hash_short = &hash[..8];

    let project_name = Path::new(project_root)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentdeck")
        .join("stats")
        .join(format!("{}-{}", project_name, hash_short))
}

/// Normalize a path-valued field to forward slashes, no trailing separator.
///
/// Applied before storage and before equality filtering, so the same
/// logical path matches regardless of which platform notation supplied it.
/// Idempotent.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// SQLite-backed stats store.
pub struct StatsStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl StatsStore {
    /// Open or create the stats database for the given project.
    pub fn open(project_root: &str) -> Result<Self, StoreError> {
        let dir = get_stats_directory(project_root);
        std::fs::create_dir_all(&dir)?;
        Self::open_at(&dir.join("stats.db"))
    }

    /// Open or create the stats database at a specific path.
    ///
    /// This is useful for testing or when you want a custom location.
    pub fn open_at(db_path: &Path) -> Result<Self, StoreError> {
        Self::open_at_with_threshold(db_path, DEFAULT_VACUUM_THRESHOLD_BYTES)
    }

    /// Open with an explicit vacuum threshold for the on-open size check.
    pub fn open_at_with_threshold(
        db_path: &Path,
        vacuum_threshold_bytes: i64,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(db_path)?;

        // WAL must be active before migrations or queries run.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER NOT NULL,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                status TEXT NOT NULL,
                error TEXT
            );",
        )?;

        run_migrations(&mut conn, MIGRATIONS)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };

        // A failed compaction is reported but never blocks readiness; the
        // applied schema stands.
        let check = store.vacuum_if_needed(Some(vacuum_threshold_bytes));
        if let Some(result) = &check.result {
            if !result.success {
                warn!(
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "startup vacuum failed"
                );
            }
        }

        Ok(store)
    }

    /// The database file path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Current schema version from the database's own metadata.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        let conn = self.lock();
        let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    /// All rows of the append-only migrations log, oldest first.
    pub fn migration_log(&self) -> Result<Vec<MigrationLogEntry>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT version, description, applied_at, status, error
             FROM schema_migrations ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MigrationLogEntry {
                version: row.get(0)?,
                description: row.get(1)?,
                applied_at: row.get(2)?,
                status: row.get(3)?,
                error: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------
    // Inserts
    // ------------------------------------------------------------------

    /// Record one agent invocation. Returns the new row id.
    pub fn insert_query_event(&self, event: &NewQueryEvent) -> Result<i64, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO query_events
                (session_id, agent_type, source, start_time_ms, duration_ms, project_path, tab_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.session_id,
                event.agent_type.as_str(),
                event.source.as_str(),
                event.start_time_ms,
                event.duration_ms,
                event.project_path.as_deref().map(normalize_path),
                event.tab_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record the start of an auto run. Returns the new row id.
    pub fn insert_auto_run_session(
        &self,
        session: &NewAutoRunSession,
    ) -> Result<i64, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO auto_run_sessions
                (session_id, agent_type, playbook, started_at_ms, tasks_total, project_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.session_id,
                session.agent_type.as_str(),
                session.playbook,
                session.started_at_ms,
                session.tasks_total,
                session.project_path.as_deref().map(normalize_path),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Apply the single terminal update to an auto run session.
    ///
    /// Returns false when no row with the given id exists.
    pub fn update_auto_run_session(
        &self,
        id: i64,
        update: &AutoRunSessionUpdate,
    ) -> Result<bool, StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE auto_run_sessions
             SET tasks_completed = ?1, duration_ms = ?2, end_reason = ?3
             WHERE id = ?4",
            params![
                update.tasks_completed,
                update.duration_ms,
                update.end_reason.as_str(),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Record one auto run task outcome. Returns the new row id.
    ///
    /// The owning session row must already exist; the foreign key rejects
    /// orphan tasks.
    pub fn insert_auto_run_task(&self, task: &NewAutoRunTask) -> Result<i64, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO auto_run_tasks
                (session_id, task_index, title, succeeded, duration_ms, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                task.session_id,
                task.task_index,
                task.title,
                task.succeeded as i64,
                task.duration_ms,
                task.error,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// List query events within a range, newest first.
    pub fn get_query_events(
        &self,
        range: TimeRange,
        filters: &QueryFilters,
    ) -> Result<Vec<QueryEvent>, StoreError> {
        let cutoff = range.cutoff_ms(Utc::now().timestamp_millis());
        let normalized_path = filters.project_path.as_deref().map(normalize_path);

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, agent_type, source, start_time_ms, duration_ms,
                    project_path, tab_id
             FROM query_events
             WHERE start_time_ms >= ?1
               AND (?2 IS NULL OR agent_type = ?2)
               AND (?3 IS NULL OR source = ?3)
               AND (?4 IS NULL OR project_path = ?4)
             ORDER BY start_time_ms DESC",
        )?;
        let rows = stmt.query_map(
            params![
                cutoff,
                filters.agent_type.map(|a| a.as_str()),
                filters.source.map(|s| s.as_str()),
                normalized_path,
            ],
            row_to_query_event,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// List auto run sessions within a range, newest first.
    pub fn get_auto_run_sessions(
        &self,
        range: TimeRange,
    ) -> Result<Vec<AutoRunSession>, StoreError> {
        let cutoff = range.cutoff_ms(Utc::now().timestamp_millis());
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, agent_type, playbook, started_at_ms, tasks_total,
                    tasks_completed, duration_ms, end_reason, project_path
             FROM auto_run_sessions
             WHERE started_at_ms >= ?1
             ORDER BY started_at_ms DESC",
        )?;
        let rows = stmt.query_map(params![cutoff], row_to_auto_run_session)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// List one session's tasks, ordered by task index ascending.
    pub fn get_auto_run_tasks(&self, session_id: i64) -> Result<Vec<AutoRunTask>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, task_index, title, succeeded, duration_ms, error
             FROM auto_run_tasks
             WHERE session_id = ?1
             ORDER BY task_index ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(AutoRunTask {
                id: row.get(0)?,
                session_id: row.get(1)?,
                task_index: row.get(2)?,
                title: row.get(3)?,
                succeeded: row.get::<_, i64>(4)? != 0,
                duration_ms: row.get(5)?,
                error: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Aggregate query events over a range.
    pub fn get_aggregated_stats(&self, range: TimeRange) -> Result<AggregatedStats, StoreError> {
        let cutoff = range.cutoff_ms(Utc::now().timestamp_millis());
        let conn = self.lock();

        let (total_queries, total_duration_ms): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_ms), 0)
             FROM query_events WHERE start_time_ms >= ?1",
            params![cutoff],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let avg_duration_ms = if total_queries > 0 {
            total_duration_ms / total_queries
        } else {
            0
        };

        let mut by_agent = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT agent_type, COUNT(*), SUM(duration_ms)
             FROM query_events WHERE start_time_ms >= ?1
             GROUP BY agent_type ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (agent, count, duration_ms) = row?;
            if let Some(agent_type) = AgentType::parse(&agent) {
                by_agent.push(AgentBucket {
                    agent_type,
                    count,
                    duration_ms,
                });
            }
        }

        let mut by_source = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT source, COUNT(*), SUM(duration_ms)
             FROM query_events WHERE start_time_ms >= ?1
             GROUP BY source ORDER BY source",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (source, count, duration_ms) = row?;
            if let Some(source) = QuerySource::parse(&source) {
                by_source.push(SourceBucket {
                    source,
                    count,
                    duration_ms,
                });
            }
        }

        let mut by_day = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT date(start_time_ms / 1000, 'unixepoch') AS day, COUNT(*), SUM(duration_ms)
             FROM query_events WHERE start_time_ms >= ?1
             GROUP BY day ORDER BY day",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok(DayBucket {
                day: row.get(0)?,
                count: row.get(1)?,
                duration_ms: row.get(2)?,
            })
        })?;
        for row in rows {
            by_day.push(row?);
        }

        Ok(AggregatedStats {
            total_queries,
            total_duration_ms,
            avg_duration_ms,
            by_agent,
            by_source,
            by_day,
        })
    }

    /// Export query events in a range as CSV, newest first.
    pub fn export_csv(&self, range: TimeRange) -> Result<String, StoreError> {
        let events = self.get_query_events(range, &QueryFilters::default())?;
        let mut csv = String::from(
            "id,session_id,agent_type,source,start_time_ms,duration_ms,project_path,tab_id\n",
        );
        for event in &events {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                event.id,
                csv_escape(&event.session_id),
                event.agent_type.as_str(),
                event.source.as_str(),
                event.start_time_ms,
                event.duration_ms,
                csv_escape(event.project_path.as_deref().unwrap_or("")),
                csv_escape(event.tab_id.as_deref().unwrap_or("")),
            ));
        }
        Ok(csv)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// On-disk database size in bytes.
    pub fn database_size(&self) -> i64 {
        std::fs::metadata(&self.db_path)
            .map(|m| m.len() as i64)
            .unwrap_or(0)
    }

    /// Run a blocking compaction pass.
    ///
    /// Failure is reported in the result, never raised: a store with stale
    /// free pages is still a working store.
    pub fn vacuum(&self) -> VacuumResult {
        let size_before = self.database_size();
        let result = {
            let conn = self.lock();
            conn.execute_batch("VACUUM")
        };
        match result {
            Ok(()) => {
                let bytes_freed = (size_before - self.database_size()).max(0);
                info!(bytes_freed, "vacuum complete");
                VacuumResult {
                    success: true,
                    bytes_freed,
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "vacuum failed");
                VacuumResult {
                    success: false,
                    bytes_freed: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Vacuum only when the database exceeds the threshold.
    ///
    /// A threshold of zero or below forces compaction unconditionally.
    pub fn vacuum_if_needed(&self, threshold_bytes: Option<i64>) -> VacuumCheck {
        let threshold = threshold_bytes.unwrap_or(DEFAULT_VACUUM_THRESHOLD_BYTES);
        let database_size = self.database_size();

        if threshold > 0 && database_size < threshold {
            return VacuumCheck {
                vacuumed: false,
                database_size,
                result: None,
            };
        }

        let result = self.vacuum();
        VacuumCheck {
            vacuumed: true,
            database_size,
            result: Some(result),
        }
    }

    /// Delete records older than the given number of days from all tables.
    ///
    /// The cutoff is computed once and shared by every table. `days` must
    /// be positive; validation happens before any deletion.
    pub fn clear_old_data(&self, older_than_days: i64) -> Result<ClearedCounts, StoreError> {
        if older_than_days <= 0 {
            return Err(StoreError::InvalidArgument(
                "olderThanDays must be greater than 0".to_string(),
            ));
        }

        let cutoff = Utc::now().timestamp_millis() - older_than_days * DAY_MS;
        let conn = self.lock();

        // Tasks carry no timestamp of their own; age follows the owning
        // session.
        let deleted_auto_run_tasks = conn.execute(
            "DELETE FROM auto_run_tasks WHERE session_id IN
                (SELECT id FROM auto_run_sessions WHERE started_at_ms < ?1)",
            params![cutoff],
        )? as i64;
        let deleted_auto_run_sessions = conn.execute(
            "DELETE FROM auto_run_sessions WHERE started_at_ms < ?1",
            params![cutoff],
        )? as i64;
        let deleted_query_events = conn.execute(
            "DELETE FROM query_events WHERE start_time_ms < ?1",
            params![cutoff],
        )? as i64;

        info!(
            deleted_query_events,
            deleted_auto_run_sessions, deleted_auto_run_tasks, "cleared old stats"
        );

        Ok(ClearedCounts {
            deleted_query_events,
            deleted_auto_run_sessions,
            deleted_auto_run_tasks,
        })
    }
}

fn row_to_query_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueryEvent> {
    let agent: String = row.get(2)?;
    let source: String = row.get(3)?;
    Ok(QueryEvent {
        id: row.get(0)?,
        session_id: row.get(1)?,
        agent_type: AgentType::parse(&agent).unwrap_or(AgentType::Terminal),
        source: QuerySource::parse(&source).unwrap_or(QuerySource::User),
        start_time_ms: row.get(4)?,
        duration_ms: row.get(5)?,
        project_path: row.get(6)?,
        tab_id: row.get(7)?,
    })
}

fn row_to_auto_run_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<AutoRunSession> {
    let agent: String = row.get(2)?;
    let end_reason: Option<String> = row.get(8)?;
    Ok(AutoRunSession {
        id: row.get(0)?,
        session_id: row.get(1)?,
        agent_type: AgentType::parse(&agent).unwrap_or(AgentType::Terminal),
        playbook: row.get(3)?,
        started_at_ms: row.get(4)?,
        tasks_total: row.get(5)?,
        tasks_completed: row.get(6)?,
        duration_ms: row.get(7)?,
        end_reason: end_reason.as_deref().and_then(RunEndReason::parse),
        project_path: row.get(9)?,
    })
}

/// Run all pending migrations, one transaction per version step.
fn run_migrations(conn: &mut Connection, migrations: &[Migration]) -> Result<(), StoreError> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    for migration in migrations.iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        let applied = (migration.apply)(&tx).and_then(|()| {
            tx.pragma_update(None, "user_version", migration.version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, description, status) VALUES (?1, ?2, 'ok')",
                params![migration.version, migration.description],
            )?;
            Ok(())
        });

        match applied {
            Ok(()) => {
                tx.commit()?;
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applied migration"
                );
            }
            Err(e) => {
                // Roll back the step, then log the failure outside it.
                drop(tx);
                let _ = conn.execute(
                    "INSERT INTO schema_migrations (version, description, status, error)
                     VALUES (?1, ?2, 'failed', ?3)",
                    params![migration.version, migration.description, e.to_string()],
                );
                error!(
                    version = migration.version,
                    error = %e,
                    "migration failed, schema left at previous version"
                );
                return Err(StoreError::Migration {
                    version: migration.version,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::migrations::target_version;
    use rusqlite::OptionalExtension;
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, StatsStore) {
        let temp = tempdir().unwrap();
        let store = StatsStore::open_at(&temp.path().join("stats.db")).unwrap();
        (temp, store)
    }

    fn sample_event(session: &str, start_ms: i64, duration_ms: i64) -> NewQueryEvent {
        NewQueryEvent {
            session_id: session.to_string(),
            agent_type: AgentType::ClaudeCode,
            source: QuerySource::User,
            start_time_ms: start_ms,
            duration_ms,
            project_path: Some("/home/dev/project".to_string()),
            tab_id: None,
        }
    }

    #[test]
    fn test_open_runs_all_migrations() {
        let (_temp, store) = open_store();
        assert_eq!(store.schema_version().unwrap(), target_version());

        let log = store.migration_log().unwrap();
        assert_eq!(log.len(), MIGRATIONS.len());
        assert!(log.iter().all(|entry| entry.status == "ok"));
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("stats.db");
        drop(StatsStore::open_at(&path).unwrap());
        let store = StatsStore::open_at(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), target_version());
        // No duplicate log rows from the second open.
        assert_eq!(store.migration_log().unwrap().len(), MIGRATIONS.len());
    }

    #[test]
    fn test_failed_migration_rolls_back_and_logs() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("stats.db");
        let store = StatsStore::open_at(&path).unwrap();
        drop(store);

        let mut conn = Connection::open(&path).unwrap();
        let broken = [Migration {
            version: 99,
            description: "broken step",
            apply: |tx| tx.execute_batch("CREATE TABLE broken (id INTEGER); SYNTAX ERROR;"),
        }];
        let err = run_migrations(&mut conn, &broken).unwrap_err();
        assert!(matches!(err, StoreError::Migration { version: 99, .. }));

        // The partial table must not survive the rollback.
        let broken_exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name='broken'",
                [],
                |row| row.get(0),
            )
            .optional()
            .unwrap();
        assert!(broken_exists.is_none());

        // Version unchanged, failure row appended.
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, target_version());
        let (status, error): (String, Option<String>) = conn
            .query_row(
                "SELECT status, error FROM schema_migrations WHERE version = 99",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "failed");
        assert!(error.is_some());
    }

    #[test]
    fn test_insert_and_read_query_events() {
        let (_temp, store) = open_store();
        let now = Utc::now().timestamp_millis();
        let id = store.insert_query_event(&sample_event("s-1", now, 1500)).unwrap();
        assert!(id > 0);

        let events = store
            .get_query_events(TimeRange::Day, &QueryFilters::default())
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session_id, "s-1");
        assert_eq!(events[0].agent_type, AgentType::ClaudeCode);
    }

    #[test]
    fn test_query_event_filters() {
        let (_temp, store) = open_store();
        let now = Utc::now().timestamp_millis();
        store.insert_query_event(&sample_event("s-1", now, 100)).unwrap();
        let mut auto = sample_event("s-2", now, 200);
        auto.source = QuerySource::Auto;
        auto.agent_type = AgentType::Codex;
        store.insert_query_event(&auto).unwrap();

        let filters = QueryFilters {
            source: Some(QuerySource::Auto),
            ..Default::default()
        };
        let events = store.get_query_events(TimeRange::All, &filters).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session_id, "s-2");

        let filters = QueryFilters {
            agent_type: Some(AgentType::ClaudeCode),
            ..Default::default()
        };
        let events = store.get_query_events(TimeRange::All, &filters).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session_id, "s-1");
    }

    #[test]
    fn test_path_filter_matches_across_notations() {
        let (_temp, store) = open_store();
        let now = Utc::now().timestamp_millis();
        let mut event = sample_event("s-1", now, 100);
        event.project_path = Some("C:\\Users\\dev\\project".to_string());
        store.insert_query_event(&event).unwrap();

        let filters = QueryFilters {
            project_path: Some("C:/Users/dev/project/".to_string()),
            ..Default::default()
        };
        let events = store.get_query_events(TimeRange::All, &filters).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].project_path.as_deref(),
            Some("C:/Users/dev/project")
        );
    }

    #[test]
    fn test_auto_run_round_trip() {
        let (_temp, store) = open_store();
        let now = Utc::now().timestamp_millis();

        let session_id = store
            .insert_auto_run_session(&NewAutoRunSession {
                session_id: "agent-session-1".to_string(),
                agent_type: AgentType::ClaudeCode,
                playbook: "release".to_string(),
                started_at_ms: now,
                tasks_total: 3,
                project_path: None,
            })
            .unwrap();

        let task_id = store
            .insert_auto_run_task(&NewAutoRunTask {
                session_id,
                task_index: 0,
                title: "Build".to_string(),
                succeeded: true,
                duration_ms: 1200,
                error: None,
            })
            .unwrap();
        assert!(task_id > 0);

        let tasks = store.get_auto_run_tasks(session_id).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].session_id, session_id);
        assert_eq!(tasks[0].task_index, 0);

        let updated = store
            .update_auto_run_session(
                session_id,
                &AutoRunSessionUpdate {
                    tasks_completed: 3,
                    duration_ms: 4500,
                    end_reason: RunEndReason::Completed,
                },
            )
            .unwrap();
        assert!(updated);

        let sessions = store.get_auto_run_sessions(TimeRange::Day).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].tasks_completed, 3);
        assert_eq!(sessions[0].duration_ms, Some(4500));
        assert_eq!(sessions[0].end_reason, Some(RunEndReason::Completed));
    }

    #[test]
    fn test_update_missing_session_returns_false() {
        let (_temp, store) = open_store();
        let updated = store
            .update_auto_run_session(
                42,
                &AutoRunSessionUpdate {
                    tasks_completed: 0,
                    duration_ms: 0,
                    end_reason: RunEndReason::Cancelled,
                },
            )
            .unwrap();
        assert!(!updated);
    }

    #[test]
    fn test_orphan_task_rejected_by_schema() {
        let (_temp, store) = open_store();
        let result = store.insert_auto_run_task(&NewAutoRunTask {
            session_id: 999,
            task_index: 0,
            title: "Orphan".to_string(),
            succeeded: false,
            duration_ms: 0,
            error: None,
        });
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn test_tasks_ordered_by_index() {
        let (_temp, store) = open_store();
        let session_id = store
            .insert_auto_run_session(&NewAutoRunSession {
                session_id: "s".to_string(),
                agent_type: AgentType::Aider,
                playbook: "p".to_string(),
                started_at_ms: Utc::now().timestamp_millis(),
                tasks_total: 3,
                project_path: None,
            })
            .unwrap();
        for index in [2, 0, 1] {
            store
                .insert_auto_run_task(&NewAutoRunTask {
                    session_id,
                    task_index: index,
                    title: format!("task {index}"),
                    succeeded: true,
                    duration_ms: 10,
                    error: None,
                })
                .unwrap();
        }
        let tasks = store.get_auto_run_tasks(session_id).unwrap();
        let indexes: Vec<i64> = tasks.iter().map(|t| t.task_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_aggregated_stats_sums_match() {
        let (_temp, store) = open_store();
        let now = Utc::now().timestamp_millis();
        store.insert_query_event(&sample_event("a", now, 100)).unwrap();
        store.insert_query_event(&sample_event("b", now - DAY_MS, 200)).unwrap();
        let mut auto = sample_event("c", now, 300);
        auto.source = QuerySource::Auto;
        auto.agent_type = AgentType::Codex;
        store.insert_query_event(&auto).unwrap();

        let stats = store.get_aggregated_stats(TimeRange::Week).unwrap();
        assert_eq!(stats.total_queries, 3);
        assert_eq!(stats.total_duration_ms, 600);
        assert_eq!(stats.avg_duration_ms, 200);

        let day_count: i64 = stats.by_day.iter().map(|d| d.count).sum();
        let day_duration: i64 = stats.by_day.iter().map(|d| d.duration_ms).sum();
        assert_eq!(day_count, stats.total_queries);
        assert_eq!(day_duration, stats.total_duration_ms);

        let agent_count: i64 = stats.by_agent.iter().map(|a| a.count).sum();
        let source_count: i64 = stats.by_source.iter().map(|s| s.count).sum();
        assert_eq!(agent_count, stats.total_queries);
        assert_eq!(source_count, stats.total_queries);
    }

    #[test]
    fn test_aggregated_stats_empty_range() {
        let (_temp, store) = open_store();
        let stats = store.get_aggregated_stats(TimeRange::Day).unwrap();
        assert_eq!(stats.total_queries, 0);
        assert_eq!(stats.avg_duration_ms, 0);
        assert!(stats.by_day.is_empty());
    }

    #[test]
    fn test_clear_old_data_validates_days() {
        let (_temp, store) = open_store();
        for days in [0, -5] {
            let err = store.clear_old_data(days).unwrap_err();
            assert!(matches!(err, StoreError::InvalidArgument(_)));
        }
        // Valid call with nothing to delete reports all-zero counts.
        let counts = store.clear_old_data(30).unwrap();
        assert_eq!(counts, ClearedCounts::default());
    }

    #[test]
    fn test_clear_old_data_deletes_across_tables() {
        let (_temp, store) = open_store();
        let now = Utc::now().timestamp_millis();
        let old = now - 40 * DAY_MS;

        store.insert_query_event(&sample_event("old", old, 100)).unwrap();
        store.insert_query_event(&sample_event("new", now, 100)).unwrap();

        let old_session = store
            .insert_auto_run_session(&NewAutoRunSession {
                session_id: "old-run".to_string(),
                agent_type: AgentType::ClaudeCode,
                playbook: "p".to_string(),
                started_at_ms: old,
                tasks_total: 1,
                project_path: None,
            })
            .unwrap();
        store
            .insert_auto_run_task(&NewAutoRunTask {
                session_id: old_session,
                task_index: 0,
                title: "t".to_string(),
                succeeded: true,
                duration_ms: 5,
                error: None,
            })
            .unwrap();

        let counts = store.clear_old_data(30).unwrap();
        assert_eq!(counts.deleted_query_events, 1);
        assert_eq!(counts.deleted_auto_run_sessions, 1);
        assert_eq!(counts.deleted_auto_run_tasks, 1);

        let remaining = store
            .get_query_events(TimeRange::All, &QueryFilters::default())
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].session_id, "new");
    }

    #[test]
    fn test_vacuum_reports_success() {
        let (_temp, store) = open_store();
        let result = store.vacuum();
        assert!(result.success);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_vacuum_if_needed_threshold() {
        let (_temp, store) = open_store();

        // A fresh database is far below 100MB.
        let check = store.vacuum_if_needed(None);
        assert!(!check.vacuumed);
        assert!(check.result.is_none());

        // Zero or negative thresholds force the pass.
        for threshold in [0, -1] {
            let check = store.vacuum_if_needed(Some(threshold));
            assert!(check.vacuumed);
            assert!(check.result.unwrap().success);
        }
    }

    #[test]
    fn test_normalize_path_idempotent() {
        for path in [
            "C:\\Users\\dev\\project",
            "C:/Users/dev/project",
            "/home/dev/project/",
            "relative\\dir",
            "/",
        ] {
            let once = normalize_path(path);
            assert_eq!(normalize_path(&once), once);
        }
    }

    #[test]
    fn test_normalize_path_unifies_notations() {
        assert_eq!(
            normalize_path("C:\\Users\\dev\\project"),
            normalize_path("C:/Users/dev/project/")
        );
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/home/dev//"), "/home/dev");
    }

    #[test]
    fn test_export_csv() {
        let (_temp, store) = open_store();
        let now = Utc::now().timestamp_millis();
        let mut event = sample_event("s-1", now, 100);
        event.project_path = Some("/home/dev/with,comma".to_string());
        store.insert_query_event(&event).unwrap();

        let csv = store.export_csv(TimeRange::All).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,session_id,agent_type,source,start_time_ms,duration_ms,project_path,tab_id"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("claude-code"));
        assert!(row.contains("\"/home/dev/with,comma\""));
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
