// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Run stats: durable recording of agent invocations and auto runs.
//!
//! Two halves with a deliberate seam between them:
//!
//! - **Store**: SQLite persistence with a versioned, forward-only schema,
//!   WAL-mode concurrent reads, startup compaction, and retention.
//! - **Recorder**: bounded-retry insert front door. Completed work is
//!   recorded best-effort; a store outage slows nothing down and fails
//!   nothing upstream.
//!
//! ```text
//! engine ──record──▶ StatsRecorder ──(≤3 attempts, backoff)──▶ StatsStore
//!                        │                                        │
//!                        └── "stats updated" listener             └─ SQLite (WAL)
//! ```

pub mod migrations;
pub mod recorder;
pub mod store;
pub mod types;

pub use recorder::{
    next_delay, Sleep, StatsListener, StatsRecorder, StatsSink, TokioSleep, MAX_INSERT_ATTEMPTS,
};
pub use store::{
    get_stats_directory, normalize_path, MigrationLogEntry, StatsStore,
    DEFAULT_VACUUM_THRESHOLD_BYTES,
};
pub use types::{
    AgentBucket, AggregatedStats, AutoRunSession, AutoRunSessionUpdate, AutoRunTask,
    ClearedCounts, DayBucket, NewAutoRunSession, NewAutoRunTask, NewQueryEvent, QueryEvent,
    QueryFilters, SourceBucket, TimeRange, VacuumCheck, VacuumResult,
};
