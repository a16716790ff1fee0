// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persisted record types and query shapes for the run stats store.

use serde::{Deserialize, Serialize};

use crate::playbook::RunEndReason;
use crate::types::{AgentType, QuerySource};

/// Fields for one agent invocation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueryEvent {
    /// Agent session the invocation belonged to.
    pub session_id: String,
    pub agent_type: AgentType,
    pub source: QuerySource,
    /// Unix millis when the invocation started.
    pub start_time_ms: i64,
    pub duration_ms: i64,
    pub project_path: Option<String>,
    pub tab_id: Option<String>,
}

/// A stored agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEvent {
    pub id: i64,
    pub session_id: String,
    pub agent_type: AgentType,
    pub source: QuerySource,
    pub start_time_ms: i64,
    pub duration_ms: i64,
    pub project_path: Option<String>,
    pub tab_id: Option<String>,
}

/// Fields inserted when an auto run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAutoRunSession {
    /// Agent session the run targeted.
    pub session_id: String,
    pub agent_type: AgentType,
    /// Playbook identifier the run executed.
    pub playbook: String,
    pub started_at_ms: i64,
    pub tasks_total: i64,
    pub project_path: Option<String>,
}

/// The single terminal update applied to an auto run session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRunSessionUpdate {
    pub tasks_completed: i64,
    pub duration_ms: i64,
    pub end_reason: RunEndReason,
}

/// A stored auto run session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRunSession {
    pub id: i64,
    pub session_id: String,
    pub agent_type: AgentType,
    pub playbook: String,
    pub started_at_ms: i64,
    pub tasks_total: i64,
    pub tasks_completed: i64,
    /// Set by the terminal update; absent while the run is in flight.
    pub duration_ms: Option<i64>,
    /// Set by the terminal update; absent while the run is in flight.
    pub end_reason: Option<RunEndReason>,
    pub project_path: Option<String>,
}

/// Fields for one auto run task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAutoRunTask {
    /// Row id of the owning auto run session. Enforced by the schema.
    pub session_id: i64,
    pub task_index: i64,
    pub title: String,
    pub succeeded: bool,
    pub duration_ms: i64,
    pub error: Option<String>,
}

/// A stored auto run task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRunTask {
    pub id: i64,
    pub session_id: i64,
    pub task_index: i64,
    pub title: String,
    pub succeeded: bool,
    pub duration_ms: i64,
    pub error: Option<String>,
}

/// Query time window, anchored at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeRange {
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    /// Inclusive lower bound in unix millis for a query at `now_ms`.
    pub fn cutoff_ms(&self, now_ms: i64) -> i64 {
        match self {
            TimeRange::Day => now_ms - Self::DAY_MS,
            TimeRange::Week => now_ms - 7 * Self::DAY_MS,
            TimeRange::Month => now_ms - 30 * Self::DAY_MS,
            TimeRange::Year => now_ms - 365 * Self::DAY_MS,
            TimeRange::All => 0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(TimeRange::Day),
            "week" => Some(TimeRange::Week),
            "month" => Some(TimeRange::Month),
            "year" => Some(TimeRange::Year),
            "all" => Some(TimeRange::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
            TimeRange::All => "all",
        }
    }
}

/// Optional equality filters for query event listings.
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub agent_type: Option<AgentType>,
    pub source: Option<QuerySource>,
    /// Matched after path normalization.
    pub project_path: Option<String>,
}

/// Per-agent aggregation bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBucket {
    pub agent_type: AgentType,
    pub count: i64,
    pub duration_ms: i64,
}

/// Per-source aggregation bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBucket {
    pub source: QuerySource,
    pub count: i64,
    pub duration_ms: i64,
}

/// Per-day aggregation bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayBucket {
    /// UTC day in `YYYY-MM-DD` form.
    pub day: String,
    pub count: i64,
    pub duration_ms: i64,
}

/// Aggregated stats over one time range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub total_queries: i64,
    pub total_duration_ms: i64,
    pub avg_duration_ms: i64,
    pub by_agent: Vec<AgentBucket>,
    pub by_source: Vec<SourceBucket>,
    pub by_day: Vec<DayBucket>,
}

/// Outcome of one vacuum pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacuumResult {
    pub success: bool,
    pub bytes_freed: i64,
    pub error: Option<String>,
}

/// Outcome of a threshold-gated vacuum check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacuumCheck {
    /// Whether a vacuum pass actually ran.
    pub vacuumed: bool,
    /// On-disk database size at check time, in bytes.
    pub database_size: i64,
    /// Present when a pass ran.
    pub result: Option<VacuumResult>,
}

/// Per-table deletion counts from a retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearedCounts {
    pub deleted_query_events: i64,
    pub deleted_auto_run_sessions: i64,
    pub deleted_auto_run_tasks: i64,
}
