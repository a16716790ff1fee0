// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Best-effort durable recording with bounded retry.
//!
//! The recorder sits between the playbook engine and the store. Inserts
//! are attempted up to three times with increasing delay; a record that
//! still cannot land is logged and dropped. The caller's workflow never
//! blocks on, waits for, or fails because of recording.
//!
//! The retry loop is an explicit state machine over an injected [`Sleep`]
//! so tests drive it without real timers.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::types::AgentType;

use super::store::StatsStore;
use super::types::{
    AutoRunSessionUpdate, NewAutoRunSession, NewAutoRunTask, NewQueryEvent,
};

/// Total insert attempts before a record is dropped.
pub const MAX_INSERT_ATTEMPTS: u32 = 3;

/// Base delay before the second attempt; doubles per attempt.
const BASE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Insert surface the recorder needs from a store.
pub trait StatsSink: Send + Sync {
    fn insert_query_event(&self, event: &NewQueryEvent) -> Result<i64, StoreError>;
    fn insert_auto_run_session(&self, session: &NewAutoRunSession) -> Result<i64, StoreError>;
    fn update_auto_run_session(
        &self,
        id: i64,
        update: &AutoRunSessionUpdate,
    ) -> Result<bool, StoreError>;
    fn insert_auto_run_task(&self, task: &NewAutoRunTask) -> Result<i64, StoreError>;
}

impl StatsSink for StatsStore {
    fn insert_query_event(&self, event: &NewQueryEvent) -> Result<i64, StoreError> {
        StatsStore::insert_query_event(self, event)
    }

    fn insert_auto_run_session(&self, session: &NewAutoRunSession) -> Result<i64, StoreError> {
        StatsStore::insert_auto_run_session(self, session)
    }

    fn update_auto_run_session(
        &self,
        id: i64,
        update: &AutoRunSessionUpdate,
    ) -> Result<bool, StoreError> {
        StatsStore::update_auto_run_session(self, id, update)
    }

    fn insert_auto_run_task(&self, task: &NewAutoRunTask) -> Result<i64, StoreError> {
        StatsStore::insert_auto_run_task(self, task)
    }
}

/// Async sleep abstraction, injectable for tests.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real tokio-backed sleep.
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Delay inserted after the given failed attempt (1-based).
pub fn next_delay(attempt: u32) -> Duration {
    BASE_RETRY_DELAY * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// States of one bounded-retry insert.
#[derive(Debug, PartialEq, Eq)]
enum RetryState {
    Attempting { attempt: u32 },
    Waiting { next_attempt: u32, delay: Duration },
    Succeeded { id: i64 },
    Exhausted,
}

/// Listener notified after each successful insert.
pub type StatsListener = Arc<dyn Fn() + Send + Sync>;

/// Records completed work units into the stats store.
pub struct StatsRecorder {
    sink: RwLock<Option<Arc<dyn StatsSink>>>,
    listener: RwLock<Option<StatsListener>>,
    sleep: Arc<dyn Sleep>,
}

impl StatsRecorder {
    /// A recorder with no store attached; recording is skipped until
    /// [`attach`](Self::attach) is called.
    pub fn new() -> Self {
        Self::with_sleep(Arc::new(TokioSleep))
    }

    /// A recorder with a custom sleep implementation.
    pub fn with_sleep(sleep: Arc<dyn Sleep>) -> Self {
        Self {
            sink: RwLock::new(None),
            listener: RwLock::new(None),
            sleep,
        }
    }

    /// Attach the store once it is open.
    pub fn attach(&self, sink: Arc<dyn StatsSink>) {
        let mut slot = self.sink.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(sink);
    }

    /// Register the listener notified on successful inserts.
    pub fn set_listener(&self, listener: StatsListener) {
        let mut slot = self.listener.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(listener);
    }

    fn sink(&self) -> Option<Arc<dyn StatsSink>> {
        self.sink
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn notify_listener(&self) {
        let listener = self
            .listener
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    /// Run one insert through the bounded-retry state machine.
    ///
    /// Returns the inserted row id, or `None` when the store is missing or
    /// every attempt failed.
    async fn try_insert<F>(
        &self,
        kind: &'static str,
        session_id: &str,
        agent_type: AgentType,
        op: F,
    ) -> Option<i64>
    where
        F: Fn(&dyn StatsSink) -> Result<i64, StoreError>,
    {
        // Store not open yet: a startup race, not a failure.
        let Some(sink) = self.sink() else {
            debug!(kind, "stats store not ready, skipping record");
            return None;
        };

        let mut state = RetryState::Attempting { attempt: 1 };
        loop {
            state = match state {
                RetryState::Attempting { attempt } => match op(sink.as_ref()) {
                    Ok(id) => RetryState::Succeeded { id },
                    Err(e) if attempt < MAX_INSERT_ATTEMPTS && e.is_retryable() => {
                        if attempt == 1 {
                            warn!(kind, session_id, error = %e, "stats insert failed, retrying");
                        }
                        RetryState::Waiting {
                            next_attempt: attempt + 1,
                            delay: next_delay(attempt),
                        }
                    }
                    Err(e) => {
                        error!(
                            kind,
                            session_id,
                            agent_type = agent_type.as_str(),
                            error = %e,
                            "stats insert failed after {attempt} attempt(s), dropping record"
                        );
                        RetryState::Exhausted
                    }
                },
                RetryState::Waiting {
                    next_attempt,
                    delay,
                } => {
                    self.sleep.sleep(delay).await;
                    RetryState::Attempting {
                        attempt: next_attempt,
                    }
                }
                RetryState::Succeeded { id } => {
                    self.notify_listener();
                    return Some(id);
                }
                RetryState::Exhausted => return None,
            };
        }
    }

    /// Record one agent invocation.
    pub async fn record_query_event(&self, event: NewQueryEvent) -> Option<i64> {
        let session_id = event.session_id.clone();
        let agent_type = event.agent_type;
        self.try_insert("query_event", &session_id, agent_type, move |sink| {
            sink.insert_query_event(&event)
        })
        .await
    }

    /// Record the start of an auto run. Returns the session row id tasks
    /// must reference.
    pub async fn begin_auto_run_session(&self, session: NewAutoRunSession) -> Option<i64> {
        let session_id = session.session_id.clone();
        let agent_type = session.agent_type;
        self.try_insert("auto_run_session", &session_id, agent_type, move |sink| {
            sink.insert_auto_run_session(&session)
        })
        .await
    }

    /// Apply the terminal update to an auto run session.
    pub async fn finish_auto_run_session(
        &self,
        id: i64,
        agent_type: AgentType,
        update: AutoRunSessionUpdate,
    ) -> bool {
        let session_id = id.to_string();
        self.try_insert("auto_run_session_update", &session_id, agent_type, move |sink| {
            sink.update_auto_run_session(id, &update).map(|_| id)
        })
        .await
        .is_some()
    }

    /// Record one auto run task outcome.
    pub async fn record_auto_run_task(
        &self,
        agent_type: AgentType,
        task: NewAutoRunTask,
    ) -> Option<i64> {
        let session_id = task.session_id.to_string();
        self.try_insert("auto_run_task", &session_id, agent_type, move |sink| {
            sink.insert_auto_run_task(&task)
        })
        .await
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
