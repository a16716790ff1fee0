// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Playbook execution: ordered batches of tasks driven through one agent.
//!
//! A playbook run is a lazy, finite, forward-only stream of progress
//! events. The engine owns all in-memory run state; the caller consumes
//! events and holds the cancellation signal.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   resolve    ┌──────────────────┐
//! │ PlaybookSource │─────────────▶│  PlaybookEngine  │
//! └────────────────┘  documents   │  (one loop/run)  │
//!                                 └───────┬──────────┘
//!                  spawn config ▲         │ events (mpsc)
//!                  per task     │         ▼
//!                        ┌──────┴─────┐  ┌─────────────┐
//!                        │  launcher  │  │   caller    │
//!                        └────────────┘  └─────────────┘
//! ```
//!
//! Completed work is handed to the stats recorder on an independent path;
//! recording failures surface only in logs, never in the event stream.

pub mod engine;
pub mod source;
pub mod types;

pub use engine::{PlaybookEngine, RunSpec};
pub use source::{DirectoryPlaybookSource, PlaybookSource, TaskDocument};
pub use types::{
    CancelHandle, ContinuationPolicy, PlaybookRun, PlaybookTask, RunEndReason, RunEvent,
    RunHandle, RunOptions, TaskState,
};
