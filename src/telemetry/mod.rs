// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing and observability infrastructure.

mod init;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
