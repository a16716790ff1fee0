// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Command implementations for the agentdeck binary.
//!
//! Everything here is a thin rendering of the library's event streams and
//! store queries: machine callers get newline-delimited JSON, humans get
//! colored text. No orchestration logic lives at this layer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tracing::warn;

use crate::config::ResolvedConfig;
use crate::context::AppContext;
use crate::launcher::AgentProcessLauncher;
use crate::playbook::{
    ContinuationPolicy, DirectoryPlaybookSource, PlaybookEngine, PlaybookSource, RunEvent,
    RunOptions, RunSpec,
};
use crate::spawn::RemoteExecution;
use crate::stats::{QueryFilters, StatsRecorder, StatsStore, TimeRange};
use crate::types::AgentType;

/// Output rendering for run events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Flags for the `run` command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub agent: AgentType,
    pub playbook: String,
    pub cwd: PathBuf,
    pub dry_run: bool,
    pub no_history: bool,
    pub abort_on_failure: bool,
    pub remote_id: Option<String>,
    pub format: OutputFormat,
}

/// Open the stats store for a project, honoring a configured override.
pub fn open_store(cwd: &PathBuf, config: &ResolvedConfig) -> Option<Arc<StatsStore>> {
    let result = match &config.database_path {
        Some(path) => StatsStore::open_at_with_threshold(
            std::path::Path::new(path),
            config.vacuum_threshold_bytes,
        ),
        None => StatsStore::open(&cwd.display().to_string()),
    };
    match result {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            // Runs proceed without history rather than failing outright.
            warn!(error = %e, "stats store unavailable, history disabled");
            None
        }
    }
}

/// Execute a playbook run and render its event stream.
pub async fn run_playbook(args: RunArgs, config: ResolvedConfig) -> anyhow::Result<()> {
    let ctx = Arc::new(AppContext::new());
    if let Some(shell) = config.custom_shell_path.clone() {
        ctx.set_custom_shell_path_callback(Arc::new(move || Some(shell.clone())));
    }

    let recorder = Arc::new(StatsRecorder::new());
    if !args.dry_run && !args.no_history {
        if let Some(store) = open_store(&args.cwd, &config) {
            recorder.attach(store);
        }
    }

    let source = DirectoryPlaybookSource::new(args.cwd.join(&config.playbook_dir));
    let documents = source.resolve(&args.playbook)?;

    let launcher = Arc::new(
        AgentProcessLauncher::new().with_timeout(Duration::from_secs(config.task_timeout_secs)),
    );
    let engine = PlaybookEngine::new(ctx, launcher, recorder);

    let continuation = if args.abort_on_failure || config.abort_on_failure {
        ContinuationPolicy::AbortOnFailure
    } else {
        ContinuationPolicy::ContinueOnFailure
    };

    let mut handle = engine.start(RunSpec {
        agent: args.agent,
        session_id: uuid::Uuid::new_v4().to_string(),
        playbook: args.playbook.clone(),
        documents,
        cwd: args.cwd.clone(),
        project_path: Some(args.cwd.display().to_string()),
        options: RunOptions {
            dry_run: args.dry_run,
            write_history: config.write_history && !args.no_history,
            continuation,
            remote: args.remote_id.map(RemoteExecution::remote),
        },
    });

    while let Some(event) = handle.events.recv().await {
        render_event(&event, args.format);
    }
    let _ = handle.done.await;

    Ok(())
}

fn render_event(event: &RunEvent, format: OutputFormat) {
    if format == OutputFormat::Json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    match event {
        RunEvent::TaskStart { message, .. } => println!("{}", message.dimmed()),
        RunEvent::TaskComplete {
            message,
            duration_ms,
            percent,
            ..
        } => println!(
            "{} {} ({}ms, {}%)",
            "✓".green(),
            message,
            duration_ms,
            percent
        ),
        RunEvent::TaskFailed { message, error, .. } => {
            println!("{} {}: {}", "✗".red(), message, error.red())
        }
        RunEvent::RunComplete {
            message,
            duration_ms,
            ..
        } => println!("{} ({}ms)", message.bold(), duration_ms),
    }
}

/// Print aggregated stats for a range.
pub fn show_stats(store: &StatsStore, range: TimeRange, json: bool) -> anyhow::Result<()> {
    let stats = store.get_aggregated_stats(range)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", format!("Stats ({})", range.as_str()).bold());
    println!("  queries: {}", stats.total_queries);
    println!("  total duration: {}ms", stats.total_duration_ms);
    println!("  avg duration: {}ms", stats.avg_duration_ms);

    if !stats.by_agent.is_empty() {
        println!("{}", "By agent:".bold());
        for bucket in &stats.by_agent {
            println!(
                "  {:<12} {:>6} queries {:>10}ms",
                bucket.agent_type.as_str(),
                bucket.count,
                bucket.duration_ms
            );
        }
    }

    if !stats.by_day.is_empty() {
        println!("{}", "By day:".bold());
        for bucket in &stats.by_day {
            println!(
                "  {} {:>6} queries {:>10}ms",
                bucket.day, bucket.count, bucket.duration_ms
            );
        }
    }

    Ok(())
}

/// Print recent query events as CSV.
pub fn export_stats(store: &StatsStore, range: TimeRange) -> anyhow::Result<()> {
    print!("{}", store.export_csv(range)?);
    Ok(())
}

/// Delete stats older than the given number of days.
pub fn clear_stats(store: &StatsStore, days: i64) -> anyhow::Result<()> {
    let counts = store.clear_old_data(days)?;
    println!(
        "deleted {} query events, {} auto run sessions, {} auto run tasks",
        counts.deleted_query_events,
        counts.deleted_auto_run_sessions,
        counts.deleted_auto_run_tasks
    );
    Ok(())
}

/// Compact the stats database, optionally unconditionally.
pub fn vacuum_stats(store: &StatsStore, force: bool, threshold: i64) -> anyhow::Result<()> {
    let check = store.vacuum_if_needed(Some(if force { 0 } else { threshold }));
    match check.result {
        Some(result) if result.success => {
            println!("vacuumed, freed {} bytes", result.bytes_freed)
        }
        Some(result) => anyhow::bail!(
            "vacuum failed: {}",
            result.error.unwrap_or_else(|| "unknown".to_string())
        ),
        None => println!(
            "skipped: database is {} bytes, below threshold",
            check.database_size
        ),
    }
    Ok(())
}

/// List recent query events for debugging.
pub fn list_events(store: &StatsStore, range: TimeRange) -> anyhow::Result<()> {
    let events = store.get_query_events(range, &QueryFilters::default())?;
    for event in events {
        println!(
            "{} {:<12} {:<5} {}ms session={}",
            event.start_time_ms,
            event.agent_type.as_str(),
            event.source.as_str(),
            event.duration_ms,
            event.session_id
        );
    }
    Ok(())
}
