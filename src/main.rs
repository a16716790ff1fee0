// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agentdeck main entry point - CLI parsing and command dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use agentdeck::cli::{self, OutputFormat, RunArgs};
use agentdeck::config::load_config;
use agentdeck::stats::TimeRange;
use agentdeck::telemetry::{init_telemetry, TelemetryConfig};
use agentdeck::types::AgentType;

/// agentdeck version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// agentdeck - drive AI coding agents through playbooks.
#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(author, version, about = "Agent process orchestration for AI coding agents", long_about = None)]
struct Cli {
    /// Show verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Agent selection on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Agent {
    /// Anthropic claude-code CLI
    ClaudeCode,
    /// OpenAI codex CLI
    Codex,
    /// opencode CLI
    Opencode,
    /// aider
    Aider,
    /// Google gemini-cli
    GeminiCli,
    /// Plain terminal commands
    Terminal,
}

impl From<Agent> for AgentType {
    fn from(agent: Agent) -> Self {
        match agent {
            Agent::ClaudeCode => AgentType::ClaudeCode,
            Agent::Codex => AgentType::Codex,
            Agent::Opencode => AgentType::Opencode,
            Agent::Aider => AgentType::Aider,
            Agent::GeminiCli => AgentType::GeminiCli,
            Agent::Terminal => AgentType::Terminal,
        }
    }
}

/// Output format for run events.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Time range selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Range {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl From<Range> for TimeRange {
    fn from(range: Range) -> Self {
        match range {
            Range::Day => TimeRange::Day,
            Range::Week => TimeRange::Week,
            Range::Month => TimeRange::Month,
            Range::Year => TimeRange::Year,
            Range::All => TimeRange::All,
        }
    }
}

/// Subcommands for agentdeck.
#[derive(Subcommand)]
enum Commands {
    /// Run a playbook against an agent
    Run {
        /// Agent to drive
        #[arg(value_enum)]
        agent: Agent,

        /// Playbook identifier (a directory under the playbook root)
        playbook: String,

        /// Report intended actions without spawning agents
        #[arg(long)]
        dry_run: bool,

        /// Skip history recording for this run
        #[arg(long)]
        no_history: bool,

        /// Stop after the first task failure
        #[arg(long)]
        abort_on_failure: bool,

        /// Execute on a remote host
        #[arg(long)]
        remote: Option<String>,

        /// Working directory for the run
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Output format for run events
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show or manage run statistics
    Stats {
        #[command(subcommand)]
        action: Option<StatsAction>,

        /// Time range to aggregate
        #[arg(short, long, value_enum, default_value = "week")]
        range: Range,

        /// Print stats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compact the stats database
    Vacuum {
        /// Vacuum regardless of database size
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}

/// Stats subcommand actions.
#[derive(Subcommand)]
enum StatsAction {
    /// Export query events as CSV
    Export {
        /// Time range to export
        #[arg(short, long, value_enum, default_value = "all")]
        range: Range,
    },
    /// List recent query events
    Events {
        /// Time range to list
        #[arg(short, long, value_enum, default_value = "week")]
        range: Range,
    },
    /// Delete data older than N days
    Clear {
        /// Age cutoff in days; must be positive
        #[arg(long)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = if cli.debug {
        TelemetryConfig::development()
    } else if cli.verbose {
        TelemetryConfig::default().with_level(tracing::Level::DEBUG)
    } else {
        TelemetryConfig::default()
    };
    let _guard = init_telemetry(&telemetry)?;

    match cli.command {
        Commands::Run {
            agent,
            playbook,
            dry_run,
            no_history,
            abort_on_failure,
            remote,
            cwd,
            format,
        } => {
            let cwd = match cwd {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            let config = load_config(&cwd)?;
            cli::run_playbook(
                RunArgs {
                    agent: agent.into(),
                    playbook,
                    cwd,
                    dry_run,
                    no_history,
                    abort_on_failure,
                    remote_id: remote,
                    format: match format {
                        Format::Text => OutputFormat::Text,
                        Format::Json => OutputFormat::Json,
                    },
                },
                config,
            )
            .await?;
        }

        Commands::Stats {
            action,
            range,
            json,
        } => {
            let cwd = std::env::current_dir()?;
            let config = load_config(&cwd)?;
            let store = cli::open_store(&cwd, &config)
                .ok_or_else(|| anyhow::anyhow!("stats store unavailable"))?;
            match action {
                None => cli::show_stats(&store, range.into(), json)?,
                Some(StatsAction::Export { range }) => cli::export_stats(&store, range.into())?,
                Some(StatsAction::Events { range }) => cli::list_events(&store, range.into())?,
                Some(StatsAction::Clear { days }) => cli::clear_stats(&store, days)?,
            }
        }

        Commands::Vacuum { force } => {
            let cwd = std::env::current_dir()?;
            let config = load_config(&cwd)?;
            let store = cli::open_store(&cwd, &config)
                .ok_or_else(|| anyhow::anyhow!("stats store unavailable"))?;
            cli::vacuum_stats(&store, force, config.vacuum_threshold_bytes)?;
        }

        Commands::Version => {
            println!("agentdeck {VERSION}");
        }
    }

    Ok(())
}
