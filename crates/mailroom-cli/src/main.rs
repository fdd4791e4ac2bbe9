//! Mailroom CLI
//!
//! Runs the demonstration workloads against the actor runtime.

mod demo;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use demo::{FanOutReport, PingPongReport, PING_PONG_LIMIT_DEFAULT};
use mailroom_core::config::{MailroomConfig, SchedulerKind};
use mailroom_core::telemetry::{init_telemetry, TelemetryConfig};
use std::path::{Path, PathBuf};

/// Mailroom CLI
#[derive(Parser, Debug)]
#[command(name = "mailroom")]
#[command(about = "Single-process actor runtime demonstrations")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Two actors exchange ping, pong and high-priority messages
    PingPong {
        /// Scheduling policy (round_robin, priority, message_priority, fair)
        #[arg(short, long)]
        scheduler: Option<SchedulerKind>,

        /// Count at which the exchange ends
        #[arg(short, long, default_value_t = PING_PONG_LIMIT_DEFAULT)]
        limit: i64,
    },

    /// Queue work on many actors up front, then drain it
    FanOut {
        /// Number of worker actors
        #[arg(short, long, default_value_t = 10)]
        actors: usize,

        /// Messages queued per actor
        #[arg(short, long, default_value_t = 5)]
        messages: usize,

        /// Scheduling policy (round_robin, priority, message_priority, fair)
        #[arg(short, long)]
        scheduler: Option<SchedulerKind>,
    },
}

// The demos detect quiescence by polling between loop cycles, which is only
// exact on a single-threaded executor.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    init_telemetry(TelemetryConfig::new("mailroom-cli").with_log_level(level))
        .context("Failed to initialize logging")?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::PingPong { scheduler, limit } => {
            cmd_ping_pong(config_with(config, scheduler)?, limit).await
        }
        Commands::FanOut {
            actors,
            messages,
            scheduler,
        } => cmd_fan_out(config_with(config, scheduler)?, actors, messages).await,
    }
}

/// Load configuration from a file or the environment
fn load_config(path: Option<&Path>) -> Result<MailroomConfig> {
    match path {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config = MailroomConfig::from_toml_str(&source)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            Ok(config.with_env_overrides()?)
        }
        None => MailroomConfig::from_env().context("Invalid configuration in environment"),
    }
}

fn config_with(
    mut config: MailroomConfig,
    scheduler: Option<SchedulerKind>,
) -> Result<MailroomConfig> {
    if let Some(kind) = scheduler {
        config.dispatcher.scheduler.kind = kind;
    }
    config.validate()?;
    Ok(config)
}

/// Run the ping-pong demo
async fn cmd_ping_pong(config: MailroomConfig, limit: i64) -> Result<()> {
    if limit < 1 {
        anyhow::bail!("limit must be at least 1, got {}", limit);
    }

    println!("{}", "Running ping-pong...".dimmed());
    let report = demo::run_ping_pong(config.dispatcher, limit).await?;
    print_ping_pong(&report, demo::expected_ping_pong_messages(limit));
    Ok(())
}

fn print_ping_pong(report: &PingPongReport, expected: u64) {
    println!();
    println!("{} {}", "Scheduler:".bold(), report.scheduler.cyan());
    let handled = report.handled.to_string();
    if report.handled == expected {
        println!("{} {}", "Handled:".bold(), handled.green());
    } else {
        println!(
            "{} {} (expected {})",
            "Handled:".bold(),
            handled.red(),
            expected
        );
    }
    println!("{} {:?}", "Elapsed:".bold(), report.elapsed);
    println!();
}

/// Run the fan-out demo
async fn cmd_fan_out(config: MailroomConfig, actors: usize, messages: usize) -> Result<()> {
    println!(
        "{}",
        format!("Queueing {} messages on each of {} actors...", messages, actors).dimmed()
    );
    let report = demo::run_fan_out(config.dispatcher, actors, messages).await?;
    print_fan_out(&report, messages as u64);
    Ok(())
}

fn print_fan_out(report: &FanOutReport, expected: u64) {
    println!();
    println!("{} {}", "Scheduler:".bold(), report.scheduler.cyan());
    println!("{:<16} {:>10}", "ACTOR".bold(), "PROCESSED".bold());
    println!("{}", "-".repeat(27));
    for (name, processed) in &report.processed {
        let count = processed.to_string();
        let count = if *processed == expected {
            count.green()
        } else {
            count.red()
        };
        println!("{:<16} {:>10}", name, count);
    }
    println!();
    println!("{} {:?}", "Elapsed:".bold(), report.elapsed);
    println!();
}
