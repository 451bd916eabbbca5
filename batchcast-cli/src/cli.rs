//! CLI surface for batchcast: argument parsing, wiring of config and delivery channel, and
//! human-readable summaries of what the engine did.
//!
//! All business logic lives in the `batchcast` library crate. This module only decides which
//! engine operation a subcommand maps to and how its result is printed.
//!
//! Commands that deliver or retract messages (`run`, `upload-now`, `undo`) need the webhook URL
//! in `BATCHCAST_WEBHOOK_URL`; every other command works offline.
use crate::load_config::{load_config, CliConfig, WEBHOOK_URL_ENV};
use crate::webhook::{OfflineChannel, WebhookChannel};
use anyhow::{Context, Result};
use batchcast::contract::DeliveryChannel;
use batchcast::coordinator::{CycleOutcome, UploadCoordinator};
use batchcast::schedule::ScheduleState;
use batchcast::scheduler::{load_schedule, reconfigure, Scheduler};
use batchcast::store::JsonStore;
use batchcast::undo::UndoReport;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// CLI for batchcast: deliver size-bounded media batches on a daily schedule.
#[derive(Parser)]
#[clap(
    name = "batchcast",
    version,
    about = "Select, deliver and archive daily batches of media files"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true, default_value = "batchcast.yaml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted with Ctrl-C
    Run,
    /// Run one upload cycle right now
    UploadNow,
    /// Show the pending queue and a preview of the next batch
    Status,
    /// Show delivery and rating statistics
    Stats,
    /// Retract the most recently delivered batch and restore its files
    Undo,
    /// Inspect or change the daily schedule
    Schedule {
        #[clap(subcommand)]
        action: ScheduleAction,
    },
    /// Record a vote for a delivered file
    Vote {
        filename: String,
        #[clap(long)]
        voter: String,
    },
    /// List the most voted files delivered recently
    Top {
        #[clap(long, default_value_t = 7)]
        days: i64,
        #[clap(long, default_value_t = 10)]
        limit: usize,
    },
    /// Forget every delivery so all pending files become eligible again
    ClearHistory,
    /// Delete every file in the archive regardless of age
    ClearArchive,
    /// Delete archive files older than the retention window
    Expire,
}

#[derive(Subcommand, Clone, Copy)]
pub enum ScheduleAction {
    Show,
    Set {
        #[clap(long)]
        hour: u32,
        #[clap(long)]
        minute: u32,
    },
    Enable,
    Disable,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run => "run",
            Commands::UploadNow => "upload-now",
            Commands::Status => "status",
            Commands::Stats => "stats",
            Commands::Undo => "undo",
            Commands::Schedule { .. } => "schedule",
            Commands::Vote { .. } => "vote",
            Commands::Top { .. } => "top",
            Commands::ClearHistory => "clear-history",
            Commands::ClearArchive => "clear-archive",
            Commands::Expire => "expire",
        }
    }

    fn needs_delivery(&self) -> bool {
        matches!(self, Commands::Run | Commands::UploadNow | Commands::Undo)
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_config(&cli.config)?;
    let command_name = cli.command.name();
    tracing::info!(command = command_name, "Dispatching command");

    let result = if cli.command.needs_delivery() {
        let url = config
            .webhook_url
            .clone()
            .with_context(|| format!("{WEBHOOK_URL_ENV} must be set for `{command_name}`"))?;
        execute(cli.command, &config, WebhookChannel::new(url)).await
    } else {
        execute(cli.command, &config, OfflineChannel).await
    };

    match &result {
        Ok(()) => tracing::info!(command = command_name, "Command complete"),
        Err(e) => tracing::error!(command = command_name, error = %e, "Command failed"),
    }
    result
}

async fn execute<C>(command: Commands, config: &CliConfig, channel: C) -> Result<()>
where
    C: DeliveryChannel + 'static,
{
    let coordinator = Arc::new(UploadCoordinator::from_config(&config.batch, channel));
    let schedule = Arc::new(JsonStore::<ScheduleState>::new(&config.batch.schedule_file));

    match command {
        Commands::Run => {
            coordinator.catalog().ensure_dirs()?;
            if let Some(initial) = config.schedule {
                if !config.batch.schedule_file.exists() {
                    reconfigure(&schedule, initial).await?;
                }
            }
            let state = load_schedule(&schedule).await?;
            print_schedule(&state);

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let handle = tokio::spawn(Scheduler::new(coordinator, schedule).run(shutdown_rx));
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            tracing::info!("Interrupt received, stopping scheduler");
            shutdown_tx.send(true).ok();
            handle.await.context("Scheduler task panicked")?;
            println!("Scheduler stopped.");
        }
        Commands::UploadNow => {
            let outcome = coordinator.run_cycle().await?;
            print_outcome(&outcome);
        }
        Commands::Status => {
            let status = coordinator.queue_status().await?;
            println!("Queue status");
            println!("  images ready:  {}", status.images_ready);
            println!("  videos ready:  {}", status.videos_ready);
            println!("  archived:      {}", status.archived);
            println!("  order:         {}", status.order);
            println!(
                "Next batch: {} images, {} videos, {:.2} MB",
                status.next_batch_images,
                status.next_batch_videos,
                megabytes(status.next_batch_bytes)
            );
        }
        Commands::Stats => {
            let since = Utc::now() - chrono::Duration::days(7);
            let (stats, top) = futures::try_join!(coordinator.statistics(), coordinator.top_rated(since, 5))?;
            println!("Statistics");
            println!(
                "  delivered:     {} ({} images, {} videos)",
                stats.total_uploaded, stats.images_uploaded, stats.videos_uploaded
            );
            println!("  archive size:  {:.2} MB", megabytes(stats.storage_used_bytes));
            println!("  rated files:   {} ({} votes)", stats.rated_files, stats.total_votes);
            println!("  last 7 days:   {}", stats.recent_uploads_count);
            for (filename, at) in &stats.recent_uploads {
                println!("    {}  {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M"), filename);
            }
            if !top.is_empty() {
                println!("Top this week:");
                for entry in &top {
                    println!("    {:>3}  {}", entry.votes, entry.filename);
                }
            }
        }
        Commands::Undo => match coordinator.undo_last().await? {
            UndoReport::NothingToUndo => println!("Nothing to undo."),
            UndoReport::Undone {
                correlation_id,
                restored,
                failed,
            } => {
                println!("Undid batch {correlation_id}: restored {} files.", restored.len());
                for failure in &failed {
                    println!("  could not restore {failure}");
                }
            }
        },
        Commands::Schedule { action } => {
            let mut state = load_schedule(&schedule).await?;
            match action {
                ScheduleAction::Show => {}
                ScheduleAction::Set { hour, minute } => {
                    state = ScheduleState::new(state.enabled, hour, minute)?;
                    reconfigure(&schedule, state).await?;
                }
                ScheduleAction::Enable | ScheduleAction::Disable => {
                    state.enabled = matches!(action, ScheduleAction::Enable);
                    reconfigure(&schedule, state).await?;
                }
            }
            print_schedule(&state);
        }
        Commands::Vote { filename, voter } => {
            if coordinator.record_vote(&filename, &voter).await? {
                println!("Vote recorded for {filename}.");
            } else {
                println!("{voter} already voted for {filename}.");
            }
        }
        Commands::Top { days, limit } => {
            let since = Utc::now() - chrono::Duration::days(days);
            let top = coordinator.top_rated(since, limit).await?;
            if top.is_empty() {
                println!("No votes in the last {days} days.");
            }
            for (rank, entry) in top.iter().enumerate() {
                println!(
                    "{:>2}. {} ({} votes, {} voters)",
                    rank + 1,
                    entry.filename,
                    entry.votes,
                    entry.distinct_voters
                );
            }
        }
        Commands::ClearHistory => {
            let dropped = coordinator.clear_history().await?;
            println!("Cleared {dropped} delivery records.");
        }
        Commands::ClearArchive => {
            let report = coordinator.clear_archive().await?;
            println!(
                "Deleted {} archive files, {} failed.",
                report.removed.len(),
                report.failed.len()
            );
        }
        Commands::Expire => {
            let report = coordinator.expire_archive().await?;
            println!(
                "Expired {} archive files, {} failed.",
                report.removed.len(),
                report.failed.len()
            );
        }
    }
    Ok(())
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / batchcast::config::BYTES_PER_MB as f64
}

fn print_schedule(state: &ScheduleState) {
    let status = if state.enabled { "enabled" } else { "disabled" };
    println!("Daily upload at {} ({status})", state.time_label());
    if let Some(next) = state.next_run(Local::now().naive_local()) {
        println!("Next run: {}", next.format("%Y-%m-%d %H:%M"));
    }
}

fn print_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::NothingToUpload => println!("Nothing to upload."),
        CycleOutcome::Abandoned { reason } => println!("Upload abandoned: {reason}"),
        CycleOutcome::Delivered(report) => {
            println!(
                "Delivered {} images and {} videos ({:.2} MB) as message {} [{}].",
                report.images,
                report.videos,
                megabytes(report.bytes),
                report.correlation_id,
                report.tier
            );
        }
    }
}
