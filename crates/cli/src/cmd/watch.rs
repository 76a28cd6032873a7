//! Run the watch loop in the foreground until Ctrl-C

use crate::system_config;
use anyhow::{Context, Result};
use intake_core::{ingestor_from_config, IntakeConfig, SettleCheck};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use watcher::{SessionSummary, TaskOutcome, WatchTask};

/// Command line settings layered over the configuration file
#[derive(Debug, Default)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub no_recursive: bool,
    pub quiescence_ms: Option<u64>,
    pub batch: bool,
    pub recheck: bool,
    pub command: Vec<String>,
}

impl Overrides {
    fn apply(self, config: &mut IntakeConfig) {
        if let Some(root) = self.root {
            config.watch.root = root;
        }
        if self.no_recursive {
            config.watch.recursive = false;
        }
        if let Some(ms) = self.quiescence_ms {
            config.watch.quiescence_window_ms = ms;
        }
        if self.batch {
            config.watch.batch = true;
        }
        if self.recheck {
            config.watch.settle_check = SettleCheck::Recheck;
        }
        if !self.command.is_empty() {
            config.ingest.command = self.command;
        }
    }
}

pub async fn run(config_path: Option<&Path>, overrides: Overrides) -> Result<()> {
    let (mut config, source) = system_config::load(config_path)?;
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let ingestor = ingestor_from_config(&config.ingest);
    let task = Arc::new(
        WatchTask::start(&config, ingestor)
            .with_context(|| format!("Failed to watch {}", config.watch.root.display()))?,
    );

    print_banner(&config, task.root(), source.as_deref());

    let completion = task.completion();
    let mut ended = tokio::task::spawn_blocking(move || completion.recv().ok());

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            println!("\n{}", "Stopping...".yellow());
            stop(Arc::clone(&task)).await?;
            (&mut ended).await.context("Watch completion waiter panicked")?
        }
        outcome = &mut ended => {
            info!("Watch loop ended by itself");
            stop(Arc::clone(&task)).await?;
            outcome.context("Watch completion waiter panicked")?
        }
    };

    match outcome {
        Some(outcome) => report(outcome),
        None => anyhow::bail!("Watch worker exited without reporting an outcome"),
    }
}

/// Join the worker off the async runtime
async fn stop(task: Arc<WatchTask>) -> Result<()> {
    tokio::task::spawn_blocking(move || task.stop())
        .await
        .context("Stop request panicked")?
        .context("Watch task did not stop cleanly")
}

fn print_banner(config: &IntakeConfig, root: &Path, source: Option<&Path>) {
    println!("{} {}", "Watching".green().bold(), root.display());
    match source {
        Some(path) => println!("  {}: {}", "config".dimmed(), path.display()),
        None => println!("  {}: {}", "config".dimmed(), "built-in defaults".dimmed()),
    }
    println!(
        "  {}: {}ms ({})",
        "quiescence".dimmed(),
        config.watch.quiescence_window_ms,
        match config.watch.settle_check {
            SettleCheck::EventTime => "event time",
            SettleCheck::Recheck => "recheck",
        }
    );
    println!(
        "  {}: {}",
        "ingest".dimmed(),
        config.classify.ingest_extensions.join(", ").cyan()
    );
    if config.ingest.command.is_empty() {
        println!("  {}: {}", "backend".dimmed(), "dry run".yellow());
    } else {
        println!("  {}: {}", "backend".dimmed(), config.ingest.command.join(" "));
    }
    if !config.watch.recursive {
        println!("  {}", "top-level directory only".yellow());
    }
    println!("{}", "Press Ctrl-C to stop".dimmed());
}

fn report(outcome: TaskOutcome) -> Result<()> {
    let summary = outcome.context("Watch session failed")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!("\n{}", "Session summary".bold());
    println!("  {} {}", "ingested".green(), summary.dispatch.ingested);
    println!("  {} {}", "skipped ".dimmed(), summary.dispatch.skipped);
    println!("  {} {}", "ignored ".dimmed(), summary.dispatch.ignored);
    if summary.dispatch.failed > 0 {
        println!("  {} {}", "failed  ".red(), summary.dispatch.failed);
    } else {
        println!("  {} {}", "failed  ".dimmed(), 0);
    }
    println!(
        "  {} {} events, {} overflows",
        "observed".dimmed(),
        summary.events,
        summary.overflows
    );
    if summary.pending_at_close > 0 {
        println!(
            "  {} {} files had not settled",
            "!".yellow(),
            summary.pending_at_close
        );
    }
}
