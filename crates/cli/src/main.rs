//! Intake CLI - intake command

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

mod cmd;
mod system_config;

/// Intake - Hand settled files from a watched directory to an importer
#[derive(Parser)]
#[command(name = "intake")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and ingest files once they settle
    Watch {
        /// Directory to watch (default: from config, else current directory)
        root: Option<PathBuf>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only watch the top-level directory
        #[arg(long)]
        no_recursive: bool,

        /// Quiescence window in milliseconds
        #[arg(long)]
        quiescence_ms: Option<u64>,

        /// Submit files settled together as one request
        #[arg(long)]
        batch: bool,

        /// Re-read modification times when a file is about to settle
        #[arg(long)]
        recheck: bool,

        /// Ingestion program and its leading arguments, after `--` (settled paths are appended)
        #[arg(last = true, value_name = "PROG")]
        command: Vec<String>,
    },
    /// Show how file names would be classified
    Classify {
        /// File names or paths
        #[arg(required = true)]
        names: Vec<String>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the effective configuration
    Config {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print an example configuration file
        #[arg(long, conflicts_with = "path")]
        example: bool,

        /// Print the configuration file in use
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit so buffered file output is flushed
    let _guard = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Watch {
            root,
            config,
            no_recursive,
            quiescence_ms,
            batch,
            recheck,
            command,
        } => {
            let overrides = cmd::watch::Overrides {
                root,
                no_recursive,
                quiescence_ms,
                batch,
                recheck,
                command,
            };
            cmd::watch::run(config.as_deref(), overrides).await
        }
        Commands::Classify { names, config } => cmd::classify::run(config.as_deref(), &names),
        Commands::Config { config, example, path } => {
            if example {
                cmd::config::run_example()
            } else if path {
                cmd::config::run_path(config.as_deref())
            } else {
                cmd::config::run_show(config.as_deref())
            }
        }
    }
}

fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    let Some(log_file) = log_file else {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let file_name = log_file
        .file_name()
        .context("Log file path has no file name")?;
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(Some(guard))
}
