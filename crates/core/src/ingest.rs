//! Ingestion backends
//!
//! The watcher only decides *when* a file is ready. Moving its bytes to the
//! destination store is the job of an [`Ingestor`].

use crate::config::IngestConfig;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Ingestion failures
#[derive(Debug, Error)]
pub enum IngestError {
    /// `submit` was called after `close`
    #[error("ingestion backend is closed")]
    Closed,

    /// The import program could not be started
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The import program ran but reported failure
    #[error("{program} exited with {status} for {count} file(s)")]
    Failed {
        program: String,
        status: String,
        count: usize,
    },

    /// Backend-specific rejection
    #[error("ingestion rejected: {0}")]
    Rejected(String),
}

/// Destination for settled files
///
/// Calls are made from the watch worker thread and may block.
pub trait Ingestor: Send + Sync {
    /// Import the given absolute paths
    fn submit(&self, paths: &[PathBuf]) -> Result<(), IngestError>;

    /// Release any held session. Must be idempotent.
    fn close(&self);
}

/// Runs an external import program with the settled paths appended
#[derive(Debug)]
pub struct CommandIngestor {
    program: String,
    args: Vec<String>,
    closed: AtomicBool,
}

impl CommandIngestor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            closed: AtomicBool::new(false),
        }
    }

    /// Build from `[program, args...]`; `None` for an empty command
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Ingestor for CommandIngestor {
    fn submit(&self, paths: &[PathBuf]) -> Result<(), IngestError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IngestError::Closed);
        }

        debug!("Running {} {:?} on {} file(s)", self.program, self.args, paths.len());

        let status = Command::new(&self.program)
            .args(&self.args)
            .args(paths)
            .status()
            .map_err(|source| IngestError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(IngestError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
                count: paths.len(),
            })
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed command ingestor for {}", self.program);
        }
    }
}

/// Logs submissions without importing anything
#[derive(Debug, Default)]
pub struct DryRunIngestor {
    submitted: Mutex<Vec<PathBuf>>,
    closed: AtomicBool,
}

impl DryRunIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path submitted so far, in order
    pub fn submitted(&self) -> Vec<PathBuf> {
        self.submitted.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Ingestor for DryRunIngestor {
    fn submit(&self, paths: &[PathBuf]) -> Result<(), IngestError> {
        if self.is_closed() {
            return Err(IngestError::Closed);
        }

        for path in paths {
            info!("Dry run: would ingest {}", path.display());
        }
        self.submitted.lock().extend_from_slice(paths);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Pick the backend described by the config
pub fn ingestor_from_config(config: &IngestConfig) -> Arc<dyn Ingestor> {
    match CommandIngestor::from_command(&config.command) {
        Some(ingestor) => Arc::new(ingestor),
        None => Arc::new(DryRunIngestor::new()),
    }
}
