//! Watcher error taxonomy
//!
//! Only `PathUnavailable`, `Backend` and `Spawn` ever reach the caller of
//! `WatchTask::start`. Everything else is recovered inside the loop and logged.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the watch machinery
#[derive(Debug, Error)]
pub enum WatchError {
    /// The root does not exist or is not a directory
    #[error("watch root {path} is unavailable: {reason}")]
    PathUnavailable { path: PathBuf, reason: String },

    /// A directory could not be subscribed to notifications
    #[error("failed to watch {path}: {source}")]
    Registration {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The platform dropped events under this directory
    #[error("notification queue overflowed under {0}")]
    NotificationOverflow(PathBuf),

    /// The notification backend could not be created
    #[error("failed to start notification backend: {0}")]
    Backend(#[from] notify::Error),

    /// `.intakeignore` or a configured pattern is malformed
    #[error("invalid ignore rules: {0}")]
    Ignore(#[from] ignore::Error),

    /// The worker thread could not be spawned
    #[error("failed to spawn watch worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread panicked before reaching Stopped
    #[error("watch worker panicked")]
    WorkerPanicked,
}

impl WatchError {
    /// Path the error refers to, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            WatchError::PathUnavailable { path, .. }
            | WatchError::Registration { path, .. }
            | WatchError::NotificationOverflow(path) => Some(path),
            _ => None,
        }
    }
}
