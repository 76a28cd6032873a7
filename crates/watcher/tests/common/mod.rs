//! Shared helpers for watcher integration tests

use intake_core::{IngestError, Ingestor, IntakeConfig};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// One `submit` call as seen by the backend
#[derive(Debug, Clone)]
pub struct Submission {
    pub paths: Vec<PathBuf>,
    pub at: SystemTime,
}

/// Ingestor that records every call and can be told to fail for a file name
#[derive(Default)]
pub struct RecordingIngestor {
    submissions: Mutex<Vec<Submission>>,
    fail_for: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl RecordingIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `submit` fail whenever a path with this file name is included
    pub fn fail_for(&self, name: &str) {
        self.fail_for.lock().push(name.to_string());
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    /// File names submitted so far, in order
    pub fn names(&self) -> Vec<String> {
        self.submissions
            .lock()
            .iter()
            .flat_map(|s| s.paths.iter())
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Ingestor for RecordingIngestor {
    fn submit(&self, paths: &[PathBuf]) -> Result<(), IngestError> {
        self.submissions.lock().push(Submission {
            paths: paths.to_vec(),
            at: SystemTime::now(),
        });

        let fail_for = self.fail_for.lock();
        for path in paths {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            if let Some(name) = name {
                if fail_for.contains(&name) {
                    return Err(IngestError::Rejected(format!("{} refused by server", name)));
                }
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Config watching `root` with a short quiescence window
pub fn config_for(root: &Path, window_ms: u64) -> IntakeConfig {
    let mut config = IntakeConfig::default();
    config.watch.root = root.to_path_buf();
    config.watch.quiescence_window_ms = window_ms;
    config
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
