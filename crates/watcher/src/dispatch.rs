//! Ingestion dispatch for settled files

use crate::session::stop_requested;
use crossbeam_channel::Receiver;
use intake_core::{Disposition, ExtensionClassifier, Ingestor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Counts for one dispatch round
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Files accepted by the ingestion backend
    pub ingested: usize,
    /// Known noise files dropped
    pub skipped: usize,
    /// Unrecognized files dropped
    pub ignored: usize,
    /// Files the backend failed on
    pub failed: usize,
}

impl DispatchSummary {
    pub fn absorb(&mut self, other: DispatchSummary) {
        self.ingested += other.ingested;
        self.skipped += other.skipped;
        self.ignored += other.ignored;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.ingested + self.skipped + self.ignored + self.failed
    }
}

/// Outcome of one dispatch round
#[derive(Debug, Default)]
pub struct Dispatched {
    pub summary: DispatchSummary,
    /// Ingestible files left unsubmitted because a stop was requested
    pub unsent: Vec<PathBuf>,
}

impl Dispatched {
    pub fn interrupted(&self) -> bool {
        !self.unsent.is_empty()
    }
}

/// Classifies settled files and hands ingestible ones to the backend
pub struct Dispatcher {
    classifier: ExtensionClassifier,
    ingestor: Arc<dyn Ingestor>,
    batch: bool,
}

impl Dispatcher {
    pub fn new(classifier: ExtensionClassifier, ingestor: Arc<dyn Ingestor>, batch: bool) -> Self {
        Self {
            classifier,
            ingestor,
            batch,
        }
    }

    /// Dispatch files that settled together
    ///
    /// Backend failures are logged and counted; the files are not retried.
    /// `stop` is checked before every submission, and whatever has not been
    /// submitted when it fires is handed back in [`Dispatched::unsent`].
    pub fn dispatch(&self, paths: Vec<PathBuf>, stop: &Receiver<()>) -> Dispatched {
        let mut outcome = Dispatched::default();
        let mut ready = Vec::new();

        for path in paths {
            match self.classifier.classify(&path) {
                Disposition::Ingest => ready.push(path),
                Disposition::SkipNotice => {
                    info!("Settled {} is a known sidecar file, skipping", path.display());
                    outcome.summary.skipped += 1;
                }
                Disposition::Ignore => {
                    info!("Settled {} is not a recognised file type", path.display());
                    outcome.summary.ignored += 1;
                }
            }
        }

        if ready.is_empty() {
            return outcome;
        }

        if self.batch {
            if stop_requested(stop) {
                outcome.unsent = ready;
            } else {
                self.submit(&ready, &mut outcome.summary);
            }
        } else {
            let mut ready = ready.into_iter();
            while let Some(path) = ready.next() {
                if stop_requested(stop) {
                    outcome.unsent.push(path);
                    outcome.unsent.extend(ready.by_ref());
                    break;
                }
                self.submit(std::slice::from_ref(&path), &mut outcome.summary);
            }
        }

        if outcome.interrupted() {
            info!(
                "Stop requested, {} settled files left unsubmitted",
                outcome.unsent.len()
            );
        }
        outcome
    }

    fn submit(&self, paths: &[PathBuf], summary: &mut DispatchSummary) {
        match self.ingestor.submit(paths) {
            Ok(()) => {
                for path in paths {
                    info!("Ingested {}", path.display());
                }
                summary.ingested += paths.len();
            }
            Err(err) => {
                for path in paths {
                    warn!("Ingestion failed for {}: {}", path.display(), err);
                }
                summary.failed += paths.len();
            }
        }
    }

    /// Release the backend session
    pub fn close(&self) {
        self.ingestor.close();
    }
}
