//! Background execution of a watch session
//!
//! [`WatchTask`] is the only handle the surrounding application needs: it
//! starts the event loop on its own thread and stops it cooperatively. The
//! session itself never leaves the worker thread.

use crate::error::WatchError;
use crate::session::{stop_requested, SessionSummary, WatchSession};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use intake_core::{IntakeConfig, Ingestor};
use notify::Watcher;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, info};

/// How a session ended
pub type TaskOutcome = Result<SessionSummary, WatchError>;

/// Handle to a running watch loop
pub struct WatchTask {
    root: PathBuf,
    stop_tx: Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    /// Disconnects once the worker thread has exited
    exited: Receiver<()>,
    ready: Receiver<()>,
    completion: Receiver<TaskOutcome>,
}

impl WatchTask {
    /// Validate the configuration and start watching in the background
    ///
    /// Returns as soon as the worker is spawned. A missing or non-directory
    /// root is reported here and no worker is started.
    pub fn start(config: &IntakeConfig, ingestor: Arc<dyn Ingestor>) -> Result<Self, WatchError> {
        let session = WatchSession::open(config, ingestor)?;
        Self::spawn(session)
    }

    /// Run an already opened session on a worker thread
    pub fn spawn<W>(session: WatchSession<W>) -> Result<Self, WatchError>
    where
        W: Watcher + Send + 'static,
    {
        let root = session.root().to_path_buf();
        let (stop_tx, stop_rx) = bounded(1);
        let (ready_tx, ready) = bounded(1);
        let (done_tx, completion) = bounded(1);
        let (alive_tx, exited) = bounded::<()>(0);

        let worker = thread::Builder::new()
            .name("intake-watch".to_string())
            .spawn(move || {
                let _alive = alive_tx;
                let outcome = run_worker(session, &stop_rx, &ready_tx);
                let _ = done_tx.send(outcome);
            })
            .map_err(WatchError::Spawn)?;
        let worker_id = worker.thread().id();

        info!("Started watch task for {}", root.display());

        Ok(Self {
            root,
            stop_tx,
            worker: Mutex::new(Some(worker)),
            worker_id,
            exited,
            ready,
            completion,
        })
    }

    /// Request a stop and wait for the loop to release its resources
    ///
    /// Safe to call repeatedly and from several threads. The first call joins
    /// the worker; concurrent callers block until the worker has exited.
    pub fn stop(&self) -> Result<(), WatchError> {
        // A full channel means a stop is already queued
        let _ = self.stop_tx.try_send(());

        if self.worker_id == thread::current().id() {
            debug!("Stop requested from the watch worker itself, not joining");
            return Ok(());
        }

        let Some(handle) = self.worker.lock().take() else {
            // Returns once every sender is gone, i.e. the worker has exited
            let _ = self.exited.recv();
            return Ok(());
        };

        handle.join().map_err(|_| WatchError::WorkerPanicked)?;
        info!("Stopped watch task for {}", self.root.display());
        Ok(())
    }

    /// Wait until the root tree is registered
    ///
    /// Returns `false` on timeout, or if the worker ended before registering.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.ready.recv_timeout(timeout).is_ok()
    }

    /// Channel yielding the outcome once the loop has returned
    pub fn completion(&self) -> Receiver<TaskOutcome> {
        self.completion.clone()
    }

    /// Wait up to `timeout` for the loop to end on its own
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        match self.completion.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for WatchTask {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("Watch task for {} ended badly: {}", self.root.display(), err);
        }
    }
}

fn run_worker<W: Watcher>(
    mut session: WatchSession<W>,
    stop_rx: &Receiver<()>,
    ready_tx: &Sender<()>,
) -> TaskOutcome {
    // A stop that arrives during startup must keep the loop from ever waiting
    if stop_requested(stop_rx) {
        debug!("Stop requested before registration");
        return Ok(session.close());
    }

    if let Err(err) = session.register() {
        error!("Cannot watch {}: {}", session.root().display(), err);
        session.close();
        return Err(err);
    }

    if stop_requested(stop_rx) {
        debug!("Stop requested during registration");
        return Ok(session.close());
    }

    let _ = ready_tx.try_send(());
    Ok(session.run(stop_rx))
}
