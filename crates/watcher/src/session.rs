//! Watch session and its event loop
//!
//! A [`WatchSession`] owns every registration, the debounce table and the
//! dispatcher. Its loop is single-threaded: it blocks on whichever comes
//! first of a stop request, the next batch of notifications, or the earliest
//! debounce expiry, and never handles two batches at once.
//!
//! ```text
//!            notification batch              expiry / batch done
//! IdleWaiting ------------------> Draining ------------------> IdleWaiting
//!      |                                                            |
//!      +---------------- stop request / source gone ----------------+--> Stopped
//! ```

use crate::debounce::DebounceTable;
use crate::dispatch::{DispatchSummary, Dispatched, Dispatcher};
use crate::error::WatchError;
use crate::event::{translate, EventKind, WatchEvent};
use crate::ignore::IgnoreRules;
use crate::reconcile::Reconciler;
use crate::registrar::{RegisterReport, Registrar};
use crossbeam_channel::{after, never, select, unbounded, Receiver};
use intake_core::{ExtensionClassifier, IntakeConfig, Ingestor, SettleCheck};
use notify::{RecommendedWatcher, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

/// Raw notifications as delivered by the backend callback
pub type NotifyReceiver = Receiver<notify::Result<notify::Event>>;

/// Event loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Blocked on the next notification, expiry or stop request
    IdleWaiting,
    /// Dispatching files whose expiry has passed
    Draining,
    /// Terminal
    Stopped,
}

/// Totals reported when a session ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Watch events processed
    pub events: usize,
    /// Overflows recovered from
    pub overflows: usize,
    /// Dispatch outcomes over the whole session
    pub dispatch: DispatchSummary,
    /// Files still waiting to settle at shutdown
    pub pending_at_close: usize,
    /// Registrations released at shutdown
    pub registrations_released: usize,
}

/// What woke the loop
enum Wake {
    Stop,
    Notifications(Vec<notify::Result<notify::Event>>),
    SourceGone,
    Expiry,
}

/// Everything one monitoring run owns
pub struct WatchSession<W: Watcher = RecommendedWatcher> {
    root: PathBuf,
    registrar: Registrar<W>,
    table: DebounceTable,
    ignore: IgnoreRules,
    dispatcher: Dispatcher,
    reconciler: Reconciler,
    settle_check: SettleCheck,
    events: NotifyReceiver,
    summary: SessionSummary,
    closed: bool,
}

impl WatchSession<RecommendedWatcher> {
    /// Validate the root and create the platform notification backend
    ///
    /// Nothing is registered yet; call [`WatchSession::register`] next.
    pub fn open(config: &IntakeConfig, ingestor: Arc<dyn Ingestor>) -> Result<Self, WatchError> {
        let root = validate_root(&config.watch.root)?;

        let (tx, rx) = unbounded();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                // The session is gone once the receiver drops
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;

        Self::with_watcher(root, config, ingestor, watcher, rx)
    }
}

impl<W: Watcher> WatchSession<W> {
    /// Build a session around an existing backend and its event channel
    ///
    /// `root` must already be an absolute directory path.
    pub fn with_watcher(
        root: PathBuf,
        config: &IntakeConfig,
        ingestor: Arc<dyn Ingestor>,
        watcher: W,
        events: NotifyReceiver,
    ) -> Result<Self, WatchError> {
        let ignore = IgnoreRules::load(&root, &config.ignore)?;
        let dispatcher = Dispatcher::new(
            ExtensionClassifier::from_config(&config.classify),
            ingestor,
            config.watch.batch,
        );

        Ok(Self {
            registrar: Registrar::new(watcher, config.watch.recursive),
            table: DebounceTable::new(config.watch.quiescence_window()),
            ignore,
            dispatcher,
            reconciler: Reconciler::new(SystemTime::now()),
            settle_check: config.watch.settle_check,
            events,
            summary: SessionSummary::default(),
            closed: false,
            root,
        })
    }

    /// Register the root tree
    pub fn register(&mut self) -> Result<RegisterReport, WatchError> {
        let root = self.root.clone();
        let report = self.registrar.register_tree(&root, false, &self.ignore)?;

        info!(
            "Watching {} ({} directories registered, {} skipped, {} ignore sources)",
            root.display(),
            report.registered.len(),
            report.failed.len(),
            self.ignore.active_sources()
        );
        Ok(report)
    }

    /// Run until stopped, then release everything
    pub fn run(mut self, stop: &Receiver<()>) -> SessionSummary {
        let mut state = LoopState::IdleWaiting;

        while state != LoopState::Stopped {
            let next = match state {
                LoopState::IdleWaiting => self.wait(stop),
                LoopState::Draining => {
                    if self.drain_until(SystemTime::now(), stop).interrupted() {
                        LoopState::Stopped
                    } else {
                        LoopState::IdleWaiting
                    }
                }
                LoopState::Stopped => LoopState::Stopped,
            };
            if next != state {
                debug!("Loop {:?} -> {:?}", state, next);
            }
            state = next;
        }

        self.close()
    }

    /// Block for the next thing to do
    fn wait(&mut self, stop: &Receiver<()>) -> LoopState {
        if stop_requested(stop) {
            return LoopState::Stopped;
        }

        let timeout: Receiver<Instant> = match self.table.time_until_next(SystemTime::now()) {
            Some(delay) => after(delay),
            None => never(),
        };

        let wake = select! {
            recv(stop) -> _ => Wake::Stop,
            recv(self.events) -> msg => match msg {
                Ok(first) => {
                    let mut batch = vec![first];
                    batch.extend(self.events.try_iter());
                    Wake::Notifications(batch)
                }
                Err(_) => Wake::SourceGone,
            },
            recv(timeout) -> _ => Wake::Expiry,
        };

        match wake {
            Wake::Stop => LoopState::Stopped,
            Wake::SourceGone => {
                warn!("Notification source disconnected, stopping");
                LoopState::Stopped
            }
            Wake::Expiry => LoopState::Draining,
            Wake::Notifications(batch) => {
                self.handle_notifications(batch);
                if self.registrar.is_empty() {
                    warn!("No watched directories remain under {}, stopping", self.root.display());
                    LoopState::Stopped
                } else {
                    LoopState::Draining
                }
            }
        }
    }

    fn handle_notifications(&mut self, batch: Vec<notify::Result<notify::Event>>) {
        let mut events = Vec::with_capacity(batch.len());
        for res in batch {
            match res {
                Ok(event) => events.extend(translate(&event, &self.root)),
                Err(err) => warn!("Notification backend error: {}", err),
            }
        }
        self.handle_batch(events);
    }

    /// Apply a batch of events to the registrations and the debounce table
    pub fn handle_batch(&mut self, events: Vec<WatchEvent>) {
        for event in events {
            debug!("{:?} {}", event.kind, event.path.display());
            self.summary.events += 1;

            match event.kind {
                EventKind::Create | EventKind::Modify => self.observe(&event.path, event.kind),
                EventKind::Delete => self.forget(&event.path),
                EventKind::Overflow => self.recover(&event.path),
            }
        }
    }

    /// Record a create/modify on `path`
    ///
    /// Symlinks are never followed, matching the startup walk.
    fn observe(&mut self, path: &Path, kind: EventKind) {
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                // Gone again before we looked
                if self.table.remove(path) {
                    debug!("{} vanished before settling: {}", path.display(), err);
                }
                return;
            }
        };

        if metadata.file_type().is_symlink() {
            debug!("Not following symlink {}", path.display());
            return;
        }

        if metadata.is_dir() {
            if kind == EventKind::Create && self.registrar.is_recursive() {
                self.register_new_dir(path);
            }
            return;
        }

        if !metadata.is_file() {
            return;
        }

        let mtime = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        self.touch(path, mtime);
    }

    fn touch(&mut self, path: &Path, mtime: SystemTime) {
        if self.ignore.should_ignore(path, false) {
            debug!("Ignoring {}", path.display());
            return;
        }

        let fresh = !self.table.contains(path);
        self.table.touch(path, mtime);
        if fresh {
            info!(
                "Pending {} (settles after {:?} without writes)",
                path.display(),
                self.table.window()
            );
        }
    }

    /// Register a directory that appeared inside the tree
    fn register_new_dir(&mut self, dir: &Path) {
        if self.registrar.is_watched(dir) || self.ignore.should_ignore(dir, true) {
            return;
        }

        match self.registrar.register_tree(dir, true, &self.ignore) {
            Ok(report) => {
                info!(
                    "Registered new directory {} ({} directories, {} files already inside)",
                    dir.display(),
                    report.registered.len(),
                    report.files.len()
                );
                // Files written before the watch existed produced no events
                for file in report.files {
                    if let Ok(mtime) = std::fs::metadata(&file).and_then(|m| m.modified()) {
                        self.touch(&file, mtime);
                    }
                }
            }
            Err(err) => warn!("Registration failure: {}", err),
        }
    }

    /// Handle a delete of a file or directory
    fn forget(&mut self, path: &Path) {
        let dirs = self.registrar.forget_under(path);
        let files = self.table.remove_under(path);

        if dirs > 0 {
            info!(
                "Directory {} removed ({} registrations, {} pending files dropped)",
                path.display(),
                dirs,
                files
            );
        } else if files > 0 {
            info!("{} deleted before settling", path.display());
        }
    }

    /// Re-walk after the backend dropped events
    fn recover(&mut self, path: &Path) {
        self.summary.overflows += 1;
        let scope = Reconciler::scope(path, &self.root);
        warn!("{}, rescanning", WatchError::NotificationOverflow(scope.clone()));

        match self.reconciler.recover(&scope, &mut self.registrar, &self.ignore) {
            Ok(changed) => {
                for (file, mtime) in changed {
                    self.touch(&file, mtime);
                }
            }
            Err(err) => warn!("Rescan of {} failed: {}", scope.display(), err),
        }
    }

    /// Dispatch every file whose expiry is at or before `now`
    pub fn drain(&mut self, now: SystemTime) -> DispatchSummary {
        self.drain_until(now, &never()).summary
    }

    /// Dispatch expired files, giving up between submissions once `stop` fires
    ///
    /// Files left unsubmitted go back into the table and count as pending.
    pub fn drain_until(&mut self, now: SystemTime, stop: &Receiver<()>) -> Dispatched {
        let expired = self.table.drain_expired(now);
        if expired.is_empty() {
            return Dispatched::default();
        }

        let settled = match self.settle_check {
            SettleCheck::EventTime => expired,
            SettleCheck::Recheck => self.recheck(expired, now),
        };

        for path in &settled {
            info!("Settled {}", path.display());
        }

        let outcome = self.dispatcher.dispatch(settled, stop);
        self.summary.dispatch.absorb(outcome.summary);
        for path in &outcome.unsent {
            self.table.reinstate(path.clone(), now);
        }
        outcome
    }

    /// Keep only files whose current mtime also says they have settled
    fn recheck(&mut self, expired: Vec<PathBuf>, now: SystemTime) -> Vec<PathBuf> {
        let window = self.table.window();
        let mut settled = Vec::with_capacity(expired.len());

        for path in expired {
            match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) if mtime + window > now => {
                    debug!("{} was written since its last event, waiting again", path.display());
                    self.table.touch(path, mtime);
                }
                Ok(_) => settled.push(path),
                Err(err) => debug!("{} vanished before settling: {}", path.display(), err),
            }
        }

        settled
    }

    /// Release registrations and the ingestion session (idempotent)
    pub fn close(&mut self) -> SessionSummary {
        if !self.closed {
            self.closed = true;
            self.summary.pending_at_close = self.table.len();
            self.summary.registrations_released = self.registrar.release();
            self.dispatcher.close();
            info!(
                "Watch session for {} closed ({} registrations released, {} files still pending)",
                self.root.display(),
                self.summary.registrations_released,
                self.summary.pending_at_close
            );
        }
        self.summary
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table(&self) -> &DebounceTable {
        &self.table
    }

    pub fn registrar(&self) -> &Registrar<W> {
        &self.registrar
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }
}

impl<W: Watcher> Drop for WatchSession<W> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consume a pending stop request without blocking
pub(crate) fn stop_requested(stop: &Receiver<()>) -> bool {
    match stop.try_recv() {
        Ok(()) => true,
        Err(crossbeam_channel::TryRecvError::Empty) => false,
        Err(crossbeam_channel::TryRecvError::Disconnected) => true,
    }
}

/// Resolve the root to an absolute directory
pub fn validate_root(root: &Path) -> Result<PathBuf, WatchError> {
    let unavailable = |reason: String| WatchError::PathUnavailable {
        path: root.to_path_buf(),
        reason,
    };

    let metadata = std::fs::metadata(root).map_err(|err| unavailable(err.to_string()))?;
    if !metadata.is_dir() {
        return Err(unavailable("not a directory".to_string()));
    }

    root.canonicalize().map_err(|err| unavailable(err.to_string()))
}
