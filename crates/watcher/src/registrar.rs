//! Recursive directory registration
//!
//! Every directory in the watched tree gets its own non-recursive
//! subscription. New subdirectories are registered reactively by the event
//! loop, so the set of registrations always mirrors the live tree.

use crate::error::WatchError;
use crate::ignore::IgnoreRules;
use notify::{RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Opaque handle for one directory registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Outcome of a registration walk
#[derive(Debug, Default)]
pub struct RegisterReport {
    /// Directories now registered (including ones that already were)
    pub registered: Vec<PathBuf>,
    /// Subdirectories that could not be watched; their subtrees were skipped
    pub failed: Vec<PathBuf>,
    /// Files found during the walk (only when requested)
    pub files: Vec<PathBuf>,
}

/// Owns the notification backend and the directory -> handle map
pub struct Registrar<W: Watcher> {
    watcher: W,
    dirs: BTreeMap<PathBuf, WatchId>,
    next_id: u64,
    recursive: bool,
}

impl<W: Watcher> Registrar<W> {
    pub fn new(watcher: W, recursive: bool) -> Self {
        Self {
            watcher,
            dirs: BTreeMap::new(),
            next_id: 0,
            recursive,
        }
    }

    /// Register `dir` and, when recursive, every subdirectory below it
    ///
    /// Fails only if `dir` itself cannot be watched. Failures further down are
    /// logged and that subtree is left out. With `collect_files`, regular
    /// files found along the way are returned so the caller can pick up
    /// anything written before the watch was in place.
    pub fn register_tree(
        &mut self,
        dir: &Path,
        collect_files: bool,
        ignore: &IgnoreRules,
    ) -> Result<RegisterReport, WatchError> {
        let mut report = RegisterReport::default();

        self.watch_dir(dir)?;
        report.registered.push(dir.to_path_buf());

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut entries = WalkDir::new(dir)
            .follow_links(false)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under {}: {}", dir.display(), err);
                    continue;
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if ignore.should_ignore(path, true) {
                    debug!("Not registering ignored directory {}", path.display());
                    entries.skip_current_dir();
                    continue;
                }
                if !self.recursive {
                    continue;
                }
                match self.watch_dir(path) {
                    Ok(_) => report.registered.push(path.to_path_buf()),
                    Err(err) => {
                        warn!("Registration failure, skipping subtree: {}", err);
                        report.failed.push(path.to_path_buf());
                        entries.skip_current_dir();
                    }
                }
            } else if collect_files && file_type.is_file() && !ignore.should_ignore(path, false) {
                report.files.push(path.to_path_buf());
            }
        }

        Ok(report)
    }

    /// Subscribe a single directory (no-op if already registered)
    fn watch_dir(&mut self, dir: &Path) -> Result<WatchId, WatchError> {
        if let Some(id) = self.dirs.get(dir) {
            return Ok(*id);
        }

        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Registration {
                path: dir.to_path_buf(),
                source,
            })?;

        let id = WatchId(self.next_id);
        self.next_id += 1;
        self.dirs.insert(dir.to_path_buf(), id);
        debug!("Registered {} as {}", dir.display(), id);
        Ok(id)
    }

    /// Drop registrations for `dir` and everything below it
    ///
    /// Returns how many registrations were removed.
    pub fn forget_under(&mut self, dir: &Path) -> usize {
        let doomed: Vec<PathBuf> = self
            .dirs
            .range(dir.to_path_buf()..)
            .take_while(|(path, _)| path.starts_with(dir))
            .map(|(path, _)| path.clone())
            .collect();

        for path in &doomed {
            self.dirs.remove(path);
            // The backend usually dropped the watch already when the directory vanished
            if let Err(err) = self.watcher.unwatch(path) {
                debug!("Unwatch of {} reported: {}", path.display(), err);
            }
        }

        doomed.len()
    }

    /// Release every registration; returns how many were held
    pub fn release(&mut self) -> usize {
        let dirs = std::mem::take(&mut self.dirs);
        for path in dirs.keys() {
            if let Err(err) = self.watcher.unwatch(path) {
                debug!("Unwatch of {} reported: {}", path.display(), err);
            }
        }
        dirs.len()
    }

    pub fn is_watched(&self, dir: &Path) -> bool {
        self.dirs.contains_key(dir)
    }

    pub fn id_of(&self, dir: &Path) -> Option<WatchId> {
        self.dirs.get(dir).copied()
    }

    /// Handle to directory mapping for every live registration
    pub fn handles(&self) -> BTreeMap<WatchId, PathBuf> {
        self.dirs
            .iter()
            .map(|(path, id)| (*id, path.clone()))
            .collect()
    }

    /// Registered directories in path order
    pub fn watched_dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.keys().map(PathBuf::as_path)
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use notify::{Config, EventHandler, RecursiveMode, Watcher, WatcherKind};
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// In-memory watcher recording calls, optionally refusing some paths
    #[derive(Clone, Default)]
    pub struct FakeWatcher {
        pub watched: Arc<Mutex<Vec<PathBuf>>>,
        pub unwatched: Arc<Mutex<Vec<PathBuf>>>,
        pub refuse: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl Watcher for FakeWatcher {
        fn new<F: EventHandler>(_event_handler: F, _config: Config) -> notify::Result<Self> {
            Ok(Self::default())
        }

        fn watch(&mut self, path: &Path, _recursive_mode: RecursiveMode) -> notify::Result<()> {
            if self.refuse.lock().iter().any(|p| p == path) {
                return Err(notify::Error::generic("permission denied"));
            }
            self.watched.lock().push(path.to_path_buf());
            Ok(())
        }

        fn unwatch(&mut self, path: &Path) -> notify::Result<()> {
            self.unwatched.lock().push(path.to_path_buf());
            Ok(())
        }

        fn kind() -> WatcherKind {
            WatcherKind::NullWatcher
        }
    }
}
