//! Overflow reconciliation
//!
//! When the platform reports that events were dropped, the affected directory
//! is walked again: directories are re-registered and files modified since the
//! session started are fed back into the debounce table.

use crate::error::WatchError;
use crate::ignore::IgnoreRules;
use crate::registrar::Registrar;
use notify::Watcher;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Recovers from missed notifications under a directory
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    /// Files older than this were already present at startup and are left alone
    since: SystemTime,
}

impl Reconciler {
    pub fn new(since: SystemTime) -> Self {
        Self { since }
    }

    /// Pick the directory to walk for an overflow reported on `path`
    pub fn scope(path: &Path, root: &Path) -> PathBuf {
        if !path.starts_with(root) {
            return root.to_path_buf();
        }
        if path.is_dir() {
            return path.to_path_buf();
        }
        match path.parent() {
            Some(parent) if parent.starts_with(root) && parent.is_dir() => parent.to_path_buf(),
            _ => root.to_path_buf(),
        }
    }

    /// Re-register `dir` and return files changed since startup with their mtimes
    pub fn recover<W: Watcher>(
        &self,
        dir: &Path,
        registrar: &mut Registrar<W>,
        ignore: &IgnoreRules,
    ) -> Result<Vec<(PathBuf, SystemTime)>, WatchError> {
        let report = registrar.register_tree(dir, true, ignore)?;

        let changed = self.changed_since(report.files);

        info!(
            "Rescanned {}: {} directories registered, {} changed files",
            dir.display(),
            report.registered.len(),
            changed.len()
        );
        Ok(changed)
    }

    /// Keep files whose mtime is newer than the session start
    fn changed_since(&self, files: Vec<PathBuf>) -> Vec<(PathBuf, SystemTime)> {
        files
            .into_iter()
            .filter_map(|path| {
                let mtime = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                    Ok(mtime) => mtime,
                    Err(err) => {
                        debug!("Cannot stat {} during rescan: {}", path.display(), err);
                        return None;
                    }
                };
                (mtime > self.since).then_some((path, mtime))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::testing::FakeWatcher;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_recover_finds_missed_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        // Present before the session started
        let old = root.join("old.tif");
        fs::write(&old, b"old").unwrap();
        let old_time = SystemTime::now() - Duration::from_secs(600);
        set_file_mtime(&old, FileTime::from_system_time(old_time)).unwrap();

        let since = SystemTime::now() - Duration::from_secs(60);

        // Arrived while events were being dropped
        fs::create_dir_all(root.join("new_run")).unwrap();
        let missed = root.join("new_run/missed.tif");
        fs::write(&missed, b"new").unwrap();

        let fake = FakeWatcher::default();
        let mut registrar = Registrar::new(fake, true);
        let reconciler = Reconciler::new(since);

        let changed = reconciler
            .recover(root, &mut registrar, &IgnoreRules::builtin(root))
            .unwrap();

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, missed);
        assert!(registrar.is_watched(&root.join("new_run")));
    }

    #[test]
    fn test_scope() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();

        assert_eq!(Reconciler::scope(&root.join("sub"), root), root.join("sub"));
        assert_eq!(
            Reconciler::scope(&root.join("sub/gone.tif"), root),
            root.join("sub")
        );
        assert_eq!(
            Reconciler::scope(&root.join("missing/x.tif"), root),
            root.to_path_buf()
        );
        assert_eq!(
            Reconciler::scope(Path::new("/elsewhere"), root),
            root.to_path_buf()
        );
    }
}
