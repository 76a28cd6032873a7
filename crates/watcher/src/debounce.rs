//! Per-path debouncing
//!
//! A single table maps each pending file to the instant it is considered
//! settled (`last modification + quiescence window`). The event loop bounds
//! its blocking wait by the earliest expiry instead of arming a timer per file.
//!
//! Invariant: one entry per path, always computed from the most recently
//! observed modification time, so a file that keeps being written keeps
//! moving its expiry forward.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Pending files and their settle deadlines
#[derive(Debug, Clone)]
pub struct DebounceTable {
    window: Duration,
    expiries: HashMap<PathBuf, SystemTime>,
}

impl DebounceTable {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            expiries: HashMap::new(),
        }
    }

    /// Quiescence window added to every modification time
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Insert or overwrite the expiry for `path`
    ///
    /// Returns the new expiry.
    pub fn touch(&mut self, path: impl Into<PathBuf>, last_modified: SystemTime) -> SystemTime {
        let expiry = last_modified + self.window;
        self.expiries.insert(path.into(), expiry);
        expiry
    }

    /// Put back a path with an already computed expiry
    ///
    /// A newer entry for the same path wins.
    pub fn reinstate(&mut self, path: PathBuf, expiry: SystemTime) {
        self.expiries.entry(path).or_insert(expiry);
    }

    /// Drop a pending entry; returns whether it existed
    pub fn remove(&mut self, path: &Path) -> bool {
        self.expiries.remove(path).is_some()
    }

    /// Drop every entry at or below `dir`; returns how many were removed
    pub fn remove_under(&mut self, dir: &Path) -> usize {
        let before = self.expiries.len();
        self.expiries.retain(|path, _| !path.starts_with(dir));
        before - self.expiries.len()
    }

    /// Earliest expiry, `None` when nothing is pending
    pub fn next_expiry(&self) -> Option<SystemTime> {
        self.expiries.values().min().copied()
    }

    /// How long to block before the earliest expiry, clamped at zero
    pub fn time_until_next(&self, now: SystemTime) -> Option<Duration> {
        self.next_expiry()
            .map(|expiry| expiry.duration_since(now).unwrap_or(Duration::ZERO))
    }

    /// Remove and return every path whose expiry is `<= now`, earliest first
    pub fn drain_expired(&mut self, now: SystemTime) -> Vec<PathBuf> {
        let mut expired: Vec<(PathBuf, SystemTime)> = self
            .expiries
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(path, expiry)| (path.clone(), *expiry))
            .collect();

        for (path, _) in &expired {
            self.expiries.remove(path);
        }

        expired.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        expired.into_iter().map(|(path, _)| path).collect()
    }

    pub fn expiry_of(&self, path: &Path) -> Option<SystemTime> {
        self.expiries.get(path).copied()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.expiries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn at(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(ms)
    }

    fn table() -> DebounceTable {
        DebounceTable::new(Duration::from_millis(200))
    }

    #[test]
    fn test_empty_table_has_no_expiry() {
        let t = table();
        assert!(t.is_empty());
        assert_eq!(t.next_expiry(), None);
        assert_eq!(t.time_until_next(at(0)), None);
    }

    #[test]
    fn test_latest_modification_wins() {
        let mut t = table();
        let a = PathBuf::from("/in/a.tif");

        t.touch(&a, at(0));
        t.touch(&a, at(100));
        t.touch(&a, at(150));

        assert_eq!(t.len(), 1);
        assert_eq!(t.expiry_of(&a), Some(at(350)));

        // Nothing fires at the expiry of the earlier writes
        assert!(t.drain_expired(at(200)).is_empty());
        assert!(t.drain_expired(at(349)).is_empty());
        assert_eq!(t.drain_expired(at(350)), vec![a.clone()]);
        assert!(t.is_empty());
    }

    #[test]
    fn test_touch_with_older_mtime_overwrites() {
        // Most recent *event* wins, even if the file's mtime was set backwards
        let mut t = table();
        let a = PathBuf::from("/in/a.tif");
        t.touch(&a, at(1_000));
        t.touch(&a, at(10));
        assert_eq!(t.expiry_of(&a), Some(at(210)));
    }

    #[test]
    fn test_remove_prevents_drain() {
        let mut t = table();
        let a = PathBuf::from("/in/a.tif");
        t.touch(&a, at(0));

        assert!(t.remove(&a));
        assert!(!t.remove(&a));
        assert!(t.drain_expired(at(10_000)).is_empty());
    }

    #[test]
    fn test_remove_under_directory() {
        let mut t = table();
        t.touch("/in/run1/a.tif", at(0));
        t.touch("/in/run1/deep/b.tif", at(0));
        t.touch("/in/run10/c.tif", at(0));
        t.touch("/in/d.tif", at(0));

        assert_eq!(t.remove_under(Path::new("/in/run1")), 2);
        assert_eq!(t.len(), 2);
        assert!(t.contains(Path::new("/in/run10/c.tif")));
    }

    #[test]
    fn test_next_expiry_is_minimum() {
        let mut t = table();
        t.touch("/in/late.tif", at(500));
        t.touch("/in/early.tif", at(100));
        t.touch("/in/mid.tif", at(300));

        assert_eq!(t.next_expiry(), Some(at(300)));
        assert_eq!(t.time_until_next(at(250)), Some(Duration::from_millis(50)));
        assert_eq!(t.time_until_next(at(900)), Some(Duration::ZERO));
    }

    #[test]
    fn test_drain_returns_expiry_order_and_keeps_pending() {
        let mut t = table();
        t.touch("/in/b.tif", at(50));
        t.touch("/in/a.tif", at(0));
        t.touch("/in/c.tif", at(1_000));

        let drained = t.drain_expired(at(300));
        assert_eq!(
            drained,
            vec![PathBuf::from("/in/a.tif"), PathBuf::from("/in/b.tif")]
        );
        assert_eq!(t.len(), 1);
        assert_eq!(t.next_expiry(), Some(at(1_200)));
    }

    #[test]
    fn test_reinstate_keeps_newer_entry() {
        let mut t = table();
        let a = PathBuf::from("/in/a.tif");
        let b = PathBuf::from("/in/b.tif");

        t.reinstate(a.clone(), at(200));
        assert_eq!(t.expiry_of(&a), Some(at(200)));

        t.touch(&b, at(500));
        t.reinstate(b.clone(), at(200));
        assert_eq!(t.expiry_of(&b), Some(at(700)));
    }
}
