//! Ignore rules for the intake tree
//!
//! Supports multiple sources of ignore patterns:
//! 1. Built-in patterns (editor temp files, OS metadata, partial downloads - always active)
//! 2. `.intakeignore` at the watch root (gitignore syntax, optional)
//! 3. Config-based patterns (gitignore syntax)
//!
//! Ignored files never reach the debounce table, and ignored directories are
//! never registered.

use crate::error::WatchError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use intake_core::IgnoreConfig;
use std::path::{Path, PathBuf};

/// Name of the per-tree ignore file
pub const IGNORE_FILE: &str = ".intakeignore";

/// Ignore rule manager
pub struct IgnoreRules {
    /// Watch root
    root: PathBuf,

    /// `.intakeignore` plus configured patterns (optional)
    custom: Option<Gitignore>,
}

impl IgnoreRules {
    /// Load ignore rules for a watch root
    pub fn load(root: &Path, config: &IgnoreConfig) -> Result<Self, WatchError> {
        let ignore_file = root.join(IGNORE_FILE);
        let use_file = config.use_ignore_file && ignore_file.is_file();

        let custom = if use_file || !config.patterns.is_empty() {
            let mut builder = GitignoreBuilder::new(root);
            if use_file {
                if let Some(err) = builder.add(&ignore_file) {
                    return Err(err.into());
                }
            }
            for pattern in &config.patterns {
                builder.add_line(None, pattern)?;
            }
            Some(builder.build()?)
        } else {
            None
        };

        Ok(Self {
            root: root.to_path_buf(),
            custom,
        })
    }

    /// Rules with only the built-in patterns
    pub fn builtin(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            custom: None,
        }
    }

    /// Check if path should be ignored
    pub fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
        if !is_dir && is_builtin_ignored(path) {
            return true;
        }

        // The matcher panics on paths outside its root
        match &self.custom {
            Some(custom) if path.starts_with(&self.root) && path != self.root => custom
                .matched_path_or_any_parents(path, is_dir)
                .is_ignore(),
            _ => false,
        }
    }

    /// Number of active ignore sources
    pub fn active_sources(&self) -> usize {
        if self.custom.is_some() {
            2
        } else {
            1
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Files that are never complete acquisitions
fn is_builtin_ignored(path: &Path) -> bool {
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    // Vim swap files and Vim/Emacs backups
    if filename.ends_with(".swp") || filename.ends_with(".swo") || filename.ends_with('~') {
        return true;
    }

    // Emacs auto-save and lock files
    if (filename.starts_with('#') && filename.ends_with('#')) || filename.starts_with(".#") {
        return true;
    }

    // MacOS / Windows system files
    if filename == ".DS_Store"
        || filename.starts_with("._")
        || filename == "Thumbs.db"
        || filename == "desktop.ini"
    {
        return true;
    }

    // Office lock files
    if filename.starts_with("~$") {
        return true;
    }

    // Transfers still in flight
    let lower = filename.to_ascii_lowercase();
    lower.ends_with(".part")
        || lower.ends_with(".partial")
        || lower.ends_with(".crdownload")
        || lower.ends_with(".download")
        || filename == IGNORE_FILE
}
