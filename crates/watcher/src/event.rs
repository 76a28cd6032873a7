//! Translation of raw `notify` events into watcher events

use notify::event::{MetadataKind, ModifyKind, RenameMode};
use std::path::{Path, PathBuf};

/// File system event as seen by the event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
}

impl WatchEvent {
    pub fn new(kind: EventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File or directory appeared (created or renamed into place)
    Create,
    /// File contents or metadata changed
    Modify,
    /// File or directory went away (removed or renamed out)
    Delete,
    /// Events under this directory may have been dropped
    Overflow,
}

/// Convert one `notify` event into zero or more watch events
///
/// `root` stands in for the affected directory when an overflow arrives
/// without paths.
pub fn translate(event: &notify::Event, root: &Path) -> Vec<WatchEvent> {
    if event.need_rescan() {
        if event.paths.is_empty() {
            return vec![WatchEvent::new(EventKind::Overflow, root)];
        }
        return event
            .paths
            .iter()
            .map(|p| WatchEvent::new(EventKind::Overflow, p))
            .collect();
    }

    use notify::EventKind as N;
    match &event.kind {
        N::Create(_) => each(event, EventKind::Create),
        N::Remove(_) => each(event, EventKind::Delete),
        N::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::To => each(event, EventKind::Create),
            RenameMode::From => each(event, EventKind::Delete),
            RenameMode::Both if event.paths.len() == 2 => vec![
                WatchEvent::new(EventKind::Delete, &event.paths[0]),
                WatchEvent::new(EventKind::Create, &event.paths[1]),
            ],
            // Unpaired rename: whatever is there now is new, whatever is gone is deleted
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        EventKind::Create
                    } else {
                        EventKind::Delete
                    };
                    WatchEvent::new(kind, p)
                })
                .collect(),
        },
        // Permission and ownership changes do not touch the contents
        N::Modify(ModifyKind::Metadata(
            MetadataKind::AccessTime
            | MetadataKind::Permissions
            | MetadataKind::Ownership
            | MetadataKind::Extended,
        )) => Vec::new(),
        N::Modify(_) | N::Any => each(event, EventKind::Modify),
        N::Access(_) | N::Other => Vec::new(),
    }
}

fn each(event: &notify::Event, kind: EventKind) -> Vec<WatchEvent> {
    event
        .paths
        .iter()
        .map(|p| WatchEvent::new(kind, p))
        .collect()
}
