//! File system watching for Intake
//!
//! This crate provides the watch/debounce/dispatch core:
//! - Per-directory registration that follows the tree as it grows
//! - A single debounce table with a dynamically computed wake-up horizon
//! - Overflow recovery by rescanning
//! - A stoppable background task hosting the event loop

pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod ignore;
pub mod reconcile;
pub mod registrar;
pub mod session;
pub mod task;

// Re-exports
pub use debounce::DebounceTable;
pub use dispatch::{DispatchSummary, Dispatched, Dispatcher};
pub use error::WatchError;
pub use event::{EventKind, WatchEvent};
pub use self::ignore::IgnoreRules;
pub use intake_core::IngestError;
pub use registrar::{RegisterReport, Registrar, WatchId};
pub use session::{LoopState, SessionSummary, WatchSession};
pub use task::{TaskOutcome, WatchTask};
