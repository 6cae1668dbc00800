//! tidyfold - keeps a directory sorted into category folders
//!
//! This library classifies files by extension, moves them into category (and
//! optionally year/month) subfolders, resolves same-name duplicates by content
//! fingerprint, purges aged files, removes emptied folders, watches a directory
//! for new arrivals, and reverses the last organize session from an append-only
//! history log.

pub mod cli;
pub mod config;
pub mod context;
pub mod duplicates;
pub mod file_category;
pub mod file_organizer;
pub mod fingerprint;
pub mod history;
pub mod logging;
pub mod notifier;
pub mod output;
pub mod reaper;
pub mod retention;
pub mod undo;
pub mod watch;

pub use config::{CompiledFilters, Config, ConfigError, OrganizeSettings};
pub use context::RunContext;
pub use file_category::{CategoryTable, OTHERS, classify};
pub use file_organizer::{FileCandidate, FileOrganizer, MoveOutcome, TargetLocation};
pub use history::{HistoryEntry, HistoryError, SessionHistory};
pub use undo::{UndoManager, UndoReport};

pub use cli::{OrganizeCommand, RunReport, organize_directory, run_cli};
