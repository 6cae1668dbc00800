//! Watch mode: organize files as they appear in the root directory.
//!
//! The OS notification backend (`notify`) runs on its own thread and pushes
//! [`WatchEvent`]s into a channel. A single consumer, [`WatchLoop::run`], drains that
//! channel on the caller's thread, so every move goes through the engine one at a
//! time and existence checks cannot race the moves that follow them.
//!
//! Newly created files wait for a settle delay before being processed, in case they
//! are still being written; a file renamed into the directory is processed at once.
//! The delay is tracked as a deadline per path, so events keep queueing meanwhile.

use crate::context::RunContext;
use crate::file_organizer::{FileOrganizer, MoveOutcome, ensure_root};
use crate::history::SessionHistory;
use crate::output::OutputFormatter;
use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a freshly created file must sit before it is touched.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on how long the loop blocks before re-checking the cancel flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A change in the watched directory that may need organizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file appeared and may still be written to.
    Created(PathBuf),
    /// A complete file was renamed or moved into the directory.
    MovedIn(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::MovedIn(path) => path,
        }
    }
}

/// Maps a raw `notify` event onto the events the loop cares about.
///
/// Only direct children of `root` are kept.
pub fn translate(event: &Event, root: &Path) -> Vec<WatchEvent> {
    let in_root = |path: &&PathBuf| path.parent() == Some(root);
    match event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(in_root)
            .map(|path| WatchEvent::Created(path.clone()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .filter(in_root)
            .map(|path| WatchEvent::MovedIn(path.clone()))
            .collect(),
        // Paths are [from, to]; only the destination matters.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .last()
            .filter(|path| path.parent() == Some(root))
            .map(|path| vec![WatchEvent::MovedIn(path.clone())])
            .unwrap_or_default(),
        // Backends that cannot tell the two sides of a rename apart.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .filter(in_root)
            .filter(|path| path.exists())
            .map(|path| WatchEvent::MovedIn(path.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Errors that end a watch run before it starts.
#[derive(Debug)]
pub enum WatchError {
    RootMissing(PathBuf),
    SubscribeFailed {
        path: PathBuf,
        source: notify::Error,
    },
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootMissing(path) => {
                write!(f, "Watched directory does not exist: {}", path.display())
            }
            Self::SubscribeFailed { path, source } => {
                write!(f, "Cannot watch {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for WatchError {}

/// A live filesystem subscription. Dropping it stops the OS watcher.
pub struct Subscription {
    _watcher: RecommendedWatcher,
    pub events: Receiver<WatchEvent>,
}

/// Starts a non-recursive watch on `root`.
///
/// The backend reports absolute paths, so `root` is canonicalized first and the
/// events carry canonical paths.
pub fn subscribe(root: &Path) -> Result<Subscription, WatchError> {
    let root = fs::canonicalize(root).map_err(|_| WatchError::RootMissing(root.to_path_buf()))?;
    let root = root.as_path();
    let (tx, rx) = unbounded();
    let watched_root = root.to_path_buf();
    let subscribe_error = |source| WatchError::SubscribeFailed {
        path: root.to_path_buf(),
        source,
    };

    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| match result {
            Ok(event) => {
                for watch_event in translate(&event, &watched_root) {
                    if tx.send(watch_event).is_err() {
                        debug!("watch loop gone, dropping event");
                    }
                }
            }
            Err(e) => warn!(error = %e, "filesystem watcher error"),
        },
        Config::default(),
    )
    .map_err(subscribe_error)?;

    watcher
        .watch(root, RecursiveMode::NonRecursive)
        .map_err(subscribe_error)?;

    Ok(Subscription {
        _watcher: watcher,
        events: rx,
    })
}

/// What a watch run did, counted per event as it happened.
#[derive(Debug, Default)]
pub struct WatchSummary {
    pub moved: usize,
    pub duplicates_skipped: usize,
    pub duplicates_deleted: usize,
    pub collisions: usize,
    pub failed: usize,
    /// Paths still queued when the run was cancelled.
    pub unprocessed: Vec<PathBuf>,
}

impl WatchSummary {
    fn tally(&mut self, outcome: &MoveOutcome) {
        match outcome {
            MoveOutcome::Moved { .. } => self.moved += 1,
            MoveOutcome::SkippedDuplicateSameContent { .. } => self.duplicates_skipped += 1,
            MoveOutcome::DeletedDuplicate { .. } => self.duplicates_deleted += 1,
            MoveOutcome::SkippedNameCollisionDifferentContent { .. } => self.collisions += 1,
            MoveOutcome::Failed { .. } => self.failed += 1,
            MoveOutcome::DeletedAged { .. } => {}
        }
    }

    pub fn processed(&self) -> usize {
        self.moved + self.duplicates_skipped + self.duplicates_deleted + self.collisions + self.failed
    }
}

/// The single consumer of watch events.
pub struct WatchLoop<'a> {
    organizer: FileOrganizer<'a>,
    settle_delay: Duration,
    cancel: Arc<AtomicBool>,
}

impl<'a> WatchLoop<'a> {
    pub fn new(organizer: FileOrganizer<'a>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            organizer,
            settle_delay: DEFAULT_SETTLE_DELAY,
            cancel,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Consumes events until the cancel flag is raised or the channel closes.
    ///
    /// The event being handled when cancellation arrives is finished first. Anything
    /// still waiting afterwards is logged and returned in
    /// [`WatchSummary::unprocessed`].
    pub fn run(&self, events: &Receiver<WatchEvent>, history: &mut SessionHistory) -> WatchSummary {
        let mut summary = WatchSummary::default();
        let mut settling: HashMap<PathBuf, Instant> = HashMap::new();

        while !self.cancel.load(Ordering::SeqCst) {
            let now = Instant::now();
            let wait = settling
                .values()
                .min()
                .map(|deadline| deadline.saturating_duration_since(now))
                .unwrap_or(POLL_INTERVAL)
                .min(POLL_INTERVAL);

            match events.recv_timeout(wait) {
                Ok(WatchEvent::Created(path)) => {
                    debug!(path = %path.display(), "created, settling");
                    settling.insert(path, Instant::now() + self.settle_delay);
                }
                Ok(WatchEvent::MovedIn(path)) => {
                    settling.remove(&path);
                    self.handle(&path, history, &mut summary);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("event channel closed");
                    break;
                }
            }

            let now = Instant::now();
            let mut due: Vec<(PathBuf, Instant)> = settling
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(path, deadline)| (path.clone(), *deadline))
                .collect();
            due.sort_by_key(|(_, deadline)| *deadline);
            for (path, _) in due {
                settling.remove(&path);
                self.handle(&path, history, &mut summary);
            }
        }

        let mut leftover: Vec<PathBuf> = settling.into_keys().collect();
        leftover.extend(events.try_iter().map(|event| event.path().to_path_buf()));
        for path in &leftover {
            warn!(path = %path.display(), "watch stopped before this event was processed");
        }
        summary.unprocessed = leftover;
        summary
    }

    fn handle(&self, path: &Path, history: &mut SessionHistory, summary: &mut WatchSummary) {
        let Some(outcome) = self.organizer.process_path(path) else {
            return;
        };
        OutputFormatter::outcome(&outcome, self.organizer.context());
        self.organizer.commit(&outcome, history);
        summary.tally(&outcome);
    }
}

/// Subscribes to `context.root` and organizes arriving files until `cancel` is set.
///
/// # Errors
///
/// Fails only when the root does not exist or cannot be watched.
pub fn watch_directory(
    organizer: FileOrganizer<'_>,
    history: &mut SessionHistory,
    cancel: Arc<AtomicBool>,
    settle_delay: Duration,
) -> Result<WatchSummary, WatchError> {
    let context: &RunContext = organizer.context();
    let root = context.root.clone();
    ensure_root(&root).map_err(|_| WatchError::RootMissing(root.clone()))?;

    let subscription = subscribe(&root)?;
    info!(root = %root.display(), "watching for new files");

    let watch_loop = WatchLoop::new(organizer, cancel).with_settle_delay(settle_delay);
    let summary = watch_loop.run(&subscription.events, history);
    drop(subscription);
    Ok(summary)
}
