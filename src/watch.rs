//! Debouncing of file-change events.
//!
//! Whatever observes the filesystem pushes [`FileChange`]s into a channel;
//! [`run`] coalesces bursts per file and hands each settled batch to a
//! callback, typically [`CodebaseAnalyzer::apply_changes`].
//!
//! [`CodebaseAnalyzer::apply_changes`]: crate::core::CodebaseAnalyzer::apply_changes

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Created(p) | FileChange::Modified(p) | FileChange::Deleted(p) => p,
        }
    }
}

/// Parses `<created|modified|deleted> <path>`.
impl FromStr for FileChange {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let Some((kind, path)) = line.split_once(char::is_whitespace) else {
            bail!("Expected '<kind> <path>', got '{line}'");
        };
        let path = PathBuf::from(path.trim());
        match kind {
            "created" | "create" | "add" => Ok(FileChange::Created(path)),
            "modified" | "modify" | "change" => Ok(FileChange::Modified(path)),
            "deleted" | "delete" | "remove" | "unlink" => Ok(FileChange::Deleted(path)),
            other => bail!("Unknown change kind '{other}'"),
        }
    }
}

/// Collapses bursts of events per path to the latest kind.
///
/// A batch is ready once no event has arrived for a full window.
#[derive(Debug)]
pub struct ChangeDebouncer {
    window: Duration,
    pending: BTreeMap<PathBuf, FileChange>,
    last_event: Option<Instant>,
}

impl ChangeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
            last_event: None,
        }
    }

    pub fn push(&mut self, change: FileChange) {
        self.push_at(change, Instant::now());
    }

    pub fn push_at(&mut self, change: FileChange, now: Instant) {
        self.pending.insert(change.path().to_path_buf(), change);
        self.last_event = Some(now);
    }

    /// When the pending batch settles, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_event.map(|last| last + self.window)
    }

    /// Drain the pending batch if it has settled by `now`, sorted by path.
    pub fn take_ready(&mut self, now: Instant) -> Vec<FileChange> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Drain the pending batch regardless of the window.
    pub fn flush(&mut self) -> Vec<FileChange> {
        self.last_event = None;
        std::mem::take(&mut self.pending).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Debounce `rx` until the sender side closes, calling `on_batch` with each
/// settled batch. Changes still pending at close are dropped.
///
/// Returns the number of batches delivered.
pub async fn run<F>(rx: mpsc::Receiver<FileChange>, window: Duration, on_batch: F) -> usize
where
    F: FnMut(Vec<FileChange>),
{
    debounce(rx, window, on_batch, false).await
}

/// Like [`run`], but changes still pending when the sender closes are
/// delivered as one last batch.
pub async fn run_to_end<F>(rx: mpsc::Receiver<FileChange>, window: Duration, on_batch: F) -> usize
where
    F: FnMut(Vec<FileChange>),
{
    debounce(rx, window, on_batch, true).await
}

async fn debounce<F>(
    mut rx: mpsc::Receiver<FileChange>,
    window: Duration,
    mut on_batch: F,
    flush_on_close: bool,
) -> usize
where
    F: FnMut(Vec<FileChange>),
{
    let mut debouncer = ChangeDebouncer::new(window);
    let mut delivered = 0usize;

    loop {
        let received = match debouncer.deadline() {
            Some(deadline) => {
                tokio::select! {
                    received = rx.recv() => received,
                    _ = sleep_until(deadline) => {
                        let batch = debouncer.take_ready(Instant::now());
                        if !batch.is_empty() {
                            debug!("Delivering {} debounced changes", batch.len());
                            on_batch(batch);
                            delivered += 1;
                        }
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        match received {
            Some(change) => debouncer.push(change),
            None => {
                if debouncer.is_empty() {
                    return delivered;
                }
                if flush_on_close {
                    let batch = debouncer.flush();
                    debug!("Delivering {} pending changes at end of input", batch.len());
                    on_batch(batch);
                    delivered += 1;
                } else {
                    debug!("Dropping {} pending changes on shutdown", debouncer.len());
                }
                return delivered;
            }
        }
    }
}
