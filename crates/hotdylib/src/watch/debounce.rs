//! Coalescing directory events into batches.
//!
//! A build writes many files in quick succession. Every event pushes the
//! batch deadline out again; one selection pass runs once the directory
//! has been quiet for the whole window.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Directory changes waiting for the quiet period to end.
#[derive(Debug)]
pub(crate) struct PendingBatch {
    /// Affected paths in arrival order, without duplicates.
    paths: Vec<PathBuf>,
    /// Time of the most recent event; `None` when nothing is pending.
    last_event: Option<Instant>,
    /// Required quiet period.
    window: Duration,
}

impl PendingBatch {
    pub(crate) const fn new(window: Duration) -> Self {
        Self {
            paths: Vec::new(),
            last_event: None,
            window,
        }
    }

    /// Records an event and restarts the quiet period.
    pub(crate) fn record(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.record_at(paths, Instant::now());
    }

    pub(crate) fn record_at(&mut self, paths: impl IntoIterator<Item = PathBuf>, now: Instant) {
        for path in paths {
            if !self.paths.contains(&path) {
                self.paths.push(path);
            }
        }
        self.last_event = Some(now);
    }

    /// Takes the batch if the directory has been quiet for the window.
    pub(crate) fn take_ready(&mut self) -> Option<Vec<PathBuf>> {
        self.take_ready_at(Instant::now())
    }

    pub(crate) fn take_ready_at(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        let last = self.last_event?;
        if now.saturating_duration_since(last) < self.window {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.paths))
    }

    /// Time left until the batch becomes ready, or `None` if nothing is pending.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.last_event
            .map(|last| self.window.saturating_sub(last.elapsed()))
    }

    pub(crate) const fn has_pending(&self) -> bool {
        self.last_event.is_some()
    }
}
