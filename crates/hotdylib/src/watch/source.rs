//! Directory change notifications.
//!
//! The watcher does not talk to the OS directly. It asks an [`EventSource`]
//! for a [`Subscription`]: a channel of [`ChangeEvent`]s plus a guard that
//! keeps the native subscription alive. Dropping the guard unsubscribes.
//!
//! [`NotifyEventSource`] is the production source, built on the `notify`
//! crate's recommended backend (FSEvents on macOS, inotify on Linux,
//! ReadDirectoryChangesW on Windows). Tests substitute their own source to
//! control exactly when notifications arrive.

use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tracing::{debug, trace, warn};

use super::types::WatchError;
use crate::EventFilter;

/// Coarse classification of a directory change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// An item was created (including the destination of a rename).
    Created,
    /// An item was removed.
    Removed,
    /// An item's content or metadata changed.
    Modified,
    /// An item was renamed away.
    Renamed,
    /// Access events and anything the backend could not classify.
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                Self::Created
            }
            EventKind::Modify(ModifyKind::Name(_)) => Self::Renamed,
            EventKind::Modify(_) => Self::Modified,
            EventKind::Remove(_) => Self::Removed,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Self::Other,
        }
    }
}

/// One change in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// The affected paths.
    pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(kind: ChangeKind, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            kind,
            paths: paths.into_iter().collect(),
        }
    }

    /// Convert a notify event, or `None` if `filter` rejects it.
    #[must_use]
    pub fn from_notify(event: &Event, filter: EventFilter) -> Option<Self> {
        let kind = ChangeKind::from(&event.kind);
        filter
            .accepts(kind)
            .then(|| Self::new(kind, event.paths.iter().cloned()))
    }
}

/// A live directory subscription.
///
/// Events arrive on [`Subscription::events`]; the guard passed to
/// [`Subscription::new`] is dropped together with the subscription, which
/// must tear down the native watch.
pub struct Subscription {
    events: Receiver<ChangeEvent>,
    _guard: Box<dyn Send>,
}

impl Subscription {
    /// Create a subscription from an event channel and a teardown guard.
    pub fn new(events: Receiver<ChangeEvent>, guard: impl Send + 'static) -> Self {
        Self {
            events,
            _guard: Box::new(guard),
        }
    }

    /// The event channel.
    #[must_use]
    pub const fn events(&self) -> &Receiver<ChangeEvent> {
        &self.events
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pending", &self.events.len())
            .finish_non_exhaustive()
    }
}

/// Installs directory subscriptions.
pub trait EventSource {
    /// Subscribe to changes directly inside `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the subscription cannot be installed.
    fn subscribe(&self, directory: &Path, filter: EventFilter) -> Result<Subscription, WatchError>;
}

/// [`EventSource`] backed by [`notify::recommended_watcher`].
#[derive(Debug, Clone, Copy)]
pub struct NotifyEventSource {
    capacity: usize,
}

impl NotifyEventSource {
    /// Default event channel capacity.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Create a source with the default channel capacity.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
        }
    }

    /// Set the event channel capacity.
    ///
    /// When the channel is full further events are dropped; the watcher
    /// rescans the whole directory anyway, so one queued event is enough.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for NotifyEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for NotifyEventSource {
    fn subscribe(&self, directory: &Path, filter: EventFilter) -> Result<Subscription, WatchError> {
        let (tx, rx) = bounded::<ChangeEvent>(self.capacity);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(change) = ChangeEvent::from_notify(&event, filter) {
                    trace!(kind = ?change.kind, paths = ?change.paths, "directory change");
                    forward(&tx, change);
                }
            }
            Err(e) => warn!(error = %e, "file watcher reported an error"),
        })
        .map_err(|e| WatchError::init_failed(format!("failed to create file watcher: {e}"), Some(e)))?;

        if !directory.is_dir() {
            return Err(WatchError::path_error(directory, "not a directory"));
        }
        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::path_error(directory, format!("failed to watch: {e}")))?;

        Ok(Subscription::new(rx, watcher))
    }
}

/// Queues `change` without blocking the notification thread.
///
/// Returns whether the event was queued.
fn forward(tx: &Sender<ChangeEvent>, change: ChangeEvent) -> bool {
    match tx.try_send(change) {
        Ok(()) => true,
        Err(TrySendError::Full(change)) => {
            debug!(paths = ?change.paths, "event channel full; dropping change");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

    #[test]
    fn test_change_kind_from_notify() {
        assert_eq!(ChangeKind::from(&EventKind::Create(CreateKind::File)), ChangeKind::Created);
        assert_eq!(
            ChangeKind::from(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            ChangeKind::Created
        );
        assert_eq!(
            ChangeKind::from(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            ChangeKind::Renamed
        );
        assert_eq!(
            ChangeKind::from(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            ChangeKind::Modified
        );
        assert_eq!(ChangeKind::from(&EventKind::Remove(RemoveKind::File)), ChangeKind::Removed);
        assert_eq!(ChangeKind::from(&EventKind::Access(AccessKind::Any)), ChangeKind::Other);
    }

    #[test]
    fn test_from_notify_applies_filter() {
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/m/a.so"));
        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("/m/a.so"));

        let change = ChangeEvent::from_notify(&created, EventFilter::Created).unwrap();
        assert_eq!(change.kind, ChangeKind::Created);
        assert_eq!(change.paths, vec![PathBuf::from("/m/a.so")]);

        assert!(ChangeEvent::from_notify(&removed, EventFilter::Created).is_none());
        assert!(ChangeEvent::from_notify(&removed, EventFilter::Any).is_some());
    }

    #[test]
    fn test_subscribe_missing_directory_fails() {
        let source = NotifyEventSource::new();
        let result = source.subscribe(Path::new("/nonexistent/hotdylib/watch"), EventFilter::Created);
        assert!(matches!(result, Err(WatchError::PathError { .. })));
    }

    #[test]
    fn test_forward_drops_when_full_instead_of_blocking() {
        let (tx, rx) = bounded(1);
        let change = || ChangeEvent::new(ChangeKind::Created, vec![PathBuf::from("/m/a.so")]);

        assert!(forward(&tx, change()));
        assert!(!forward(&tx, change()));
        assert_eq!(rx.len(), 1);

        drop(rx);
        assert!(!forward(&tx, change()));
    }
}
