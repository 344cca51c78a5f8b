//! The watcher thread.
//!
//! [`start`] subscribes to the module directory, runs the initial pass on
//! the caller's thread and hands the [`WatchContext`] to a dedicated
//! thread. That thread waits on two channels, commands from the
//! [`AutoloadHandle`] and change events from the subscription, and runs a
//! pass whenever a debounced batch is ready.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, bounded, never, select};
use tracing::{debug, info, warn};

use super::context::WatchContext;
use super::debounce::PendingBatch;
use super::handle::AutoloadHandle;
use super::source::{EventSource, Subscription};
use super::types::{ReloadTrigger, WatchError};
use crate::{EventFilter, ModuleLoader, config::DEFAULT_DEBOUNCE};

/// How long the loop sleeps when no batch is pending.
const IDLE_TICK: Duration = Duration::from_millis(500);

/// Commands sent to the watcher thread.
#[derive(Debug, Clone)]
pub(crate) enum WatchCommand {
    /// Run a pass now.
    Rescan,
    /// Stop the watcher.
    Stop,
}

/// State shared between the handle and the watcher thread.
pub(crate) struct WatcherState {
    running: AtomicBool,
}

impl WatcherState {
    pub(crate) const fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Tuning for one watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Quiet period before a batch of events triggers a pass.
    pub debounce: Duration,
    /// Which changes are delivered.
    pub events: EventFilter,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            events: EventFilter::default(),
        }
    }
}

/// Starts watching `context.directory`.
///
/// The subscription is installed before the initial pass, so a module
/// written while that pass runs still produces an event.
pub(crate) fn start<L, S>(
    source: &S,
    options: WatchOptions,
    context: WatchContext<L>,
) -> Result<AutoloadHandle, WatchError>
where
    L: ModuleLoader + 'static,
    S: EventSource + ?Sized,
{
    let subscription = source.subscribe(context.directory.as_path(), options.events)?;
    info!(
        directory = %context.directory,
        events = %options.events,
        debounce_ms = options.debounce.as_millis(),
        "autoload watch started"
    );

    context.run_pass(ReloadTrigger::Initial);

    let state = Arc::new(WatcherState::new());
    let (command_tx, command_rx) = bounded::<WatchCommand>(16);
    let directory = context.directory.clone();

    let thread_state = state.clone();
    let thread = thread::Builder::new()
        .name("hotdylib-watcher".to_string())
        .spawn(move || {
            watcher_loop(&thread_state, &command_rx, subscription, &context, options.debounce);
        })
        .map_err(|e| WatchError::init_failed(format!("failed to spawn watcher thread: {e}"), None))?;

    Ok(AutoloadHandle::new(state, command_tx, thread, directory))
}

/// Main loop of the watcher thread.
///
/// The running flag is checked before every pass; once the handle clears
/// it, pending events are discarded.
fn watcher_loop<L: ModuleLoader>(
    state: &WatcherState,
    commands: &Receiver<WatchCommand>,
    subscription: Subscription,
    context: &WatchContext<L>,
    debounce: Duration,
) {
    let mut events = subscription.events().clone();
    let mut batch = PendingBatch::new(debounce);
    let mut disconnected = false;

    while state.is_running() {
        let timeout = batch.remaining().unwrap_or(IDLE_TICK);

        select! {
            recv(commands) -> command => match command {
                Ok(WatchCommand::Rescan) => {
                    if state.is_running() {
                        context.run_pass(ReloadTrigger::Rescan);
                    }
                }
                Ok(WatchCommand::Stop) | Err(_) => {
                    state.stop();
                    break;
                }
            },

            recv(events) -> event => match event {
                Ok(change) => {
                    debug!(kind = ?change.kind, paths = ?change.paths, "change queued");
                    batch.record(change.paths);
                }
                Err(_) => {
                    warn!(directory = %context.directory, "notification channel closed");
                    disconnected = true;
                }
            },

            default(timeout) => {}
        }

        if disconnected {
            events = never();
            disconnected = false;
        }

        if state.is_running()
            && let Some(paths) = batch.take_ready()
        {
            context.run_pass(ReloadTrigger::DirectoryChanged(paths));
        }
    }

    if batch.has_pending() {
        debug!(directory = %context.directory, "discarding pending changes");
    }
    // Receiver before guard: the guard may wait on the notification thread.
    drop(events);
    drop(subscription);
    info!(directory = %context.directory, "autoload watch stopped");
}
