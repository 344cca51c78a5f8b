//! Stop capability for an active watch.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::warn;

use super::types::WatchError;
use super::watcher::{WatchCommand, WatcherState};
use crate::ModuleDirectory;

/// Handle to an active watch.
///
/// Holding the handle keeps the watch alive. [`AutoloadHandle::stop`] (or
/// dropping the handle) tears down the subscription and releases the watch
/// context exactly once. When it returns, no pass is running and none will
/// start.
///
/// # Example
///
/// ```ignore
/// let handle = builder.start()?.expect("directory configured");
/// // ... rebuild the module a few times ...
/// handle.rescan()?;
/// handle.stop();
/// ```
#[must_use = "dropping the handle stops the watch"]
pub struct AutoloadHandle {
    state: Arc<WatcherState>,
    command_tx: Sender<WatchCommand>,
    thread: Option<JoinHandle<()>>,
    directory: ModuleDirectory,
}

impl AutoloadHandle {
    pub(crate) const fn new(
        state: Arc<WatcherState>,
        command_tx: Sender<WatchCommand>,
        thread: JoinHandle<()>,
        directory: ModuleDirectory,
    ) -> Self {
        Self {
            state,
            command_tx,
            thread: Some(thread),
            directory,
        }
    }

    /// The watched directory.
    #[must_use]
    pub const fn directory(&self) -> &ModuleDirectory {
        &self.directory
    }

    /// Returns `true` until the watch is stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Asks the watcher thread to run a pass without waiting for an event.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Stopped`] if the watch has stopped, or
    /// [`WatchError::ChannelError`] if the command cannot be delivered.
    pub fn rescan(&self) -> Result<(), WatchError> {
        if !self.state.is_running() {
            return Err(WatchError::Stopped);
        }
        self.command_tx
            .send(WatchCommand::Rescan)
            .map_err(|_| WatchError::channel_error("failed to send rescan command"))
    }

    /// Stops the watch and waits for the watcher thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.state.stop();
        let _ = self.command_tx.try_send(WatchCommand::Stop);

        if let Some(thread) = self.thread.take() {
            // A report callback may drop the handle on the watcher thread itself.
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                warn!(directory = %self.directory, "watcher thread panicked");
            }
        }
    }
}

impl Drop for AutoloadHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AutoloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoloadHandle")
            .field("directory", &self.directory)
            .field("running", &self.state.is_running())
            .finish_non_exhaustive()
    }
}
