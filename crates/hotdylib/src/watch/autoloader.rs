//! The collaborator-facing facade.
//!
//! An [`Autoloader`] is what a host holds on to. It offers the two
//! operations a host exposes to its user, "load once" and "toggle
//! autoloading", and tracks whether a watch is active through the explicit
//! [`AutoloadState`] machine.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::context::{ModuleState, ReportCallback, WatchContext};
use super::handle::AutoloadHandle;
use super::source::{EventSource, NotifyEventSource};
use super::types::WatchError;
use super::watcher::{self, WatchOptions};
use crate::{
    DylibLoader, FatalHandler, FatalModuleError, ModuleDirectory, ModuleLoader, ModuleSelector,
    SelectedModule,
};

/// Whether a watch is active.
#[derive(Debug, Default)]
pub enum AutoloadState {
    /// No watch.
    #[default]
    Inactive,
    /// A watch is running; the handle is its stop capability.
    Watching(AutoloadHandle),
}

impl AutoloadState {
    /// Returns `true` in the `Watching` state.
    #[must_use]
    pub const fn is_watching(&self) -> bool {
        matches!(self, Self::Watching(_))
    }
}

/// Loads modules on demand and, when enabled, whenever the module
/// directory changes.
///
/// Created by [`AutoloadBuilder::build`](crate::AutoloadBuilder::build).
/// Manual and watch-triggered loads share one load gate and one last-loaded
/// record. Dropping the autoloader stops an active watch.
pub struct Autoloader<L = DylibLoader, S = NotifyEventSource> {
    directory: Option<ModuleDirectory>,
    selector: ModuleSelector,
    options: WatchOptions,
    modules: Arc<ModuleState<L>>,
    on_result: Option<ReportCallback>,
    on_fatal: FatalHandler,
    source: S,
    state: AutoloadState,
}

impl<L, S> Autoloader<L, S>
where
    L: ModuleLoader + 'static,
    S: EventSource,
{
    pub(crate) const fn new(
        directory: Option<ModuleDirectory>,
        selector: ModuleSelector,
        options: WatchOptions,
        modules: Arc<ModuleState<L>>,
        on_result: Option<ReportCallback>,
        on_fatal: FatalHandler,
        source: S,
    ) -> Self {
        Self {
            directory,
            selector,
            options,
            modules,
            on_result,
            on_fatal,
            source,
            state: AutoloadState::Inactive,
        }
    }

    /// The module directory, if configured.
    #[must_use]
    pub const fn directory(&self) -> Option<&ModuleDirectory> {
        self.directory.as_ref()
    }

    /// Returns `true` if a module directory is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Returns `true` while a watch is active.
    #[must_use]
    pub const fn is_autoloading(&self) -> bool {
        self.state.is_watching()
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &AutoloadState {
        &self.state
    }

    /// Path of the most recently loaded module.
    #[must_use]
    pub fn last_loaded(&self) -> Option<PathBuf> {
        self.modules.last_loaded()
    }

    /// Returns `true` while a module is being loaded.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.modules.is_loading()
    }

    /// The module a load would pick right now.
    #[must_use]
    pub fn select(&self) -> Option<SelectedModule> {
        let directory = self.directory.as_ref()?;
        self.selector.select(directory.as_path())
    }

    /// Selects the current module and loads it.
    ///
    /// Loads even if the selection is the last-loaded path. Returns
    /// `Ok(None)` when no directory is configured or nothing qualifies.
    ///
    /// # Errors
    ///
    /// Returns [`FatalModuleError`] if the selected module cannot be loaded.
    /// Watch-triggered loads hand such errors to the fatal handler instead;
    /// here the caller decides.
    pub fn load_once(&self) -> Result<Option<SelectedModule>, FatalModuleError> {
        let Some(directory) = &self.directory else {
            info!("no module directory configured; nothing to load");
            return Ok(None);
        };
        let Some(module) = self.selector.select(directory.as_path()) else {
            info!(%directory, "no module to load");
            return Ok(None);
        };

        self.modules.load(module.path())?;
        info!(path = %module.path().display(), "module loaded");
        Ok(Some(module))
    }

    /// Enables or disables autoloading.
    ///
    /// Enabling while watching and disabling while inactive do nothing.
    /// Enabling without a configured directory is refused. Returns whether
    /// autoloading is active afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the watch cannot be started; the state
    /// stays `Inactive`.
    pub fn set_autoloading(&mut self, enabled: bool) -> Result<bool, WatchError> {
        match (enabled, self.is_autoloading()) {
            (true, false) => {
                let Some(directory) = self.directory.clone() else {
                    info!("no module directory configured; autoloading unavailable");
                    return Ok(false);
                };
                let context = WatchContext {
                    directory,
                    selector: self.selector,
                    modules: self.modules.clone(),
                    on_result: self.on_result.clone(),
                    on_fatal: self.on_fatal.clone(),
                };
                let handle = watcher::start(&self.source, self.options, context)?;
                self.state = AutoloadState::Watching(handle);
            }
            (false, true) => {
                if let AutoloadState::Watching(handle) = std::mem::take(&mut self.state) {
                    handle.stop();
                }
            }
            _ => {}
        }
        Ok(self.is_autoloading())
    }

    /// Asks the active watch to run a pass now.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Stopped`] when autoloading is off.
    pub fn rescan(&self) -> Result<(), WatchError> {
        match &self.state {
            AutoloadState::Watching(handle) => handle.rescan(),
            AutoloadState::Inactive => Err(WatchError::Stopped),
        }
    }
}

impl<L, S> std::fmt::Debug for Autoloader<L, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autoloader")
            .field("directory", &self.directory)
            .field("selector", &self.selector)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
