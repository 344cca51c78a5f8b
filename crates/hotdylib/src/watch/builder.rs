//! Builder for autoloaders and watches.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::autoloader::Autoloader;
use super::context::{ModuleState, ReportCallback, WatchContext};
use super::handle::AutoloadHandle;
use super::source::{EventSource, NotifyEventSource};
use super::types::{ModuleReport, WatchError};
use super::watcher::{self, WatchOptions};
use crate::{
    AutoloadConfig, ContentType, DylibLoader, EventFilter, FatalHandler, FatalModuleError,
    ModuleDirectory, ModuleLoader, ModuleSelector, terminate_handler,
};

/// Builder for [`Autoloader`] and for bare watches.
///
/// # Example
///
/// ```ignore
/// use hotdylib::{AutoloadBuilder, ConfigLoader};
///
/// let config = ConfigLoader::new().load()?;
/// let mut autoloader = AutoloadBuilder::new()
///     .config(&config)
///     .on_result(|report| match report.selected_path() {
///         Some(path) if report.loaded => println!("loaded {}", path.display()),
///         Some(path) => println!("{} is current", path.display()),
///         None => println!("no module found"),
///     })
///     .build();
///
/// autoloader.set_autoloading(true)?;
/// ```
///
/// # Defaults
///
/// - loader: [`DylibLoader`]
/// - event source: [`NotifyEventSource`]
/// - required type: the platform's dynamic library type
/// - debounce: 100ms, events: created only
/// - fatal errors: [`terminate`](crate::terminate) the process
#[must_use]
pub struct AutoloadBuilder<L = DylibLoader, S = NotifyEventSource> {
    directory: Option<ModuleDirectory>,
    selector: ModuleSelector,
    options: WatchOptions,
    last_loaded: Option<PathBuf>,
    on_result: Option<ReportCallback>,
    on_fatal: FatalHandler,
    loader: L,
    source: S,
}

impl AutoloadBuilder {
    /// Create a builder with the default loader and event source.
    pub fn new() -> Self {
        Self {
            directory: None,
            selector: ModuleSelector::native(),
            options: WatchOptions::default(),
            last_loaded: None,
            on_result: None,
            on_fatal: terminate_handler(),
            loader: DylibLoader,
            source: NotifyEventSource::new(),
        }
    }
}

impl Default for AutoloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<L, S> AutoloadBuilder<L, S> {
    /// Set the module directory.
    pub fn directory(mut self, directory: ModuleDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Take directory, debounce and event filter from `config`.
    pub fn config(mut self, config: &AutoloadConfig) -> Self {
        self.directory = config.directory().cloned();
        self.options.debounce = config.debounce();
        self.options.events = config.events();
        self
    }

    /// Require a content type other than the platform's dynamic library type.
    pub const fn required_type(mut self, required: ContentType) -> Self {
        self.selector = ModuleSelector::new(required);
        self
    }

    /// Set the debounce window. Zero runs a pass for every event.
    pub const fn debounce(mut self, debounce: Duration) -> Self {
        self.options.debounce = debounce;
        self
    }

    /// Set which directory changes trigger a pass.
    pub const fn events(mut self, events: EventFilter) -> Self {
        self.options.events = events;
        self
    }

    /// Seed the path of the last-loaded module.
    ///
    /// The initial pass does not reload a selection at this path.
    pub fn last_loaded(mut self, path: Option<PathBuf>) -> Self {
        self.last_loaded = path;
        self
    }

    /// Register a callback for the outcome of every pass.
    ///
    /// The callback runs on the thread performing the pass: the caller of
    /// `start` for the initial pass, the watcher thread afterwards.
    pub fn on_result<F>(mut self, callback: F) -> Self
    where
        F: Fn(ModuleReport) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(callback));
        self
    }

    /// Replace the fatal error handler for watch-triggered loads.
    pub fn on_fatal<F>(mut self, handler: F) -> Self
    where
        F: Fn(FatalModuleError) + Send + Sync + 'static,
    {
        self.on_fatal = Arc::new(handler);
        self
    }

    /// Use a different module loader.
    pub fn loader<L2>(self, loader: L2) -> AutoloadBuilder<L2, S> {
        AutoloadBuilder {
            directory: self.directory,
            selector: self.selector,
            options: self.options,
            last_loaded: self.last_loaded,
            on_result: self.on_result,
            on_fatal: self.on_fatal,
            loader,
            source: self.source,
        }
    }

    /// Use a different event source.
    pub fn event_source<S2>(self, source: S2) -> AutoloadBuilder<L, S2> {
        AutoloadBuilder {
            directory: self.directory,
            selector: self.selector,
            options: self.options,
            last_loaded: self.last_loaded,
            on_result: self.on_result,
            on_fatal: self.on_fatal,
            loader: self.loader,
            source,
        }
    }
}

impl<L, S> AutoloadBuilder<L, S>
where
    L: ModuleLoader + 'static,
    S: EventSource,
{
    /// Build an inactive [`Autoloader`].
    pub fn build(self) -> Autoloader<L, S> {
        Autoloader::new(
            self.directory,
            self.selector,
            self.options,
            Arc::new(ModuleState::new(self.loader, self.last_loaded)),
            self.on_result,
            self.on_fatal,
            self.source,
        )
    }

    /// Start a watch directly, without an [`Autoloader`].
    ///
    /// Returns `Ok(None)` when no directory is configured.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the subscription cannot be installed or the
    /// watcher thread cannot be spawned.
    pub fn start(self) -> Result<Option<AutoloadHandle>, WatchError> {
        let Some(directory) = self.directory else {
            info!("no module directory configured; autoloading unavailable");
            return Ok(None);
        };

        let context = WatchContext {
            directory,
            selector: self.selector,
            modules: Arc::new(ModuleState::new(self.loader, self.last_loaded)),
            on_result: self.on_result,
            on_fatal: self.on_fatal,
        };
        watcher::start(&self.source, self.options, context).map(Some)
    }
}
