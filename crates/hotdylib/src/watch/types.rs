//! Core types for autoloading.
//!
//! - [`WatchError`] - errors installing or controlling a directory watch
//! - [`ModuleReport`] - the outcome of one selection pass
//! - [`ReloadTrigger`] - what caused the pass

use std::path::{Path, PathBuf};
use std::time::Instant;

use miette::Diagnostic;
use thiserror::Error;

use crate::SelectedModule;

/// Error type for watch operations.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize the file watcher.
    #[error("failed to initialize file watcher: {message}")]
    #[diagnostic(
        code(hotdylib::watch::init_failed),
        help("Check the platform's file notification limits (e.g. fs.inotify.max_user_watches)")
    )]
    InitFailed {
        /// Human-readable error message.
        message: String,
        /// The underlying notify error, if available.
        #[source]
        source: Option<notify::Error>,
    },

    /// Failed to watch the module directory.
    #[error("failed to watch directory '{}': {message}", path.display())]
    #[diagnostic(
        code(hotdylib::watch::path_error),
        help("Ensure the module directory exists and you have read permissions")
    )]
    PathError {
        /// The directory that could not be watched.
        path: PathBuf,
        /// Human-readable error message.
        message: String,
    },

    /// The watcher has been stopped.
    #[error("watcher has been stopped")]
    #[diagnostic(
        code(hotdylib::watch::stopped),
        help("Enable autoloading again to start a new watch")
    )]
    Stopped,

    /// Channel communication error.
    #[error("internal channel error: {message}")]
    #[diagnostic(code(hotdylib::watch::channel_error))]
    ChannelError {
        /// Human-readable error message.
        message: String,
    },
}

impl WatchError {
    /// Create a new `InitFailed` error.
    pub fn init_failed(message: impl Into<String>, source: Option<notify::Error>) -> Self {
        Self::InitFailed {
            message: message.into(),
            source,
        }
    }

    /// Create a new `PathError`.
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PathError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new `ChannelError`.
    pub fn channel_error(message: impl Into<String>) -> Self {
        Self::ChannelError {
            message: message.into(),
        }
    }
}

/// What caused a selection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReloadTrigger {
    /// The pass run when autoloading was enabled.
    Initial,

    /// A debounced batch of directory changes; holds the affected paths.
    DirectoryChanged(Vec<PathBuf>),

    /// An explicit [`AutoloadHandle::rescan`](crate::AutoloadHandle::rescan).
    Rescan,
}

impl ReloadTrigger {
    /// Paths reported by the notification backend for this pass.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Self::DirectoryChanged(paths) => paths,
            Self::Initial | Self::Rescan => &[],
        }
    }
}

impl std::fmt::Display for ReloadTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial selection"),

            Self::DirectoryChanged(paths) => write!(f, "{} directory change(s)", paths.len()),

            Self::Rescan => write!(f, "rescan"),
        }
    }
}

/// Outcome of one selection pass, delivered to the report callback.
///
/// Every pass produces a report, whether or not it loaded anything, so the
/// host can tell "nothing new" (`selected` is the module already loaded)
/// apart from "nothing found" (`selected` is `None`).
#[derive(Debug, Clone)]
pub struct ModuleReport {
    /// The module the pass selected, if any qualified.
    pub selected: Option<SelectedModule>,

    /// Whether this pass loaded `selected`.
    pub loaded: bool,

    /// What caused the pass.
    pub trigger: ReloadTrigger,

    /// When the pass finished.
    pub timestamp: Instant,
}

impl ModuleReport {
    /// Create a new report.
    #[must_use]
    pub fn new(selected: Option<SelectedModule>, loaded: bool, trigger: ReloadTrigger) -> Self {
        Self {
            selected,
            loaded,
            trigger,
            timestamp: Instant::now(),
        }
    }

    /// Path of the selected module.
    #[must_use]
    pub fn selected_path(&self) -> Option<&Path> {
        self.selected.as_ref().map(SelectedModule::path)
    }

    /// Returns `true` if no qualifying module was found.
    #[must_use]
    pub const fn found_nothing(&self) -> bool {
        self.selected.is_none()
    }

    /// Returns `true` for the pass run when autoloading was enabled.
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        matches!(self.trigger, ReloadTrigger::Initial)
    }
}
