//! Error types for module loading and configuration.
//!
//! # Error Taxonomy
//!
//! | Type | When It Occurs | Policy |
//! |------|----------------|--------|
//! | [`FatalModuleError`] | A selected module cannot be opened, resolved or closed | Fatal by default |
//! | [`ConfigError`] | The configuration file or a configured value is invalid | Reported to the host |
//! | [`WatchError`](crate::WatchError) | The directory subscription cannot be installed | Reported to the host |
//!
//! Conditions the autoloader absorbs (a directory that cannot be listed, a
//! file whose attributes cannot be read, no qualifying module, no directory
//! configured) are never errors; they degrade to "no module".
//!
//! # Fatal Module Errors
//!
//! A module file that was selected but cannot be opened indicates a broken
//! build artifact. These errors are returned as values so a host can decide
//! what to do, but the default handler installed by
//! [`AutoloadBuilder`](crate::AutoloadBuilder) terminates the process with a
//! diagnostic (see [`terminate`](crate::terminate)).

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::Source;

/// A selected module could not be loaded, invoked or unloaded.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum FatalModuleError {
    /// The dynamic linker refused to open the file.
    #[error("failed to load library at '{}'", path.display())]
    #[diagnostic(
        code(hotdylib::loader::open_failed),
        help(
            "The file looks like a dynamic library but could not be opened. Check for a truncated build artifact or an architecture mismatch, then rebuild."
        )
    )]
    Open {
        /// Path of the module that failed to open.
        path: PathBuf,
        /// The underlying dynamic linker error.
        #[source]
        source: libloading::Error,
    },

    /// The module does not export the entry point.
    #[error("failed to load '{symbol}' symbol in library at '{}'", path.display())]
    #[diagnostic(
        code(hotdylib::loader::symbol_missing),
        help("Export the entry point as `#[unsafe(no_mangle)] pub extern \"C\" fn {symbol}()`")
    )]
    Symbol {
        /// Path of the module that lacks the symbol.
        path: PathBuf,
        /// The symbol that could not be resolved.
        symbol: &'static str,
        /// The underlying dynamic linker error.
        #[source]
        source: libloading::Error,
    },

    /// The library handle could not be released.
    #[error("failed to close library at '{}'", path.display())]
    #[diagnostic(code(hotdylib::loader::close_failed))]
    Close {
        /// Path of the module whose handle could not be closed.
        path: PathBuf,
        /// The underlying dynamic linker error.
        #[source]
        source: libloading::Error,
    },
}

impl FatalModuleError {
    /// Create a new `Open` error.
    pub fn open(path: impl Into<PathBuf>, source: libloading::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Create a new `Symbol` error.
    pub fn symbol(path: impl Into<PathBuf>, symbol: &'static str, source: libloading::Error) -> Self {
        Self::Symbol {
            path: path.into(),
            symbol,
            source,
        }
    }

    /// Create a new `Close` error.
    pub fn close(path: impl Into<PathBuf>, source: libloading::Error) -> Self {
        Self::Close {
            path: path.into(),
            source,
        }
    }

    /// The module the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. } | Self::Symbol { path, .. } | Self::Close { path, .. } => path,
        }
    }
}

/// Errors raised while resolving [`AutoloadConfig`](crate::AutoloadConfig).
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read config file '{}'", path.display())]
    #[diagnostic(
        code(hotdylib::config::read_failed),
        help("Check that the file exists and is readable")
    )]
    Read {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML or has unknown keys.
    #[error("invalid config file '{}'", path.display())]
    #[diagnostic(
        code(hotdylib::config::parse_failed),
        help("Supported keys are `directory`, `debounce_ms` and `events`")
    )]
    Parse {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A `.env` file exists but could not be parsed.
    #[error("invalid .env file '{}': {message}", path.display())]
    #[diagnostic(code(hotdylib::config::dotenv_failed))]
    Dotenv {
        /// The `.env` file.
        path: PathBuf,
        /// Human-readable error message.
        message: String,
    },

    /// The module directory is not an absolute path.
    #[error("module directory '{}' is not an absolute path", path.display())]
    #[diagnostic(
        code(hotdylib::config::relative_directory),
        help("Set HOTDYLIB_DIRECTORY (or `directory` in hotdylib.toml) to an absolute path")
    )]
    RelativeDirectory {
        /// The configured path.
        path: PathBuf,
    },

    /// A configured value could not be parsed.
    #[error("invalid value for {key} from {origin}: {message}")]
    #[diagnostic(code(hotdylib::config::invalid_value))]
    InvalidValue {
        /// The configuration key.
        key: &'static str,
        /// Where the value came from.
        origin: Source,
        /// Human-readable error message.
        message: String,
    },
}

impl ConfigError {
    /// Create a new `InvalidValue` error.
    pub fn invalid_value(key: &'static str, origin: Source, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            origin,
            message: message.into(),
        }
    }
}
