//! Autoload configuration.
//!
//! The only required input is the module directory. When it is not
//! configured anywhere, autoloading is switched off; that is a supported
//! state, not an error.
//!
//! # Sources
//!
//! | Key | Environment | TOML key | Default |
//! |-----|-------------|----------|---------|
//! | module directory | `HOTDYLIB_DIRECTORY` | `directory` | not set (feature off) |
//! | debounce window | `HOTDYLIB_DEBOUNCE_MS` | `debounce_ms` | `100` |
//! | watched events | `HOTDYLIB_EVENTS` | `events` | `created` |
//!
//! Values are layered CLI > environment > `.env` > config file > default,
//! and [`AutoloadConfig::sources`] records which layer won.
//!
//! ```rust,ignore
//! use hotdylib::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//! match config.directory() {
//!     Some(dir) => println!("modules in {dir}"),
//!     None => println!("autoloading disabled"),
//! }
//! ```

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{ConfigError, ConfigSources, Source};

/// Environment variable holding the module directory.
pub const DIRECTORY_VAR: &str = "HOTDYLIB_DIRECTORY";

/// Environment variable holding the debounce window in milliseconds.
pub const DEBOUNCE_VAR: &str = "HOTDYLIB_DEBOUNCE_MS";

/// Environment variable selecting the watched events (`created` or `any`).
pub const EVENTS_VAR: &str = "HOTDYLIB_EVENTS";

/// Config file read when present in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "hotdylib.toml";

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Absolute path of the directory scanned for modules.
///
/// Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleDirectory(PathBuf);

impl ModuleDirectory {
    /// Validates `path` as a module directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RelativeDirectory`] if `path` is not absolute.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.is_absolute() {
            Ok(Self(path))
        } else {
            Err(ConfigError::RelativeDirectory { path })
        }
    }

    /// The directory path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ModuleDirectory {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for ModuleDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Which directory changes wake the watcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum EventFilter {
    /// Only newly created items (a fresh build artifact).
    #[default]
    Created,
    /// Creations, removals, renames and content modifications.
    Any,
}

impl EventFilter {
    /// Returns `true` if events of `kind` should trigger a selection pass.
    #[must_use]
    pub const fn accepts(self, kind: crate::ChangeKind) -> bool {
        use crate::ChangeKind;

        match self {
            Self::Created => matches!(kind, ChangeKind::Created),
            Self::Any => !matches!(kind, ChangeKind::Other),
        }
    }
}

impl FromStr for EventFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" | "create" => Ok(Self::Created),
            "any" | "all" => Ok(Self::Any),
            other => Err(format!("expected `created` or `any`, got `{other}`")),
        }
    }
}

impl Display for EventFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Resolved autoload configuration.
#[derive(Clone, Debug)]
pub struct AutoloadConfig {
    directory: Option<ModuleDirectory>,
    debounce: Duration,
    events: EventFilter,
    sources: ConfigSources,
}

impl AutoloadConfig {
    /// A configuration with defaults and the given directory, bypassing
    /// all configuration sources.
    #[must_use]
    pub fn with_directory(directory: Option<ModuleDirectory>) -> Self {
        let mut sources = ConfigSources::new();
        sources.record(
            "directory",
            if directory.is_some() { Source::Default } else { Source::NotSet },
        );
        sources.record("debounce_ms", Source::Default);
        sources.record("events", Source::Default);

        Self {
            directory,
            debounce: DEFAULT_DEBOUNCE,
            events: EventFilter::default(),
            sources,
        }
    }

    /// The module directory, or `None` when autoloading is switched off.
    #[must_use]
    pub const fn directory(&self) -> Option<&ModuleDirectory> {
        self.directory.as_ref()
    }

    /// Returns `true` if a module directory is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Quiet period used to coalesce directory events into one batch.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Which directory changes trigger a selection pass.
    #[must_use]
    pub const fn events(&self) -> EventFilter {
        self.events
    }

    /// Where each value came from.
    #[must_use]
    pub const fn sources(&self) -> &ConfigSources {
        &self.sources
    }
}

impl Default for AutoloadConfig {
    fn default() -> Self {
        Self::with_directory(None)
    }
}

/// Shape of `hotdylib.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    directory: Option<PathBuf>,
    debounce_ms: Option<u64>,
    events: Option<EventFilter>,
}

/// Values read from a `.env` file without touching the process environment.
#[derive(Debug, Default)]
struct DotenvValues {
    path: Option<PathBuf>,
    values: HashMap<String, String>,
}

/// Builds an [`AutoloadConfig`] from layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    file_required: bool,
    dotenv: Option<PathBuf>,
    directory: Option<PathBuf>,
    debounce: Option<Duration>,
    events: Option<EventFilter>,
}

impl ConfigLoader {
    /// Creates a loader that reads the environment, `.env` (with the
    /// `dotenv` feature) and `hotdylib.toml` if present.
    #[must_use]
    pub fn new() -> Self {
        Self {
            file: Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
            file_required: false,
            dotenv: cfg!(feature = "dotenv").then(|| PathBuf::from(".env")),
            directory: None,
            debounce: None,
            events: None,
        }
    }

    /// Reads `path` as the config file; it must exist.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self.file_required = true;
        self
    }

    /// Skips the config file entirely.
    #[must_use]
    pub fn without_file(mut self) -> Self {
        self.file = None;
        self.file_required = false;
        self
    }

    /// Reads `.env` values from `path` instead of `./.env`.
    #[must_use]
    pub fn dotenv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv = Some(path.into());
        self
    }

    /// Skips `.env` files.
    #[must_use]
    pub fn without_dotenv(mut self) -> Self {
        self.dotenv = None;
        self
    }

    /// Overrides the module directory (CLI layer).
    #[must_use]
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.directory = Some(path.into());
        self
    }

    /// Overrides the debounce window (CLI layer).
    #[must_use]
    pub const fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Overrides the watched events (CLI layer).
    #[must_use]
    pub const fn events(mut self, events: EventFilter) -> Self {
        self.events = Some(events);
        self
    }

    /// Resolves the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file is required but missing, a
    /// file cannot be parsed, the directory is relative, or a value is
    /// malformed.
    pub fn load(self) -> Result<AutoloadConfig, ConfigError> {
        let (file, file_path) = self.read_file()?;
        let dotenv = self.read_dotenv()?;
        let file_source = || Source::ConfigFile(file_path.clone().unwrap_or_default());
        let mut sources = ConfigSources::new();

        let directory = if let Some(path) = self.directory {
            sources.record("directory", Source::Cli);
            Some(path)
        } else if let Some((value, source)) = lookup(DIRECTORY_VAR, &dotenv)? {
            sources.record("directory", source);
            Some(PathBuf::from(value))
        } else if let Some(path) = file.directory {
            sources.record("directory", file_source());
            Some(path)
        } else {
            sources.record("directory", Source::NotSet);
            None
        };
        let directory = directory.map(ModuleDirectory::new).transpose()?;

        let debounce = if let Some(debounce) = self.debounce {
            sources.record("debounce_ms", Source::Cli);
            debounce
        } else if let Some((value, source)) = lookup(DEBOUNCE_VAR, &dotenv)? {
            let millis = value.trim().parse::<u64>().map_err(|e| {
                ConfigError::invalid_value("debounce_ms", source.clone(), e.to_string())
            })?;
            sources.record("debounce_ms", source);
            Duration::from_millis(millis)
        } else if let Some(millis) = file.debounce_ms {
            sources.record("debounce_ms", file_source());
            Duration::from_millis(millis)
        } else {
            sources.record("debounce_ms", Source::Default);
            DEFAULT_DEBOUNCE
        };

        let events = if let Some(events) = self.events {
            sources.record("events", Source::Cli);
            events
        } else if let Some((value, source)) = lookup(EVENTS_VAR, &dotenv)? {
            let events = value
                .parse::<EventFilter>()
                .map_err(|e| ConfigError::invalid_value("events", source.clone(), e))?;
            sources.record("events", source);
            events
        } else if let Some(events) = file.events {
            sources.record("events", file_source());
            events
        } else {
            sources.record("events", Source::Default);
            EventFilter::default()
        };

        debug!(
            directory = ?directory.as_ref().map(ModuleDirectory::as_path),
            debounce_ms = debounce.as_millis(),
            %events,
            "autoload configuration resolved"
        );

        Ok(AutoloadConfig {
            directory,
            debounce,
            events,
            sources,
        })
    }

    fn read_file(&self) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
        let Some(path) = &self.file else {
            return Ok((FileConfig::default(), None));
        };
        if !self.file_required && !path.exists() {
            return Ok((FileConfig::default(), None));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        Ok((parsed, Some(path.clone())))
    }

    #[cfg(feature = "dotenv")]
    fn read_dotenv(&self) -> Result<DotenvValues, ConfigError> {
        let Some(path) = &self.dotenv else {
            return Ok(DotenvValues::default());
        };
        if !path.exists() {
            return Ok(DotenvValues::default());
        }

        let to_error = |e: dotenvy::Error| ConfigError::Dotenv {
            path: path.clone(),
            message: e.to_string(),
        };
        let mut values = HashMap::new();
        for item in dotenvy::from_path_iter(path).map_err(to_error)? {
            let (key, value) = item.map_err(to_error)?;
            values.insert(key, value);
        }

        Ok(DotenvValues {
            path: Some(path.clone()),
            values,
        })
    }

    #[cfg(not(feature = "dotenv"))]
    fn read_dotenv(&self) -> Result<DotenvValues, ConfigError> {
        Ok(DotenvValues::default())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks `key` up in the process environment, then in `.env` values.
fn lookup(key: &'static str, dotenv: &DotenvValues) -> Result<Option<(String, Source)>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => return Ok(Some((value, Source::Environment))),
        Ok(_) | Err(std::env::VarError::NotPresent) => {}
        Err(std::env::VarError::NotUnicode(_)) => {
            return Err(ConfigError::invalid_value(
                key,
                Source::Environment,
                "environment variable contains invalid UTF-8",
            ));
        }
    }

    Ok(dotenv
        .values
        .get(key)
        .filter(|value| !value.is_empty())
        .map(|value| (value.clone(), Source::DotenvFile(dotenv.path.clone()))))
}
