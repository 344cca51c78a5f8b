//! Source attribution for configuration values.
//!
//! [`AutoloadConfig`](crate::AutoloadConfig) records where each of its values
//! came from so the host can explain why autoloading is (or is not) enabled.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Indicates where a configuration value originated from.
///
/// # Priority Order
///
/// Sources are consulted from highest to lowest priority:
///
/// 1. **CLI arguments** - `--directory /path/to/build`
/// 2. **Environment variables** - `HOTDYLIB_DIRECTORY=/path/to/build`
/// 3. **Dotenv files** - `.env` file
/// 4. **Config files** - `hotdylib.toml`
/// 5. **Built-in defaults**
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Source {
    /// Value was provided on the command line.
    Cli,

    /// Value was read from the process environment.
    Environment,

    /// Value was loaded from a `.env` file.
    DotenvFile(Option<PathBuf>),

    /// Value was loaded from a TOML configuration file.
    ConfigFile(PathBuf),

    /// Value is the built-in default.
    Default,

    /// No source provided a value.
    NotSet,
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI argument"),

            Self::Environment => write!(f, "Environment variable"),

            Self::DotenvFile(Some(path)) => write!(f, ".env file ({})", path.display()),

            Self::DotenvFile(None) => write!(f, ".env file"),

            Self::ConfigFile(path) => write!(f, "Config file ({})", path.display()),

            Self::Default => write!(f, "Default value"),

            Self::NotSet => write!(f, "Not set"),
        }
    }
}

/// Source information for a single configuration key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueSource {
    /// The configuration key (e.g., `"directory"`).
    pub key: &'static str,

    /// Where the value originated from.
    pub source: Source,
}

impl ValueSource {
    /// Creates a new `ValueSource`.
    #[must_use]
    pub const fn new(key: &'static str, source: Source) -> Self {
        Self { key, source }
    }
}

impl Display for ValueSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.source)
    }
}

/// Collection of source attributions for a loaded configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigSources {
    entries: Vec<ValueSource>,
}

impl ConfigSources {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Records the source of `key`, replacing any earlier record.
    pub fn record(&mut self, key: &'static str, source: Source) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.source = source;
        } else {
            self.entries.push(ValueSource::new(key, source));
        }
    }

    /// Returns the source of `key`, if recorded.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Source> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.source)
    }

    /// Iterates over all recorded attributions.
    pub fn iter(&self) -> impl Iterator<Item = &ValueSource> {
        self.entries.iter()
    }
}

impl Display for ConfigSources {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration Source:")?;
        for entry in &self.entries {
            writeln!(f, "  {entry}")?;
        }
        Ok(())
    }
}
