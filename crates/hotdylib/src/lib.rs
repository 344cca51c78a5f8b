//! # hotdylib
//!
//! Load a freshly built native module into a running process, call its
//! entry point, and do it again every time a newer module shows up.
//!
//! `hotdylib` shortens the edit-build-run loop for native code: the host
//! process stays up while a module is rebuilt externally, and the newest
//! build is picked up from a directory, loaded, invoked and unloaded.
//!
//! ## Features
//!
//! - **Deterministic selection** - the newest regular file of the native
//!   dynamic library type wins, ties go to the smallest path
//! - **Header sniffing** - ELF, Mach-O and PE files are classified by their
//!   header bytes, not by file extension
//! - **Complete load cycles** - open with lazy binding, call `test`, close;
//!   no library handle outlives a load
//! - **Autoloading** - a directory watch reloads the module after each build
//! - **Rich diagnostics** - load failures are [`miette`] diagnostics
//! - **Layered configuration** - CLI, environment, `.env` and TOML file, with
//!   source attribution
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hotdylib::{AutoloadBuilder, ConfigLoader};
//!
//! fn main() -> hotdylib::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     let autoloader = AutoloadBuilder::new().config(&config).build();
//!
//!     match autoloader.load_once()? {
//!         Some(module) => println!("loaded {}", module.path().display()),
//!         None => println!("nothing to load"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Contract
//!
//! A module is a shared library placed directly in the module directory
//! that exports an unmangled `extern "C" fn test()`:
//!
//! ```rust,ignore
//! #[unsafe(no_mangle)]
//! pub extern "C" fn test() {
//!     println!("hello from the new build");
//! }
//! ```
//!
//! ## Error Output Example
//!
//! ```text
//! hotdylib::loader::symbol_missing
//!
//!   × failed to load 'test' symbol in library at '/work/plugin/target/debug/libplugin.so'
//!   ╰─▶ /work/plugin/target/debug/libplugin.so: undefined symbol: test
//!   help: Export the entry point as `#[unsafe(no_mangle)] pub extern "C" fn test()`
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|---------|
//! | `dotenv` | Read `HOTDYLIB_*` values from `.env` files | **Yes** |
//! | `cli` | The `hotdylib` host binary | **Yes** |

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Re-export miette for error handling.
pub use miette;

/// Re-export libloading for custom [`ModuleLoader`] implementations.
pub use libloading;

// ============================================================================
// Core Modules
// ============================================================================

// Error types
mod error;
pub use error::{ConfigError, FatalModuleError};

/// A Result type that displays errors with miette's fancy formatting.
///
/// ```rust,ignore
/// fn main() -> hotdylib::Result<()> {
///     let config = hotdylib::ConfigLoader::new().load()?;
///     Ok(())
/// }
/// ```
pub type Result<T> = miette::Result<T>;

// Source attribution types
mod source;
pub use source::{ConfigSources, Source, ValueSource};

pub mod config;
pub use config::{AutoloadConfig, ConfigLoader, EventFilter, ModuleDirectory};

// ============================================================================
// Selection and Loading
// ============================================================================

pub mod select;
pub use select::{CandidateModule, ContentType, ModuleSelector, SelectedModule};

pub mod loader;
pub use loader::{
    DylibLoader, ENTRY_SYMBOL, FatalHandler, LoadGate, ModuleLoader, terminate, terminate_handler,
};

// ============================================================================
// Autoloading
// ============================================================================

pub mod watch;

pub use watch::{
    AutoloadBuilder, AutoloadHandle, AutoloadState, Autoloader, ChangeEvent, ChangeKind,
    EventSource, ModuleReport, NotifyEventSource, ReloadTrigger, ReportCallback, Subscription,
    WatchError, WatchOptions,
};
