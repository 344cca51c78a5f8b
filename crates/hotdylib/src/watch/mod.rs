//! Autoloading: reload the module whenever its directory changes.
//!
//! # Features
//!
//! - **Directory watching** - one non-recursive subscription on the module
//!   directory through the `notify` crate
//! - **Debouncing** - a build's burst of events becomes a single pass
//! - **No redundant reloads** - a selection at the last-loaded path is
//!   reported but not loaded again
//! - **Serialized loads** - manual and watch-triggered loads share a
//!   [`LoadGate`](crate::LoadGate)
//! - **Clean teardown** - stopping waits for an in-flight pass, discards
//!   pending events and drops the subscription exactly once
//!
//! # Quick Start
//!
//! ```ignore
//! use hotdylib::{AutoloadBuilder, ModuleDirectory};
//! use std::time::Duration;
//!
//! fn main() -> hotdylib::Result<()> {
//!     let mut autoloader = AutoloadBuilder::new()
//!         .directory(ModuleDirectory::new("/work/plugin/target/debug")?)
//!         .debounce(Duration::from_millis(200))
//!         .on_result(|report| println!("{:?} (loaded: {})", report.selected_path(), report.loaded))
//!         .build();
//!
//!     // Load whatever is there right now.
//!     autoloader.load_once()?;
//!
//!     // Load each new module until told to stop.
//!     autoloader.set_autoloading(true)?;
//!     std::io::stdin().read_line(&mut String::new()).ok();
//!     autoloader.set_autoloading(false)?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌──────────────────┐
//! │ EventSource │────▶│ watcher thread│────▶│   ModuleState    │
//! │  (notify)   │     │  (debounce)   │     │ (gate + last)    │
//! └─────────────┘     └───────────────┘     └──────────────────┘
//!                            │                       ▲
//!                            ▼                       │
//!                     ┌─────────────┐        ┌──────────────┐
//!                     │  on_result  │        │  Autoloader  │
//!                     │  on_fatal   │        │  (load_once) │
//!                     └─────────────┘        └──────────────┘
//! ```
//!
//! # Fatal Errors
//!
//! A selected module that cannot be opened, lacks the entry point or cannot
//! be closed is a broken build. Watch-triggered loads pass the
//! [`FatalModuleError`](crate::FatalModuleError) to the fatal handler, which
//! by default terminates the process. Install a handler with
//! [`AutoloadBuilder::on_fatal`] to keep running instead; the failed module
//! is then not recorded as loaded.

mod autoloader;
mod builder;
mod context;
mod debounce;
mod handle;
mod source;
mod types;
mod watcher;

// Public API
pub use autoloader::{AutoloadState, Autoloader};
pub use builder::AutoloadBuilder;
pub use context::ReportCallback;
pub use handle::AutoloadHandle;
pub use source::{ChangeEvent, ChangeKind, EventSource, NotifyEventSource, Subscription};
pub use types::{ModuleReport, ReloadTrigger, WatchError};
pub use watcher::WatchOptions;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _: fn() -> AutoloadBuilder = AutoloadBuilder::new;
        let _ = NotifyEventSource::default();
    }
}
