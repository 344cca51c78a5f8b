//! Module discovery and selection.
//!
//! A module directory typically holds build output: the library itself,
//! intermediate objects, dependency files, maybe older copies. Selection
//! narrows that down to exactly one file:
//!
//! 1. list the directory (non-recursive),
//! 2. keep regular files whose sniffed [`ContentType`] equals the required
//!    type (the platform's dynamic library type by default),
//! 3. take the one with the newest modification time.
//!
//! ```rust,ignore
//! use hotdylib::{ContentType, ModuleSelector};
//!
//! let selector = ModuleSelector::new(ContentType::ElfSharedObject);
//! if let Some(module) = selector.select(Path::new("/work/game/target/debug")) {
//!     println!("would load {}", module.path().display());
//! }
//! ```
//!
//! Selection never fails: listing errors are logged and treated as "no
//! module", since the directory may be transiently missing during a rebuild.

mod content_type;
mod selector;

pub use content_type::{ContentType, HEADER_WINDOW};
pub use selector::{CandidateModule, ModuleSelector, SelectedModule};
