//! Loading, invoking and unloading a module.
//!
//! One load is a complete cycle: open the file as a dynamic library with
//! lazy binding, resolve [`ENTRY_SYMBOL`], call it, close the handle. No
//! library handle outlives the cycle.
//!
//! Failures are [`FatalModuleError`]s. Hosts usually hand them to
//! [`terminate`], which is also what [`AutoloadBuilder`](crate::AutoloadBuilder)
//! installs by default for watch-triggered loads.

use std::path::Path;
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::FatalModuleError;

/// Name of the function every module must export.
///
/// The function takes no arguments and returns nothing:
///
/// ```rust,ignore
/// #[unsafe(no_mangle)]
/// pub extern "C" fn test() {
///     println!("hello from the freshly built module");
/// }
/// ```
pub const ENTRY_SYMBOL: &str = "test";

/// Performs one load/invoke/unload cycle for a module path.
///
/// Implementations do not need to be reentrant: every call made by this
/// crate goes through a [`LoadGate`].
pub trait ModuleLoader: Send {
    /// Loads `path`, invokes its entry point and unloads it again.
    ///
    /// # Errors
    ///
    /// Returns [`FatalModuleError`] if the module cannot be opened, lacks
    /// the entry point, or cannot be closed.
    fn load(&mut self, path: &Path) -> Result<(), FatalModuleError>;
}

/// [`ModuleLoader`] backed by the platform dynamic linker.
///
/// # Safety Model
///
/// Loading native code runs its initializers and the entry point with the
/// full privileges of the host process. Nothing about the module's behavior
/// is checked.
#[derive(Clone, Copy, Debug, Default)]
pub struct DylibLoader;

impl ModuleLoader for DylibLoader {
    fn load(&mut self, path: &Path) -> Result<(), FatalModuleError> {
        debug!(path = %path.display(), "opening module");
        let library = open_lazy(path).map_err(|e| FatalModuleError::open(path, e))?;

        let invoked = {
            // SAFETY: the entry point contract is `extern "C" fn()`. The symbol
            // is dropped at the end of this block, before the library closes.
            match unsafe { library.get::<unsafe extern "C" fn()>(ENTRY_SYMBOL.as_bytes()) } {
                Ok(entry) => {
                    info!(path = %path.display(), symbol = ENTRY_SYMBOL, "invoking module entry point");
                    // SAFETY: see above; whatever the module does is its own business.
                    unsafe { entry() };
                    Ok(())
                }
                Err(e) => Err(FatalModuleError::symbol(path, ENTRY_SYMBOL, e)),
            }
        };

        let closed = library
            .close()
            .map_err(|e| FatalModuleError::close(path, e));

        match (invoked, closed) {
            (Err(e), Err(close)) => {
                error!(path = %path.display(), error = %close, "failed to close library after symbol lookup failed");
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => {
                debug!(path = %path.display(), "module closed");
                Ok(())
            }
        }
    }
}

#[cfg(unix)]
fn open_lazy(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LAZY, RTLD_LOCAL};

    // SAFETY: opening a library runs its initializers; modules are trusted
    // development artifacts.
    unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_LOCAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_lazy(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: as above. Windows resolves imports at load time.
    unsafe { Library::new(path) }
}

/// Serializes all loads through one loader.
///
/// Manual loads and watch-triggered loads share a gate, so at most one
/// library handle is open at any time.
pub struct LoadGate<L> {
    loader: Mutex<L>,
}

impl<L: ModuleLoader> LoadGate<L> {
    /// Wraps `loader`.
    pub fn new(loader: L) -> Self {
        Self {
            loader: Mutex::new(loader),
        }
    }

    /// Runs one load cycle, waiting for any load already in progress.
    ///
    /// # Errors
    ///
    /// Propagates the loader's [`FatalModuleError`].
    pub fn load(&self, path: &Path) -> Result<(), FatalModuleError> {
        let mut loader = self.loader.lock();
        loader.load(path)
    }

    /// Returns `true` if a load is currently running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loader.is_locked()
    }
}

impl<L> std::fmt::Debug for LoadGate<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGate")
            .field("loading", &self.loader.is_locked())
            .finish()
    }
}

/// Callback invoked with fatal errors raised by watch-triggered loads.
pub type FatalHandler = Arc<dyn Fn(FatalModuleError) + Send + Sync + 'static>;

/// Reports `error` and terminates the process with exit status 1.
///
/// This is the default [`FatalHandler`] behavior: a module that was
/// selected but cannot be loaded is a broken build, and continuing with a
/// half-loaded module is worse than stopping.
pub fn terminate(error: FatalModuleError) -> ! {
    error!(path = %error.path().display(), error = %error, "fatal module error");
    eprintln!("{:?}", miette::Report::new(error));
    std::process::exit(1)
}

/// A [`FatalHandler`] that calls [`terminate`].
#[must_use]
pub fn terminate_handler() -> FatalHandler {
    fn handle(error: FatalModuleError) {
        terminate(error)
    }
    Arc::new(handle)
}
