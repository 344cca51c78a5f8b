//! State shared between manual loads and the watcher thread.
//!
//! [`ModuleState`] pairs the [`LoadGate`] with the path of the last-loaded
//! module. Loads are serialized, and the comparison against the last-loaded
//! path happens inside the same critical section as the load, so a manual
//! load and a watch-triggered pass can never both load the same path. The
//! last-loaded path itself is only locked briefly, never while a module's
//! entry point runs.
//!
//! [`WatchContext`] is everything one watch needs to run a pass. It is
//! created by `start`, moved into the watcher thread and dropped when that
//! thread exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::types::{ModuleReport, ReloadTrigger};
use crate::{
    FatalHandler, FatalModuleError, LoadGate, ModuleDirectory, ModuleLoader, ModuleSelector,
};

/// Callback receiving the outcome of every selection pass.
pub type ReportCallback = Arc<dyn Fn(ModuleReport) + Send + Sync + 'static>;

/// The load gate and the last-loaded path.
pub(crate) struct ModuleState<L> {
    gate: LoadGate<L>,
    serial: Mutex<()>,
    last_loaded: Mutex<Option<PathBuf>>,
}

impl<L: ModuleLoader> ModuleState<L> {
    pub(crate) fn new(loader: L, last_loaded: Option<PathBuf>) -> Self {
        Self {
            gate: LoadGate::new(loader),
            serial: Mutex::new(()),
            last_loaded: Mutex::new(last_loaded),
        }
    }

    pub(crate) fn last_loaded(&self) -> Option<PathBuf> {
        self.last_loaded.lock().clone()
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.gate.is_loading()
    }

    /// Loads `path` unconditionally and records it as last loaded.
    pub(crate) fn load(&self, path: &Path) -> Result<(), FatalModuleError> {
        let _serial = self.serial.lock();
        self.load_and_record(path)
    }

    /// Loads `path` unless it is the last-loaded path.
    ///
    /// Returns whether a load happened. On error the last-loaded path is
    /// left unchanged.
    pub(crate) fn load_if_new(&self, path: &Path) -> Result<bool, FatalModuleError> {
        let _serial = self.serial.lock();
        if self.last_loaded.lock().as_deref() == Some(path) {
            debug!(path = %path.display(), "module already loaded");
            return Ok(false);
        }
        self.load_and_record(path)?;
        Ok(true)
    }

    fn load_and_record(&self, path: &Path) -> Result<(), FatalModuleError> {
        self.gate.load(path)?;
        *self.last_loaded.lock() = Some(path.to_path_buf());
        Ok(())
    }
}

/// Everything a running watch needs to perform a pass.
pub(crate) struct WatchContext<L> {
    pub(crate) directory: ModuleDirectory,
    pub(crate) selector: ModuleSelector,
    pub(crate) modules: Arc<ModuleState<L>>,
    pub(crate) on_result: Option<ReportCallback>,
    pub(crate) on_fatal: FatalHandler,
}

impl<L: ModuleLoader> WatchContext<L> {
    /// Selects, loads if the selection is new, and reports.
    ///
    /// A fatal load error goes to the fatal handler first. If the handler
    /// returns, the pass is still reported, with `loaded == false`.
    pub(crate) fn run_pass(&self, trigger: ReloadTrigger) -> ModuleReport {
        let selected = self.selector.select(self.directory.as_path());

        let loaded = match &selected {
            Some(module) => match self.modules.load_if_new(module.path()) {
                Ok(loaded) => {
                    if loaded {
                        info!(path = %module.path().display(), %trigger, "module loaded");
                    }
                    loaded
                }
                Err(e) => {
                    (self.on_fatal)(e);
                    false
                }
            },
            None => {
                debug!(directory = %self.directory, %trigger, "no qualifying module");
                false
            }
        };

        let report = ModuleReport::new(selected, loaded, trigger);
        if let Some(on_result) = &self.on_result {
            on_result(report.clone());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Receiver, Sender, bounded};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Counter(Arc<Mutex<Vec<PathBuf>>>);

    impl ModuleLoader for Counter {
        fn load(&mut self, path: &Path) -> Result<(), FatalModuleError> {
            self.0.lock().push(path.to_path_buf());
            Ok(())
        }
    }

    struct Failing;

    impl ModuleLoader for Failing {
        fn load(&mut self, path: &Path) -> Result<(), FatalModuleError> {
            Err(FatalModuleError::open(path, libloading::Error::DlOpenUnknown))
        }
    }

    /// Signals when a load starts and waits to be released.
    struct Paused {
        started: Sender<()>,
        release: Receiver<()>,
    }

    impl ModuleLoader for Paused {
        fn load(&mut self, _path: &Path) -> Result<(), FatalModuleError> {
            let _ = self.started.send(());
            let _ = self.release.recv();
            Ok(())
        }
    }

    #[test]
    fn test_load_if_new_skips_same_path() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = ModuleState::new(Counter(seen.clone()), None);
        let path = Path::new("/m/a.so");

        assert!(state.load_if_new(path).unwrap());
        assert!(!state.load_if_new(path).unwrap());
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(state.last_loaded().as_deref(), Some(path));
    }

    #[test]
    fn test_load_if_new_respects_seeded_path() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = ModuleState::new(Counter(seen.clone()), Some(PathBuf::from("/m/a.so")));

        assert!(!state.load_if_new(Path::new("/m/a.so")).unwrap());
        assert!(state.load_if_new(Path::new("/m/b.so")).unwrap());
        assert_eq!(*seen.lock(), vec![PathBuf::from("/m/b.so")]);
    }

    #[test]
    fn test_load_always_loads() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = ModuleState::new(Counter(seen.clone()), None);

        state.load(Path::new("/m/a.so")).unwrap();
        state.load(Path::new("/m/a.so")).unwrap();
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_failed_load_keeps_last_loaded() {
        let previous = PathBuf::from("/m/a.so");
        let state = ModuleState::new(Failing, Some(previous.clone()));

        let next = Path::new("/m/b.so");
        assert!(state.load_if_new(next).is_err());
        assert!(state.load(next).is_err());
        assert_eq!(state.last_loaded(), Some(previous));
    }

    #[test]
    fn test_last_loaded_readable_during_load() {
        let (started_tx, started) = bounded(1);
        let (release, release_rx) = bounded(1);
        let state = Arc::new(ModuleState::new(
            Paused {
                started: started_tx,
                release: release_rx,
            },
            Some(PathBuf::from("/m/a.so")),
        ));

        let loading = state.clone();
        let worker = thread::spawn(move || loading.load_if_new(Path::new("/m/b.so")));
        started.recv_timeout(Duration::from_secs(10)).unwrap();

        assert!(state.is_loading());
        assert_eq!(state.last_loaded(), Some(PathBuf::from("/m/a.so")));

        release.send(()).unwrap();
        assert!(worker.join().unwrap().unwrap());
        assert_eq!(state.last_loaded(), Some(PathBuf::from("/m/b.so")));
    }

    #[test]
    fn test_run_pass_reports_fatal_as_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut header = vec![0u8; 64];
        header[..4].copy_from_slice(b"\x7fELF");
        header[4] = 2;
        header[5] = 1;
        header[16] = 3;
        std::fs::write(dir.path().join("libm.so"), header).unwrap();

        let fatal = Arc::new(Mutex::new(0_usize));
        let fatal_count = fatal.clone();
        let context = WatchContext {
            directory: ModuleDirectory::new(dir.path()).unwrap(),
            selector: ModuleSelector::new(crate::ContentType::ElfSharedObject),
            modules: Arc::new(ModuleState::new(Failing, None)),
            on_result: None,
            on_fatal: Arc::new(move |_| *fatal_count.lock() += 1),
        };

        let report = context.run_pass(ReloadTrigger::Initial);
        assert!(!report.loaded);
        assert!(report.selected.is_some());
        assert_eq!(*fatal.lock(), 1);
        assert_eq!(context.modules.last_loaded(), None);
    }
}
