//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use hotdylib::{
    ChangeEvent, ChangeKind, EventFilter, EventSource, FatalModuleError, ModuleLoader,
    ModuleReport, Subscription, WatchError,
};
use parking_lot::Mutex;

/// Long enough for any report the tests wait on.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal 64-bit little-endian ELF header with the given `e_type`.
pub fn elf_header(e_type: u16) -> Vec<u8> {
    let mut header = vec![0u8; 64];
    header[..4].copy_from_slice(b"\x7fELF");
    header[4] = 2;
    header[5] = 1;
    header[6] = 1;
    header[16..18].copy_from_slice(&e_type.to_le_bytes());
    header
}

/// Writes a file that sniffs as an ELF shared object.
pub fn write_module(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, elf_header(3)).unwrap();
    path
}

/// Writes a module and sets its modification time to `secs` after the epoch.
pub fn write_module_at(dir: &Path, name: &str, secs: u64) -> PathBuf {
    let path = write_module(dir, name);
    set_modified(&path, secs);
    path
}

pub fn set_modified(path: &Path, secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

pub fn modified(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

/// Compiles a real dynamic library into `modules` whose `test` entry point
/// writes "called" to `marker`.
///
/// Uses `$RUSTC` if set, otherwise `rustc` from `PATH`. The library is
/// built in a scratch directory and copied in, so `modules` holds nothing
/// but the library itself.
pub fn build_marker_module(modules: &Path, marker: &Path) -> PathBuf {
    let scratch = tempfile::tempdir().unwrap();
    let source = scratch.path().join("fixture.rs");
    fs::write(
        &source,
        format!(
            "#[no_mangle]\npub extern \"C\" fn test() {{\n    let _ = std::fs::write({:?}, \"called\");\n}}\n",
            marker.display().to_string()
        ),
    )
    .unwrap();

    let name = format!("{DLL_PREFIX}fixture{DLL_SUFFIX}");
    let built = scratch.path().join(&name);
    let rustc = std::env::var_os("RUSTC").unwrap_or_else(|| "rustc".into());
    let status = Command::new(rustc)
        .args(["--edition", "2021", "--crate-type", "cdylib", "-C", "opt-level=0"])
        .arg("-o")
        .arg(&built)
        .arg(&source)
        .status()
        .expect("rustc must be available to build the fixture library");
    assert!(status.success(), "fixture library failed to compile");

    let path = modules.join(&name);
    fs::copy(&built, &path).unwrap();
    path
}

/// Records every path it is asked to load.
#[derive(Clone, Default)]
pub struct CountingLoader {
    loads: Arc<Mutex<Vec<PathBuf>>>,
}

impl CountingLoader {
    pub fn loads(&self) -> Vec<PathBuf> {
        self.loads.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.loads.lock().len()
    }
}

impl ModuleLoader for CountingLoader {
    fn load(&mut self, path: &Path) -> Result<(), FatalModuleError> {
        self.loads.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// Fails every load with an open error.
#[derive(Clone, Copy, Default)]
pub struct FailingLoader;

impl ModuleLoader for FailingLoader {
    fn load(&mut self, path: &Path) -> Result<(), FatalModuleError> {
        Err(FatalModuleError::open(
            path,
            hotdylib::libloading::Error::DlOpenUnknown,
        ))
    }
}

/// Blocks inside `load` until released.
pub struct BlockingLoader {
    started: Sender<PathBuf>,
    release: Receiver<()>,
    finished: Arc<AtomicUsize>,
}

pub struct BlockingControl {
    pub started: Receiver<PathBuf>,
    pub release: Sender<()>,
    pub finished: Arc<AtomicUsize>,
}

impl BlockingLoader {
    pub fn new() -> (Self, BlockingControl) {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let finished = Arc::new(AtomicUsize::new(0));
        (
            Self {
                started: started_tx,
                release: release_rx,
                finished: finished.clone(),
            },
            BlockingControl {
                started: started_rx,
                release: release_tx,
                finished,
            },
        )
    }
}

impl ModuleLoader for BlockingLoader {
    fn load(&mut self, path: &Path) -> Result<(), FatalModuleError> {
        let _ = self.started.send(path.to_path_buf());
        let _ = self.release.recv();
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Event source driven by the test instead of the file system.
///
/// Ignores the event filter: every emitted event is delivered.
#[derive(Clone, Default)]
pub struct ChannelSource {
    sender: Arc<Mutex<Option<Sender<ChangeEvent>>>>,
    subscriptions: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    released_disconnected: Arc<AtomicUsize>,
}

impl ChannelSource {
    /// Delivers an event; returns `false` if no subscription is listening.
    pub fn emit(&self, kind: ChangeKind, paths: impl IntoIterator<Item = PathBuf>) -> bool {
        let sender = self.sender.lock().clone();
        sender.is_some_and(|tx| tx.send(ChangeEvent::new(kind, paths)).is_ok())
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Releases that happened after every event receiver was gone.
    pub fn released_disconnected(&self) -> usize {
        self.released_disconnected.load(Ordering::SeqCst)
    }
}

struct ReleaseGuard {
    sender: Arc<Mutex<Option<Sender<ChangeEvent>>>>,
    released: Arc<AtomicUsize>,
    released_disconnected: Arc<AtomicUsize>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.sender.lock().take() {
            let marker = ChangeEvent::new(ChangeKind::Other, Vec::new());
            if matches!(tx.try_send(marker), Err(TrySendError::Disconnected(_))) {
                self.released_disconnected.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl EventSource for ChannelSource {
    fn subscribe(&self, _directory: &Path, _filter: EventFilter) -> Result<Subscription, WatchError> {
        let (tx, rx) = bounded(64);
        *self.sender.lock() = Some(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);

        Ok(Subscription::new(
            rx,
            ReleaseGuard {
                sender: self.sender.clone(),
                released: self.released.clone(),
                released_disconnected: self.released_disconnected.clone(),
            },
        ))
    }
}

/// An event source whose subscriptions always fail.
#[derive(Clone, Copy, Default)]
pub struct BrokenSource;

impl EventSource for BrokenSource {
    fn subscribe(&self, directory: &Path, _filter: EventFilter) -> Result<Subscription, WatchError> {
        Err(WatchError::path_error(directory, "subscription refused"))
    }
}

/// Collects reports from an `on_result` callback.
pub fn report_channel() -> (impl Fn(ModuleReport) + Send + Sync + 'static, Receiver<ModuleReport>) {
    let (tx, rx) = unbounded();
    (
        move |report| {
            let _ = tx.send(report);
        },
        rx,
    )
}

/// Counts calls to a fatal handler.
pub fn fatal_counter() -> (impl Fn(FatalModuleError) + Send + Sync + 'static, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let handler_count = count.clone();
    (
        move |_| {
            handler_count.fetch_add(1, Ordering::SeqCst);
        },
        count,
    )
}

/// A flag set from another thread.
pub fn flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}
